//! Background fill monitor.
//!
//! One task owns the clock: every `tick_interval` it takes the state lock,
//! advances the price walk, and tries to fill crossed limit orders. The lock
//! is held only for the duration of one tick, never across a sleep, so API
//! calls are never starved. Shutdown is cooperative via a watch channel and
//! waits for the task to finish its current tick.

use crate::engine::SimState;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::debug;

pub(crate) struct FillMonitor {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl FillMonitor {
    pub(crate) fn spawn(
        state: Arc<Mutex<SimState>>,
        tick_interval: Duration,
        fill_probability: f64,
    ) -> Self {
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick_interval);
            // The first tick of a tokio interval fires immediately.
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        state.lock().await.tick(fill_probability);
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            debug!("fill monitor stopping");
                            break;
                        }
                    }
                }
            }
        });
        Self { shutdown, task }
    }

    /// Signal the task to stop and wait for it to exit.
    pub(crate) async fn shutdown(self) {
        // Receiver dropping first just ends the loop early.
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}
