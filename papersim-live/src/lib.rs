//! Async dry-run trading on top of `papersim-core`.
//!
//! Where the core's replay engine steps through historical candles under
//! caller control, this crate runs the simulation on a live clock: a seeded
//! random walk moves prices, and a background task fills resting limit
//! orders as prices cross them. Intended for paper-trading a strategy
//! end-to-end before pointing it at a real exchange.

mod engine;
mod monitor;

pub use engine::{DryRunConfig, DryRunEngine};
