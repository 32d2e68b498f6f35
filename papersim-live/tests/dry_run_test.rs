//! End-to-end tests for the dry-run engine and its fill monitor.
//!
//! The price walk is frozen (zero trend, zero volatility) so price movement
//! happens only through `set_simulated_price`, which keeps the assertions
//! deterministic. Monitor-driven outcomes are observed by polling with a
//! timeout rather than sleeping fixed amounts.

use papersim_core::{CostModel, ExecutionError, OrderStatus, ProductId, WalkConfig};
use papersim_live::{DryRunConfig, DryRunEngine};
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

const TICK: Duration = Duration::from_millis(10);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn engine() -> DryRunEngine {
    init_tracing();
    let mut balances = HashMap::new();
    balances.insert("USD".to_string(), 100_000.0);
    balances.insert("BTC".to_string(), 2.0);
    let mut prices = HashMap::new();
    prices.insert("BTC-USD".parse::<ProductId>().unwrap(), 50_000.0);

    DryRunEngine::new(
        CostModel {
            fee_rate: 0.001,
            slippage_std: 0.0,
        },
        DryRunConfig {
            walk: WalkConfig {
                trend_bias: 0.0,
                volatility_factor: 0.0,
            },
            tick_interval: TICK,
            fill_probability: 1.0,
            simulated_latency: Duration::ZERO,
        },
        balances,
        prices,
        42,
    )
    .unwrap()
}

/// Poll `check` until it returns true or two seconds elapse.
async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let poll = async {
        loop {
            if check().await {
                return;
            }
            tokio::time::sleep(TICK).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(2), poll).await.is_ok()
}

#[tokio::test]
async fn market_order_fills_at_simulated_price() {
    let engine = engine();
    let order = engine
        .execute_market_order("BTC-USD", "buy", 0.1)
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Filled);
    assert_eq!(order.filled_price, Some(50_000.0));

    let usd = engine.get_simulated_balance("USD").await;
    let btc = engine.get_simulated_balance("BTC").await;
    assert!((usd - (100_000.0 - 5_000.0 - 5.0)).abs() < 1e-9);
    assert!((btc - 2.1).abs() < 1e-12);
}

#[tokio::test]
async fn monitor_fills_crossed_limit_order() {
    let mut engine = engine();
    engine.start();

    let order = engine
        .execute_limit_order("BTC-USD", "buy", 0.1, 48_000.0)
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Open);

    // Push the price through the limit; the monitor should fill it.
    engine.set_simulated_price("BTC-USD", 47_000.0).await.unwrap();
    let filled = eventually(|| async {
        engine.get_order_status(order.id).await.unwrap() == OrderStatus::Filled
    })
    .await;
    assert!(filled, "monitor never filled the crossed limit order");

    // Fills at the limit price, not the walked price.
    let filled = engine.get_order(order.id).await.unwrap();
    assert_eq!(filled.filled_price, Some(48_000.0));

    engine.stop().await;
}

#[tokio::test]
async fn cancel_before_fill_wins_the_race() {
    let mut engine = engine();

    // Monitor not started yet: the resting order cannot fill.
    let order = engine
        .execute_limit_order("BTC-USD", "sell", 0.5, 55_000.0)
        .await
        .unwrap();
    engine.cancel_order(order.id).await.unwrap();

    engine.start();
    engine.set_simulated_price("BTC-USD", 60_000.0).await.unwrap();
    tokio::time::sleep(TICK * 5).await;

    // Cancelled is terminal; the monitor must not resurrect the order.
    assert!(matches!(
        engine.get_order_status(order.id).await.unwrap(),
        OrderStatus::Cancelled { .. }
    ));
    assert_eq!(engine.get_simulated_balance("BTC").await, 2.0);

    // The cancellation is the last transition on record for this order.
    let trail = engine.audit_trail().await;
    let last = trail.iter().rev().find(|e| e.order_id == order.id).unwrap();
    assert!(matches!(last.to, OrderStatus::Cancelled { .. }));

    engine.stop().await;
}

#[tokio::test]
async fn halt_blocks_submissions_but_not_monitor_fills() {
    let mut engine = engine();
    engine.start();

    let order = engine
        .execute_limit_order("BTC-USD", "buy", 0.1, 48_000.0)
        .await
        .unwrap();

    engine.halt_trading("risk limit breached").await;
    let err = engine
        .execute_market_order("BTC-USD", "buy", 0.1)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Trading is currently halted");

    // The resting order still resolves while halted.
    engine.set_simulated_price("BTC-USD", 47_000.0).await.unwrap();
    let filled = eventually(|| async {
        engine.get_order_status(order.id).await.unwrap() == OrderStatus::Filled
    })
    .await;
    assert!(filled, "halt must not stop the monitor");

    engine.resume_trading("limits reset").await;
    assert!(engine.execute_market_order("BTC-USD", "buy", 0.1).await.is_ok());

    engine.stop().await;
}

#[tokio::test]
async fn stop_halts_the_clock() {
    let mut engine = engine();
    engine.start();
    assert!(engine.is_running());

    let ticked = eventually(|| async { engine.get_simulation_stats().await.ticks > 0 }).await;
    assert!(ticked);

    engine.stop().await;
    assert!(!engine.is_running());
    let ticks = engine.get_simulation_stats().await.ticks;
    tokio::time::sleep(TICK * 5).await;
    assert_eq!(engine.get_simulation_stats().await.ticks, ticks);
}

#[tokio::test]
async fn simulated_price_roundtrip_and_errors() {
    let engine = engine();
    assert_eq!(engine.get_simulated_price("BTC-USD").await.unwrap(), 50_000.0);

    engine.set_simulated_price("BTC-USD", 44_000.0).await.unwrap();
    assert_eq!(engine.get_simulated_price("BTC-USD").await.unwrap(), 44_000.0);

    let err = engine.get_simulated_price("ETH-USD").await.unwrap_err();
    assert!(err.to_string().contains("Invalid product ID"));

    let err = engine.set_simulated_price("BTC-USD", -1.0).await.unwrap_err();
    assert!(matches!(err, ExecutionError::InvalidPrice(_)));
}

#[tokio::test]
async fn stats_and_history_track_activity() {
    let engine = engine();
    engine.execute_market_order("BTC-USD", "buy", 0.1).await.unwrap();
    let _ = engine.execute_market_order("BTC-USD", "buy", 100.0).await;
    engine
        .execute_limit_order("BTC-USD", "buy", 0.1, 40_000.0)
        .await
        .unwrap();

    let stats = engine.get_simulation_stats().await;
    assert_eq!(stats.orders_attempted, 3);
    assert_eq!(stats.orders_filled, 1);
    assert_eq!(stats.orders_rejected, 1);
    assert_eq!(stats.limit_orders_open, 1);

    assert_eq!(engine.get_trade_history().await.len(), 1);
    let metrics = engine.get_performance_metrics().await.unwrap();
    assert_eq!(metrics.num_trades, 1);
}

#[tokio::test]
async fn halted_and_invalid_submissions_are_counted() {
    let engine = engine();

    engine.halt_trading("risk limit breached").await;
    let err = engine
        .execute_market_order("BTC-USD", "buy", 0.1)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Trading is currently halted");
    engine.resume_trading("limits reset").await;

    let err = engine
        .execute_limit_order("BTC-USD", "buy", 0.1, -1.0)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Invalid limit price"));

    // Both failures show up in the counters.
    let stats = engine.get_simulation_stats().await;
    assert_eq!(stats.orders_attempted, 2);
    assert_eq!(stats.orders_rejected, 2);
    assert_eq!(stats.orders_filled, 0);
    assert_eq!(stats.limit_orders_open, 0);
}

#[tokio::test]
async fn reset_restores_initial_state() {
    let engine = engine();
    engine.execute_market_order("BTC-USD", "sell", 1.0).await.unwrap();
    engine.set_simulated_price("BTC-USD", 60_000.0).await.unwrap();
    engine.halt_trading("teardown").await;

    engine.reset().await;

    assert_eq!(engine.get_simulated_balance("USD").await, 100_000.0);
    assert_eq!(engine.get_simulated_balance("BTC").await, 2.0);
    assert_eq!(engine.get_simulated_price("BTC-USD").await.unwrap(), 50_000.0);
    assert!(!engine.is_halted().await);
    assert!(engine.get_trade_history().await.is_empty());
    assert_eq!(engine.get_simulation_stats().await, Default::default());
}

#[tokio::test]
async fn insufficient_balance_is_reported_and_harmless() {
    let engine = engine();
    let err = engine
        .execute_market_order("BTC-USD", "buy", 100.0)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Insufficient USD balance"));
    assert_eq!(engine.get_simulated_balance("USD").await, 100_000.0);
    assert_eq!(engine.get_simulated_balance("BTC").await, 2.0);
}
