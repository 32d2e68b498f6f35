//! Deterministic simulated order execution over historical candles.
//!
//! This crate is the synchronous core of the paper-trading stack:
//!
//! - [`domain`] — products, orders, candles, the balance ledger, and the
//!   trade log record types.
//! - [`execution`] — slippage and fee model.
//! - [`market`] — the candle cursor and the synthetic price random walk.
//! - [`engine`] — the replay engine, order registry, and control plane.
//! - [`metrics`] — performance metrics from recorded history.
//! - [`rng`] — seeded, named RNG streams for reproducible runs.
//!
//! The async dry-run engine (live clock, background fill monitor) lives in
//! the companion `papersim-live` crate and is built on these types.

pub mod domain;
pub mod engine;
pub mod execution;
pub mod market;
pub mod metrics;
pub mod rng;

pub use domain::{
    Candle, CandleSeries, InvalidProduct, InvalidSide, Ledger, LedgerError, Order, OrderId,
    OrderIdGen, OrderStatus, OrderType, ProductId, SeriesError, Side, TradeRecord, ValuationPoint,
    REQUIRED_COLUMNS,
};
pub use engine::{
    ExecutionError, OrderRegistry, ReplayConfig, ReplayEngine, SetupError, SimulationStats,
    TransitionEvent,
};
pub use execution::CostModel;
pub use market::{CandleCursor, PriceSimulator, WalkConfig};
pub use metrics::{PerformanceMetrics, PERIODS_PER_YEAR};
pub use rng::SeedTree;

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn engine_types_are_send_sync() {
        assert_send_sync::<ReplayEngine>();
        assert_send_sync::<PriceSimulator>();
        assert_send_sync::<OrderRegistry>();
        assert_send_sync::<PerformanceMetrics>();
        assert_send_sync::<ExecutionError>();
    }
}
