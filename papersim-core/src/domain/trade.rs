//! Append-only trade log and portfolio valuation history.
//!
//! Both record types are immutable once appended; only `reset()` clears
//! them. The metrics calculator reconstructs performance from these alone.

use super::order::{OrderId, OrderType, Side};
use super::product::ProductId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Immutable record of one completed fill.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub timestamp: DateTime<Utc>,
    pub order_id: OrderId,
    pub product: ProductId,
    pub side: Side,
    pub order_type: OrderType,
    /// Filled size in base currency units.
    pub size: f64,
    /// Realized execution price (slippage included).
    pub execution_price: f64,
    /// Fee paid in quote currency.
    pub fee: f64,
    /// Total portfolio value immediately after this fill.
    pub portfolio_value: f64,
}

impl TradeRecord {
    /// Traded notional in quote currency.
    pub fn notional(&self) -> f64 {
        self.size * self.execution_price
    }
}

/// Portfolio value at one point in simulated time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ValuationPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}
