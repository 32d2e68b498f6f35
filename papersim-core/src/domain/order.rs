//! Order types and the order lifecycle state machine types.
//!
//! Status transitions are one-directional:
//! Pending → Open → { Filled, Cancelled, Rejected }. Market orders skip the
//! Open state (they fill or reject immediately). Terminal orders are never
//! resurrected; the registry enforces this at every transition site.

use super::product::ProductId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Monotonic order identifier, unique within one engine instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Generates sequential order IDs. Reset with the engine so replay runs
/// produce identical IDs.
#[derive(Debug, Clone, Default)]
pub struct OrderIdGen {
    next: u64,
}

impl OrderIdGen {
    pub fn next_id(&mut self) -> OrderId {
        self.next += 1;
        OrderId(self.next)
    }
}

/// Raised when a side string is not `buy` or `sell`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid order side: {0}")]
pub struct InvalidSide(pub String);

/// Which way the order trades the base currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl FromStr for Side {
    type Err = InvalidSide;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "buy" => Ok(Side::Buy),
            "sell" => Ok(Side::Sell),
            _ => Err(InvalidSide(s.into())),
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// Market orders execute against the current price; limit orders rest until
/// their limit price is crossed. Stop and stop-limit orders are out of scope.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    Limit { limit_price: f64 },
}

impl OrderType {
    pub fn limit_price(&self) -> Option<f64> {
        match self {
            OrderType::Market => None,
            OrderType::Limit { limit_price } => Some(*limit_price),
        }
    }
}

/// Order lifecycle states.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Created, not yet admitted.
    Pending,
    /// Resting limit order, waiting for its price to be crossed.
    Open,
    /// Completely filled.
    Filled,
    /// Cancelled with a reason (user cancel, reset, etc).
    Cancelled { reason: String },
    /// Rejected with a reason (e.g. insolvent at fill time).
    Rejected { reason: String },
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Cancelled { .. } | OrderStatus::Rejected { .. }
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "pending"),
            OrderStatus::Open => write!(f, "open"),
            OrderStatus::Filled => write!(f, "filled"),
            OrderStatus::Cancelled { .. } => write!(f, "cancelled"),
            OrderStatus::Rejected { .. } => write!(f, "rejected"),
        }
    }
}

/// A single simulated order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub product: ProductId,
    pub side: Side,
    pub order_type: OrderType,
    /// Requested size in base currency units. Always > 0.
    pub size: f64,
    /// Filled size. Invariant: `filled_size <= size`.
    pub filled_size: f64,
    /// Execution price, set on fill.
    pub filled_price: Option<f64>,
    /// Fee paid in quote currency, accrued on fill.
    pub fee: f64,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub filled_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn new(
        id: OrderId,
        product: ProductId,
        side: Side,
        order_type: OrderType,
        size: f64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            product,
            side,
            order_type,
            size,
            filled_size: 0.0,
            filled_price: None,
            fee: 0.0,
            status: OrderStatus::Pending,
            created_at,
            filled_at: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == OrderStatus::Open
    }

    pub fn remaining_size(&self) -> f64 {
        self.size - self.filled_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_order(status: OrderStatus) -> Order {
        let mut order = Order::new(
            OrderId(1),
            "BTC-USD".parse().unwrap(),
            Side::Buy,
            OrderType::Limit { limit_price: 50_000.0 },
            0.5,
            Utc::now(),
        );
        order.status = status;
        order
    }

    #[test]
    fn side_parses_case_insensitive() {
        assert_eq!("buy".parse::<Side>().unwrap(), Side::Buy);
        assert_eq!("SELL".parse::<Side>().unwrap(), Side::Sell);
        assert_eq!("Buy".parse::<Side>().unwrap(), Side::Buy);
    }

    #[test]
    fn side_rejects_unknown() {
        let err = "hold".parse::<Side>().unwrap_err();
        assert!(err.to_string().contains("Invalid order side"));
    }

    #[test]
    fn terminal_states() {
        assert!(!OrderStatus::Pending.is_terminal());
        assert!(!OrderStatus::Open.is_terminal());
        assert!(OrderStatus::Filled.is_terminal());
        assert!(OrderStatus::Cancelled { reason: "x".into() }.is_terminal());
        assert!(OrderStatus::Rejected { reason: "x".into() }.is_terminal());
    }

    #[test]
    fn remaining_size() {
        let mut order = sample_order(OrderStatus::Open);
        assert_eq!(order.remaining_size(), 0.5);
        order.filled_size = 0.5;
        assert_eq!(order.remaining_size(), 0.0);
    }

    #[test]
    fn id_gen_is_sequential() {
        let mut gen = OrderIdGen::default();
        assert_eq!(gen.next_id(), OrderId(1));
        assert_eq!(gen.next_id(), OrderId(2));
        assert_eq!(gen.next_id(), OrderId(3));
    }

    #[test]
    fn order_serialization_roundtrip() {
        let order = sample_order(OrderStatus::Open);
        let json = serde_json::to_string(&order).unwrap();
        let deser: Order = serde_json::from_str(&json).unwrap();
        assert_eq!(deser.id, order.id);
        assert_eq!(deser.status, order.status);
        assert_eq!(deser.order_type.limit_price(), Some(50_000.0));
    }
}
