//! Order registry: owns every order ever submitted and enforces the
//! lifecycle state machine at each transition.
//!
//! Orders are kept for the lifetime of the run (terminal ones included) so
//! status lookups and the audit trail survive fills and cancels. Open-order
//! iteration follows insertion order, which keeps limit resolution
//! deterministic.

use super::ExecutionError;
use crate::domain::{Order, OrderId, OrderStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One recorded lifecycle transition. Cancellation and rejection reasons
/// travel inside the `to` status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionEvent {
    pub order_id: OrderId,
    pub from: OrderStatus,
    pub to: OrderStatus,
}

#[derive(Debug, Clone, Default)]
pub struct OrderRegistry {
    orders: HashMap<OrderId, Order>,
    insertion: Vec<OrderId>,
    audit: Vec<TransitionEvent>,
}

impl OrderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, order: Order) {
        debug_assert!(!self.orders.contains_key(&order.id));
        self.insertion.push(order.id);
        self.orders.insert(order.id, order);
    }

    pub fn get(&self, id: OrderId) -> Option<&Order> {
        self.orders.get(&id)
    }

    pub fn status(&self, id: OrderId) -> Result<OrderStatus, ExecutionError> {
        self.orders
            .get(&id)
            .map(|order| order.status.clone())
            .ok_or(ExecutionError::OrderNotFound(id))
    }

    /// IDs of resting limit orders, oldest first.
    pub fn open_order_ids(&self) -> Vec<OrderId> {
        self.insertion
            .iter()
            .filter(|id| self.orders[id].is_open())
            .copied()
            .collect()
    }

    pub fn open_count(&self) -> usize {
        self.orders.values().filter(|o| o.is_open()).count()
    }

    pub fn len(&self) -> usize {
        self.insertion.len()
    }

    pub fn is_empty(&self) -> bool {
        self.insertion.is_empty()
    }

    pub fn clear(&mut self) {
        self.orders.clear();
        self.insertion.clear();
        self.audit.clear();
    }

    /// Every recorded transition, oldest first.
    pub fn audit_trail(&self) -> &[TransitionEvent] {
        &self.audit
    }

    /// Pending → Open (limit order admitted to rest).
    pub fn mark_open(&mut self, id: OrderId) -> Result<(), ExecutionError> {
        let order = self.live_order(id)?;
        debug_assert_eq!(order.status, OrderStatus::Pending);
        let from = std::mem::replace(&mut order.status, OrderStatus::Open);
        self.audit.push(TransitionEvent {
            order_id: id,
            from,
            to: OrderStatus::Open,
        });
        Ok(())
    }

    /// Pending/Open → Filled, recording the realized price and fee.
    pub fn mark_filled(
        &mut self,
        id: OrderId,
        execution_price: f64,
        fee: f64,
        at: DateTime<Utc>,
    ) -> Result<(), ExecutionError> {
        let order = self.live_order(id)?;
        order.filled_size = order.size;
        order.filled_price = Some(execution_price);
        order.fee = fee;
        order.filled_at = Some(at);
        let from = std::mem::replace(&mut order.status, OrderStatus::Filled);
        self.audit.push(TransitionEvent {
            order_id: id,
            from,
            to: OrderStatus::Filled,
        });
        Ok(())
    }

    /// Pending/Open → Cancelled.
    pub fn mark_cancelled(&mut self, id: OrderId, reason: &str) -> Result<(), ExecutionError> {
        let status = OrderStatus::Cancelled {
            reason: reason.to_string(),
        };
        let order = self.live_order(id)?;
        let from = std::mem::replace(&mut order.status, status.clone());
        self.audit.push(TransitionEvent {
            order_id: id,
            from,
            to: status,
        });
        Ok(())
    }

    /// Pending/Open → Rejected.
    pub fn mark_rejected(&mut self, id: OrderId, reason: &str) -> Result<(), ExecutionError> {
        let status = OrderStatus::Rejected {
            reason: reason.to_string(),
        };
        let order = self.live_order(id)?;
        let from = std::mem::replace(&mut order.status, status.clone());
        self.audit.push(TransitionEvent {
            order_id: id,
            from,
            to: status,
        });
        Ok(())
    }

    /// Look up a non-terminal order, or explain why the transition is
    /// impossible. Terminal orders are never resurrected.
    fn live_order(&mut self, id: OrderId) -> Result<&mut Order, ExecutionError> {
        let order = self
            .orders
            .get_mut(&id)
            .ok_or(ExecutionError::OrderNotFound(id))?;
        if order.status.is_terminal() {
            return Err(ExecutionError::OrderNotCancellable {
                id,
                status: order.status.to_string(),
            });
        }
        Ok(order)
    }
}
