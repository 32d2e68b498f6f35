//! Execution engine: order intake, settlement, and the control plane.

pub mod registry;
pub mod replay;

pub use registry::{OrderRegistry, TransitionEvent};
pub use replay::{ReplayConfig, ReplayEngine};

use crate::domain::{
    InvalidProduct, InvalidSide, Ledger, LedgerError, OrderId, ProductId, SeriesError, Side,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Errors from engine construction.
#[derive(Debug, Clone, Error)]
pub enum SetupError {
    #[error(transparent)]
    Series(#[from] SeriesError),

    #[error("Invalid initial balance for {currency}: {amount}")]
    InvalidInitialBalance { currency: String, amount: f64 },

    #[error("Missing required currency in initial balances: {currency}")]
    MissingRequiredCurrency { currency: String },

    #[error("products quote in different currencies: {first} vs {second}")]
    MixedQuoteCurrencies { first: String, second: String },

    #[error("no products configured")]
    NoProducts,

    #[error("Invalid initial price for {product}: {price}")]
    InvalidInitialPrice { product: String, price: f64 },
}

/// Errors from order submission, cancellation, and lookup.
#[derive(Debug, Clone, Error)]
pub enum ExecutionError {
    #[error("Invalid order size: {0}")]
    InvalidOrderSize(f64),

    #[error("Invalid limit price: {0}")]
    InvalidLimitPrice(f64),

    #[error("Invalid price: {0}")]
    InvalidPrice(f64),

    #[error(transparent)]
    InvalidSide(#[from] InvalidSide),

    #[error(transparent)]
    InvalidProduct(#[from] InvalidProduct),

    #[error(transparent)]
    InsufficientBalance(#[from] LedgerError),

    #[error("Trading is currently halted")]
    TradingHalted,

    #[error("order {0} not found")]
    OrderNotFound(OrderId),

    #[error("order {id} is {status} and cannot be cancelled")]
    OrderNotCancellable { id: OrderId, status: String },
}

/// Counters describing one simulation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationStats {
    /// Every submission, whether it ended filled, resting, or rejected.
    pub orders_attempted: u64,
    pub orders_filled: u64,
    pub orders_rejected: u64,
    /// Limit orders currently resting.
    pub limit_orders_open: u64,
    /// Price ticks processed (candle steps or walk ticks).
    pub ticks: u64,
}

/// Validate user-supplied starting balances: all amounts finite and
/// non-negative, and every traded product's base and quote currency present
/// (a zero balance is fine; a missing key is a configuration error).
pub fn validate_balances(
    balances: &HashMap<String, f64>,
    required_currencies: &[&str],
) -> Result<(), SetupError> {
    for (currency, amount) in balances {
        if !amount.is_finite() || *amount < 0.0 {
            return Err(SetupError::InvalidInitialBalance {
                currency: currency.clone(),
                amount: *amount,
            });
        }
    }
    for currency in required_currencies {
        if !balances.contains_key(*currency) {
            return Err(SetupError::MissingRequiredCurrency {
                currency: currency.to_string(),
            });
        }
    }
    Ok(())
}

/// Size must be a positive finite number of base units.
pub fn validate_size(size: f64) -> Result<(), ExecutionError> {
    if !size.is_finite() || size <= 0.0 {
        return Err(ExecutionError::InvalidOrderSize(size));
    }
    Ok(())
}

pub fn validate_limit_price(limit_price: f64) -> Result<(), ExecutionError> {
    if !limit_price.is_finite() || limit_price <= 0.0 {
        return Err(ExecutionError::InvalidLimitPrice(limit_price));
    }
    Ok(())
}

/// Move money for one fill. Buys debit quote (cost plus fee) and credit
/// base; sells debit base and credit quote net of fee. The debit happens
/// first and is all-or-nothing, so a failed settlement leaves the ledger
/// exactly as it was.
pub fn settle_fill(
    ledger: &mut Ledger,
    product: &ProductId,
    side: Side,
    size: f64,
    execution_price: f64,
    fee: f64,
) -> Result<(), LedgerError> {
    let notional = size * execution_price;
    match side {
        Side::Buy => {
            ledger.debit(product.quote(), notional + fee)?;
            ledger.credit(product.base(), size);
        }
        Side::Sell => {
            ledger.debit(product.base(), size)?;
            ledger.credit(product.quote(), notional - fee);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> Ledger {
        let mut balances = HashMap::new();
        balances.insert("USD".to_string(), 50_000.0);
        balances.insert("BTC".to_string(), 1.0);
        Ledger::new(balances)
    }

    fn btc_usd() -> ProductId {
        "BTC-USD".parse().unwrap()
    }

    #[test]
    fn buy_settlement_moves_quote_and_base() {
        let mut ledger = ledger();
        settle_fill(&mut ledger, &btc_usd(), Side::Buy, 0.1, 50_000.0, 5.0).unwrap();
        assert!((ledger.available("USD") - 44_995.0).abs() < 1e-9);
        assert!((ledger.available("BTC") - 1.1).abs() < 1e-12);
    }

    #[test]
    fn sell_settlement_moves_base_and_quote() {
        let mut ledger = ledger();
        settle_fill(&mut ledger, &btc_usd(), Side::Sell, 0.5, 50_000.0, 25.0).unwrap();
        assert!((ledger.available("BTC") - 0.5).abs() < 1e-12);
        assert!((ledger.available("USD") - 74_975.0).abs() < 1e-9);
    }

    #[test]
    fn failed_settlement_leaves_ledger_untouched() {
        let mut ledger = ledger();
        let before = ledger.clone();
        let err = settle_fill(&mut ledger, &btc_usd(), Side::Buy, 10.0, 50_000.0, 500.0);
        assert!(err.is_err());
        assert_eq!(ledger, before);
    }

    #[test]
    fn balance_validation() {
        let mut balances = HashMap::new();
        balances.insert("USD".to_string(), 50_000.0);
        balances.insert("BTC".to_string(), 0.0);
        assert!(validate_balances(&balances, &["BTC", "USD"]).is_ok());
        assert!(matches!(
            validate_balances(&balances, &["ETH", "USD"]),
            Err(SetupError::MissingRequiredCurrency { .. })
        ));
        balances.insert("BTC".to_string(), -1.0);
        assert!(matches!(
            validate_balances(&balances, &["BTC", "USD"]),
            Err(SetupError::InvalidInitialBalance { .. })
        ));
    }

    #[test]
    fn size_validation() {
        assert!(validate_size(0.1).is_ok());
        for bad in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let err = validate_size(bad).unwrap_err();
            assert!(err.to_string().contains("Invalid order size"));
        }
    }

    #[test]
    fn halted_message() {
        assert_eq!(
            ExecutionError::TradingHalted.to_string(),
            "Trading is currently halted"
        );
    }
}
