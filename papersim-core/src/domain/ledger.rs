//! Balance ledger — the single source of truth for solvency.
//!
//! Balances never go negative: `debit` is all-or-nothing and fails without
//! mutating anything. All mutation happens through the engines under the
//! single-writer discipline; the ledger itself is a plain map.

use std::collections::HashMap;
use thiserror::Error;

/// Errors from ledger operations.
#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    #[error("Insufficient {currency} balance: requested {requested:.8}, available {available:.8}")]
    InsufficientBalance {
        currency: String,
        requested: f64,
        available: f64,
    },
}

/// Per-currency available balances.
#[derive(Debug, Clone, PartialEq)]
pub struct Ledger {
    balances: HashMap<String, f64>,
}

impl Ledger {
    pub fn new(balances: HashMap<String, f64>) -> Self {
        debug_assert!(balances.values().all(|b| *b >= 0.0));
        Self { balances }
    }

    /// Available balance for a currency; unknown currencies read as zero.
    pub fn available(&self, currency: &str) -> f64 {
        self.balances.get(currency).copied().unwrap_or(0.0)
    }

    /// Add to a currency's balance.
    pub fn credit(&mut self, currency: &str, amount: f64) {
        debug_assert!(amount >= 0.0, "credit amount must be non-negative");
        *self.balances.entry(currency.to_string()).or_insert(0.0) += amount;
    }

    /// Remove from a currency's balance. Fails (without any mutation) if the
    /// full amount is not available — there are no partial debits.
    pub fn debit(&mut self, currency: &str, amount: f64) -> Result<(), LedgerError> {
        debug_assert!(amount >= 0.0, "debit amount must be non-negative");
        let available = self.available(currency);
        if amount > available {
            return Err(LedgerError::InsufficientBalance {
                currency: currency.to_string(),
                requested: amount,
                available,
            });
        }
        self.balances.insert(currency.to_string(), available - amount);
        Ok(())
    }

    pub fn contains(&self, currency: &str) -> bool {
        self.balances.contains_key(currency)
    }

    pub fn balances(&self) -> &HashMap<String, f64> {
        &self.balances
    }

    /// Total value expressed in `quote` currency. The quote balance counts
    /// 1:1; every other currency is converted at `price_of(currency)`.
    /// Currencies with no known price contribute nothing.
    pub fn value_in(&self, quote: &str, price_of: impl Fn(&str) -> Option<f64>) -> f64 {
        self.balances
            .iter()
            .map(|(currency, amount)| {
                if currency == quote {
                    *amount
                } else {
                    price_of(currency).map_or(0.0, |price| amount * price)
                }
            })
            .sum()
    }
}
