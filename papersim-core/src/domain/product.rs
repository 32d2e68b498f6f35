//! Product identifiers — validated `"BASE-QUOTE"` currency pairs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Raised when a product string is not a well-formed `BASE-QUOTE` pair.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid product ID: {0}")]
pub struct InvalidProduct(pub String);

/// A traded product, e.g. `BTC-USD`: base currency bought/sold against a
/// quote currency.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProductId {
    base: String,
    quote: String,
}

impl ProductId {
    /// Build from already-validated currency codes.
    pub fn new(base: impl Into<String>, quote: impl Into<String>) -> Self {
        let base = base.into();
        let quote = quote.into();
        debug_assert!(is_currency_code(&base) && is_currency_code(&quote));
        Self { base, quote }
    }

    /// Currency being bought or sold (e.g. `BTC`).
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Currency the price is quoted in (e.g. `USD`).
    pub fn quote(&self) -> &str {
        &self.quote
    }
}

fn is_currency_code(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric())
}

impl FromStr for ProductId {
    type Err = InvalidProduct;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (base, quote) = s.split_once('-').ok_or_else(|| InvalidProduct(s.into()))?;
        if !is_currency_code(base) || !is_currency_code(quote) {
            return Err(InvalidProduct(s.into()));
        }
        Ok(Self {
            base: base.to_ascii_uppercase(),
            quote: quote.to_ascii_uppercase(),
        })
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.base, self.quote)
    }
}
