//! Synthetic price simulator — a seeded geometric random walk.
//!
//! Each tick multiplies every product's price by
//! `1 + trend_bias + volatility_factor * BASE_STEP_STD * z` with `z` standard
//! normal. Prices are clamped strictly positive. Products tick in sorted
//! order so a given seed always produces the same path regardless of how the
//! price map was populated.

use crate::domain::ProductId;
use crate::rng::standard_normal;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-tick relative standard deviation at `volatility_factor = 1.0`.
const BASE_STEP_STD: f64 = 0.001;

/// Floor keeping prices strictly positive after an extreme draw.
const MIN_PRICE_FRACTION: f64 = 1e-6;

/// Random-walk shape parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WalkConfig {
    /// Deterministic drift per tick (0.0001 = +1 bp per tick).
    pub trend_bias: f64,
    /// Multiplier on the random component; 0 disables randomness entirely.
    pub volatility_factor: f64,
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            trend_bias: 0.0,
            volatility_factor: 1.0,
        }
    }
}

/// Simulated prices for a set of products, advanced one tick at a time.
#[derive(Debug)]
pub struct PriceSimulator {
    config: WalkConfig,
    prices: BTreeMap<ProductId, f64>,
    rng: StdRng,
}

impl PriceSimulator {
    pub fn new(config: WalkConfig, initial_prices: BTreeMap<ProductId, f64>, rng: StdRng) -> Self {
        debug_assert!(initial_prices.values().all(|p| *p > 0.0));
        Self {
            config,
            prices: initial_prices,
            rng,
        }
    }

    pub fn price(&self, product: &ProductId) -> Option<f64> {
        self.prices.get(product).copied()
    }

    pub fn prices(&self) -> &BTreeMap<ProductId, f64> {
        &self.prices
    }

    /// Override a product's price. Subsequent ticks walk from the new value.
    pub fn set_price(&mut self, product: ProductId, price: f64) {
        debug_assert!(price > 0.0);
        self.prices.insert(product, price);
    }

    /// Advance every product's price by one tick.
    pub fn tick(&mut self) {
        let WalkConfig {
            trend_bias,
            volatility_factor,
        } = self.config;
        for price in self.prices.values_mut() {
            let z = standard_normal(&mut self.rng);
            let factor = 1.0 + trend_bias + volatility_factor * BASE_STEP_STD * z;
            *price = (*price * factor).max(*price * MIN_PRICE_FRACTION);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::SeedTree;

    fn btc_usd() -> ProductId {
        "BTC-USD".parse().unwrap()
    }

    fn simulator(config: WalkConfig, seed: u64) -> PriceSimulator {
        let mut prices = BTreeMap::new();
        prices.insert(btc_usd(), 50_000.0);
        PriceSimulator::new(config, prices, SeedTree::new(seed).stream("price-walk"))
    }

    #[test]
    fn zero_volatility_walks_by_trend_only() {
        let config = WalkConfig {
            trend_bias: 0.01,
            volatility_factor: 0.0,
        };
        let mut sim = simulator(config, 1);
        sim.tick();
        let price = sim.price(&btc_usd()).unwrap();
        assert!((price - 50_500.0).abs() < 1e-6);
        sim.tick();
        let price = sim.price(&btc_usd()).unwrap();
        assert!((price - 51_005.0).abs() < 1e-6);
    }

    #[test]
    fn same_seed_same_path() {
        let config = WalkConfig::default();
        let mut a = simulator(config, 42);
        let mut b = simulator(config, 42);
        for _ in 0..100 {
            a.tick();
            b.tick();
            assert_eq!(a.price(&btc_usd()), b.price(&btc_usd()));
        }
    }

    #[test]
    fn prices_stay_positive() {
        let config = WalkConfig {
            trend_bias: -0.01,
            volatility_factor: 100.0,
        };
        let mut sim = simulator(config, 7);
        for _ in 0..1_000 {
            sim.tick();
            assert!(sim.price(&btc_usd()).unwrap() > 0.0);
        }
    }

    #[test]
    fn set_price_overrides_walk() {
        let mut sim = simulator(WalkConfig::default(), 3);
        sim.set_price(btc_usd(), 10_000.0);
        assert_eq!(sim.price(&btc_usd()), Some(10_000.0));
    }

    #[test]
    fn unknown_product_has_no_price() {
        let sim = simulator(WalkConfig::default(), 3);
        assert_eq!(sim.price(&"ETH-USD".parse().unwrap()), None);
    }
}
