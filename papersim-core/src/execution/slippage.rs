//! Slippage and fee model.
//!
//! Market orders execute at the reference price times a Gaussian
//! perturbation with mean 1 and standard deviation `slippage_std`. Limit
//! orders carry zero slippage (they fill at their limit price) but still pay
//! the proportional fee. Setting `slippage_std` to zero makes market fills
//! exact, which the balance-equation tests rely on. The RNG is always
//! caller-supplied so runs are reproducible under a fixed seed.

use crate::rng::standard_normal;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Proportional transaction-cost parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CostModel {
    /// Fee as a fraction of traded notional (0.001 = 10 bps).
    pub fee_rate: f64,
    /// Standard deviation of the relative slippage draw.
    pub slippage_std: f64,
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            fee_rate: 0.001,
            slippage_std: 0.0005,
        }
    }
}

/// Simulated execution price for a market order:
/// `reference_price * (1 + slippage_std * z)` with `z` standard normal,
/// clamped at zero.
pub fn simulate_execution_price(
    reference_price: f64,
    slippage_std: f64,
    rng: &mut impl Rng,
) -> f64 {
    let z = standard_normal(rng);
    (reference_price * (1.0 + slippage_std * z)).max(0.0)
}

/// Fee in quote currency for a fill of the given notional.
pub fn compute_fee(size: f64, execution_price: f64, fee_rate: f64) -> f64 {
    size * execution_price * fee_rate
}
