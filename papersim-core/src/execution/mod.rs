//! Fill pricing: slippage and fees.

pub mod slippage;

pub use slippage::{compute_fee, simulate_execution_price, CostModel};
