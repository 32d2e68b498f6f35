//! Performance metrics computed from the trade log and valuation history.
//!
//! All functions are pure: they read the recorded history and never touch
//! engine state, so metrics can be recomputed at any point in a run.

use crate::domain::{Side, TradeRecord, ValuationPoint};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Valuation points per year used to annualize returns and Sharpe.
/// One point per daily candle / tick.
pub const PERIODS_PER_YEAR: f64 = 252.0;

/// Snapshot of run performance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub initial_value: f64,
    pub final_value: f64,
    /// Fractional return over the whole run (0.1 = +10%).
    pub total_return: f64,
    pub annualized_return: f64,
    pub sharpe_ratio: f64,
    /// Worst peak-to-trough decline, in [-1, 0].
    pub max_drawdown: f64,
    /// Fraction of closing trades with positive realized PnL.
    pub win_rate: f64,
    pub num_trades: usize,
    /// Total traded notional in quote currency.
    pub total_volume: f64,
    pub total_fees: f64,
}

impl PerformanceMetrics {
    /// Compute metrics from recorded history. Returns `None` before the
    /// first trade: every ratio would be vacuous on an untouched portfolio.
    pub fn compute(trades: &[TradeRecord], valuations: &[ValuationPoint]) -> Option<Self> {
        if trades.is_empty() || valuations.is_empty() {
            return None;
        }
        let initial_value = valuations[0].value;
        let final_value = valuations[valuations.len() - 1].value;
        let values: Vec<f64> = valuations.iter().map(|p| p.value).collect();
        Some(Self {
            initial_value,
            final_value,
            total_return: total_return(initial_value, final_value),
            annualized_return: annualized_return(initial_value, final_value, values.len()),
            sharpe_ratio: sharpe_ratio(&values),
            max_drawdown: max_drawdown(&values),
            win_rate: win_rate(trades),
            num_trades: trades.len(),
            total_volume: trades.iter().map(|t| t.notional()).sum(),
            total_fees: trades.iter().map(|t| t.fee).sum(),
        })
    }
}

pub fn total_return(initial_value: f64, final_value: f64) -> f64 {
    if initial_value <= 0.0 {
        return 0.0;
    }
    final_value / initial_value - 1.0
}

/// Geometric annualization over `num_periods` valuation points.
pub fn annualized_return(initial_value: f64, final_value: f64, num_periods: usize) -> f64 {
    if initial_value <= 0.0 || final_value <= 0.0 || num_periods < 2 {
        return 0.0;
    }
    let periods = (num_periods - 1) as f64;
    (final_value / initial_value).powf(PERIODS_PER_YEAR / periods) - 1.0
}

/// Annualized Sharpe ratio over per-period returns, zero risk-free rate.
/// Zero when the return series is flat.
pub fn sharpe_ratio(values: &[f64]) -> f64 {
    let returns = period_returns(values);
    if returns.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(&returns);
    let std = std_dev(&returns, mean);
    if std < 1e-15 {
        return 0.0;
    }
    mean / std * PERIODS_PER_YEAR.sqrt()
}

/// Worst peak-to-trough decline as a non-positive fraction.
pub fn max_drawdown(values: &[f64]) -> f64 {
    let mut peak = f64::MIN;
    let mut worst = 0.0f64;
    for &value in values {
        peak = peak.max(value);
        if peak > 0.0 {
            worst = worst.min(value / peak - 1.0);
        }
    }
    worst
}

/// Fraction of sell trades whose realized PnL (against the running average
/// cost of the position, fee included) is positive. Zero when nothing has
/// been sold yet.
pub fn win_rate(trades: &[TradeRecord]) -> f64 {
    // Running (size, avg cost) per product.
    let mut positions: HashMap<String, (f64, f64)> = HashMap::new();
    let mut sells = 0usize;
    let mut wins = 0usize;

    for trade in trades {
        let key = trade.product.to_string();
        let entry = positions.entry(key).or_insert((0.0, 0.0));
        match trade.side {
            Side::Buy => {
                let (size, avg_cost) = *entry;
                let new_size = size + trade.size;
                let buy_cost = trade.execution_price + trade.fee / trade.size;
                *entry = (
                    new_size,
                    (size * avg_cost + trade.size * buy_cost) / new_size,
                );
            }
            Side::Sell => {
                sells += 1;
                let (size, avg_cost) = *entry;
                let realized =
                    (trade.execution_price - avg_cost) * trade.size - trade.fee;
                if realized > 0.0 {
                    wins += 1;
                }
                *entry = ((size - trade.size).max(0.0), avg_cost);
            }
        }
    }

    if sells == 0 {
        return 0.0;
    }
    wins as f64 / sells as f64
}

fn period_returns(values: &[f64]) -> Vec<f64> {
    values
        .windows(2)
        .filter(|pair| pair[0] > 0.0)
        .map(|pair| pair[1] / pair[0] - 1.0)
        .collect()
}

fn mean_f64(xs: &[f64]) -> f64 {
    xs.iter().sum::<f64>() / xs.len() as f64
}

fn std_dev(xs: &[f64], mean: f64) -> f64 {
    let var = xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (xs.len() - 1) as f64;
    var.sqrt()
}
