//! Causal per-bar metric pipeline: every metric is a pure function of the
//! bar prefix ending at the snapshot's bar, computed over fixed trailing
//! windows and clamped to its documented bounds.

pub mod breakout;
pub mod instability;
pub mod levels;
pub mod liquidity;
pub mod momentum;
pub mod risk;
pub mod roll;
pub mod shock;
pub mod structure;
pub mod trend;
pub mod volatility;

use crate::model::{Bar, MetricSnapshot};

/// Minimum bar history before any snapshot is emitted.
pub const MIN_BARS: usize = 20;

/// Largest trailing window used anywhere in the metric pipeline
/// (the 252-bar peak-drawdown lookback).
pub const WINDOW_MAX: usize = risk::DRAWDOWN_LOOKBACK;

/// Compute the full metric set for the last bar of `bars`.
/// Returns `None` below the 20-bar warmup; callers skip emission.
pub fn compute_metrics(bars: &[Bar]) -> Option<MetricSnapshot> {
    if bars.len() < MIN_BARS {
        return None;
    }
    let last = bars[bars.len() - 1];
    let (breakout_up, breakout_down) = breakout::breakout_probabilities(bars);
    Some(MetricSnapshot {
        ts_ms: last.ts_ms,
        market_bias: trend::market_bias(bars),
        risk_level: risk::risk_level(bars),
        volatility_regime: volatility::volatility_regime(bars),
        downside_shock_risk: shock::downside_shock_risk(bars),
        structural_score: structure::structural_score(bars),
        momentum: momentum::momentum_state(bars),
        liquidity: liquidity::liquidity_context(bars),
        breakout_up,
        breakout_down,
        key_levels: levels::key_levels(bars),
        instability_index: instability::instability_index(bars),
    })
}

/// One snapshot slot per bar; `None` for warmup indices.
pub fn metrics_series(bars: &[Bar]) -> Vec<Option<MetricSnapshot>> {
    (0..bars.len())
        .map(|i| compute_metrics(&bars[..=i]))
        .collect()
}
