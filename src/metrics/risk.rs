use crate::metrics::roll::{atr, clamp01, linear_unit, log_returns, tail, window_max, EPS};
use crate::model::Bar;

const ATR_PERIOD: usize = 14;
/// Rolling close peak lookback for the drawdown term.
pub const DRAWDOWN_LOOKBACK: usize = 252;
const SEMIDEV_WINDOW: usize = 20;

/// Aggregate risk level in [0,1]: ATR-to-price, drawdown from the 252-bar
/// close peak, and downside semideviation. The drawdown term contributes
/// zero until a full 252-bar history exists (partial-warmup policy).
pub fn risk_level(bars: &[Bar]) -> f64 {
    let close = match bars.last() {
        Some(b) => b.close,
        None => return 0.0,
    };

    let atr_term = match atr(bars, ATR_PERIOD) {
        Some(a) => linear_unit(a / close.max(EPS), 0.0, 0.05),
        None => 0.0,
    };

    let dd_term = if bars.len() >= DRAWDOWN_LOOKBACK {
        let closes: Vec<f64> = tail(bars, DRAWDOWN_LOOKBACK).iter().map(|b| b.close).collect();
        let peak = window_max(&closes);
        linear_unit((peak - close) / peak.max(EPS), 0.0, 0.5)
    } else {
        0.0
    };

    let semi_term = linear_unit(downside_semidev(bars, SEMIDEV_WINDOW), 0.0, 0.04);

    clamp01(0.40 * atr_term + 0.35 * dd_term + 0.25 * semi_term)
}

/// Root-mean-square of negative log returns over the trailing window.
pub fn downside_semidev(bars: &[Bar], window: usize) -> f64 {
    let rets = log_returns(tail(bars, window + 1));
    if rets.is_empty() {
        return 0.0;
    }
    let sq_sum: f64 = rets.iter().map(|r| r.min(0.0).powi(2)).sum();
    (sq_sum / rets.len() as f64).sqrt()
}
