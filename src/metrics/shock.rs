use crate::metrics::roll::{clamp01, linear_unit, log_returns, tail, window_min};
use crate::model::Bar;
use crate::metrics::risk::downside_semidev;

const WINDOW: usize = 20;
/// Open below previous close by more than this fraction counts as a gap down.
const GAP_DOWN_FRAC: f64 = 0.005;

/// Downside shock susceptibility in [0,1]: sustained downside variance,
/// the worst single-bar return, and gap-down frequency over 20 bars.
pub fn downside_shock_risk(bars: &[Bar]) -> f64 {
    let semi_term = linear_unit(downside_semidev(bars, WINDOW), 0.0, 0.04);

    let rets = log_returns(tail(bars, WINDOW + 1));
    let worst_term = if rets.is_empty() {
        0.0
    } else {
        linear_unit((-window_min(&rets)).max(0.0), 0.0, 0.08)
    };

    let gap_term = linear_unit(gap_down_frequency(bars, WINDOW), 0.0, 0.3);

    clamp01(0.45 * semi_term + 0.35 * worst_term + 0.20 * gap_term)
}

/// Fraction of the trailing window's bars that opened a gap down.
pub fn gap_down_frequency(bars: &[Bar], window: usize) -> f64 {
    let w = tail(bars, window + 1);
    if w.len() < 2 {
        return 0.0;
    }
    let gaps = w
        .windows(2)
        .filter(|p| p[1].open < p[0].close * (1.0 - GAP_DOWN_FRAC))
        .count();
    gaps as f64 / (w.len() - 1) as f64
}
