use crate::metrics::roll::{clamp01, tail, window_max, window_min, EPS};
use crate::model::Bar;

const NEAR_WINDOW: usize = 20;
const WIDE_WINDOW: usize = 100;

fn range_of(bars: &[Bar]) -> (f64, f64) {
    let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
    (window_max(&highs), window_min(&lows))
}

/// Breakout pressure in [0,1] for each direction: proximity of the close to
/// the 20-bar extreme, boosted when the 20-bar range has compressed inside
/// the 100-bar range.
pub fn breakout_probabilities(bars: &[Bar]) -> (f64, f64) {
    if bars.len() < 2 {
        return (0.0, 0.0);
    }
    let near = tail(bars, NEAR_WINDOW);
    let wide = tail(bars, WIDE_WINDOW);
    let (near_hi, near_lo) = range_of(near);
    let (wide_hi, wide_lo) = range_of(wide);

    let near_range = (near_hi - near_lo).max(EPS);
    let wide_range = (wide_hi - wide_lo).max(EPS);
    let compression = clamp01(1.0 - near_range / wide_range);

    let close = bars[bars.len() - 1].close;
    let proximity_up = clamp01(1.0 - (near_hi - close) / near_range);
    let proximity_down = clamp01(1.0 - (close - near_lo) / near_range);

    let up = clamp01(0.6 * proximity_up + 0.4 * compression);
    let down = clamp01(0.6 * proximity_down + 0.4 * compression);
    (up, down)
}
