use crate::metrics::roll::{clamp_signed, tail, window_max, window_min, EPS};
use crate::model::Bar;

const WINDOW: usize = 20;

/// Market structure quality in [-1,1]: net higher-high/higher-low pressure
/// over 20 bar pairs, plus where the close sits inside the 20-bar range.
pub fn structural_score(bars: &[Bar]) -> f64 {
    let w = tail(bars, WINDOW + 1);
    if w.len() < 3 {
        return 0.0;
    }

    let mut ups: f64 = 0.0;
    let mut downs: f64 = 0.0;
    for pair in w.windows(2) {
        if pair[1].high > pair[0].high {
            ups += 1.0;
        }
        if pair[1].low < pair[0].low {
            downs += 1.0;
        }
    }
    let net = (ups - downs) / (ups + downs).max(1.0);

    let highs: Vec<f64> = w.iter().map(|b| b.high).collect();
    let lows: Vec<f64> = w.iter().map(|b| b.low).collect();
    let hi = window_max(&highs);
    let lo = window_min(&lows);
    let close = w[w.len() - 1].close;
    let range_pos = 2.0 * ((close - lo) / (hi - lo).max(EPS)) - 1.0;

    clamp_signed(0.7 * net + 0.3 * range_pos)
}
