use crate::metrics::momentum::efficiency_ratio;
use crate::metrics::roll::{clamp01, linear_unit, mean, std_dev, tail, EPS};
use crate::metrics::volatility::realized_vol;
use crate::model::Bar;

const VOL_WINDOW: usize = 20;
const VOV_SAMPLES: usize = 20;
const ER_WINDOW: usize = 10;
const GAP_WINDOW: usize = 20;
/// Absolute open-vs-previous-close move that counts as a gap.
const GAP_FRAC: f64 = 0.01;

/// Composite instability in [0,1]: volatility-of-volatility, path
/// inefficiency, and gap frequency.
pub fn instability_index(bars: &[Bar]) -> f64 {
    let vov_term = vol_of_vol_term(bars);
    let inefficiency = 1.0 - efficiency_ratio(bars, ER_WINDOW);
    let gap_term = linear_unit(gap_frequency(bars, GAP_WINDOW), 0.0, 0.5);

    clamp01(0.40 * vov_term + 0.35 * inefficiency + 0.25 * gap_term)
}

/// Std of the trailing rolling-vol samples relative to their mean.
fn vol_of_vol_term(bars: &[Bar]) -> f64 {
    if bars.len() < VOL_WINDOW + VOV_SAMPLES {
        return 0.0;
    }
    let vols: Vec<f64> = (0..VOV_SAMPLES)
        .map(|back| realized_vol(&bars[..bars.len() - back], VOL_WINDOW))
        .collect();
    let m = mean(&vols);
    clamp01(std_dev(&vols) / m.max(EPS) / 1.5)
}

fn gap_frequency(bars: &[Bar], window: usize) -> f64 {
    let w = tail(bars, window + 1);
    if w.len() < 2 {
        return 0.0;
    }
    let gaps = w
        .windows(2)
        .filter(|p| ((p[1].open - p[0].close) / p[0].close.max(EPS)).abs() > GAP_FRAC)
        .count();
    gaps as f64 / (w.len() - 1) as f64
}
