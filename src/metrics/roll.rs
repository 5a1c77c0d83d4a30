//! Shared rolling-window math for the metric pipeline.
//!
//! Every helper here operates on an explicit trailing slice so metric values
//! are pure functions of a bounded bar window. Ratios are floored with `EPS`
//! so no NaN/Inf can reach a clamped output.

use crate::model::Bar;

/// Floor for denominators in ratio computations.
pub const EPS: f64 = 1e-12;

pub fn clamp01(x: f64) -> f64 {
    if x.is_nan() {
        return 0.0;
    }
    x.clamp(0.0, 1.0)
}

pub fn clamp_signed(x: f64) -> f64 {
    if x.is_nan() {
        return 0.0;
    }
    x.clamp(-1.0, 1.0)
}

/// Last `n` elements of a slice (the whole slice when shorter).
pub fn tail<T>(xs: &[T], n: usize) -> &[T] {
    let start = xs.len().saturating_sub(n);
    &xs[start..]
}

pub fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Population standard deviation.
pub fn std_dev(xs: &[f64]) -> f64 {
    if xs.len() < 2 {
        return 0.0;
    }
    let m = mean(xs);
    let variance = xs
        .iter()
        .map(|x| {
            let d = x - m;
            d * d
        })
        .sum::<f64>()
        / xs.len() as f64;
    variance.sqrt()
}

pub fn window_max(xs: &[f64]) -> f64 {
    xs.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

pub fn window_min(xs: &[f64]) -> f64 {
    xs.iter().copied().fold(f64::INFINITY, f64::min)
}

/// EMA with span-style smoothing (alpha = 2 / (span + 1)), seeded with the
/// first element of the slice. Callers pass a bounded trailing window.
pub fn ema_over(xs: &[f64], span: usize) -> Option<f64> {
    let first = *xs.first()?;
    let alpha = 2.0 / (span as f64 + 1.0);
    let mut ema = first;
    for x in &xs[1..] {
        ema = alpha * x + (1.0 - alpha) * ema;
    }
    Some(ema)
}

/// Close-to-close log returns of a bar window; one element shorter than input.
pub fn log_returns(bars: &[Bar]) -> Vec<f64> {
    bars.windows(2)
        .map(|w| (w[1].close / w[0].close.max(EPS)).ln())
        .collect()
}

/// Wilder true range for a bar given the previous close.
pub fn true_range(bar: &Bar, prev_close: f64) -> f64 {
    let hl = bar.high - bar.low;
    let hc = (bar.high - prev_close).abs();
    let lc = (bar.low - prev_close).abs();
    hl.max(hc).max(lc)
}

/// Simple-average ATR over the last `period` true ranges. Requires
/// `period + 1` bars; shorter input averages what is available (min 2 bars).
pub fn atr(bars: &[Bar], period: usize) -> Option<f64> {
    if bars.len() < 2 {
        return None;
    }
    let window = tail(bars, period + 1);
    let trs: Vec<f64> = window
        .windows(2)
        .map(|w| true_range(&w[1], w[0].close))
        .collect();
    Some(mean(&trs))
}

/// Linear map of `x` from [lo, hi] into [0,1], clamped at both ends.
pub fn linear_unit(x: f64, lo: f64, hi: f64) -> f64 {
    clamp01((x - lo) / (hi - lo).max(EPS))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(high: f64, low: f64, close: f64) -> Bar {
        Bar {
            ts_ms: 0,
            open: close,
            high,
            low,
            close,
            volume: 1.0,
        }
    }

    #[test]
    fn clamp_swallows_nan() {
        assert_eq!(clamp01(f64::NAN), 0.0);
        assert_eq!(clamp_signed(f64::NAN), 0.0);
        assert_eq!(clamp01(1.7), 1.0);
        assert_eq!(clamp_signed(-3.0), -1.0);
    }

    #[test]
    fn tail_handles_short_slices() {
        let xs = [1.0, 2.0, 3.0];
        assert_eq!(tail(&xs, 2), &[2.0, 3.0]);
        assert_eq!(tail(&xs, 10), &xs[..]);
    }

    #[test]
    fn std_dev_of_constant_is_zero() {
        let xs = [5.0; 30];
        assert_eq!(std_dev(&xs), 0.0);
    }

    #[test]
    fn true_range_covers_gaps() {
        // Gap down: previous close far above the bar's range.
        let b = bar(101.0, 99.0, 100.0);
        assert!((true_range(&b, 110.0) - 11.0).abs() < f64::EPSILON);
        // No gap: plain high-low range.
        assert!((true_range(&b, 100.5) - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn atr_needs_two_bars() {
        assert!(atr(&[bar(1.0, 1.0, 1.0)], 14).is_none());
        let bars = [bar(102.0, 98.0, 100.0), bar(103.0, 99.0, 101.0)];
        assert!((atr(&bars, 14).unwrap() - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn linear_unit_clamps() {
        assert_eq!(linear_unit(0.05, 0.05, 0.25), 0.0);
        assert_eq!(linear_unit(0.25, 0.05, 0.25), 1.0);
        assert!((linear_unit(0.15, 0.05, 0.25) - 0.5).abs() < 1e-12);
        assert_eq!(linear_unit(-1.0, 0.0, 1.0), 0.0);
    }

    #[test]
    fn ema_over_converges_toward_recent_values() {
        let xs: Vec<f64> = (0..50).map(|_| 10.0).collect();
        assert!((ema_over(&xs, 20).unwrap() - 10.0).abs() < 1e-9);
        let mut xs = vec![0.0; 5];
        xs.extend(std::iter::repeat(1.0).take(200));
        assert!(ema_over(&xs, 20).unwrap() > 0.99);
    }
}
