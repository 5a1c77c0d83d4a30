use crate::metrics::roll::{clamp01, clamp_signed, tail, EPS};
use crate::model::{Bar, MomentumLabel, MomentumState};

const ER_WINDOW: usize = 10;
const ROC_WINDOW: usize = 20;
const LABEL_LAG: usize = 5;
/// Minimum 5-bar score move to call momentum accelerating or fading.
const LABEL_DELTA: f64 = 0.05;

/// Kaufman efficiency ratio over the trailing window: net move divided by
/// the sum of absolute bar-to-bar moves, in [0,1].
pub fn efficiency_ratio(bars: &[Bar], window: usize) -> f64 {
    let w = tail(bars, window + 1);
    if w.len() < 2 {
        return 0.0;
    }
    let net = (w[w.len() - 1].close - w[0].close).abs();
    let path: f64 = w.windows(2).map(|p| (p[1].close - p[0].close).abs()).sum();
    clamp01(net / path.max(EPS))
}

fn momentum_score(bars: &[Bar]) -> f64 {
    let er = efficiency_ratio(bars, ER_WINDOW);

    let w = tail(bars, ER_WINDOW + 1);
    let direction = if w.len() < 2 {
        0.0
    } else {
        (w[w.len() - 1].close - w[0].close).signum()
    };

    let roc_w = tail(bars, ROC_WINDOW + 1);
    let roc_term = if roc_w.len() < 2 {
        0.0
    } else {
        let roc = roc_w[roc_w.len() - 1].close / roc_w[0].close.max(EPS) - 1.0;
        (roc * 8.0).tanh()
    };

    clamp_signed(0.6 * direction * er + 0.4 * roc_term)
}

/// Momentum composite: signed score, efficiency ratio, and a label derived
/// from how the score moved over the last 5 bars.
pub fn momentum_state(bars: &[Bar]) -> MomentumState {
    let score = momentum_score(bars);
    let er = efficiency_ratio(bars, ER_WINDOW);

    let label = if bars.len() > ER_WINDOW + LABEL_LAG {
        let prev = momentum_score(&bars[..bars.len() - LABEL_LAG]);
        if prev != 0.0 && score != 0.0 && prev.signum() != score.signum() {
            MomentumLabel::Reversing
        } else if score.abs() - prev.abs() >= LABEL_DELTA {
            MomentumLabel::Accelerating
        } else if prev.abs() - score.abs() >= LABEL_DELTA {
            MomentumLabel::Fading
        } else {
            MomentumLabel::Steady
        }
    } else {
        MomentumLabel::Steady
    };

    MomentumState {
        score,
        label,
        efficiency_ratio: er,
    }
}
