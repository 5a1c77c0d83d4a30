use crate::metrics::roll::{clamp01, mean, tail, EPS};
use crate::model::{Bar, LiquidityContext, LiquidityLabel, TrendDirection};

const SHORT_WINDOW: usize = 20;
const LONG_WINDOW: usize = 100;
const TREND_LAG: usize = 5;
const TREND_BAND: f64 = 0.05;

fn volume_ratio(bars: &[Bar]) -> f64 {
    let vols: Vec<f64> = bars.iter().map(|b| b.volume).collect();
    let short = mean(tail(&vols, SHORT_WINDOW));
    let long = mean(tail(&vols, LONG_WINDOW));
    if long <= EPS {
        // Dead tape: no volume in the long window at all.
        return 0.0;
    }
    short / long
}

/// Liquidity context in [0,1]: recent volume against the long-run norm,
/// with a label and a 5-bar trend.
pub fn liquidity_context(bars: &[Bar]) -> LiquidityContext {
    let ratio = volume_ratio(bars);
    let score = clamp01(ratio / 2.0);

    let label = if score < 0.35 {
        LiquidityLabel::Dry
    } else if score > 0.65 {
        LiquidityLabel::Flush
    } else {
        LiquidityLabel::Normal
    };

    let trend = if bars.len() > SHORT_WINDOW + TREND_LAG {
        let then = volume_ratio(&bars[..bars.len() - TREND_LAG]);
        if ratio > then * (1.0 + TREND_BAND) {
            TrendDirection::Rising
        } else if ratio < then * (1.0 - TREND_BAND) {
            TrendDirection::Falling
        } else {
            TrendDirection::Stable
        }
    } else {
        TrendDirection::Stable
    };

    LiquidityContext { score, label, trend }
}
