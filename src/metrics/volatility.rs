use crate::metrics::roll::{clamp01, log_returns, std_dev, tail, EPS};
use crate::model::{Bar, TrendDirection, VolatilityLabel, VolatilityRegime};

const SHORT_WINDOW: usize = 20;
const LONG_WINDOW: usize = 100;
/// Relative band for calling the 5-bar volatility trend rising/falling.
const TREND_BAND: f64 = 0.05;
const TREND_LAG: usize = 5;

/// Short-horizon realized volatility of the trailing window.
pub fn realized_vol(bars: &[Bar], window: usize) -> f64 {
    std_dev(&log_returns(tail(bars, window + 1)))
}

fn vol_score(bars: &[Bar]) -> f64 {
    let short = realized_vol(bars, SHORT_WINDOW);
    let long = realized_vol(bars, LONG_WINDOW);
    clamp01(short / long.max(EPS) / 2.5)
}

/// Volatility regime: short-vs-long realized vol pressure with a label and
/// a 5-bar trend direction.
pub fn volatility_regime(bars: &[Bar]) -> VolatilityRegime {
    let score = vol_score(bars);

    let label = if score < 0.25 {
        VolatilityLabel::Low
    } else if score < 0.5 {
        VolatilityLabel::Normal
    } else if score < 0.8 {
        VolatilityLabel::Elevated
    } else {
        VolatilityLabel::Extreme
    };

    let trend = if bars.len() > SHORT_WINDOW + TREND_LAG {
        let now = realized_vol(bars, SHORT_WINDOW);
        let then = realized_vol(&bars[..bars.len() - TREND_LAG], SHORT_WINDOW);
        if now > then * (1.0 + TREND_BAND) {
            TrendDirection::Rising
        } else if now < then * (1.0 - TREND_BAND) {
            TrendDirection::Falling
        } else {
            TrendDirection::Stable
        }
    } else {
        TrendDirection::Stable
    };

    VolatilityRegime { score, label, trend }
}
