use crate::metrics::roll::{atr, clamp_signed, ema_over, tail, EPS};
use crate::model::Bar;

const FAST_SPAN: usize = 20;
const SLOW_SPAN: usize = 100;
const ATR_PERIOD: usize = 14;

/// Directional bias in [-1,1]: fast/slow EMA spread normalised by ATR and
/// squashed through tanh. Positive = bullish structure.
pub fn market_bias(bars: &[Bar]) -> f64 {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let fast = ema_over(tail(&closes, 2 * FAST_SPAN), FAST_SPAN);
    let slow = ema_over(tail(&closes, 2 * SLOW_SPAN), SLOW_SPAN);
    let (Some(fast), Some(slow)) = (fast, slow) else {
        return 0.0;
    };
    let Some(atr) = atr(bars, ATR_PERIOD) else {
        return 0.0;
    };
    let spread = (fast - slow) / (3.0 * atr).max(EPS);
    clamp_signed(spread.tanh())
}
