use crate::metrics::roll::{atr, tail};
use crate::model::{Bar, KeyLevel, LevelKind};

/// Lookback for support/resistance clustering.
pub const LEVEL_LOOKBACK: usize = 250;
/// Pivot is confirmed this many bars after it prints (no look-ahead).
const PIVOT_ARM: usize = 2;
const MAX_LEVELS: usize = 8;
/// Cluster bin width as a multiple of ATR.
const BIN_ATR_MULT: f64 = 0.25;

/// Cluster fractal swing highs/lows from the trailing 250 bars into price
/// levels. Strength is the touch count normalised by the strongest cluster.
/// Levels are returned ordered by price, at most 8.
pub fn key_levels(bars: &[Bar]) -> Vec<KeyLevel> {
    let w = tail(bars, LEVEL_LOOKBACK);
    if w.len() < 2 * PIVOT_ARM + 1 {
        return Vec::new();
    }
    let Some(atr) = atr(bars, 14) else {
        return Vec::new();
    };
    let bin_width = (BIN_ATR_MULT * atr).max(f64::EPSILON);

    // Fractal pivots: strictly the extreme of the 5-bar neighbourhood, and
    // only confirmed once PIVOT_ARM bars have printed after them.
    let mut pivots: Vec<f64> = Vec::new();
    for j in PIVOT_ARM..w.len() - PIVOT_ARM {
        let c = &w[j];
        let neigh = &w[j - PIVOT_ARM..=j + PIVOT_ARM];
        let is_high = neigh.iter().enumerate().all(|(k, b)| k == PIVOT_ARM || b.high < c.high);
        let is_low = neigh.iter().enumerate().all(|(k, b)| k == PIVOT_ARM || b.low > c.low);
        if is_high {
            pivots.push(c.high);
        }
        if is_low {
            pivots.push(c.low);
        }
    }
    if pivots.is_empty() {
        return Vec::new();
    }
    pivots.sort_by(|a, b| a.total_cmp(b));

    // Greedy clustering of the sorted pivot prices.
    let mut clusters: Vec<(f64, u32)> = Vec::new(); // (price sum, touches)
    let mut sum = pivots[0];
    let mut count = 1u32;
    for &p in &pivots[1..] {
        let center = sum / count as f64;
        if p - center <= bin_width {
            sum += p;
            count += 1;
        } else {
            clusters.push((sum, count));
            sum = p;
            count = 1;
        }
    }
    clusters.push((sum, count));

    let max_touches = clusters.iter().map(|(_, c)| *c).max().unwrap_or(1).max(1);
    let close = bars[bars.len() - 1].close;
    let mut levels: Vec<KeyLevel> = clusters
        .into_iter()
        .map(|(sum, touches)| {
            let price = sum / touches as f64;
            KeyLevel {
                price,
                kind: if price < close {
                    LevelKind::Support
                } else {
                    LevelKind::Resistance
                },
                strength: touches as f64 / max_touches as f64,
                touches,
            }
        })
        .collect();

    // Keep the strongest clusters, then present them in price order.
    levels.sort_by(|a, b| b.touches.cmp(&a.touches).then(a.price.total_cmp(&b.price)));
    levels.truncate(MAX_LEVELS);
    levels.sort_by(|a, b| a.price.total_cmp(&b.price));
    levels
}
