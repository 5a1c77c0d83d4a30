//! Rank-based percentile normalisation with tie-safe mid-ranks.
//!
//! `rank = count_less + (count_equal + 1) / 2` over the reference set, and
//! `N` counts the query itself alongside the reference values, so the result
//! is always strictly inside (0, 1).

/// Mid-rank percentile of `value` against `reference`.
/// Returns `None` for an empty reference set.
pub fn midrank_percentile(value: f64, reference: &[f64]) -> Option<f64> {
    if reference.is_empty() {
        return None;
    }
    let mut less = 0usize;
    let mut equal = 0usize;
    for &r in reference {
        if r < value {
            less += 1;
        } else if r == value {
            equal += 1;
        }
    }
    let rank = less as f64 + (equal as f64 + 1.0) / 2.0;
    Some(rank / (reference.len() + 1) as f64)
}

/// Percentile of each value against the `window` values strictly preceding
/// it. The first `window` slots are `None`; the current value is never part
/// of its own reference set.
pub fn trailing_percentiles(values: &[f64], window: usize) -> Vec<Option<f64>> {
    values
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            if i < window {
                None
            } else {
                midrank_percentile(v, &values[i - window..i])
            }
        })
        .collect()
}

/// Percentile of each value against all preceding values from series start.
/// `None` until at least `min_bars` prior values exist.
pub fn expanding_percentiles(values: &[f64], min_bars: usize) -> Vec<Option<f64>> {
    let min_bars = min_bars.max(1);
    values
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            if i < min_bars {
                None
            } else {
                midrank_percentile(v, &values[..i])
            }
        })
        .collect()
}
