//! Structural-break ("era") detection over a benchmark volatility series.
//!
//! The detector fits a mean-only break model to `ln(rolling_std(log_returns))`
//! by exact dynamic programming over segment endpoints, with BIC model-order
//! selection. Eras partition the full input range; the percentile normaliser
//! later runs independently inside each era, with early-era estimates shrunk
//! toward neutral.

use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::EngineError;
use crate::metrics::roll::std_dev;
use crate::percentile::expanding_percentiles;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EraConfig {
    /// Rolling window for the realized-vol series.
    pub rv_window: usize,
    /// Minimum segment length in bars.
    pub min_segment: usize,
    /// Floor added before the log so zero-vol segments stay finite.
    pub epsilon: f64,
}

impl Default for EraConfig {
    fn default() -> Self {
        Self {
            rv_window: 126,
            min_segment: 504,
            epsilon: 1e-12,
        }
    }
}

/// A contiguous, non-overlapping time segment. Indices are inclusive bar
/// positions in the fitting series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Era {
    pub start_idx: usize,
    pub end_idx: usize,
    pub start_ts_ms: i64,
    pub end_ts_ms: i64,
}

impl Era {
    pub fn contains_ts(&self, ts_ms: i64) -> bool {
        ts_ms >= self.start_ts_ms && ts_ms <= self.end_ts_ms
    }
}

/// Result of one era fit. Eras cover the full input range, gap-free.
/// A series too short for even one minimum-length segment is reported as a
/// single era with an empty break set and infinite BIC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EraSet {
    pub asset_class: String,
    pub eras: Vec<Era>,
    /// Bar indices where a new era begins (excluding index 0).
    pub break_indices: Vec<usize>,
    /// BIC of the selected model order.
    pub bic: f64,
    /// sha256 over the fitting input; stale boundaries are detected by
    /// comparing this against the current series hash.
    pub data_hash: String,
}

impl EraSet {
    pub fn era_for_ts(&self, ts_ms: i64) -> Option<&Era> {
        self.eras.iter().find(|e| e.contains_ts(ts_ms))
    }
}

/// Era metadata document persisted as JSON, one per asset class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EraMetadata {
    pub asset_class: String,
    pub epsilon: f64,
    pub rv_window: usize,
    pub min_segment: usize,
    pub break_model: String,
    pub break_indices: Vec<usize>,
    pub break_dates: Vec<String>,
    pub n_eras: usize,
    pub data_hash: String,
}

impl EraMetadata {
    pub fn from_fit(set: &EraSet, cfg: &EraConfig, ts_ms: &[i64]) -> Self {
        let break_dates = set
            .break_indices
            .iter()
            .map(|&i| format_date(ts_ms[i]))
            .collect();
        Self {
            asset_class: set.asset_class.clone(),
            epsilon: cfg.epsilon,
            rv_window: cfg.rv_window,
            min_segment: cfg.min_segment,
            break_model: "mean".to_string(),
            break_indices: set.break_indices.clone(),
            break_dates,
            n_eras: set.eras.len(),
            data_hash: set.data_hash.clone(),
        }
    }
}

fn format_date(ts_ms: i64) -> String {
    match Utc.timestamp_millis_opt(ts_ms) {
        chrono::LocalResult::Single(dt) => dt.format("%Y-%m-%d").to_string(),
        _ => ts_ms.to_string(),
    }
}

/// Hash of the fitting input series. Any change to the series changes this.
pub fn series_hash(ts_ms: &[i64], closes: &[f64]) -> String {
    let mut hasher = Sha256::new();
    for (&t, &c) in ts_ms.iter().zip(closes.iter()) {
        hasher.update(t.to_le_bytes());
        hasher.update(c.to_le_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Write the shared era boundary table across asset classes.
pub fn write_boundary_csv(path: &std::path::Path, sets: &[EraSet]) -> Result<(), EngineError> {
    let mut out = String::from("asset_class,era,start_date,end_date,start_idx,end_idx\n");
    for set in sets {
        for (i, era) in set.eras.iter().enumerate() {
            out.push_str(&format!(
                "{},{},{},{},{},{}\n",
                set.asset_class,
                i,
                format_date(era.start_ts_ms),
                format_date(era.end_ts_ms),
                era.start_idx,
                era.end_idx,
            ));
        }
    }
    std::fs::write(path, out)?;
    Ok(())
}

/// Log-volatility fitting series: `ln(rolling_std(log_returns, rv_window) + eps)`.
/// The first `rv_window` bars have no value and are excluded from the fit
/// without changing segment membership of the valid bars.
fn log_vol_series(closes: &[f64], cfg: &EraConfig) -> Vec<f64> {
    let n = closes.len();
    if n < cfg.rv_window + 1 {
        return Vec::new();
    }
    let returns: Vec<f64> = closes
        .windows(2)
        .map(|w| (w[1] / w[0].max(cfg.epsilon)).ln())
        .collect();
    (cfg.rv_window..n)
        .map(|t| (std_dev(&returns[t - cfg.rv_window..t]) + cfg.epsilon).ln())
        .collect()
}

/// Sum of squared deviations from the segment's own mean, via prefix sums.
struct SegmentCost {
    s1: Vec<f64>,
    s2: Vec<f64>,
}

impl SegmentCost {
    fn new(values: &[f64]) -> Self {
        let mut s1 = vec![0.0; values.len() + 1];
        let mut s2 = vec![0.0; values.len() + 1];
        for (i, &v) in values.iter().enumerate() {
            s1[i + 1] = s1[i] + v;
            s2[i + 1] = s2[i] + v * v;
        }
        Self { s1, s2 }
    }

    /// Cost of the half-open segment [a, b).
    fn cost(&self, a: usize, b: usize) -> f64 {
        let len = (b - a) as f64;
        let sum = self.s1[b] - self.s1[a];
        let sq = self.s2[b] - self.s2[a];
        (sq - sum * sum / len).max(0.0)
    }
}

/// Fit eras to a benchmark close-price series.
///
/// Returns an `EraSet` whose eras exactly cover `[ts_ms[0], ts_ms[n-1]]`.
/// Errors only on empty/degenerate input; a series without room for one
/// full segment yields the reported single-era/infinite-BIC result.
pub fn fit_eras(
    asset_class: &str,
    ts_ms: &[i64],
    closes: &[f64],
    cfg: &EraConfig,
) -> Result<EraSet, EngineError> {
    if ts_ms.len() != closes.len() || closes.len() < 2 {
        return Err(EngineError::InsufficientHistory {
            need: 2,
            got: closes.len(),
        });
    }
    let n = closes.len();
    let data_hash = series_hash(ts_ms, closes);

    let values = log_vol_series(closes, cfg);
    let m = values.len();
    let l = cfg.min_segment;

    if m < l {
        // Reported condition: no room for even one minimum-length segment.
        return Ok(EraSet {
            asset_class: asset_class.to_string(),
            eras: vec![Era {
                start_idx: 0,
                end_idx: n - 1,
                start_ts_ms: ts_ms[0],
                end_ts_ms: ts_ms[n - 1],
            }],
            break_indices: Vec::new(),
            bic: f64::INFINITY,
            data_hash,
        });
    }

    let seg = SegmentCost::new(&values);
    let max_k = m / l - 1;

    // dp[k][j]: best cost splitting values[0..j] into k+1 segments of
    // length >= l. parent[k][j]: chosen start of the last segment.
    let mut dp: Vec<Vec<f64>> = Vec::with_capacity(max_k + 1);
    let mut parent: Vec<Vec<usize>> = Vec::with_capacity(max_k + 1);

    let mut dp0 = vec![f64::INFINITY; m + 1];
    for j in l..=m {
        dp0[j] = seg.cost(0, j);
    }
    dp.push(dp0);
    parent.push(vec![0; m + 1]);

    for k in 1..=max_k {
        let mut dpk = vec![f64::INFINITY; m + 1];
        let mut park = vec![0; m + 1];
        let prev = &dp[k - 1];
        for j in ((k + 1) * l)..=m {
            let mut best = f64::INFINITY;
            let mut best_split = 0;
            // Last segment starts at `split`; earlier part needs k*l bars.
            for split in (k * l)..=(j - l) {
                if prev[split].is_finite() {
                    let cand = prev[split] + seg.cost(split, j);
                    // Strict improvement only: first occurrence wins ties.
                    if cand < best {
                        best = cand;
                        best_split = split;
                    }
                }
            }
            dpk[j] = best;
            park[j] = best_split;
        }
        dp.push(dpk);
        parent.push(park);
    }

    // Model order by minimum BIC; first occurrence (smallest k) wins ties.
    let mf = m as f64;
    let mut best_k = 0usize;
    let mut best_bic = f64::INFINITY;
    for (k, dpk) in dp.iter().enumerate() {
        let rss = dpk[m];
        if !rss.is_finite() {
            continue;
        }
        let bic = mf * (rss.max(cfg.epsilon) / mf).ln() + (k as f64 + 1.0) * mf.ln();
        if bic < best_bic {
            best_bic = bic;
            best_k = k;
        }
    }

    // Reconstruct splits in valid-series coordinates.
    let mut splits = Vec::with_capacity(best_k);
    let mut j = m;
    for k in (1..=best_k).rev() {
        let s = parent[k][j];
        splits.push(s);
        j = s;
    }
    splits.reverse();

    // Map back to bar indices. Leading warmup bars belong to the first era.
    let offset = n - m;
    let break_indices: Vec<usize> = splits.iter().map(|&s| s + offset).collect();

    let mut eras = Vec::with_capacity(break_indices.len() + 1);
    let mut start = 0usize;
    for &b in &break_indices {
        eras.push(Era {
            start_idx: start,
            end_idx: b - 1,
            start_ts_ms: ts_ms[start],
            end_ts_ms: ts_ms[b - 1],
        });
        start = b;
    }
    eras.push(Era {
        start_idx: start,
        end_idx: n - 1,
        start_ts_ms: ts_ms[start],
        end_ts_ms: ts_ms[n - 1],
    });

    Ok(EraSet {
        asset_class: asset_class.to_string(),
        eras,
        break_indices,
        bic: best_bic,
        data_hash,
    })
}

/// Expanding percentile conditioned on era membership, with early-era
/// confidence shrinkage toward the neutral 0.5.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EraConditionedPercentile {
    /// Raw expanding percentile within the era, if enough era history exists.
    pub percentile: Option<f64>,
    /// `min(1, bars_seen_in_era / bars_per_year)`.
    pub confidence: f64,
    /// `0.5 + (raw - 0.5) * confidence`; neutral when no percentile exists.
    pub adjusted: Option<f64>,
}

/// Run the expanding normaliser independently inside each era.
///
/// `values[i]` is the raw escalation at `ts_ms[i]`. `bars_seen_in_era`
/// counts prior bars of the same era, so the first bar of an era always
/// yields exactly 0.5. Timestamps outside the fitted range attach to the
/// nearest edge era: bars past the last boundary extend the terminal era
/// and bars before the first one extend the opening era, so every bar has
/// a defined percentile stream even when the symbol's history outruns the
/// benchmark's.
pub fn era_conditioned_percentiles(
    values: &[f64],
    ts_ms: &[i64],
    eras: &EraSet,
    min_bars: usize,
    bars_per_year: u32,
) -> Vec<EraConditionedPercentile> {
    debug_assert_eq!(values.len(), ts_ms.len());
    let mut out = vec![
        EraConditionedPercentile {
            percentile: None,
            confidence: 0.0,
            adjusted: None,
        };
        values.len()
    ];
    if eras.eras.is_empty() {
        return out;
    }
    let target = bars_per_year.max(1) as f64;

    let assignment: Vec<usize> = ts_ms
        .iter()
        .map(|&t| {
            eras.eras
                .iter()
                .position(|e| e.contains_ts(t))
                .unwrap_or(if t < eras.eras[0].start_ts_ms {
                    0
                } else {
                    eras.eras.len() - 1
                })
        })
        .collect();

    for era_idx in 0..eras.eras.len() {
        let idx: Vec<usize> = (0..values.len())
            .filter(|&i| assignment[i] == era_idx)
            .collect();
        if idx.is_empty() {
            continue;
        }
        let era_values: Vec<f64> = idx.iter().map(|&i| values[i]).collect();
        let raw = expanding_percentiles(&era_values, min_bars);
        for (pos, &i) in idx.iter().enumerate() {
            let confidence = (pos as f64 / target).min(1.0);
            let p = raw[pos];
            // At full confidence pass the raw percentile through untouched;
            // the algebraic form is not bit-exact in floating point.
            let adjusted = match p {
                Some(p) if confidence >= 1.0 => p,
                _ => 0.5 + (p.unwrap_or(0.5) - 0.5) * confidence,
            };
            out[i] = EraConditionedPercentile {
                percentile: p,
                confidence,
                adjusted: Some(adjusted),
            };
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_cost_matches_direct_ssr() {
        let values = [1.0, 2.0, 4.0, 8.0, 16.0];
        let seg = SegmentCost::new(&values);
        let m = values[1..4].iter().sum::<f64>() / 3.0;
        let direct: f64 = values[1..4].iter().map(|v| (v - m).powi(2)).sum();
        assert!((seg.cost(1, 4) - direct).abs() < 1e-9);
        assert!(seg.cost(0, 1).abs() < 1e-12);
    }

    #[test]
    fn series_hash_tracks_input_changes() {
        let ts = [1_000i64, 2_000, 3_000];
        let a = series_hash(&ts, &[1.0, 2.0, 3.0]);
        let b = series_hash(&ts, &[1.0, 2.0, 3.0]);
        let c = series_hash(&ts, &[1.0, 2.0, 3.1]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
