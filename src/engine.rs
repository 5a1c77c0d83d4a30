//! Full-chain evaluation (bars → metrics → escalation → percentile → bucket)
//! plus the incremental-cache contract: appended bars trigger a bounded tail
//! recomputation whose output is bit-identical to a full pass.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::bucket::{Bucket, BucketConfig, HysteresisState};
use crate::era::{era_conditioned_percentiles, EraConditionedPercentile, EraSet};
use crate::error::EngineError;
use crate::escalation::{escalation_series, EscalationConfig, EscalationInputs, EscalationPoint};
use crate::metrics::roll::{mean, tail};
use crate::metrics::{compute_metrics, MIN_BARS, WINDOW_MAX};
use crate::model::{validate_bars, Bar, MetricSnapshot, Timeframe};
use crate::percentile::{expanding_percentiles, trailing_percentiles};

/// Bumping this invalidates every cached result unconditionally.
pub const CODE_VERSION: &str = "re-3";

/// Span of the reference moving average for the price-divergence component.
const DIVERGENCE_MA_SPAN: usize = 20;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    pub timeframe: Timeframe,
    pub escalation: EscalationConfig,
    pub bucket: BucketConfig,
    /// Trailing-window horizon reported alongside the bucket input stream.
    pub trailing_window: usize,
    /// Minimum history for expanding-mode percentiles.
    pub expanding_min_bars: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            timeframe: Timeframe::Day,
            escalation: EscalationConfig::default(),
            bucket: BucketConfig::default(),
            trailing_window: 252,
            expanding_min_bars: 60,
        }
    }
}

/// One output row per bar. Warmup slots keep their `None`s so row index
/// always equals bar index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineRow {
    pub ts_ms: i64,
    pub snapshot: Option<MetricSnapshot>,
    pub escalation: Option<EscalationPoint>,
    /// Trailing-window percentile of the raw escalation.
    pub trailing_percentile: Option<f64>,
    /// Era-conditioned (or plain expanding) percentile feeding the bucket.
    pub conditioned: Option<EraConditionedPercentile>,
    pub bucket: Bucket,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheFingerprint {
    pub last_bar_ts_ms: i64,
    pub n_rows: usize,
    pub code_version: String,
    pub cache_key: String,
}

impl CacheFingerprint {
    pub fn compute(last_bar_ts_ms: i64, n_rows: usize) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(last_bar_ts_ms.to_le_bytes());
        hasher.update((n_rows as u64).to_le_bytes());
        hasher.update(CODE_VERSION.as_bytes());
        Self {
            last_bar_ts_ms,
            n_rows,
            code_version: CODE_VERSION.to_string(),
            cache_key: hex::encode(hasher.finalize()),
        }
    }

    /// Whether a cached result under this fingerprint is still a valid
    /// prefix of `bars`. A code-version change always fails the check.
    pub fn is_valid_prefix_of(&self, bars: &[Bar]) -> bool {
        self.code_version == CODE_VERSION
            && self.n_rows <= bars.len()
            && self.n_rows > 0
            && bars[self.n_rows - 1].ts_ms == self.last_bar_ts_ms
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineResult {
    pub rows: Vec<EngineRow>,
    pub fingerprint: CacheFingerprint,
}

pub struct Engine {
    settings: EngineSettings,
    eras: Option<EraSet>,
}

impl Engine {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            settings,
            eras: None,
        }
    }

    /// Condition percentiles on a fitted era partition.
    pub fn with_eras(mut self, eras: EraSet) -> Self {
        self.eras = Some(eras);
        self
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Full evaluation over the entire bar history.
    pub fn evaluate(&self, bars: &[Bar]) -> Result<EngineResult, EngineError> {
        validate_bars(bars)?;
        let snapshots: Vec<Option<MetricSnapshot>> =
            (0..bars.len()).map(|i| compute_metrics(&bars[..=i])).collect();
        self.finish(bars, snapshots)
    }

    /// Incremental evaluation: `bars` is the full history with new bars
    /// appended after the prefix `prev` was computed over. Keeps the prefix
    /// rows up to `n_prev - WINDOW_MAX` untouched and recomputes metric
    /// snapshots only for the tail. Falls back to a full pass when the
    /// cached fingerprint no longer matches (stale cache is a recompute
    /// trigger, not an error).
    pub fn evaluate_incremental(
        &self,
        prev: &EngineResult,
        bars: &[Bar],
    ) -> Result<EngineResult, EngineError> {
        if !prev.fingerprint.is_valid_prefix_of(bars) {
            debug!(
                cached_rows = prev.rows.len(),
                bars = bars.len(),
                "cache fingerprint mismatch, full recompute"
            );
            return self.evaluate(bars);
        }
        validate_bars(bars)?;

        let n_prev = prev.rows.len();
        let keep = n_prev.saturating_sub(WINDOW_MAX);

        // Persisted rows can disagree with the current warmup boundary
        // (legacy or hand-edited state that still passes the fingerprint
        // check). A degraded prefix falls back to a full pass.
        let prefix_consistent = prev.rows[..keep]
            .iter()
            .enumerate()
            .all(|(i, r)| r.snapshot.is_some() == (i + 1 >= MIN_BARS));
        if !prefix_consistent {
            debug!(kept = keep, "cached prefix inconsistent with warmup, full recompute");
            return self.evaluate(bars);
        }
        debug!(kept = keep, recomputed = bars.len() - keep, "incremental tail recompute");

        let mut snapshots: Vec<Option<MetricSnapshot>> = prev.rows[..keep]
            .iter()
            .map(|r| r.snapshot.clone())
            .collect();
        for i in keep..bars.len() {
            snapshots.push(compute_metrics(&bars[..=i]));
        }
        self.finish(bars, snapshots)
    }

    /// Shared back half: escalation, percentile normalisation, bucketing.
    /// These stages are cheap and always run over the full series so the
    /// incremental path stays bit-identical to a full recomputation.
    fn finish(
        &self,
        bars: &[Bar],
        snapshots: Vec<Option<MetricSnapshot>>,
    ) -> Result<EngineResult, EngineError> {
        let n = bars.len();
        if n == 0 {
            return Err(EngineError::InsufficientHistory { need: 1, got: 0 });
        }

        // Valid-metric region: one entry per bar from the warmup boundary on.
        let first_valid = MIN_BARS - 1;
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();

        let (region_ts, region_dsr, region_inst, region_struct, region_price, region_ma) =
            if n > first_valid {
                let idx: Vec<usize> = (first_valid..n).collect();
                let snap = |i: &usize| snapshots[*i].as_ref().expect("snapshot after warmup");
                (
                    idx.iter().map(|i| bars[*i].ts_ms).collect::<Vec<i64>>(),
                    idx.iter().map(|i| snap(i).downside_shock_risk).collect::<Vec<f64>>(),
                    idx.iter().map(|i| snap(i).instability_index).collect::<Vec<f64>>(),
                    idx.iter().map(|i| snap(i).structural_score).collect::<Vec<f64>>(),
                    idx.iter().map(|i| closes[*i]).collect::<Vec<f64>>(),
                    idx.iter()
                        .map(|i| mean(tail(&closes[..=*i], DIVERGENCE_MA_SPAN)))
                        .collect::<Vec<f64>>(),
                )
            } else {
                Default::default()
            };

        let inputs = EscalationInputs {
            ts_ms: &region_ts,
            downside_shock_risk: &region_dsr,
            instability: &region_inst,
            structural: &region_struct,
            price: &region_price,
            moving_avg: &region_ma,
        };
        let escalations = escalation_series(&inputs, &self.settings.escalation);

        // Compact raw escalation series for the rank stages.
        let mut esc_bar_idx: Vec<usize> = Vec::new();
        let mut esc_raw: Vec<f64> = Vec::new();
        let mut esc_ts: Vec<i64> = Vec::new();
        for (j, point) in escalations.iter().enumerate() {
            if let Some(p) = point {
                esc_bar_idx.push(first_valid + j);
                esc_raw.push(p.raw);
                esc_ts.push(p.ts_ms);
            }
        }

        let trailing = trailing_percentiles(&esc_raw, self.settings.trailing_window);

        let conditioned: Vec<EraConditionedPercentile> = match &self.eras {
            Some(eras) => era_conditioned_percentiles(
                &esc_raw,
                &esc_ts,
                eras,
                self.settings.expanding_min_bars,
                self.settings.timeframe.bars_per_trading_year(),
            ),
            None => expanding_percentiles(&esc_raw, self.settings.expanding_min_bars)
                .into_iter()
                .map(|p| EraConditionedPercentile {
                    percentile: p,
                    confidence: 1.0,
                    adjusted: p,
                })
                .collect(),
        };

        // Assemble rows, streaming the hysteresis machine in bar order.
        let mut rows: Vec<EngineRow> = bars
            .iter()
            .enumerate()
            .map(|(i, b)| EngineRow {
                ts_ms: b.ts_ms,
                snapshot: snapshots[i].clone(),
                escalation: if i >= first_valid {
                    escalations[i - first_valid]
                } else {
                    None
                },
                trailing_percentile: None,
                conditioned: None,
                bucket: self.settings.bucket.default_bucket,
            })
            .collect();

        let mut state = HysteresisState::default();
        let mut cursor = 0usize;
        for i in 0..n {
            let at_escalation = cursor < esc_bar_idx.len() && esc_bar_idx[cursor] == i;
            if at_escalation {
                rows[i].trailing_percentile = trailing[cursor];
                rows[i].conditioned = Some(conditioned[cursor]);
                rows[i].bucket =
                    state.classify(conditioned[cursor].adjusted, &self.settings.bucket);
                cursor += 1;
            } else {
                rows[i].bucket = state.classify(None, &self.settings.bucket);
            }
        }

        let fingerprint = CacheFingerprint::compute(bars[n - 1].ts_ms, n);
        Ok(EngineResult { rows, fingerprint })
    }
}
