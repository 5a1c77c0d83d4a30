//! Escalation composite: five bounded sub-scores over downside-shock risk,
//! instability, structural decay, and price/average divergence, combined
//! with fixed weights into one stress value per bar.

use serde::{Deserialize, Serialize};

use crate::metrics::roll::{clamp01, linear_unit, mean, window_min, EPS};

/// One escalation observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EscalationPoint {
    pub ts_ms: i64,
    /// Weighted composite, in [0,1].
    pub raw: f64,
    /// C1..C5 sub-scores, each in [0,1].
    pub components: [f64; 5],
}

/// Aligned input series over the valid-metric region of a symbol's history.
#[derive(Debug, Clone, Copy)]
pub struct EscalationInputs<'a> {
    pub ts_ms: &'a [i64],
    pub downside_shock_risk: &'a [f64],
    pub instability: &'a [f64],
    pub structural: &'a [f64],
    pub price: &'a [f64],
    pub moving_avg: &'a [f64],
}

impl EscalationInputs<'_> {
    pub fn len(&self) -> usize {
        self.ts_ms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ts_ms.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationConfig {
    /// Component weights C1..C5.
    pub weights: [f64; 5],
    /// C1 normalisation interval for the raw shock-risk level.
    pub dsr_level_lo: f64,
    pub dsr_level_hi: f64,
    /// C2/C3/C4/C5 upper normalisation bounds (lower bound is zero).
    pub dsr_lift_hi: f64,
    pub instability_lift_hi: f64,
    pub structural_decay_hi: f64,
    pub divergence_lift_hi: f64,
    /// Lift-off blend between "above trailing average" and "above trailing
    /// minimum". Kept as tunables; the original calibration is 0.35/0.65.
    pub lift_avg_weight: f64,
    pub lift_min_weight: f64,
    /// Trailing window lengths.
    pub dsr_window: usize,
    pub instability_window: usize,
    pub structural_window: usize,
    pub divergence_window: usize,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            weights: [0.30, 0.25, 0.20, 0.15, 0.10],
            dsr_level_lo: 0.05,
            dsr_level_hi: 0.25,
            dsr_lift_hi: 0.05,
            instability_lift_hi: 0.08,
            structural_decay_hi: 0.25,
            divergence_lift_hi: 0.006,
            lift_avg_weight: 0.35,
            lift_min_weight: 0.65,
            dsr_window: 10,
            instability_window: 5,
            structural_window: 10,
            divergence_window: 5,
        }
    }
}

impl EscalationConfig {
    pub fn max_window(&self) -> usize {
        self.dsr_window
            .max(self.instability_window)
            .max(self.structural_window)
            .max(self.divergence_window)
    }

    /// Points required (including the current one) before the composite is
    /// emitted. With default windows this is 12, so escalation starts on the
    /// 31st bar overall given the 20-bar metric warmup.
    pub fn min_points(&self) -> usize {
        self.max_window() + 2
    }
}

/// Lift-off blend: how far the current value sits above its trailing average
/// and trailing minimum, both floored at zero. Rewards sustained elevation
/// and sharp lift-off from a recent low.
fn lift_off(series: &[f64], i: usize, window: usize, cfg: &EscalationConfig) -> f64 {
    let w = &series[i - window..i];
    let above_avg = (series[i] - mean(w)).max(0.0);
    let above_min = (series[i] - window_min(w)).max(0.0);
    cfg.lift_avg_weight * above_avg + cfg.lift_min_weight * above_min
}

fn divergence(price: f64, ma: f64) -> f64 {
    (price - ma).abs() / ma.abs().max(EPS)
}

fn components_at(
    inputs: &EscalationInputs,
    divergences: &[f64],
    i: usize,
    cfg: &EscalationConfig,
) -> [f64; 5] {
    let c1 = linear_unit(
        inputs.downside_shock_risk[i],
        cfg.dsr_level_lo,
        cfg.dsr_level_hi,
    );
    let c2 = linear_unit(
        lift_off(inputs.downside_shock_risk, i, cfg.dsr_window, cfg),
        0.0,
        cfg.dsr_lift_hi,
    );
    let c3 = linear_unit(
        lift_off(inputs.instability, i, cfg.instability_window, cfg),
        0.0,
        cfg.instability_lift_hi,
    );
    let trailing_struct = mean(&inputs.structural[i - cfg.structural_window..i]);
    let c4 = linear_unit(
        (trailing_struct - inputs.structural[i]).max(0.0),
        0.0,
        cfg.structural_decay_hi,
    );
    let c5 = linear_unit(
        lift_off(divergences, i, cfg.divergence_window, cfg),
        0.0,
        cfg.divergence_lift_hi,
    );
    [c1, c2, c3, c4, c5]
}

fn combine(ts_ms: i64, components: [f64; 5], cfg: &EscalationConfig) -> EscalationPoint {
    let raw = clamp01(
        components
            .iter()
            .zip(cfg.weights.iter())
            .map(|(c, w)| c * w)
            .sum(),
    );
    EscalationPoint {
        ts_ms,
        raw,
        components,
    }
}

/// Single-point kernel: the composite at index `i` of the input series.
/// `None` below the warmup. This is the correctness oracle for
/// [`escalation_series`]; both paths must agree at every index.
pub fn escalation_at(
    inputs: &EscalationInputs,
    i: usize,
    cfg: &EscalationConfig,
) -> Option<EscalationPoint> {
    if i + 1 < cfg.min_points() || i >= inputs.len() {
        return None;
    }
    let start = i.saturating_sub(cfg.divergence_window);
    let mut divergences = vec![0.0; inputs.len()];
    for j in start..=i {
        divergences[j] = divergence(inputs.price[j], inputs.moving_avg[j]);
    }
    Some(combine(
        inputs.ts_ms[i],
        components_at(inputs, &divergences, i, cfg),
        cfg,
    ))
}

/// Full-series evaluation: precomputes the divergence series once and walks
/// the windows in order. Numerically identical to [`escalation_at`] at every
/// index.
pub fn escalation_series(
    inputs: &EscalationInputs,
    cfg: &EscalationConfig,
) -> Vec<Option<EscalationPoint>> {
    let n = inputs.len();
    let divergences: Vec<f64> = (0..n)
        .map(|j| divergence(inputs.price[j], inputs.moving_avg[j]))
        .collect();
    (0..n)
        .map(|i| {
            if i + 1 < cfg.min_points() {
                None
            } else {
                Some(combine(
                    inputs.ts_ms[i],
                    components_at(inputs, &divergences, i, cfg),
                    cfg,
                ))
            }
        })
        .collect()
}
