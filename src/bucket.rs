//! Two-threshold hysteresis classifier turning an escalation percentile
//! stream into a discrete risk bucket without flip-flopping near one line.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Bucket {
    Low,
    Med,
    High,
}

impl Bucket {
    /// Recommended action tag for downstream consumers.
    pub fn action(&self) -> &'static str {
        match self {
            Bucket::Low => "normal-operations",
            Bucket::Med => "tighten-risk",
            Bucket::High => "reduce-exposure",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketConfig {
    /// Percentile at or above which the machine enters the high state.
    pub enter: f64,
    /// Percentile at or below which it leaves the high state.
    pub exit: f64,
    /// Bucket emitted while not in the high state.
    pub default_bucket: Bucket,
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            enter: 0.90,
            exit: 0.75,
            default_bucket: Bucket::Low,
        }
    }
}

/// Hysteresis state machine. The single `is_high` bit is the only mutable
/// state in the whole core; one instance per (symbol, timeframe).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HysteresisState {
    pub is_high: bool,
}

impl HysteresisState {
    /// Classify the next percentile. Between the two thresholds the state is
    /// held. An undefined or NaN percentile emits the default bucket and
    /// leaves the stored bit untouched, so behaviour after a gap resumes as
    /// if the gap never happened.
    pub fn classify(&mut self, percentile: Option<f64>, cfg: &BucketConfig) -> Bucket {
        let p = match percentile {
            Some(p) if p.is_finite() => p,
            _ => return cfg.default_bucket,
        };
        if self.is_high {
            if p <= cfg.exit {
                self.is_high = false;
            }
        } else if p >= cfg.enter {
            self.is_high = true;
        }
        if self.is_high {
            Bucket::High
        } else {
            cfg.default_bucket
        }
    }
}
