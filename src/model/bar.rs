use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// One OHLCV observation for a fixed time interval. Immutable once written.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub ts_ms: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn is_bullish(&self) -> bool {
        self.close >= self.open
    }

    /// Bar-level sanity used at the ingestion boundary; the pipeline itself
    /// assumes already-validated input.
    fn check(&self) -> Result<(), String> {
        for (name, v) in [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
        ] {
            if !v.is_finite() {
                return Err(format!("{} is not finite at ts {}", name, self.ts_ms));
            }
            if v <= 0.0 {
                return Err(format!("{} must be > 0 at ts {} (got {})", name, self.ts_ms, v));
            }
        }
        if !self.volume.is_finite() || self.volume < 0.0 {
            return Err(format!("volume must be finite and >= 0 at ts {}", self.ts_ms));
        }
        if self.high < self.low {
            return Err(format!("high < low at ts {}", self.ts_ms));
        }
        Ok(())
    }
}

/// Validate an ordered bar slice before it enters the pipeline: strictly
/// increasing timestamps, positive finite prices, non-negative volume.
pub fn validate_bars(bars: &[Bar]) -> Result<(), EngineError> {
    let mut prev_ts: Option<i64> = None;
    for bar in bars {
        bar.check().map_err(EngineError::MalformedInput)?;
        if let Some(prev) = prev_ts {
            if bar.ts_ms <= prev {
                return Err(EngineError::MalformedInput(format!(
                    "timestamps not strictly increasing: {} after {}",
                    bar.ts_ms, prev
                )));
            }
        }
        prev_ts = Some(bar.ts_ms);
    }
    Ok(())
}
