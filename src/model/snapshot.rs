use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolatilityLabel {
    Low,
    Normal,
    Elevated,
    Extreme,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendDirection {
    Rising,
    Falling,
    Stable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MomentumLabel {
    Accelerating,
    Steady,
    Fading,
    Reversing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LiquidityLabel {
    Dry,
    Normal,
    Flush,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LevelKind {
    Support,
    Resistance,
}

/// One clustered support/resistance price level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeyLevel {
    pub price: f64,
    pub kind: LevelKind,
    /// Touch count normalised by the strongest level, in [0,1].
    pub strength: f64,
    pub touches: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolatilityRegime {
    /// Short-vs-long realized volatility pressure, in [0,1].
    pub score: f64,
    pub label: VolatilityLabel,
    pub trend: TrendDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MomentumState {
    /// Signed momentum composite, in [-1,1].
    pub score: f64,
    pub label: MomentumLabel,
    /// Kaufman efficiency ratio, in [0,1].
    pub efficiency_ratio: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LiquidityContext {
    /// Recent volume versus the long-run norm, in [0,1].
    pub score: f64,
    pub label: LiquidityLabel,
    pub trend: TrendDirection,
}

/// Full per-bar metric set. Every field depends only on bars up to and
/// including the snapshot's bar; no look-ahead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub ts_ms: i64,
    /// Directional bias, in [-1,1].
    pub market_bias: f64,
    /// Aggregate risk level, in [0,1].
    pub risk_level: f64,
    pub volatility_regime: VolatilityRegime,
    /// Downside shock susceptibility, in [0,1].
    pub downside_shock_risk: f64,
    /// Market structure quality, in [-1,1].
    pub structural_score: f64,
    pub momentum: MomentumState,
    pub liquidity: LiquidityContext,
    /// Probability-like breakout pressure, each in [0,1].
    pub breakout_up: f64,
    pub breakout_down: f64,
    /// Support/resistance levels ordered by price, at most 8.
    pub key_levels: Vec<KeyLevel>,
    /// Composite instability, in [0,1].
    pub instability_index: f64,
}
