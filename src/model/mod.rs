pub mod bar;
pub mod snapshot;
pub mod timeframe;

pub use bar::{validate_bars, Bar};
pub use snapshot::{
    KeyLevel, LevelKind, LiquidityContext, LiquidityLabel, MetricSnapshot, MomentumLabel,
    MomentumState, TrendDirection, VolatilityLabel, VolatilityRegime,
};
pub use timeframe::Timeframe;
