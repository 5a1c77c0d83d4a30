use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::bucket::BucketConfig;
use crate::engine::EngineSettings;
use crate::escalation::EscalationConfig;
use crate::model::Timeframe;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub engine: EngineSection,
    pub universe: UniverseConfig,
    pub data: DataConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineSection {
    pub timeframe: String,
    #[serde(default = "default_trailing_window")]
    pub trailing_window: usize,
    #[serde(default = "default_expanding_min_bars")]
    pub expanding_min_bars: usize,
    #[serde(default = "default_enter")]
    pub bucket_enter: f64,
    #[serde(default = "default_exit")]
    pub bucket_exit: f64,
}

fn default_trailing_window() -> usize {
    252
}

fn default_expanding_min_bars() -> usize {
    60
}

fn default_enter() -> f64 {
    0.90
}

fn default_exit() -> f64 {
    0.75
}

#[derive(Debug, Clone, Deserialize)]
pub struct UniverseConfig {
    pub symbols: Vec<String>,
    /// Benchmark symbol whose history drives the era fit.
    pub benchmark: String,
    pub asset_class: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataConfig {
    pub bar_store_path: String,
    pub state_store_path: String,
    /// Directory for era metadata JSON, the boundary CSV, and cache sidecars.
    pub meta_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("config/default.toml"))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&config_str)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        Timeframe::parse(&self.engine.timeframe)?;
        if self.engine.trailing_window == 0 {
            bail!("engine.trailing_window must be > 0");
        }
        if self.engine.expanding_min_bars == 0 {
            bail!("engine.expanding_min_bars must be > 0");
        }
        let (enter, exit) = (self.engine.bucket_enter, self.engine.bucket_exit);
        if !(0.0..=1.0).contains(&enter) || !(0.0..=1.0).contains(&exit) {
            bail!("bucket thresholds must lie in [0,1]");
        }
        if exit >= enter {
            bail!(
                "bucket_exit ({}) must be below bucket_enter ({})",
                exit,
                enter
            );
        }
        if self.universe.symbols.is_empty() {
            bail!("universe.symbols must not be empty");
        }
        if self.universe.benchmark.trim().is_empty() {
            bail!("universe.benchmark must be set");
        }
        Ok(())
    }

    /// Symbols to evaluate, upper-cased and deduplicated, benchmark included.
    pub fn tradable_symbols(&self) -> Vec<String> {
        let mut out = Vec::new();
        for sym in std::iter::once(&self.universe.benchmark).chain(self.universe.symbols.iter()) {
            let s = sym.trim().to_ascii_uppercase();
            if !s.is_empty() && !out.iter().any(|v| v == &s) {
                out.push(s);
            }
        }
        out
    }

    pub fn engine_settings(&self) -> Result<EngineSettings> {
        Ok(EngineSettings {
            timeframe: Timeframe::parse(&self.engine.timeframe)?,
            escalation: EscalationConfig::default(),
            bucket: BucketConfig {
                enter: self.engine.bucket_enter,
                exit: self.engine.bucket_exit,
                ..BucketConfig::default()
            },
            trailing_window: self.engine.trailing_window,
            expanding_min_bars: self.engine.expanding_min_bars,
        })
    }
}
