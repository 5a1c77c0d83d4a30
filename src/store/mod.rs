pub mod bar_store;
pub mod state_store;

pub use bar_store::BarStore;
pub use state_store::{StateRecord, StateStore, STATE_SCHEMA_VERSION};

use std::path::{Path, PathBuf};

use crate::engine::CacheFingerprint;
use crate::error::EngineError;
use crate::model::Timeframe;

fn sidecar_path(dir: &Path, symbol: &str, timeframe: Timeframe) -> PathBuf {
    dir.join(format!("{}_{}.cache.json", symbol, timeframe.label()))
}

/// Persist the cache sidecar for one (symbol, timeframe).
pub fn write_cache_sidecar(
    dir: &Path,
    symbol: &str,
    timeframe: Timeframe,
    fingerprint: &CacheFingerprint,
) -> Result<(), EngineError> {
    std::fs::create_dir_all(dir)?;
    let path = sidecar_path(dir, symbol, timeframe);
    std::fs::write(path, serde_json::to_string_pretty(fingerprint)?)?;
    Ok(())
}

/// Load the cache sidecar if present and parseable. A missing or corrupt
/// sidecar is treated as no cache, never an error.
pub fn read_cache_sidecar(
    dir: &Path,
    symbol: &str,
    timeframe: Timeframe,
) -> Option<CacheFingerprint> {
    let path = sidecar_path(dir, symbol, timeframe);
    let payload = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&payload).ok()
}
