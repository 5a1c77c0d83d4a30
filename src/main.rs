use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};

use regime_engine::config::Config;
use regime_engine::engine::{Engine, EngineResult};
use regime_engine::era::{fit_eras, write_boundary_csv, EraConfig, EraMetadata, EraSet};
use regime_engine::model::{Bar, Timeframe};
use regime_engine::store::{read_cache_sidecar, write_cache_sidecar, BarStore, StateStore};

fn main() -> Result<()> {
    // Load config
    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {:#}", e);
            eprintln!("Make sure config/default.toml exists");
            std::process::exit(1);
        }
    };

    // Init tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                config
                    .logging
                    .level
                    .parse()
                    .unwrap_or_else(|_| "info".parse().unwrap())
            }),
        )
        .init();

    let timeframe = Timeframe::parse(&config.engine.timeframe)?;
    let settings = config.engine_settings()?;
    let meta_dir = Path::new(&config.data.meta_dir);

    tracing::info!(
        timeframe = %timeframe.label(),
        symbols = config.tradable_symbols().len(),
        benchmark = %config.universe.benchmark,
        "Starting regime-engine"
    );

    // Bar reads stay on the main thread; the connection is not shareable.
    let bar_store = BarStore::open(Path::new(&config.data.bar_store_path))?;
    let symbols = config.tradable_symbols();
    let mut universe: Vec<(String, Vec<Bar>)> = Vec::with_capacity(symbols.len());
    for symbol in &symbols {
        universe.push((symbol.clone(), bar_store.get_bars(symbol, timeframe, None)?));
    }
    drop(bar_store);

    // Era fit over the benchmark series.
    let benchmark = config.universe.benchmark.trim().to_ascii_uppercase();
    let bench_bars = universe
        .iter()
        .find(|(s, _)| *s == benchmark)
        .map(|(_, bars)| bars.as_slice())
        .unwrap_or(&[]);
    let eras: Option<EraSet> = if bench_bars.len() >= 2 {
        let ts: Vec<i64> = bench_bars.iter().map(|b| b.ts_ms).collect();
        let closes: Vec<f64> = bench_bars.iter().map(|b| b.close).collect();
        let era_cfg = EraConfig::default();
        let set = fit_eras(&config.universe.asset_class, &ts, &closes, &era_cfg)?;
        if set.bic.is_infinite() {
            tracing::warn!(
                bars = bench_bars.len(),
                "benchmark too short for one full era segment, single-era fallback"
            );
        }
        std::fs::create_dir_all(meta_dir)?;
        let metadata = EraMetadata::from_fit(&set, &era_cfg, &ts);
        let meta_path = meta_dir.join(format!("eras_{}.json", config.universe.asset_class));
        std::fs::write(&meta_path, serde_json::to_string_pretty(&metadata)?)?;
        write_boundary_csv(&meta_dir.join("era_boundaries.csv"), std::slice::from_ref(&set))?;
        tracing::info!(n_eras = set.eras.len(), bic = set.bic, "era fit written");
        Some(set)
    } else {
        tracing::warn!(benchmark = %benchmark, "no benchmark bars, skipping era conditioning");
        None
    };

    let state_store = Mutex::new(StateStore::open(Path::new(&config.data.state_store_path))?);

    // One worker owns one (symbol, timeframe) unit of state at a time.
    std::thread::scope(|scope| -> Result<()> {
        let mut handles = Vec::new();
        for (symbol, bars) in &universe {
            let engine = match &eras {
                Some(set) => Engine::new(settings.clone()).with_eras(set.clone()),
                None => Engine::new(settings.clone()),
            };
            let state_store = &state_store;
            handles.push(scope.spawn(move || -> Result<()> {
                run_symbol(symbol, timeframe, engine, bars, state_store, meta_dir)
            }));
        }
        for handle in handles {
            handle
                .join()
                .map_err(|_| anyhow::anyhow!("worker panicked"))??;
        }
        Ok(())
    })?;

    tracing::info!("done");
    Ok(())
}

fn run_symbol(
    symbol: &str,
    timeframe: Timeframe,
    engine: Engine,
    bars: &[Bar],
    state_store: &Mutex<StateStore>,
    meta_dir: &Path,
) -> Result<()> {
    if bars.is_empty() {
        tracing::warn!(symbol, "no bars, skipping");
        return Ok(());
    }

    // Consult the sidecar: a matching fingerprint allows a tail recompute.
    let cached = read_cache_sidecar(meta_dir, symbol, timeframe);
    let result: EngineResult = match cached {
        Some(fp) if fp.is_valid_prefix_of(bars) => {
            let prev_rows = state_store
                .lock()
                .expect("state store lock")
                .load_rows(symbol, timeframe)?;
            if prev_rows.len() == fp.n_rows {
                let prev = EngineResult {
                    rows: prev_rows,
                    fingerprint: fp,
                };
                engine.evaluate_incremental(&prev, bars)?
            } else {
                tracing::warn!(symbol, "sidecar/state row count mismatch, full recompute");
                engine.evaluate(bars)?
            }
        }
        _ => engine.evaluate(bars)?,
    };

    {
        let mut store = state_store.lock().expect("state store lock");
        store.upsert_rows(symbol, timeframe, &result.rows)?;
    }
    write_cache_sidecar(meta_dir, symbol, timeframe, &result.fingerprint)
        .with_context(|| format!("failed to write cache sidecar for {}", symbol))?;

    tracing::info!(
        symbol,
        rows = result.rows.len(),
        cache_key = %result.fingerprint.cache_key,
        "evaluated"
    );
    Ok(())
}
