use std::path::PathBuf;

use regime_engine::bucket::Bucket;
use regime_engine::engine::{CacheFingerprint, EngineRow};
use regime_engine::model::{Bar, Timeframe};
use regime_engine::store::{
    read_cache_sidecar, write_cache_sidecar, BarStore, StateStore,
};

fn temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "regime-engine-test-{}-{}",
        tag,
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn bar(ts_ms: i64, close: f64) -> Bar {
    Bar {
        ts_ms,
        open: close,
        high: close * 1.01,
        low: close * 0.99,
        close,
        volume: 500.0,
    }
}

fn row(ts_ms: i64) -> EngineRow {
    EngineRow {
        ts_ms,
        snapshot: None,
        escalation: None,
        trailing_percentile: Some(0.42),
        conditioned: None,
        bucket: Bucket::Low,
    }
}

#[test]
fn bar_store_round_trip_is_ordered() {
    let dir = temp_dir("bars-order");
    let mut store = BarStore::open(&dir.join("bars.duckdb")).unwrap();
    // Write out of order; reads must come back sorted by timestamp.
    let bars = vec![bar(3_000, 103.0), bar(1_000, 101.0), bar(2_000, 102.0)];
    store.write_bars("SPY", Timeframe::Day, &bars).unwrap();

    let got = store.get_bars("SPY", Timeframe::Day, None).unwrap();
    assert_eq!(got.len(), 3);
    assert_eq!(
        got.iter().map(|b| b.ts_ms).collect::<Vec<_>>(),
        vec![1_000, 2_000, 3_000]
    );

    let upto = store.get_bars("SPY", Timeframe::Day, Some(2_000)).unwrap();
    assert_eq!(upto.len(), 2);
}

#[test]
fn bar_store_dedupes_last_write_wins() {
    let dir = temp_dir("bars-dedupe");
    let mut store = BarStore::open(&dir.join("bars.duckdb")).unwrap();
    store
        .write_bars("SPY", Timeframe::Day, &[bar(1_000, 100.0)])
        .unwrap();
    store
        .write_bars("SPY", Timeframe::Day, &[bar(1_000, 111.0)])
        .unwrap();

    let got = store.get_bars("SPY", Timeframe::Day, None).unwrap();
    assert_eq!(got.len(), 1);
    assert!((got[0].close - 111.0).abs() < f64::EPSILON);
}

#[test]
fn bar_store_separates_symbols_and_timeframes() {
    let dir = temp_dir("bars-keys");
    let mut store = BarStore::open(&dir.join("bars.duckdb")).unwrap();
    store
        .write_bars("SPY", Timeframe::Day, &[bar(1_000, 100.0)])
        .unwrap();
    store
        .write_bars("SPY", Timeframe::Week, &[bar(1_000, 200.0)])
        .unwrap();
    store
        .write_bars("QQQ", Timeframe::Day, &[bar(1_000, 300.0)])
        .unwrap();

    assert_eq!(store.get_bars("SPY", Timeframe::Day, None).unwrap().len(), 1);
    assert_eq!(store.get_bars("SPY", Timeframe::Week, None).unwrap().len(), 1);
    assert_eq!(store.get_bars("QQQ", Timeframe::Day, None).unwrap().len(), 1);
    assert!(store.get_bars("IWM", Timeframe::Day, None).unwrap().is_empty());
}

#[test]
fn state_store_upsert_and_latest() {
    let dir = temp_dir("state");
    let mut store = StateStore::open(&dir.join("state.sqlite")).unwrap();
    let rows = vec![row(1_000), row(2_000), row(3_000)];
    store.upsert_rows("SPY", Timeframe::Day, &rows).unwrap();

    let loaded = store.load_rows("SPY", Timeframe::Day).unwrap();
    assert_eq!(loaded, rows);

    let latest = store.latest("SPY", Timeframe::Day).unwrap().unwrap();
    assert_eq!(latest.ts_ms, 3_000);

    // Re-upserting the tail moves the latest pointer, not the row count.
    let mut newer = row(3_000);
    newer.bucket = Bucket::High;
    store
        .upsert_rows("SPY", Timeframe::Day, &[newer.clone(), row(4_000)])
        .unwrap();
    let loaded = store.load_rows("SPY", Timeframe::Day).unwrap();
    assert_eq!(loaded.len(), 4);
    assert_eq!(loaded[2], newer);
    let latest = store.latest("SPY", Timeframe::Day).unwrap().unwrap();
    assert_eq!(latest.ts_ms, 4_000);
}

#[test]
fn state_store_empty_lookups() {
    let dir = temp_dir("state-empty");
    let store = StateStore::open(&dir.join("state.sqlite")).unwrap();
    assert!(store.load_rows("SPY", Timeframe::Day).unwrap().is_empty());
    assert!(store.latest("SPY", Timeframe::Day).unwrap().is_none());
}

#[test]
fn cache_sidecar_round_trip() {
    let dir = temp_dir("sidecar");
    let fp = CacheFingerprint::compute(5_000, 128);
    write_cache_sidecar(&dir, "SPY", Timeframe::Day, &fp).unwrap();

    let loaded = read_cache_sidecar(&dir, "SPY", Timeframe::Day).unwrap();
    assert_eq!(loaded, fp);

    // Missing sidecar is no cache, not an error.
    assert!(read_cache_sidecar(&dir, "QQQ", Timeframe::Day).is_none());

    // Corrupt sidecar is ignored the same way.
    std::fs::write(dir.join("IWM_1d.cache.json"), "{not json").unwrap();
    assert!(read_cache_sidecar(&dir, "IWM", Timeframe::Day).is_none());
}
