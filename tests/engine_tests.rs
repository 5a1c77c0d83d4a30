use regime_engine::bucket::Bucket;
use regime_engine::engine::{CacheFingerprint, Engine, EngineSettings, CODE_VERSION};
use regime_engine::era::{fit_eras, EraConfig};
use regime_engine::model::Bar;

fn lcg(seed: &mut u64) -> f64 {
    *seed = seed
        .wrapping_mul(6364136223846793005)
        .wrapping_add(1442695040888963407);
    (*seed >> 11) as f64 / (1u64 << 53) as f64
}

fn walk_bars(n: usize, seed: u64) -> Vec<Bar> {
    let mut s = seed;
    let mut close = 100.0;
    (0..n)
        .map(|i| {
            let r = (lcg(&mut s) - 0.5) * 0.03;
            let open = close;
            close = (close * (1.0 + r)).max(1.0);
            Bar {
                ts_ms: 86_400_000 * (i as i64 + 1),
                open,
                high: open.max(close) * 1.005,
                low: open.min(close) * 0.995,
                close,
                volume: 1_000.0 + lcg(&mut s) * 500.0,
            }
        })
        .collect()
}

fn small_settings() -> EngineSettings {
    EngineSettings {
        trailing_window: 30,
        expanding_min_bars: 10,
        ..EngineSettings::default()
    }
}

#[test]
fn full_evaluation_is_deterministic() {
    let bars = walk_bars(400, 1);
    let engine = Engine::new(small_settings());
    let a = engine.evaluate(&bars).unwrap();
    let b = engine.evaluate(&bars).unwrap();
    assert_eq!(a, b);
}

#[test]
fn escalation_starts_on_the_31st_bar() {
    let bars = walk_bars(60, 2);
    let engine = Engine::new(small_settings());
    let result = engine.evaluate(&bars).unwrap();
    for (i, row) in result.rows.iter().enumerate() {
        assert_eq!(row.snapshot.is_some(), i >= 19, "metric warmup at {}", i);
        assert_eq!(row.escalation.is_some(), i >= 30, "composite warmup at {}", i);
    }
}

#[test]
fn incremental_matches_full_at_any_split() {
    let bars = walk_bars(420, 3);
    let engine = Engine::new(small_settings());
    let full = engine.evaluate(&bars).unwrap();

    for split in [40usize, 100, 200, 300, 419] {
        let prev = engine.evaluate(&bars[..split]).unwrap();
        let inc = engine.evaluate_incremental(&prev, &bars).unwrap();
        assert_eq!(inc, full, "divergence for split {}", split);
    }
}

#[test]
fn incremental_matches_full_with_eras() {
    let bars = walk_bars(2_400, 4);
    let ts: Vec<i64> = bars.iter().map(|b| b.ts_ms).collect();
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let eras = fit_eras("test", &ts, &closes, &EraConfig::default()).unwrap();

    let engine = Engine::new(small_settings()).with_eras(eras);
    let full = engine.evaluate(&bars).unwrap();
    let prev = engine.evaluate(&bars[..2_000]).unwrap();
    let inc = engine.evaluate_incremental(&prev, &bars).unwrap();
    assert_eq!(inc, full);
}

#[test]
fn symbol_history_outrunning_the_benchmark_keeps_the_bucket_live() {
    // Eras fitted on a shorter benchmark: bars past the fitted range must
    // still feed the hysteresis machine instead of leaving it blind.
    let bars = walk_bars(1_600, 13);
    let bench = &bars[..1_500];
    let ts: Vec<i64> = bench.iter().map(|b| b.ts_ms).collect();
    let closes: Vec<f64> = bench.iter().map(|b| b.close).collect();
    let eras = fit_eras("test", &ts, &closes, &EraConfig::default()).unwrap();

    let engine = Engine::new(small_settings()).with_eras(eras);
    let result = engine.evaluate(&bars).unwrap();
    for (i, row) in result.rows.iter().enumerate().skip(1_500) {
        assert!(row.escalation.is_some(), "no escalation at {}", i);
        let conditioned = row.conditioned.unwrap();
        assert!(conditioned.adjusted.is_some(), "bucket input missing at {}", i);
    }
}

#[test]
fn prefix_rows_are_stable_under_append() {
    // No look-ahead: appending bars never rewrites history.
    let bars = walk_bars(300, 5);
    let engine = Engine::new(small_settings());
    let short = engine.evaluate(&bars[..250]).unwrap();
    let long = engine.evaluate(&bars).unwrap();
    for i in 0..250 {
        assert_eq!(short.rows[i], long.rows[i], "history rewritten at {}", i);
    }
}

#[test]
fn stale_fingerprint_triggers_full_recompute() {
    let bars = walk_bars(200, 6);
    let engine = Engine::new(small_settings());
    let full = engine.evaluate(&bars).unwrap();

    // Same row count, different last timestamp: not a valid prefix.
    let mut prev = engine.evaluate(&bars[..150]).unwrap();
    prev.fingerprint.last_bar_ts_ms += 1;
    assert!(!prev.fingerprint.is_valid_prefix_of(&bars));
    let recomputed = engine.evaluate_incremental(&prev, &bars).unwrap();
    assert_eq!(recomputed, full);
}

#[test]
fn degraded_cached_prefix_falls_back_to_full_recompute() {
    // Persisted rows missing a post-warmup snapshot (legacy or hand-edited
    // state) still pass the fingerprint check; they must trigger a full
    // pass, not a panic.
    let bars = walk_bars(420, 12);
    let engine = Engine::new(small_settings());
    let full = engine.evaluate(&bars).unwrap();

    let mut prev = engine.evaluate(&bars[..350]).unwrap();
    prev.rows[50].snapshot = None; // well inside the kept prefix (350 - 252)
    assert!(prev.fingerprint.is_valid_prefix_of(&bars));

    let recomputed = engine.evaluate_incremental(&prev, &bars).unwrap();
    assert_eq!(recomputed, full);
}

#[test]
fn code_version_mismatch_invalidates_unconditionally() {
    let bars = walk_bars(120, 7);
    let engine = Engine::new(small_settings());
    let mut prev = engine.evaluate(&bars).unwrap();
    prev.fingerprint.code_version = "re-0-older".to_string();
    assert!(!prev.fingerprint.is_valid_prefix_of(&bars));
    // Even though the bar data itself is unchanged.
    assert_eq!(prev.fingerprint.last_bar_ts_ms, bars.last().unwrap().ts_ms);
}

#[test]
fn fingerprint_is_a_pure_hash_of_its_key() {
    let a = CacheFingerprint::compute(1_000, 42);
    let b = CacheFingerprint::compute(1_000, 42);
    let c = CacheFingerprint::compute(1_001, 42);
    let d = CacheFingerprint::compute(1_000, 43);
    assert_eq!(a, b);
    assert_ne!(a.cache_key, c.cache_key);
    assert_ne!(a.cache_key, d.cache_key);
    assert_eq!(a.code_version, CODE_VERSION);
}

#[test]
fn buckets_and_percentiles_stay_bounded() {
    let bars = walk_bars(500, 8);
    let engine = Engine::new(small_settings());
    let result = engine.evaluate(&bars).unwrap();
    let mut seen_defined = false;
    for row in &result.rows {
        if let Some(p) = row.trailing_percentile {
            assert!(p > 0.0 && p < 1.0, "trailing percentile {}", p);
            seen_defined = true;
        }
        if let Some(c) = &row.conditioned {
            assert!((0.0..=1.0).contains(&c.confidence));
            if let Some(adj) = c.adjusted {
                assert!((0.0..=1.0).contains(&adj));
            }
        }
        assert!(matches!(row.bucket, Bucket::Low | Bucket::Med | Bucket::High));
    }
    assert!(seen_defined, "no trailing percentiles emitted");
}

#[test]
fn malformed_bars_are_rejected() {
    let mut bars = walk_bars(50, 9);
    bars[10].ts_ms = bars[9].ts_ms;
    let engine = Engine::new(small_settings());
    assert!(engine.evaluate(&bars).is_err());
}
