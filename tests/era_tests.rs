use regime_engine::era::{era_conditioned_percentiles, fit_eras, EraConfig, EraMetadata, EraSet};

/// Two-regime synthetic price path: alternating +/-sigma log returns give an
/// exactly flat volatility plateau in each half.
fn two_regime_closes(n_low: usize, n_high: usize) -> (Vec<i64>, Vec<f64>) {
    let mut closes = vec![100.0];
    let push = |closes: &mut Vec<f64>, sigma: f64, count: usize| {
        for i in 0..count {
            let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
            let last = *closes.last().unwrap();
            closes.push(last * (sign * sigma).exp());
        }
    };
    push(&mut closes, 0.005, n_low);
    push(&mut closes, 0.04, n_high);
    let ts: Vec<i64> = (0..closes.len()).map(|i| 86_400_000 * (i as i64 + 1)).collect();
    (ts, closes)
}

fn assert_partition(set: &EraSet, n: usize, ts: &[i64], min_segment: usize) {
    assert!(!set.eras.is_empty());
    assert_eq!(set.eras[0].start_idx, 0);
    assert_eq!(set.eras.last().unwrap().end_idx, n - 1);
    assert_eq!(set.eras[0].start_ts_ms, ts[0]);
    assert_eq!(set.eras.last().unwrap().end_ts_ms, ts[n - 1]);
    for pair in set.eras.windows(2) {
        assert_eq!(pair[0].end_idx + 1, pair[1].start_idx, "gap or overlap");
    }
    for era in &set.eras {
        assert!(
            era.end_idx - era.start_idx + 1 >= min_segment,
            "era shorter than minimum segment"
        );
    }
}

#[test]
fn detects_the_volatility_break() {
    let (ts, closes) = two_regime_closes(1_100, 1_100);
    let cfg = EraConfig::default();
    let set = fit_eras("test", &ts, &closes, &cfg).unwrap();

    assert_partition(&set, closes.len(), &ts, cfg.min_segment);
    // The 126-bar rolling-vol ramp between the plateaus is itself a distinct
    // mean level, so the mean-only model may spend an extra break on it.
    // What must hold: at least one break, and one of them lands within a
    // rolling window of the regime change.
    assert!(set.eras.len() >= 2, "no break found");
    let closest = set
        .break_indices
        .iter()
        .map(|&b| (b as i64 - 1_100).unsigned_abs() as usize)
        .min()
        .unwrap();
    assert!(closest <= cfg.rv_window + 2, "nearest break {} bars from 1100", closest);
    assert!(set.bic.is_finite());
}

#[test]
fn identical_input_yields_identical_breaks() {
    let (ts, closes) = two_regime_closes(900, 1_300);
    let cfg = EraConfig::default();
    let a = fit_eras("test", &ts, &closes, &cfg).unwrap();
    let b = fit_eras("test", &ts, &closes, &cfg).unwrap();
    assert_eq!(a.break_indices, b.break_indices);
    assert_eq!(a.data_hash, b.data_hash);
    assert_eq!(a.bic.to_bits(), b.bic.to_bits());
}

#[test]
fn short_series_reports_single_era_with_infinite_bic() {
    let (ts, closes) = two_regime_closes(100, 100);
    let cfg = EraConfig::default();
    let set = fit_eras("test", &ts, &closes, &cfg).unwrap();
    assert_eq!(set.eras.len(), 1);
    assert!(set.break_indices.is_empty());
    assert!(set.bic.is_infinite());
    assert_partition(&set, closes.len(), &ts, 1);
}

#[test]
fn empty_input_is_rejected() {
    let cfg = EraConfig::default();
    assert!(fit_eras("test", &[], &[], &cfg).is_err());
    assert!(fit_eras("test", &[1], &[100.0], &cfg).is_err());
}

#[test]
fn constant_price_stays_finite_through_the_epsilon_floor() {
    // Zero volatility everywhere: ln(0 + eps) must not produce -inf costs.
    let closes = vec![100.0; 1_300];
    let ts: Vec<i64> = (0..1_300).map(|i| 60_000 * (i as i64 + 1)).collect();
    let set = fit_eras("flat", &ts, &closes, &EraConfig::default()).unwrap();
    assert_eq!(set.eras.len(), 1);
    assert!(set.bic.is_finite());
}

#[test]
fn metadata_document_reflects_the_fit() {
    let (ts, closes) = two_regime_closes(1_100, 1_100);
    let cfg = EraConfig::default();
    let set = fit_eras("us_equity", &ts, &closes, &cfg).unwrap();
    let meta = EraMetadata::from_fit(&set, &cfg, &ts);
    assert_eq!(meta.asset_class, "us_equity");
    assert_eq!(meta.break_model, "mean");
    assert_eq!(meta.n_eras, set.eras.len());
    assert_eq!(meta.break_indices, set.break_indices);
    assert_eq!(meta.break_dates.len(), meta.break_indices.len());
    assert_eq!(meta.data_hash, set.data_hash);
    assert_eq!(meta.rv_window, 126);
    assert_eq!(meta.min_segment, 504);

    // A changed input series must change the hash.
    let mut moved = closes.clone();
    moved[500] *= 1.001;
    let set2 = fit_eras("us_equity", &ts, &moved, &cfg).unwrap();
    assert_ne!(set.data_hash, set2.data_hash);
}

#[test]
fn timestamps_outside_the_fitted_range_extend_the_edge_eras() {
    // A symbol's history can outrun the benchmark the eras were fitted on;
    // those bars must keep a defined percentile stream instead of falling
    // out of every era.
    let (ts, closes) = two_regime_closes(1_100, 1_100);
    let cfg = EraConfig::default();
    let set = fit_eras("test", &ts, &closes, &cfg).unwrap();

    let day = 86_400_000i64;
    let extra = 100usize;
    let mut ext_ts = vec![ts[0] - day]; // one bar before the fitted range
    ext_ts.extend_from_slice(&ts);
    for i in 0..extra {
        ext_ts.push(ts[ts.len() - 1] + day * (i as i64 + 1));
    }
    let n = ext_ts.len();
    let values: Vec<f64> = (0..n).map(|i| (i % 89) as f64 / 89.0).collect();

    let out = era_conditioned_percentiles(&values, &ext_ts, &set, 10, 252);

    // The leading bar attaches to the opening era: it is that era's first
    // observation, exactly neutral.
    assert_eq!(out[0].confidence, 0.0);
    assert_eq!(out[0].adjusted, Some(0.5));

    // Bars past the last boundary extend the terminal era: deep history,
    // full confidence, raw percentile passed through.
    for o in &out[n - extra..] {
        assert_eq!(o.confidence, 1.0);
        assert!(o.percentile.is_some());
        assert_eq!(o.adjusted, o.percentile);
    }
}

#[test]
fn confidence_shrinkage_boundaries_are_exact() {
    let (ts, closes) = two_regime_closes(1_100, 1_100);
    let cfg = EraConfig::default();
    let set = fit_eras("test", &ts, &closes, &cfg).unwrap();

    let n = closes.len();
    let values: Vec<f64> = (0..n).map(|i| (i % 97) as f64 / 97.0).collect();
    let bars_per_year = 252u32;
    let out = era_conditioned_percentiles(&values, &ts, &set, 10, bars_per_year);

    for era in &set.eras {
        // First bar of each era: zero bars seen, exactly neutral.
        let first = era.start_idx;
        assert_eq!(out[first].confidence, 0.0);
        assert_eq!(out[first].adjusted, Some(0.5));

        // Past one trading year: adjusted passes the raw percentile through.
        let deep = era.start_idx + bars_per_year as usize;
        if deep <= era.end_idx {
            assert_eq!(out[deep].confidence, 1.0);
            assert_eq!(out[deep].adjusted, out[deep].percentile);
        }
    }

    // Interior confidence is strictly between the boundaries.
    let mid = set.eras[0].start_idx + 126;
    assert!((out[mid].confidence - 0.5).abs() < 1e-12);
}
