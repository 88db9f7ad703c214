//! End-to-end scenarios: bands → indices → summaries → fusion → priority.

use std::f64::consts::PI;

use approx::assert_relative_eq;
use chrono::{TimeZone, Utc};
use geoguard_algorithms::alerts::{prioritize_alert, AlertContext, AlertRecord, PriorityParams};
use geoguard_algorithms::fusion::{
    AoiMetadata, ChangeCategory, FusionConfig, FusionEngine, Region, RiskLevel,
};
use geoguard_algorithms::imagery::{compute_indices, summarize_indices, IndexSummary, SpectralIndex, SummaryMap};
use geoguard_core::{Band, BandSet, Raster};

fn summaries(pairs: &[(&str, f64)]) -> SummaryMap {
    pairs
        .iter()
        .map(|&(k, v)| (k.to_string(), IndexSummary::from_value(v)))
        .collect()
}

/// Twelve monthly NDVI means oscillating around 0.5
fn seasonal_history(amplitude: f64) -> Vec<SummaryMap> {
    (0..12)
        .map(|i| {
            let v = 0.5 + amplitude * (2.0 * PI * i as f64 / 12.0).sin();
            summaries(&[("ndvi", v)])
        })
        .collect()
}

fn uniform_bands(values: &[(Band, f64)]) -> BandSet {
    let mut set = BandSet::new();
    for &(band, v) in values {
        set.insert(band, Raster::filled(16, 16, v)).unwrap();
    }
    set
}

#[test]
fn construction_scenario() {
    let engine = FusionEngine::default();
    let current = summaries(&[("ndvi", 0.2), ("ndbi", 0.45)]);
    let previous = summaries(&[("ndvi", 0.62), ("ndbi", 0.12)]);

    let r = engine.fuse(&current, &previous, None, None);

    assert_relative_eq!(r.details.index_changes["ndvi"], -67.7, epsilon = 0.05);
    assert_relative_eq!(r.details.index_changes["ndbi"], 275.0, epsilon = 1e-9);
    assert_eq!(r.details.significant_changes, vec!["ndbi", "ndvi"]);
    assert_eq!(r.category, ChangeCategory::IllegalConstruction);
    assert!(
        matches!(r.risk_level, RiskLevel::High | RiskLevel::Critical),
        "risk level {:?}",
        r.risk_level
    );
}

#[test]
fn unchanged_scenario() {
    let engine = FusionEngine::default();
    let s = summaries(&[("ndvi", 0.55), ("ndwi", 0.1), ("turbidity_index", 0.4)]);
    let r = engine.fuse(&s, &s, None, None);
    assert_eq!(r.composite_risk_score, 0.0);
    assert_eq!(r.category, ChangeCategory::NormalVariation);
    assert_eq!(r.confidence, 0.8);
}

#[test]
fn seasonal_history_lowers_risk() {
    let engine = FusionEngine::default();
    let current = summaries(&[("ndvi", 0.45)]);
    let previous = summaries(&[("ndvi", 0.6)]);
    let history = seasonal_history(0.3);

    let without = engine.fuse(&current, &previous, None, None);
    let with = engine.fuse(&current, &previous, Some(&history), None);

    assert!(with.seasonal_likelihood > 0.5, "likelihood {}", with.seasonal_likelihood);
    assert_eq!(with.category, ChangeCategory::SeasonalAgriculture);
    assert_eq!(without.seasonal_likelihood, 0.0);
    assert!(
        with.composite_risk_score < without.composite_risk_score,
        "{} !< {}",
        with.composite_risk_score,
        without.composite_risk_score
    );
}

#[test]
fn seasonal_discount_is_monotonic() {
    let engine = FusionEngine::default();
    let current = summaries(&[("ndvi", 0.45)]);
    let previous = summaries(&[("ndvi", 0.6)]);

    let mut last: Option<(f64, f64)> = None;
    for amplitude in [0.22, 0.25, 0.28, 0.3] {
        let r = engine.fuse(&current, &previous, Some(&seasonal_history(amplitude)), None);
        assert_eq!(r.category, ChangeCategory::SeasonalAgriculture);
        if let Some((likelihood, risk)) = last {
            assert!(r.seasonal_likelihood > likelihood);
            assert!(r.composite_risk_score < risk);
        }
        last = Some((r.seasonal_likelihood, r.composite_risk_score));
    }
}

#[test]
fn fusion_is_deterministic() {
    let engine = FusionEngine::for_region(Region::IndiaCoastal);
    let current = summaries(&[
        ("ndvi", 0.31),
        ("ndwi", 0.42),
        ("turbidity_index", 0.9),
        ("algae_index", 1.7),
        ("mndwi", 0.11),
    ]);
    let previous = summaries(&[
        ("ndvi", 0.35),
        ("ndwi", 0.3),
        ("turbidity_index", 0.5),
        ("algae_index", 1.0),
        ("mndwi", 0.1),
    ]);
    let history = seasonal_history(0.1);

    let a = engine.fuse(&current, &previous, Some(&history), None);
    let b = engine.fuse(&current, &previous, Some(&history), None);
    assert_eq!(a, b);
    assert_eq!(
        serde_json::to_string(&a).unwrap(),
        serde_json::to_string(&b).unwrap()
    );
    assert_eq!(a.category, ChangeCategory::AlgalBloom);
}

#[test]
fn band_pipeline_to_priority() {
    // Vegetated field replaced by a built surface; no blue or SWIR-2 band
    let before = uniform_bands(&[
        (Band::Green, 0.08),
        (Band::Red, 0.08),
        (Band::Nir, 0.50),
        (Band::Swir1, 0.15),
    ]);
    let after = uniform_bands(&[
        (Band::Green, 0.05),
        (Band::Red, 0.20),
        (Band::Nir, 0.25),
        (Band::Swir1, 0.35),
    ]);

    let before_idx = compute_indices(&before).unwrap();
    let after_idx = compute_indices(&after).unwrap();
    for missing in [SpectralIndex::Evi, SpectralIndex::Bsi, SpectralIndex::Nbri, SpectralIndex::AlgaeIndex] {
        assert!(!after_idx.contains_key(&missing), "{missing} should be omitted");
    }

    let previous = summarize_indices(&before_idx);
    let current = summarize_indices(&after_idx);
    assert_eq!(current["ndvi"].valid_count, 256);

    let engine = FusionEngine::new(FusionConfig::default()).unwrap();
    let aoi = AoiMetadata::new("field-7");
    let result = engine.fuse(&current, &previous, None, Some(&aoi));

    // Water pollution also scores 0.8 here; the earlier rule wins the tie
    assert_eq!(result.category, ChangeCategory::IllegalConstruction);
    assert_relative_eq!(result.confidence, 0.8, epsilon = 1e-12);
    assert!(result.risk_level >= RiskLevel::High);
    assert_eq!(result.aoi_id.as_deref(), Some("field-7"));
    assert!(result.primary_indicators.len() <= 5);
    assert_eq!(&result.primary_indicators[..3], ["ndvi", "ndbi", "thermal_proxy"]);

    let alert = AlertRecord::from_fusion(
        "alert-1",
        &result,
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
    );
    let ctx = AlertContext {
        aoi_importance: 1.0,
        alert_age_days: Some(0.0),
        ..AlertContext::default()
    };
    let priority = prioritize_alert(&alert, &ctx, &PriorityParams::default());
    assert!(priority.priority_score >= 60.0, "score {}", priority.priority_score);
    assert_eq!(priority.aoi_id.as_deref(), Some("field-7"));
}
