//! Property checks over random inputs.

use chrono::{TimeZone, Utc};
use geoguard_algorithms::alerts::{prioritize_alert, AlertContext, AlertRecord, PriorityParams};
use geoguard_algorithms::change_point::{detect_change_point, CusumParams, DetectorParams, EwmaParams};
use geoguard_algorithms::fusion::{ChangeCategory, FusionEngine};
use geoguard_algorithms::imagery::{compute_indices, summarize, IndexSummary, SpectralIndex, SummaryMap};
use geoguard_algorithms::statistics::{analyze_hotspots, grid_cells, HotspotParams};
use geoguard_algorithms::Status;
use geoguard_core::{Band, BandSet, Raster};
use proptest::prelude::*;

const FUSION_INDICES: [&str; 8] = [
    "ndvi",
    "evi",
    "ndwi",
    "mndwi",
    "ndbi",
    "nbri",
    "turbidity_index",
    "algae_index",
];

fn arb_summaries() -> impl Strategy<Value = SummaryMap> {
    prop::collection::vec(-1.0e6f64..1.0e6, FUSION_INDICES.len()).prop_map(|values| {
        FUSION_INDICES
            .iter()
            .zip(values)
            .map(|(k, v)| (k.to_string(), IndexSummary::from_value(v)))
            .collect()
    })
}

fn arb_category() -> impl Strategy<Value = ChangeCategory> {
    prop::sample::select(ChangeCategory::ALL.to_vec())
}

fn raster_from(values: Vec<f64>, rows: usize, cols: usize) -> Raster<f64> {
    Raster::from_vec(values, rows, cols).unwrap()
}

proptest! {
    #[test]
    fn composite_risk_stays_in_unit_interval(
        current in arb_summaries(),
        previous in arb_summaries(),
        history in prop::collection::vec(arb_summaries(), 0..8),
    ) {
        let engine = FusionEngine::default();
        let r = engine.fuse(&current, &previous, Some(&history), None);
        prop_assert!((0.0..=1.0).contains(&r.composite_risk_score), "risk {}", r.composite_risk_score);
        prop_assert!((0.0..=1.0).contains(&r.confidence));
        prop_assert!((0.0..=1.0).contains(&r.seasonal_likelihood));
        prop_assert!(r.primary_indicators.len() <= 5);
        prop_assert!(r.supporting_evidence.len() <= 5);
    }

    #[test]
    fn insignificant_changes_are_normal_variation(
        base in prop::collection::vec(0.2f64..0.9, FUSION_INDICES.len()),
        jitter in prop::collection::vec(-0.1f64..0.1, FUSION_INDICES.len()),
    ) {
        // Relative moves under 10% stay below every stock threshold
        let previous: SummaryMap = FUSION_INDICES
            .iter()
            .zip(&base)
            .map(|(k, v)| (k.to_string(), IndexSummary::from_value(*v)))
            .collect();
        let current: SummaryMap = FUSION_INDICES
            .iter()
            .zip(base.iter().zip(&jitter))
            .map(|(k, (v, j))| (k.to_string(), IndexSummary::from_value(v * (1.0 + j))))
            .collect();

        let r = FusionEngine::default().fuse(&current, &previous, None, None);
        prop_assert_eq!(r.category, ChangeCategory::NormalVariation);
        prop_assert_eq!(r.confidence, 0.8);
    }

    #[test]
    fn priority_factors_respect_caps(
        risk in -1.0e3f64..1.0e3,
        confidence in -1.0e3f64..1.0e3,
        importance in -1.0e3f64..1.0e3,
        velocity in -1.0e3f64..1.0e3,
        category in arb_category(),
        known in prop::collection::vec(arb_category(), 0..4),
    ) {
        let alert = AlertRecord {
            id: "a".into(),
            aoi_id: None,
            category,
            risk_score: risk,
            confidence,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            latitude: None,
            longitude: None,
        };
        let ctx = AlertContext {
            aoi_importance: importance,
            velocity,
            known_categories: Some(known),
            ..AlertContext::default()
        };
        let r = prioritize_alert(&alert, &ctx, &PriorityParams::default());
        let f = r.factors;
        prop_assert!((0.0..=30.0).contains(&f.magnitude));
        prop_assert!((0.0..=25.0).contains(&f.confidence));
        prop_assert!((0.0..=25.0).contains(&f.importance));
        prop_assert!((0.0..=15.0).contains(&f.velocity));
        prop_assert!(f.novelty == 0.0 || f.novelty == 5.0);
        prop_assert!((0.0..=100.0).contains(&r.priority_score));
    }

    #[test]
    fn hotspot_grid_covers_raster(
        (rows, cols, before, after) in (1usize..40, 1usize..40).prop_flat_map(|(rows, cols)| {
            let n = rows * cols;
            (
                Just(rows),
                Just(cols),
                prop::collection::vec(-1.0f64..1.0, n),
                prop::collection::vec(-1.0f64..1.0, n),
            )
        }),
        grid_size in 1usize..12,
        pct in 0.0f64..100.0,
    ) {
        let cells = grid_cells(rows, cols, grid_size);
        prop_assert_eq!(cells.len(), grid_size * grid_size);
        let covered: usize = cells
            .iter()
            .map(|c| (c.row_end - c.row_start) * (c.col_end - c.col_start))
            .sum();
        prop_assert_eq!(covered, rows * cols);

        let params = HotspotParams { grid_size, percentile: pct };
        let report = analyze_hotspots(
            &raster_from(before, rows, cols),
            &raster_from(after, rows, cols),
            &params,
        )
        .unwrap();
        prop_assert_eq!(report.cells_analyzed, grid_size * grid_size);
        prop_assert!(report.hotspot_pixels() <= rows * cols);
        prop_assert!(report.total_hotspots() <= report.cells_analyzed);
    }

    #[test]
    fn missing_bands_omit_indices(mask in prop::collection::vec(any::<bool>(), 9)) {
        let mut bands = BandSet::new();
        for (band, present) in geoguard_core::band::SENTINEL2_ORDER.iter().zip(&mask) {
            if *present {
                bands.insert(*band, Raster::filled(3, 3, 0.2)).unwrap();
            }
        }
        let out = compute_indices(&bands).unwrap();
        for index in SpectralIndex::ALL {
            let computable = index.required_bands().iter().all(|b| bands.contains(*b));
            prop_assert_eq!(out.contains_key(&index), computable, "{}", index);
        }
    }

    #[test]
    fn short_sequences_never_detect(value in prop::option::of(-10.0f64..10.0)) {
        let seq: Vec<f64> = value.into_iter().collect();
        for params in [
            DetectorParams::ewma(EwmaParams::default()),
            DetectorParams::cusum(CusumParams::default()),
        ] {
            let r = detect_change_point(&seq, &params).unwrap();
            prop_assert_eq!(r.status, Status::InsufficientData);
            prop_assert!(!r.change_detected);
            prop_assert_eq!(r.confidence, 0.0);
        }
    }
}

#[test]
fn all_nan_raster_summarizes_to_zero() {
    let r = Raster::filled(4, 5, f64::NAN);
    let s = summarize(&r);
    assert_eq!((s.mean, s.min, s.max, s.std), (0.0, 0.0, 0.0, 0.0));
    assert_eq!(s.valid_count, 0);
}
