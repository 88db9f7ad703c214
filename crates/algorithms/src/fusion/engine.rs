//! Multi-index fusion engine
//!
//! Turns two dates of per-index summaries (plus optional history) into one
//! categorised, confidence-weighted risk assessment. The engine is pure:
//! identical inputs and configuration give identical results.

use std::collections::BTreeMap;

use geoguard_core::{Algorithm, Error, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::category::{ChangeCategory, RiskLevel};
use super::change::IndexChange;
use super::config::{FusionConfig, Region};
use super::rules::{best_match, ChangeSet};
use crate::imagery::SummaryMap;
use crate::statistics::descriptive::coefficient_of_variation;

/// Identity of the monitored area, echoed into results
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AoiMetadata {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

impl AoiMetadata {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_location(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
        self
    }

    /// Regional preset for the AOI centre, if it has one
    pub fn region(&self) -> Option<Region> {
        Some(Region::from_coordinates(self.latitude?, self.longitude?))
    }
}

/// Per-index breakdown behind a fusion result
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FusionDetails {
    /// Percent change per index
    pub index_changes: BTreeMap<String, f64>,
    /// Indices whose change exceeded their threshold
    pub significant_changes: Vec<String>,
    pub total_indicators: usize,
}

/// Outcome of one fusion run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aoi_id: Option<String>,
    pub region: Region,
    pub category: ChangeCategory,
    pub confidence: f64,
    /// Weighted change magnitude in [0, 1] after seasonal discount
    pub composite_risk_score: f64,
    pub risk_level: RiskLevel,
    pub seasonal_likelihood: f64,
    pub primary_indicators: Vec<String>,
    pub supporting_evidence: Vec<String>,
    pub recommendation: String,
    pub details: FusionDetails,
}

/// Rules-based fusion over index summaries
#[derive(Debug, Clone, Default)]
pub struct FusionEngine {
    config: FusionConfig,
}

impl FusionEngine {
    /// Validate `config` and build an engine around it.
    ///
    /// This is the only fallible step; `fuse` itself always completes.
    pub fn new(config: FusionConfig) -> Result<Self> {
        config.validate()?;
        debug!(region = %config.region, rules = config.rules.len(), "fusion engine ready");
        Ok(Self { config })
    }

    pub fn for_region(region: Region) -> Self {
        Self {
            config: FusionConfig::for_region(region),
        }
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    /// Fuse current and previous summaries into a categorised risk assessment.
    pub fn fuse(
        &self,
        current: &SummaryMap,
        previous: &SummaryMap,
        history: Option<&[SummaryMap]>,
        aoi: Option<&AoiMetadata>,
    ) -> FusionResult {
        let changes = self.index_changes(current, previous);
        let seasonal = history.map_or(0.0, |h| self.seasonal_likelihood(h, &changes));
        debug!(
            indices = changes.len(),
            significant = changes.values().filter(|c| c.is_significant).count(),
            seasonal_likelihood = seasonal,
            "index changes computed"
        );

        let class = &self.config.classification;
        let significant: Vec<&str> = changes
            .values()
            .filter(|c| c.is_significant)
            .map(|c| c.name.as_str())
            .collect();

        let decision = best_match(&self.config.rules, &changes, seasonal)
            .filter(|(_, score)| *score >= class.min_confidence);

        let (category, confidence, primary) = match decision {
            Some((rule, score)) => {
                let mut primary: Vec<String> = rule
                    .indices()
                    .into_iter()
                    .filter(|i| significant.contains(i))
                    .map(str::to_string)
                    .collect();
                for name in &significant {
                    if !primary.iter().any(|p| p == name) {
                        primary.push(name.to_string());
                    }
                }
                primary.truncate(class.max_primary_indicators);
                (rule.category, score.clamp(0.0, 1.0), primary)
            }
            None if !significant.is_empty() => {
                let primary = significant
                    .iter()
                    .take(class.max_unknown_indicators)
                    .map(|s| s.to_string())
                    .collect();
                (ChangeCategory::Unknown, class.unknown_confidence, primary)
            }
            None => (ChangeCategory::NormalVariation, class.normal_confidence, Vec::new()),
        };

        let raw_risk = self.composite_risk(&changes, category);
        let discount = if category == ChangeCategory::SeasonalAgriculture {
            self.config.seasonal.seasonal_discount
        } else {
            self.config.seasonal.other_discount
        };
        let risk = (raw_risk * (1.0 - seasonal * discount)).clamp(0.0, 1.0);
        let risk_level = self.config.risk_levels.level(risk * confidence);

        info!(
            category = %category,
            confidence,
            risk,
            level = %risk_level,
            "fusion decision"
        );

        FusionResult {
            aoi_id: aoi.map(|a| a.id.clone()),
            region: self.config.region,
            category,
            confidence,
            composite_risk_score: risk,
            risk_level,
            seasonal_likelihood: seasonal,
            primary_indicators: primary,
            supporting_evidence: self.evidence(&changes),
            recommendation: self.recommendation(category, confidence, seasonal),
            details: FusionDetails {
                index_changes: changes
                    .iter()
                    .map(|(k, c)| (k.clone(), c.percent_change))
                    .collect(),
                significant_changes: significant.iter().map(|s| s.to_string()).collect(),
                total_indicators: changes.len(),
            },
        }
    }

    /// Changes for every index present in both maps with finite means
    pub fn index_changes(&self, current: &SummaryMap, previous: &SummaryMap) -> ChangeSet {
        let mut out = ChangeSet::new();
        for (name, cur) in current {
            let Some(prev) = previous.get(name) else {
                continue;
            };
            if !(cur.mean.is_finite() && prev.mean.is_finite()) {
                warn!(index = %name, "non-finite summary mean, index left out of fusion");
                continue;
            }
            let change = IndexChange::new(name.clone(), cur.mean, prev.mean, self.config.threshold(name));
            out.insert(name.clone(), change);
        }
        out
    }

    /// Likelihood in [0, 1] that the change follows a seasonal cycle.
    ///
    /// Zero unless the seasonal index changed in this run and the history
    /// holds enough finite samples of it.
    pub fn seasonal_likelihood(&self, history: &[SummaryMap], changes: &ChangeSet) -> f64 {
        let cfg = &self.config.seasonal;
        if !changes.contains_key(&cfg.index) {
            return 0.0;
        }
        let values: Vec<f64> = history
            .iter()
            .filter_map(|h| h.get(&cfg.index))
            .map(|s| s.mean)
            .filter(|v| v.is_finite())
            .collect();
        if values.len() < cfg.min_historical_samples {
            debug!(samples = values.len(), "too little history for seasonality");
            return 0.0;
        }
        (coefficient_of_variation(&values) / cfg.cv_scale).clamp(0.0, 1.0)
    }

    /// Weighted mean of normalized change magnitudes for the category's family
    pub fn composite_risk(&self, changes: &ChangeSet, category: ChangeCategory) -> f64 {
        if changes.is_empty() {
            return 0.0;
        }
        let (weighted, total) = match self.config.weights.for_family(category.family()) {
            Some(weights) => changes
                .iter()
                .filter_map(|(name, c)| weights.get(name).map(|w| (c.normalized_magnitude(), *w)))
                .fold((0.0, 0.0), |(s, t), (m, w)| (s + m * w, t + w)),
            None => {
                let w = 1.0 / changes.len() as f64;
                changes
                    .values()
                    .fold((0.0, 0.0), |(s, t), c| (s + c.normalized_magnitude() * w, t + w))
            }
        };
        if total > 0.0 {
            (weighted / total).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    /// Readable lines for the largest significant changes
    fn evidence(&self, changes: &ChangeSet) -> Vec<String> {
        let mut significant: Vec<&IndexChange> =
            changes.values().filter(|c| c.is_significant).collect();
        significant.sort_by(|a, b| {
            b.percent_change
                .abs()
                .total_cmp(&a.percent_change.abs())
                .then_with(|| a.name.cmp(&b.name))
        });
        significant
            .into_iter()
            .take(self.config.classification.max_evidence)
            .map(|c| {
                format!(
                    "{}: {:+.1}% change ({:.3} → {:.3})",
                    c.name, c.percent_change, c.previous, c.current
                )
            })
            .collect()
    }

    fn recommendation(&self, category: ChangeCategory, confidence: f64, seasonal: f64) -> String {
        let mut text = category.recommendation().to_string();
        if confidence < self.config.classification.low_confidence {
            text = format!("LOW CONFIDENCE: {text} Collect additional data for verification.");
        }
        if seasonal > self.config.seasonal.qualifier_threshold
            && category != ChangeCategory::SeasonalAgriculture
        {
            text.push_str(" Note: Some changes may be seasonal - compare with historical patterns.");
        }
        text
    }
}

/// Input bundle for [`Fusion`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FusionInput {
    pub current: SummaryMap,
    pub previous: SummaryMap,
    #[serde(default)]
    pub history: Option<Vec<SummaryMap>>,
    #[serde(default)]
    pub aoi: Option<AoiMetadata>,
}

/// Fusion engine algorithm
#[derive(Debug, Clone, Default)]
pub struct Fusion;

impl Algorithm for Fusion {
    type Input = FusionInput;
    type Output = FusionResult;
    type Params = FusionConfig;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Fusion"
    }

    fn description(&self) -> &'static str {
        "Classify multi-index change and score its risk"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        let engine = FusionEngine::new(params)?;
        Ok(engine.fuse(
            &input.current,
            &input.previous,
            input.history.as_deref(),
            input.aoi.as_ref(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imagery::IndexSummary;
    use approx::assert_relative_eq;

    fn summaries(pairs: &[(&str, f64)]) -> SummaryMap {
        pairs
            .iter()
            .map(|&(k, v)| (k.to_string(), IndexSummary::from_value(v)))
            .collect()
    }

    #[test]
    fn test_construction_scenario() {
        let engine = FusionEngine::default();
        let current = summaries(&[("ndvi", 0.2), ("ndbi", 0.45)]);
        let previous = summaries(&[("ndvi", 0.62), ("ndbi", 0.12)]);
        let r = engine.fuse(&current, &previous, None, None);

        assert_eq!(r.category, ChangeCategory::IllegalConstruction);
        assert_relative_eq!(r.confidence, 0.6, epsilon = 1e-12);
        assert_relative_eq!(r.details.index_changes["ndvi"], -67.741935483870968, epsilon = 1e-9);
        assert_relative_eq!(r.details.index_changes["ndbi"], 275.0, epsilon = 1e-9);
        // (0.677 * 0.25 + 1.0 * 0.40) / 0.65, then the 0.3 seasonal factor is idle
        assert_relative_eq!(r.composite_risk_score, (0.6774193548387097 * 0.25 + 0.4) / 0.65, epsilon = 1e-9);
        assert_eq!(r.risk_level, RiskLevel::High);
        assert_eq!(r.primary_indicators, vec!["ndvi", "ndbi"]);
        assert_eq!(r.supporting_evidence[0], "ndbi: +275.0% change (0.120 → 0.450)");
        assert!(r.recommendation.starts_with("High confidence unauthorized construction"));
    }

    #[test]
    fn test_identical_inputs_are_normal() {
        let engine = FusionEngine::default();
        let s = summaries(&[("ndvi", 0.5), ("ndwi", -0.2), ("ndbi", 0.1)]);
        let r = engine.fuse(&s, &s, None, None);
        assert_eq!(r.category, ChangeCategory::NormalVariation);
        assert_eq!(r.confidence, 0.8);
        assert_eq!(r.composite_risk_score, 0.0);
        assert_eq!(r.risk_level, RiskLevel::Low);
        assert!(r.primary_indicators.is_empty());
        assert!(r.supporting_evidence.is_empty());
        assert_eq!(r.details.total_indicators, 3);
    }

    #[test]
    fn test_unknown_fallback() {
        let engine = FusionEngine::default();
        // ndvi -20% is significant but matches no rule
        let r = engine.fuse(&summaries(&[("ndvi", 0.4)]), &summaries(&[("ndvi", 0.5)]), None, None);
        assert_eq!(r.category, ChangeCategory::Unknown);
        assert_eq!(r.confidence, 0.4);
        assert_eq!(r.primary_indicators, vec!["ndvi"]);
        assert!(r.recommendation.starts_with("LOW CONFIDENCE: "));
        assert!(r.recommendation.ends_with("Collect additional data for verification."));
    }

    #[test]
    fn test_indices_missing_from_previous_are_ignored() {
        let engine = FusionEngine::default();
        let r = engine.fuse(
            &summaries(&[("ndvi", 0.5), ("evi", 0.9)]),
            &summaries(&[("ndvi", 0.5)]),
            None,
            None,
        );
        assert_eq!(r.details.total_indicators, 1);
        assert!(!r.details.index_changes.contains_key("evi"));
    }

    #[test]
    fn test_seasonal_likelihood_needs_history() {
        let engine = FusionEngine::default();
        let changes = engine.index_changes(&summaries(&[("ndvi", 0.3)]), &summaries(&[("ndvi", 0.4)]));
        let short: Vec<SummaryMap> = (0..3).map(|i| summaries(&[("ndvi", 0.2 + 0.2 * i as f64)])).collect();
        assert_eq!(engine.seasonal_likelihood(&short, &changes), 0.0);

        let long: Vec<SummaryMap> = [0.2, 0.8, 0.2, 0.8]
            .iter()
            .map(|&v| summaries(&[("ndvi", v)]))
            .collect();
        // cv = 0.3 / 0.5 = 0.6, scaled by 0.5 and clamped
        assert_relative_eq!(engine.seasonal_likelihood(&long, &changes), 1.0);

        let no_ndvi = engine.index_changes(&summaries(&[("ndwi", 0.3)]), &summaries(&[("ndwi", 0.4)]));
        assert_eq!(engine.seasonal_likelihood(&long, &no_ndvi), 0.0);
    }

    #[test]
    fn test_seasonal_note_on_other_categories() {
        let engine = FusionEngine::default();
        let history: Vec<SummaryMap> = [0.2, 0.8, 0.2, 0.8]
            .iter()
            .map(|&v| summaries(&[("ndvi", v)]))
            .collect();
        // -10% is below the ndvi threshold, so nothing is significant
        let r = engine.fuse(
            &summaries(&[("ndvi", 0.45)]),
            &summaries(&[("ndvi", 0.5)]),
            Some(&history),
            None,
        );
        assert_eq!(r.category, ChangeCategory::NormalVariation);
        assert!(r.recommendation.ends_with("compare with historical patterns."));
    }

    #[test]
    fn test_regional_threshold_changes_significance() {
        let current = summaries(&[("ndvi", 0.435)]);
        let previous = summaries(&[("ndvi", 0.5)]);
        // -13%: below the stock 15% but above the north-east 15% * 0.8
        let stock = FusionEngine::default().fuse(&current, &previous, None, None);
        assert_eq!(stock.category, ChangeCategory::NormalVariation);
        let ne = FusionEngine::for_region(Region::IndiaNortheast).fuse(&current, &previous, None, None);
        assert_eq!(ne.category, ChangeCategory::Unknown);
    }

    #[test]
    fn test_aoi_id_is_echoed() {
        let engine = FusionEngine::default();
        let s = summaries(&[("ndvi", 0.5)]);
        let aoi = AoiMetadata::new("aoi-17").with_location(26.1, 91.7);
        let r = engine.fuse(&s, &s, None, Some(&aoi));
        assert_eq!(r.aoi_id.as_deref(), Some("aoi-17"));
        assert_eq!(aoi.region(), Some(Region::IndiaNortheast));
    }

    #[test]
    fn test_invalid_config_fails_at_construction() {
        let mut config = FusionConfig::default();
        config.weights.vegetation_loss.insert("ndvi".into(), f64::NAN);
        assert!(matches!(FusionEngine::new(config), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_algorithm_trait() {
        let input = FusionInput {
            current: summaries(&[("nbri", -0.4), ("ndvi", 0.1)]),
            previous: summaries(&[("nbri", 0.5), ("ndvi", 0.6)]),
            history: None,
            aoi: None,
        };
        let r = Fusion.execute_default(input).unwrap();
        assert_eq!(r.category, ChangeCategory::WildfireDamage);
        assert_relative_eq!(r.confidence, 0.9, epsilon = 1e-12);
    }

    #[test]
    fn test_wildfire_uses_equal_weights() {
        let engine = FusionEngine::default();
        let current = summaries(&[("nbri", -0.4), ("ndwi", 0.4), ("ndvi", 0.45)]);
        let previous = summaries(&[("nbri", 0.5), ("ndwi", 0.2), ("ndvi", 0.5)]);
        let r = engine.fuse(&current, &previous, None, None);

        assert_eq!(r.category, ChangeCategory::WildfireDamage);
        assert_relative_eq!(r.confidence, 0.7, epsilon = 1e-12);
        // nbri -180% and ndwi +100% saturate, ndvi -10% gives 0.1
        assert_relative_eq!(r.composite_risk_score, (1.0 + 1.0 + 0.1) / 3.0, epsilon = 1e-9);
        assert_eq!(r.risk_level, RiskLevel::Medium);
    }

    #[test]
    fn test_overflowing_history_keeps_risk_bounded() {
        let engine = FusionEngine::default();
        let current = summaries(&[("ndvi", 0.2), ("ndbi", 0.45)]);
        let previous = summaries(&[("ndvi", 0.62), ("ndbi", 0.12)]);
        let history: Vec<SummaryMap> = (0..4).map(|_| summaries(&[("ndvi", 1e308)])).collect();

        let changes = engine.index_changes(&current, &previous);
        assert_eq!(engine.seasonal_likelihood(&history, &changes), 0.0);

        let r = engine.fuse(&current, &previous, Some(&history), None);
        assert_eq!(r.category, ChangeCategory::IllegalConstruction);
        assert!(r.composite_risk_score.is_finite());
        assert!((0.0..=1.0).contains(&r.composite_risk_score));
        assert_eq!(r.risk_level, RiskLevel::High);
    }
}
