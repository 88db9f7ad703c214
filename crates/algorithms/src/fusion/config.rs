//! Fusion configuration
//!
//! Thresholds, weight tables, rules and classification constants. A config is
//! plain data: build it in code, load it from TOML, or start from a regional
//! preset. [`FusionConfig::validate`] is the only place configuration errors
//! are raised; the engine calls it once at construction.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use geoguard_core::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::category::{RiskLevel, WeightFamily};
use super::rules::{default_rules, Rule};
use crate::imagery::SpectralIndex;

/// Environmental region a config is tuned for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    #[default]
    Default,
    IndiaNortheast,
    IndiaCoastal,
    IndiaPlains,
    IndiaHimalayan,
    IndiaDesert,
    GlobalTropical,
    GlobalTemperate,
    GlobalArid,
}

impl Region {
    pub const ALL: [Region; 9] = [
        Region::Default,
        Region::IndiaNortheast,
        Region::IndiaCoastal,
        Region::IndiaPlains,
        Region::IndiaHimalayan,
        Region::IndiaDesert,
        Region::GlobalTropical,
        Region::GlobalTemperate,
        Region::GlobalArid,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Region::Default => "default",
            Region::IndiaNortheast => "india_northeast",
            Region::IndiaCoastal => "india_coastal",
            Region::IndiaPlains => "india_plains",
            Region::IndiaHimalayan => "india_himalayan",
            Region::IndiaDesert => "india_desert",
            Region::GlobalTropical => "global_tropical",
            Region::GlobalTemperate => "global_temperate",
            Region::GlobalArid => "global_arid",
        }
    }

    /// Scale applied to an index's base significance threshold.
    ///
    /// Below 1 makes the index more sensitive in this region.
    pub fn multiplier(self, index: &str) -> f64 {
        let table: &[(&str, f64)] = match self {
            Region::IndiaNortheast => &[
                ("ndvi", 0.8),
                ("evi", 0.85),
                ("ndwi", 1.2),
                ("mndwi", 1.2),
                ("algae_index", 0.9),
                ("turbidity_index", 0.85),
            ],
            Region::IndiaCoastal => &[
                ("ndwi", 0.9),
                ("mndwi", 0.85),
                ("algae_index", 0.75),
                ("turbidity_index", 0.8),
                ("ndvi", 1.1),
            ],
            Region::IndiaPlains => &[
                ("ndvi", 1.2),
                ("evi", 1.2),
                ("savi", 1.15),
                ("ndbi", 0.9),
                ("bai", 0.9),
            ],
            Region::IndiaHimalayan => &[
                ("ndvi", 0.85),
                ("nbri", 0.8),
                ("thermal_proxy", 0.85),
                ("ndwi", 1.1),
            ],
            Region::IndiaDesert => &[
                ("ndvi", 1.5),
                ("bsi", 0.85),
                ("ndbi", 0.85),
                ("bai", 0.85),
                ("ndwi", 1.5),
            ],
            Region::Default
            | Region::GlobalTropical
            | Region::GlobalTemperate
            | Region::GlobalArid => &[],
        };
        table
            .iter()
            .find(|(name, _)| *name == index)
            .map_or(1.0, |(_, m)| *m)
    }

    /// Pick a preset from WGS84 coordinates.
    ///
    /// Inside India (lat 8..35, lon 68..97) the sub-region is chosen from
    /// coarse boxes; elsewhere the latitude band decides.
    pub fn from_coordinates(latitude: f64, longitude: f64) -> Self {
        let in_india = (8.0..=35.0).contains(&latitude) && (68.0..=97.0).contains(&longitude);
        if in_india {
            if latitude >= 24.0 && longitude >= 88.0 {
                Region::IndiaNortheast
            } else if latitude >= 28.0 {
                Region::IndiaHimalayan
            } else if latitude <= 12.0
                || (longitude <= 73.0 && (15.0..=20.0).contains(&latitude))
                || (longitude >= 85.0 && latitude <= 20.0)
            {
                Region::IndiaCoastal
            } else if longitude <= 75.0 && (24.0..=30.0).contains(&latitude) {
                Region::IndiaDesert
            } else {
                Region::IndiaPlains
            }
        } else if latitude.abs() <= 23.5 {
            Region::GlobalTropical
        } else if latitude.abs() < 45.0 {
            Region::GlobalTemperate
        } else {
            Region::GlobalArid
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let key = s.trim().to_ascii_lowercase().replace('-', "_");
        Region::ALL
            .into_iter()
            .find(|r| r.as_str() == key)
            .ok_or_else(|| Error::InvalidParameter {
                name: "region",
                value: s.to_string(),
                reason: "unknown region".into(),
            })
    }
}

/// Per-family index weights used by the composite risk score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightTables {
    pub vegetation_loss: BTreeMap<String, f64>,
    pub construction: BTreeMap<String, f64>,
    pub water_change: BTreeMap<String, f64>,
}

impl Default for WeightTables {
    fn default() -> Self {
        Self {
            vegetation_loss: table(&[
                ("ndvi", 0.35),
                ("evi", 0.25),
                ("savi", 0.20),
                ("nbri", 0.15),
                ("bsi", 0.05),
            ]),
            construction: table(&[
                ("ndbi", 0.40),
                ("ndvi", 0.25),
                ("bai", 0.20),
                ("thermal_proxy", 0.10),
                ("bsi", 0.05),
            ]),
            water_change: table(&[
                ("ndwi", 0.35),
                ("mndwi", 0.30),
                ("turbidity_index", 0.20),
                ("ndvi", 0.10),
                ("algae_index", 0.05),
            ]),
        }
    }
}

impl WeightTables {
    /// Table for a family, `None` for equal weighting
    pub fn for_family(&self, family: WeightFamily) -> Option<&BTreeMap<String, f64>> {
        match family {
            WeightFamily::VegetationLoss => Some(&self.vegetation_loss),
            WeightFamily::Construction => Some(&self.construction),
            WeightFamily::WaterChange => Some(&self.water_change),
            WeightFamily::Equal => None,
        }
    }

    fn named(&self) -> [(&'static str, &BTreeMap<String, f64>); 3] {
        [
            ("vegetation_loss", &self.vegetation_loss),
            ("construction", &self.construction),
            ("water_change", &self.water_change),
        ]
    }
}

/// Lower bounds of the risk levels on `risk_score * confidence`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskBoundaries {
    pub critical: f64,
    pub high: f64,
    pub medium: f64,
}

impl Default for RiskBoundaries {
    fn default() -> Self {
        Self {
            critical: 0.75,
            high: 0.50,
            medium: 0.25,
        }
    }
}

impl RiskBoundaries {
    pub fn level(&self, adjusted_score: f64) -> RiskLevel {
        if adjusted_score >= self.critical {
            RiskLevel::Critical
        } else if adjusted_score >= self.high {
            RiskLevel::High
        } else if adjusted_score >= self.medium {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

/// Seasonality detection and discounting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeasonalConfig {
    /// Index whose history measures seasonality
    pub index: String,
    pub min_historical_samples: usize,
    /// Coefficient of variation that maps to likelihood 1
    pub cv_scale: f64,
    /// Risk discount factor when the winning category is seasonal agriculture
    pub seasonal_discount: f64,
    /// Risk discount factor for every other category
    pub other_discount: f64,
    /// Likelihood above which recommendations carry a seasonal note
    pub qualifier_threshold: f64,
}

impl Default for SeasonalConfig {
    fn default() -> Self {
        Self {
            index: SpectralIndex::Ndvi.name().to_string(),
            min_historical_samples: 4,
            cv_scale: 0.5,
            seasonal_discount: 0.7,
            other_discount: 0.3,
            qualifier_threshold: 0.6,
        }
    }
}

/// Fallbacks and caps of the category decision
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationConfig {
    /// Best rule scores below this fall back to unknown / normal variation
    pub min_confidence: f64,
    pub unknown_confidence: f64,
    pub normal_confidence: f64,
    /// Confidence below which recommendations are marked low confidence
    pub low_confidence: f64,
    pub max_primary_indicators: usize,
    pub max_unknown_indicators: usize,
    pub max_evidence: usize,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.3,
            unknown_confidence: 0.4,
            normal_confidence: 0.8,
            low_confidence: 0.5,
            max_primary_indicators: 5,
            max_unknown_indicators: 3,
            max_evidence: 5,
        }
    }
}

/// Complete fusion engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    pub region: Region,
    /// Significance threshold (percent) for indices without a base threshold
    pub default_threshold: f64,
    /// Significance thresholds in percent, before regional scaling
    pub base_thresholds: BTreeMap<String, f64>,
    pub weights: WeightTables,
    pub risk_levels: RiskBoundaries,
    pub seasonal: SeasonalConfig,
    pub classification: ClassificationConfig,
    pub rules: Vec<Rule>,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self::for_region(Region::Default)
    }
}

fn table(entries: &[(&str, f64)]) -> BTreeMap<String, f64> {
    entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

fn default_base_thresholds() -> BTreeMap<String, f64> {
    table(&[
        ("ndvi", 15.0),
        ("evi", 20.0),
        ("ndwi", 20.0),
        ("mndwi", 25.0),
        ("ndbi", 15.0),
        ("bsi", 20.0),
        ("nbri", 25.0),
        ("turbidity_index", 30.0),
        ("algae_index", 25.0),
        ("thermal_proxy", 15.0),
        ("savi", 20.0),
        ("bai", 20.0),
    ])
}

impl FusionConfig {
    /// Stock configuration scaled for `region`
    pub fn for_region(region: Region) -> Self {
        Self {
            region,
            default_threshold: 20.0,
            base_thresholds: default_base_thresholds(),
            weights: WeightTables::default(),
            risk_levels: RiskBoundaries::default(),
            seasonal: SeasonalConfig::default(),
            classification: ClassificationConfig::default(),
            rules: default_rules(),
        }
    }

    /// Stock configuration for the region containing a point
    pub fn from_coordinates(latitude: f64, longitude: f64) -> Self {
        Self::for_region(Region::from_coordinates(latitude, longitude))
    }

    /// Effective significance threshold (percent) of an index
    pub fn threshold(&self, index: &str) -> f64 {
        let base = self
            .base_thresholds
            .get(index)
            .copied()
            .unwrap_or(self.default_threshold);
        base * self.region.multiplier(index)
    }

    /// Every known index with its effective threshold
    pub fn effective_thresholds(&self) -> BTreeMap<String, f64> {
        self.base_thresholds
            .keys()
            .map(|k| (k.clone(), self.threshold(k)))
            .collect()
    }

    /// Parse a TOML document; missing fields take stock values.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(s).map_err(|e| Error::Configuration(format!("invalid TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a TOML configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        debug!(path = %path.display(), "loading fusion configuration");
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Reject tables the engine cannot use meaningfully
    pub fn validate(&self) -> Result<()> {
        let bad = |msg: String| Err(Error::Configuration(msg));

        if !(self.default_threshold > 0.0 && self.default_threshold.is_finite()) {
            return bad(format!("default_threshold must be positive, got {}", self.default_threshold));
        }
        for (name, t) in &self.base_thresholds {
            if !(*t > 0.0 && t.is_finite()) {
                return bad(format!("threshold for '{name}' must be positive, got {t}"));
            }
        }

        for (family, weights) in self.weights.named() {
            for (name, w) in weights {
                if !(*w >= 0.0 && w.is_finite()) {
                    return bad(format!("weight {family}.{name} must be non-negative, got {w}"));
                }
            }
            if weights.values().sum::<f64>() <= 0.0 {
                return bad(format!("weight table '{family}' has no positive weight"));
            }
        }

        let r = &self.risk_levels;
        if !(0.0 <= r.medium && r.medium < r.high && r.high < r.critical && r.critical <= 1.0) {
            return bad(format!(
                "risk boundaries must satisfy 0 <= medium < high < critical <= 1, got {}/{}/{}",
                r.medium, r.high, r.critical
            ));
        }

        let s = &self.seasonal;
        if s.index.trim().is_empty() {
            return bad("seasonal.index must name an index".into());
        }
        if !(s.cv_scale > 0.0 && s.cv_scale.is_finite()) {
            return bad(format!("seasonal.cv_scale must be positive, got {}", s.cv_scale));
        }
        for (name, v) in [
            ("seasonal_discount", s.seasonal_discount),
            ("other_discount", s.other_discount),
            ("qualifier_threshold", s.qualifier_threshold),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return bad(format!("seasonal.{name} must be within [0, 1], got {v}"));
            }
        }

        let c = &self.classification;
        for (name, v) in [
            ("min_confidence", c.min_confidence),
            ("unknown_confidence", c.unknown_confidence),
            ("normal_confidence", c.normal_confidence),
            ("low_confidence", c.low_confidence),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return bad(format!("classification.{name} must be within [0, 1], got {v}"));
            }
        }

        for (i, rule) in self.rules.iter().enumerate() {
            if rule.conditions.is_empty() {
                return bad(format!("rule {i} ({}) has no conditions", rule.category));
            }
            if !rule.base_score.is_finite() || rule.bonuses.iter().any(|b| !b.add.is_finite()) {
                return bad(format!("rule {i} ({}) has a non-finite score", rule.category));
            }
            let conditions = rule.conditions.iter().chain(rule.bonuses.iter().map(|b| &b.when));
            for cond in conditions {
                if !cond.is_finite() {
                    return bad(format!("rule {i} ({}) has a non-finite bound", rule.category));
                }
                if let Some(index) = cond.index() {
                    if index.trim().is_empty() {
                        return bad(format!("rule {i} ({}) references an empty index name", rule.category));
                    }
                    if index.parse::<SpectralIndex>().is_err() {
                        return bad(format!("rule {i} ({}) references unknown index '{index}'", rule.category));
                    }
                }
            }
        }

        Ok(())
    }
}
