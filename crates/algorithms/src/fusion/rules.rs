//! Classification rules as data
//!
//! A rule fires when all of its conditions hold. Its score starts at the
//! base score (or the seasonal likelihood) and each corroborating bonus whose
//! condition holds is added on top. A condition on an index that is absent
//! from the change set never holds.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::category::ChangeCategory;
use super::change::IndexChange;

/// Changes keyed by index name
pub type ChangeSet = BTreeMap<String, IndexChange>;

/// Predicate over the change set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Condition {
    /// `percent_change < value`
    PercentBelow { index: String, value: f64 },
    /// `percent_change > value`
    PercentAbove { index: String, value: f64 },
    /// `|percent_change| > value`
    AbsPercentAbove { index: String, value: f64 },
    /// Current index value `> value`
    CurrentAbove { index: String, value: f64 },
    /// Seasonal likelihood `> value`
    SeasonalLikelihoodAbove { value: f64 },
}

impl Condition {
    pub fn holds(&self, changes: &ChangeSet, seasonal_likelihood: f64) -> bool {
        let pct = |index: &str| changes.get(index).map(|c| c.percent_change);
        match self {
            Condition::PercentBelow { index, value } => pct(index.as_str()).is_some_and(|p| p < *value),
            Condition::PercentAbove { index, value } => pct(index.as_str()).is_some_and(|p| p > *value),
            Condition::AbsPercentAbove { index, value } => {
                pct(index.as_str()).is_some_and(|p| p.abs() > *value)
            }
            Condition::CurrentAbove { index, value } => {
                changes.get(index).is_some_and(|c| c.current > *value)
            }
            Condition::SeasonalLikelihoodAbove { value } => seasonal_likelihood > *value,
        }
    }

    /// Index the condition reads, if any
    pub fn index(&self) -> Option<&str> {
        match self {
            Condition::PercentBelow { index, .. }
            | Condition::PercentAbove { index, .. }
            | Condition::AbsPercentAbove { index, .. }
            | Condition::CurrentAbove { index, .. } => Some(index.as_str()),
            Condition::SeasonalLikelihoodAbove { .. } => None,
        }
    }

    fn value(&self) -> f64 {
        match self {
            Condition::PercentBelow { value, .. }
            | Condition::PercentAbove { value, .. }
            | Condition::AbsPercentAbove { value, .. }
            | Condition::CurrentAbove { value, .. }
            | Condition::SeasonalLikelihoodAbove { value } => *value,
        }
    }

    pub(crate) fn is_finite(&self) -> bool {
        self.value().is_finite()
    }
}

/// Corroborating signal added to a fired rule's score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bonus {
    pub when: Condition,
    pub add: f64,
}

/// Where a fired rule's starting score comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreSource {
    #[default]
    Base,
    SeasonalLikelihood,
}

/// One classification rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub category: ChangeCategory,
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub base_score: f64,
    #[serde(default)]
    pub score_source: ScoreSource,
    #[serde(default)]
    pub bonuses: Vec<Bonus>,
}

impl Rule {
    /// Score of the rule, `None` when a condition fails
    pub fn evaluate(&self, changes: &ChangeSet, seasonal_likelihood: f64) -> Option<f64> {
        if !self.conditions.iter().all(|c| c.holds(changes, seasonal_likelihood)) {
            return None;
        }
        let start = match self.score_source {
            ScoreSource::Base => self.base_score,
            ScoreSource::SeasonalLikelihood => seasonal_likelihood,
        };
        let bonus: f64 = self
            .bonuses
            .iter()
            .filter(|b| b.when.holds(changes, seasonal_likelihood))
            .map(|b| b.add)
            .sum();
        Some(start + bonus)
    }

    /// Indices referenced by conditions then bonuses, without repeats
    pub fn indices(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        let all = self
            .conditions
            .iter()
            .chain(self.bonuses.iter().map(|b| &b.when));
        for index in all.filter_map(Condition::index) {
            if !out.contains(&index) {
                out.push(index);
            }
        }
        out
    }
}

fn below(index: &str, value: f64) -> Condition {
    Condition::PercentBelow { index: index.into(), value }
}

fn above(index: &str, value: f64) -> Condition {
    Condition::PercentAbove { index: index.into(), value }
}

fn bonus(when: Condition, add: f64) -> Bonus {
    Bonus { when, add }
}

/// The stock rule table, evaluated in this order.
///
/// ```text
/// illegal_construction  ndvi < -15 and ndbi > 15          0.6 (+0.2 thermal > 10, +0.2 bsi > 10)
/// illegal_mining        ndvi < -30 and ndwi > 20          0.7 (+0.2 bsi > 15, +0.1 nbri < -20)
/// deforestation         ndvi < -40                        0.5 (+0.3 evi < -30, +0.2 nbri < -30)
/// seasonal_agriculture  |ndvi| > 20 and seasonal > 0.6    seasonal likelihood
/// water_pollution       turbidity > 30                    0.6 (+0.2 algae > 25, +0.2 |mndwi| > 20)
/// algal_bloom           algae > 40                        0.7 (+0.2 ndwi now > 0.3, +0.1 turbidity > 20)
/// wildfire_damage       nbri < -50                        0.7 (+0.2 ndvi < -40, +0.1 thermal > 20)
/// ```
pub fn default_rules() -> Vec<Rule> {
    vec![
        Rule {
            category: ChangeCategory::IllegalConstruction,
            conditions: vec![below("ndvi", -15.0), above("ndbi", 15.0)],
            base_score: 0.6,
            score_source: ScoreSource::Base,
            bonuses: vec![
                bonus(above("thermal_proxy", 10.0), 0.2),
                bonus(above("bsi", 10.0), 0.2),
            ],
        },
        Rule {
            category: ChangeCategory::IllegalMining,
            conditions: vec![below("ndvi", -30.0), above("ndwi", 20.0)],
            base_score: 0.7,
            score_source: ScoreSource::Base,
            bonuses: vec![bonus(above("bsi", 15.0), 0.2), bonus(below("nbri", -20.0), 0.1)],
        },
        Rule {
            category: ChangeCategory::Deforestation,
            conditions: vec![below("ndvi", -40.0)],
            base_score: 0.5,
            score_source: ScoreSource::Base,
            bonuses: vec![bonus(below("evi", -30.0), 0.3), bonus(below("nbri", -30.0), 0.2)],
        },
        Rule {
            category: ChangeCategory::SeasonalAgriculture,
            conditions: vec![
                Condition::AbsPercentAbove { index: "ndvi".into(), value: 20.0 },
                Condition::SeasonalLikelihoodAbove { value: 0.6 },
            ],
            base_score: 0.0,
            score_source: ScoreSource::SeasonalLikelihood,
            bonuses: Vec::new(),
        },
        Rule {
            category: ChangeCategory::WaterPollution,
            conditions: vec![above("turbidity_index", 30.0)],
            base_score: 0.6,
            score_source: ScoreSource::Base,
            bonuses: vec![
                bonus(above("algae_index", 25.0), 0.2),
                bonus(Condition::AbsPercentAbove { index: "mndwi".into(), value: 20.0 }, 0.2),
            ],
        },
        Rule {
            category: ChangeCategory::AlgalBloom,
            conditions: vec![above("algae_index", 40.0)],
            base_score: 0.7,
            score_source: ScoreSource::Base,
            bonuses: vec![
                bonus(Condition::CurrentAbove { index: "ndwi".into(), value: 0.3 }, 0.2),
                bonus(above("turbidity_index", 20.0), 0.1),
            ],
        },
        Rule {
            category: ChangeCategory::WildfireDamage,
            conditions: vec![below("nbri", -50.0)],
            base_score: 0.7,
            score_source: ScoreSource::Base,
            bonuses: vec![
                bonus(below("ndvi", -40.0), 0.2),
                bonus(above("thermal_proxy", 20.0), 0.1),
            ],
        },
    ]
}

/// Winning rule and its score; ties go to the earlier rule
pub fn best_match<'a>(
    rules: &'a [Rule],
    changes: &ChangeSet,
    seasonal_likelihood: f64,
) -> Option<(&'a Rule, f64)> {
    rules
        .iter()
        .filter_map(|r| r.evaluate(changes, seasonal_likelihood).map(|s| (r, s)))
        .fold(None, |best, (rule, score)| match best {
            Some((_, top)) if top >= score => best,
            _ => Some((rule, score)),
        })
}
