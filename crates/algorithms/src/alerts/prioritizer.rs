//! Alert prioritization
//!
//! A 0–100 priority score built from five capped factors:
//!
//! | factor     | points | source                                   |
//! |------------|--------|------------------------------------------|
//! | magnitude  | 30     | composite risk score                     |
//! | confidence | 25     | fusion confidence                        |
//! | importance | 25     | AOI importance in [0, 1]                 |
//! | velocity   | 15     | normalized change velocity               |
//! | novelty    | 5      | category not seen before for the AOI     |

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use geoguard_core::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::fusion::{ChangeCategory, FusionResult, RiskLevel};

const KM_PER_DEGREE: f64 = 111.0;

/// Tags that mark an ecologically high-value AOI
pub const HIGH_VALUE_TAGS: [&str; 4] = ["forest", "wetland", "coral_reef", "wildlife_habitat"];

/// An alert raised from a fusion result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub id: String,
    #[serde(default)]
    pub aoi_id: Option<String>,
    pub category: ChangeCategory,
    pub risk_score: f64,
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
    /// AOI centre, used for grouping
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

impl AlertRecord {
    pub fn from_fusion(id: impl Into<String>, result: &FusionResult, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            aoi_id: result.aoi_id.clone(),
            category: result.category,
            risk_score: result.composite_risk_score,
            confidence: result.confidence,
            timestamp,
            latitude: None,
            longitude: None,
        }
    }

    pub fn with_location(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
        self
    }
}

/// Caller-supplied context for one alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertContext {
    /// AOI importance in [0, 1], see [`aoi_importance`]
    pub aoi_importance: f64,
    pub alert_age_days: Option<f64>,
    pub recent_alert_count: usize,
    /// Categories already alerted for this AOI; `None` disables novelty
    pub known_categories: Option<Vec<ChangeCategory>>,
    /// Normalized change velocity (fraction per day)
    pub velocity: f64,
}

impl Default for AlertContext {
    fn default() -> Self {
        Self {
            aoi_importance: 0.5,
            alert_age_days: None,
            recent_alert_count: 0,
            known_categories: None,
            velocity: 0.0,
        }
    }
}

/// Point allotments and boundaries of the priority score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorityParams {
    /// Default: 30
    pub magnitude_points: f64,
    /// Default: 25
    pub confidence_points: f64,
    /// Default: 25
    pub importance_points: f64,
    /// Default: 15
    pub velocity_points: f64,
    /// Default: 5
    pub novelty_points: f64,
    /// Velocity points above which the action flags acceleration. Default: 10
    pub accelerating_points: f64,
    /// |velocity| that makes a critical alert immediate. Default: 0.01
    pub immediate_velocity: f64,
    /// Age in days up to which a critical alert is immediate. Default: 1
    pub immediate_age_days: f64,
}

impl Default for PriorityParams {
    fn default() -> Self {
        Self {
            magnitude_points: 30.0,
            confidence_points: 25.0,
            importance_points: 25.0,
            velocity_points: 15.0,
            novelty_points: 5.0,
            accelerating_points: 10.0,
            immediate_velocity: 0.01,
            immediate_age_days: 1.0,
        }
    }
}

impl PriorityParams {
    /// Every allotment and threshold must be finite and non-negative
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("magnitude_points", self.magnitude_points),
            ("confidence_points", self.confidence_points),
            ("importance_points", self.importance_points),
            ("velocity_points", self.velocity_points),
            ("novelty_points", self.novelty_points),
            ("accelerating_points", self.accelerating_points),
            ("immediate_velocity", self.immediate_velocity),
            ("immediate_age_days", self.immediate_age_days),
        ];
        for (name, value) in fields {
            if !(value >= 0.0 && value.is_finite()) {
                return Err(Error::InvalidParameter {
                    name,
                    value: value.to_string(),
                    reason: "must be finite and non-negative".into(),
                });
            }
        }
        Ok(())
    }
}

/// Points contributed by each factor
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PriorityFactors {
    pub magnitude: f64,
    pub confidence: f64,
    pub importance: f64,
    pub velocity: f64,
    pub novelty: f64,
}

impl PriorityFactors {
    pub fn total(&self) -> f64 {
        self.magnitude + self.confidence + self.importance + self.velocity + self.novelty
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl PriorityLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            PriorityLevel::Critical
        } else if score >= 60.0 {
            PriorityLevel::High
        } else if score >= 40.0 {
            PriorityLevel::Medium
        } else {
            PriorityLevel::Low
        }
    }

    pub fn action(self) -> &'static str {
        match self {
            PriorityLevel::Critical => {
                "IMMEDIATE ACTION REQUIRED: Deploy field team for verification and intervention within 24 hours."
            }
            PriorityLevel::High => {
                "HIGH PRIORITY: Schedule site inspection within 72 hours and alert relevant authorities."
            }
            PriorityLevel::Medium => "MEDIUM PRIORITY: Add to inspection queue. Review within one week.",
            PriorityLevel::Low => {
                "LOW PRIORITY: Continue monitoring. Routine review in next reporting cycle."
            }
        }
    }
}

impl fmt::Display for PriorityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PriorityLevel::Low => "low",
            PriorityLevel::Medium => "medium",
            PriorityLevel::High => "high",
            PriorityLevel::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// Scheduling class of an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Routine,
    Moderate,
    Urgent,
    Immediate,
}

/// Priority of one alert with its factor breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityRecord {
    pub alert_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aoi_id: Option<String>,
    pub priority_score: f64,
    pub priority_level: PriorityLevel,
    pub urgency: Urgency,
    pub factors: PriorityFactors,
    pub recommended_action: String,
}

/// Non-finite inputs and unusable allotments contribute nothing
fn capped(value: f64, points: f64) -> f64 {
    if value.is_finite() && points >= 0.0 && points.is_finite() {
        (value * points).clamp(0.0, points)
    } else {
        0.0
    }
}

/// Score one alert.
pub fn prioritize_alert(
    alert: &AlertRecord,
    context: &AlertContext,
    params: &PriorityParams,
) -> PriorityRecord {
    let novel = context
        .known_categories
        .as_ref()
        .is_some_and(|known| !known.contains(&alert.category));

    let factors = PriorityFactors {
        magnitude: capped(alert.risk_score, params.magnitude_points),
        confidence: capped(alert.confidence, params.confidence_points),
        importance: capped(context.aoi_importance, params.importance_points),
        velocity: capped(context.velocity.abs(), params.velocity_points),
        novelty: if novel { params.novelty_points } else { 0.0 },
    };
    let score = factors.total();
    let level = PriorityLevel::from_score(score);

    let fresh = context
        .alert_age_days
        .is_some_and(|age| age <= params.immediate_age_days);
    let urgency = if score >= 80.0 && (context.velocity.abs() > params.immediate_velocity || fresh) {
        Urgency::Immediate
    } else if score >= 60.0 {
        Urgency::Urgent
    } else if score >= 40.0 {
        Urgency::Moderate
    } else {
        Urgency::Routine
    };

    let mut action = level.action().to_string();
    if factors.velocity > params.accelerating_points {
        action.push_str(" ACCELERATING CHANGE DETECTED - prioritize above other alerts of same level.");
    }
    if factors.novelty > 0.0 {
        action.push_str(" NEW PATTERN - requires expert analysis.");
    }

    debug!(alert = %alert.id, score, level = %level, "alert prioritized");

    PriorityRecord {
        alert_id: alert.id.clone(),
        aoi_id: alert.aoi_id.clone(),
        priority_score: score,
        priority_level: level,
        urgency,
        factors,
        recommended_action: action,
    }
}

/// Score alerts and order them highest first, ties by alert id.
pub fn prioritize(
    alerts: &[(AlertRecord, AlertContext)],
    params: &PriorityParams,
    limit: Option<usize>,
) -> Result<Vec<PriorityRecord>> {
    params.validate()?;
    let mut records: Vec<PriorityRecord> = alerts
        .iter()
        .map(|(alert, ctx)| prioritize_alert(alert, ctx, params))
        .collect();
    records.sort_by(|a, b| {
        b.priority_score
            .partial_cmp(&a.priority_score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.alert_id.cmp(&b.alert_id))
    });
    if let Some(n) = limit {
        records.truncate(n);
    }
    Ok(records)
}

/// AOI importance from its tags and recent alert count.
///
/// Base 0.5, +0.3 for a protected area, +0.2 for a high-value ecosystem,
/// +0.1 with more than three recent alerts; capped at 1.
pub fn aoi_importance<S: AsRef<str>>(tags: &[S], recent_alert_count: usize) -> f64 {
    let has = |t: &str| tags.iter().any(|s| s.as_ref() == t);
    let mut importance = 0.5;
    if has("protected_area") {
        importance += 0.3;
    }
    if HIGH_VALUE_TAGS.iter().any(|&t| has(t)) {
        importance += 0.2;
    }
    if recent_alert_count > 3 {
        importance += 0.1;
    }
    f64::min(importance, 1.0)
}

/// Thresholds for [`group_related_alerts`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupingParams {
    /// Default: 2 km
    pub distance_km: f64,
    /// Default: 7 days
    pub window_days: f64,
}

impl Default for GroupingParams {
    fn default() -> Self {
        Self {
            distance_km: 2.0,
            window_days: 7.0,
        }
    }
}

/// Alerts close in space and time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertGroup {
    pub group_id: String,
    pub alert_ids: Vec<String>,
    pub center_latitude: f64,
    pub center_longitude: f64,
    pub severity: RiskLevel,
}

impl AlertGroup {
    pub fn len(&self) -> usize {
        self.alert_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alert_ids.is_empty()
    }
}

fn distance_km(a: (f64, f64), b: (f64, f64)) -> f64 {
    (a.0 - b.0).hypot(a.1 - b.1) * KM_PER_DEGREE
}

/// Greedily group located alerts within `distance_km` and `window_days` of a seed.
///
/// Alerts without coordinates are ignored; only groups of two or more are
/// returned.
pub fn group_related_alerts(alerts: &[AlertRecord], params: &GroupingParams) -> Vec<AlertGroup> {
    let located: Vec<(&AlertRecord, (f64, f64))> = alerts
        .iter()
        .filter_map(|a| Some((a, (a.latitude?, a.longitude?))))
        .collect();

    let mut taken = vec![false; located.len()];
    let mut groups = Vec::new();

    for (i, (seed, seed_pos)) in located.iter().enumerate() {
        if taken[i] {
            continue;
        }
        let members: Vec<usize> = (0..located.len())
            .filter(|&j| !taken[j])
            .filter(|&j| {
                let (other, pos) = located[j];
                let days = (seed.timestamp - other.timestamp).num_seconds().abs() as f64 / 86_400.0;
                distance_km(*seed_pos, pos) < params.distance_km && days <= params.window_days
            })
            .collect();
        for &j in &members {
            taken[j] = true;
        }
        if members.len() < 2 {
            continue;
        }

        let n = members.len() as f64;
        let lat = members.iter().map(|&j| located[j].1 .0).sum::<f64>() / n;
        let lon = members.iter().map(|&j| located[j].1 .1).sum::<f64>() / n;
        let mean_confidence = members.iter().map(|&j| located[j].0.confidence).sum::<f64>() / n;
        let severity = if mean_confidence > 0.8 {
            RiskLevel::Critical
        } else if mean_confidence > 0.6 {
            RiskLevel::High
        } else if mean_confidence > 0.4 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        };

        groups.push(AlertGroup {
            group_id: format!("group_{}", groups.len()),
            alert_ids: members.iter().map(|&j| located[j].0.id.clone()).collect(),
            center_latitude: lat,
            center_longitude: lon,
            severity,
        });
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{Duration, TimeZone};

    fn alert(id: &str, risk: f64, confidence: f64) -> AlertRecord {
        AlertRecord {
            id: id.to_string(),
            aoi_id: Some("aoi-1".into()),
            category: ChangeCategory::Deforestation,
            risk_score: risk,
            confidence,
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
            latitude: None,
            longitude: None,
        }
    }

    #[test]
    fn test_factor_breakdown() {
        let ctx = AlertContext {
            aoi_importance: 0.8,
            velocity: 0.5,
            ..AlertContext::default()
        };
        let r = prioritize_alert(&alert("a", 0.6, 0.8), &ctx, &PriorityParams::default());
        assert_relative_eq!(r.factors.magnitude, 18.0, epsilon = 1e-9);
        assert_relative_eq!(r.factors.confidence, 20.0, epsilon = 1e-9);
        assert_relative_eq!(r.factors.importance, 20.0, epsilon = 1e-9);
        assert_relative_eq!(r.factors.velocity, 7.5, epsilon = 1e-9);
        assert_eq!(r.factors.novelty, 0.0);
        assert_relative_eq!(r.priority_score, 65.5, epsilon = 1e-9);
        assert_eq!(r.priority_level, PriorityLevel::High);
        assert_eq!(r.urgency, Urgency::Urgent);
        assert!(r.recommended_action.starts_with("HIGH PRIORITY"));
    }

    #[test]
    fn test_factors_are_capped() {
        let ctx = AlertContext {
            aoi_importance: 7.0,
            velocity: -40.0,
            known_categories: Some(vec![ChangeCategory::WaterPollution]),
            alert_age_days: Some(0.5),
            ..AlertContext::default()
        };
        let r = prioritize_alert(&alert("a", 12.0, 3.0), &ctx, &PriorityParams::default());
        assert_eq!(r.factors.magnitude, 30.0);
        assert_eq!(r.factors.confidence, 25.0);
        assert_eq!(r.factors.importance, 25.0);
        assert_eq!(r.factors.velocity, 15.0);
        assert_eq!(r.factors.novelty, 5.0);
        assert_eq!(r.priority_score, 100.0);
        assert_eq!(r.priority_level, PriorityLevel::Critical);
        assert_eq!(r.urgency, Urgency::Immediate);
        assert!(r.recommended_action.contains("ACCELERATING CHANGE DETECTED"));
        assert!(r.recommended_action.ends_with("NEW PATTERN - requires expert analysis."));
    }

    #[test]
    fn test_critical_but_stale_is_urgent() {
        let ctx = AlertContext {
            aoi_importance: 1.0,
            alert_age_days: Some(5.0),
            ..AlertContext::default()
        };
        // 30 + 25 + 25 = 80 with no velocity and an old alert
        let r = prioritize_alert(&alert("a", 1.0, 1.0), &ctx, &PriorityParams::default());
        assert_eq!(r.priority_level, PriorityLevel::Critical);
        assert_eq!(r.urgency, Urgency::Urgent);
    }

    #[test]
    fn test_known_category_is_not_novel() {
        let ctx = AlertContext {
            known_categories: Some(vec![ChangeCategory::Deforestation]),
            ..AlertContext::default()
        };
        let r = prioritize_alert(&alert("a", 0.1, 0.1), &ctx, &PriorityParams::default());
        assert_eq!(r.factors.novelty, 0.0);
        assert_eq!(r.priority_level, PriorityLevel::Low);
        assert_eq!(r.urgency, Urgency::Routine);
    }

    #[test]
    fn test_prioritize_orders_and_limits() {
        let ctx = AlertContext::default();
        let alerts = vec![
            (alert("b", 0.2, 0.5), ctx.clone()),
            (alert("c", 0.9, 0.9), ctx.clone()),
            (alert("a", 0.2, 0.5), ctx.clone()),
        ];
        let out = prioritize(&alerts, &PriorityParams::default(), Some(2)).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].alert_id, "c");
        // equal scores fall back to id order
        assert_eq!(out[1].alert_id, "a");
    }

    #[test]
    fn test_negative_allotment_is_rejected() {
        let alerts = vec![(alert("a", 0.5, 0.5), AlertContext::default())];
        let params = PriorityParams {
            velocity_points: -5.0,
            ..PriorityParams::default()
        };
        assert!(matches!(
            prioritize(&alerts, &params, None),
            Err(Error::InvalidParameter { name: "velocity_points", .. })
        ));

        let params = PriorityParams {
            magnitude_points: f64::NAN,
            ..PriorityParams::default()
        };
        assert!(params.validate().is_err());
        // scoring one alert directly degrades to zero points instead of panicking
        let r = prioritize_alert(&alerts[0].0, &alerts[0].1, &params);
        assert_eq!(r.factors.magnitude, 0.0);
        assert!(PriorityParams::default().validate().is_ok());
    }

    #[test]
    fn test_aoi_importance() {
        assert_eq!(aoi_importance::<&str>(&[], 0), 0.5);
        assert_relative_eq!(aoi_importance(&["protected_area"], 0), 0.8);
        assert_relative_eq!(aoi_importance(&["wetland", "river"], 4), 0.8);
        assert_eq!(aoi_importance(&["protected_area", "forest"], 10), 1.0);
    }

    #[test]
    fn test_group_related_alerts() {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let mut a = alert("a", 0.5, 0.9).with_location(10.0, 76.0);
        let mut b = alert("b", 0.5, 0.8).with_location(10.005, 76.005);
        let mut c = alert("c", 0.5, 0.9).with_location(10.0, 76.0);
        let d = alert("d", 0.5, 0.9).with_location(12.0, 78.0);
        let e = alert("e", 0.5, 0.9);
        a.timestamp = t0;
        b.timestamp = t0 + Duration::days(3);
        // same place, outside the window
        c.timestamp = t0 + Duration::days(30);

        let groups = group_related_alerts(&[a, b, c, d, e], &GroupingParams::default());
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].alert_ids, vec!["a", "b"]);
        assert_eq!(groups[0].severity, RiskLevel::Critical);
        assert_relative_eq!(groups[0].center_latitude, 10.0025, epsilon = 1e-9);
    }
}
