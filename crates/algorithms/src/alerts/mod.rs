//! Alert post-processing
//!
//! Orders fusion-derived alerts for follow-up and groups alerts that are
//! close in space and time.

pub mod prioritizer;

pub use prioritizer::{
    aoi_importance, group_related_alerts, prioritize, prioritize_alert, AlertContext, AlertGroup,
    AlertRecord, GroupingParams, PriorityFactors, PriorityLevel, PriorityParams, PriorityRecord,
    Urgency,
};
