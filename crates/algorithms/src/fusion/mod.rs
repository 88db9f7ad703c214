//! Multi-index change fusion
//!
//! - [`change`]: per-index change between two dates
//! - [`category`]: change categories, weight families and risk levels
//! - [`rules`]: classification rules as inspectable data
//! - [`config`]: thresholds, weights and regional presets
//! - [`engine`]: the fusion engine itself

pub mod category;
pub mod change;
pub mod config;
pub mod engine;
pub mod rules;

pub use category::{ChangeCategory, RiskLevel, WeightFamily};
pub use change::{percent_change, IndexChange};
pub use config::{
    ClassificationConfig, FusionConfig, Region, RiskBoundaries, SeasonalConfig, WeightTables,
};
pub use engine::{AoiMetadata, Fusion, FusionDetails, FusionEngine, FusionInput, FusionResult};
pub use rules::{best_match, default_rules, Bonus, ChangeSet, Condition, Rule, ScoreSource};
