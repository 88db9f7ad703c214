//! Change categories and risk levels

use std::fmt;
use std::str::FromStr;

use geoguard_core::Error;
use serde::{Deserialize, Serialize};

/// Kind of environmental change a fusion run concludes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeCategory {
    IllegalConstruction,
    IllegalMining,
    Deforestation,
    WaterPollution,
    CoastalErosion,
    AlgalBloom,
    AgriculturalExpansion,
    SeasonalAgriculture,
    UrbanHeatIsland,
    WildfireDamage,
    NormalVariation,
    Unknown,
}

/// Weight table a category's risk score is computed with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightFamily {
    VegetationLoss,
    Construction,
    WaterChange,
    /// Every present index weighs the same
    Equal,
}

impl ChangeCategory {
    pub const ALL: [ChangeCategory; 12] = [
        ChangeCategory::IllegalConstruction,
        ChangeCategory::IllegalMining,
        ChangeCategory::Deforestation,
        ChangeCategory::WaterPollution,
        ChangeCategory::CoastalErosion,
        ChangeCategory::AlgalBloom,
        ChangeCategory::AgriculturalExpansion,
        ChangeCategory::SeasonalAgriculture,
        ChangeCategory::UrbanHeatIsland,
        ChangeCategory::WildfireDamage,
        ChangeCategory::NormalVariation,
        ChangeCategory::Unknown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ChangeCategory::IllegalConstruction => "illegal_construction",
            ChangeCategory::IllegalMining => "illegal_mining",
            ChangeCategory::Deforestation => "deforestation",
            ChangeCategory::WaterPollution => "water_pollution",
            ChangeCategory::CoastalErosion => "coastal_erosion",
            ChangeCategory::AlgalBloom => "algal_bloom",
            ChangeCategory::AgriculturalExpansion => "agricultural_expansion",
            ChangeCategory::SeasonalAgriculture => "seasonal_agriculture",
            ChangeCategory::UrbanHeatIsland => "urban_heat_island",
            ChangeCategory::WildfireDamage => "wildfire_damage",
            ChangeCategory::NormalVariation => "normal_variation",
            ChangeCategory::Unknown => "unknown",
        }
    }

    pub fn family(self) -> WeightFamily {
        match self {
            ChangeCategory::IllegalConstruction => WeightFamily::Construction,
            ChangeCategory::IllegalMining | ChangeCategory::Deforestation => {
                WeightFamily::VegetationLoss
            }
            ChangeCategory::WaterPollution | ChangeCategory::AlgalBloom => WeightFamily::WaterChange,
            _ => WeightFamily::Equal,
        }
    }

    /// Base action text, before confidence and seasonal qualifiers
    pub fn recommendation(self) -> &'static str {
        match self {
            ChangeCategory::IllegalConstruction => {
                "High confidence unauthorized construction detected. \
                 Recommend immediate site inspection and enforcement action."
            }
            ChangeCategory::IllegalMining => {
                "Possible illegal mining or quarrying activity detected. \
                 Recommend aerial survey and ground verification."
            }
            ChangeCategory::Deforestation => {
                "Significant vegetation loss detected. \
                 Recommend assessment for illegal logging or land clearing."
            }
            ChangeCategory::WaterPollution => {
                "Water quality degradation detected. \
                 Recommend water sampling and pollutant source investigation."
            }
            ChangeCategory::AlgalBloom => {
                "Algal bloom detected. \
                 Recommend water quality monitoring and public health advisory."
            }
            ChangeCategory::SeasonalAgriculture => {
                "Changes consistent with normal agricultural cycles. \
                 Low priority - continue routine monitoring."
            }
            ChangeCategory::WildfireDamage => {
                "Wildfire or burn damage detected. \
                 Recommend damage assessment and restoration planning."
            }
            ChangeCategory::NormalVariation => {
                "Changes within normal variation range. \
                 No immediate action required - continue monitoring."
            }
            ChangeCategory::Unknown => {
                "Significant change detected but classification uncertain. \
                 Recommend expert review and additional data collection."
            }
            ChangeCategory::CoastalErosion
            | ChangeCategory::AgriculturalExpansion
            | ChangeCategory::UrbanHeatIsland => "Further investigation recommended.",
        }
    }
}

impl fmt::Display for ChangeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        ChangeCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == key)
            .ok_or_else(|| Error::InvalidParameter {
                name: "category",
                value: s.to_string(),
                reason: "unknown change category".into(),
            })
    }
}

/// Ordinal risk of a fusion result
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        };
        f.write_str(s)
    }
}
