use serde::{Deserialize, Serialize};

/// Four-value discretization of the numeric risk score. Ordered so that
/// comparisons express "at least this severe".
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Fixed thresholds: 70 and above is critical, 50 high, 30 medium.
    pub fn from_score(score: u8) -> Self {
        match score {
            70.. => Self::Critical,
            50..=69 => Self::High,
            30..=49 => Self::Medium,
            _ => Self::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }

    pub fn recommendation(&self) -> &'static str {
        match self {
            Self::Low => "Low risk. Proceed under standard change controls.",
            Self::Medium => {
                "Moderate risk. Review the flagged findings and implement during a maintenance window."
            }
            Self::High => "High risk. Security review is required before implementation.",
            Self::Critical => {
                "Critical risk. Do not implement until the flagged conflicts are remediated and the full approval chain has signed off."
            }
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorImpact {
    Increase,
    Decrease,
    Neutral,
}

/// A single contribution to the risk score.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskFactor {
    pub name: String,
    pub impact: FactorImpact,
    pub weight: i32,
    pub description: String,
}

/// Computed risk for one ticket.
///
/// Invariant: `score` equals the base weight plus the sum of all factor
/// weights, clamped to [0, 100], and `level` is derived from `score` via
/// `RiskLevel::from_score`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub score: u8,
    pub level: RiskLevel,
    pub factors: Vec<RiskFactor>,
    pub recommendation: String,
}
