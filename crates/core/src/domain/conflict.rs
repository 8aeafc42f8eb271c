use ipnet::IpNet;
use serde::{Deserialize, Serialize};

use crate::domain::rule::RuleAction;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    Shadowing,
    Overlap,
    Contradiction,
    Redundancy,
}

impl ConflictType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Shadowing => "shadowing",
            Self::Overlap => "overlap",
            Self::Contradiction => "contradiction",
            Self::Redundancy => "redundancy",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictSeverity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningType {
    BroadRule,
    HighRiskPort,
    CrossEnvironment,
    Compliance,
}

impl WarningType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BroadRule => "broad_rule",
            Self::HighRiskPort => "high_risk_port",
            Self::CrossEnvironment => "cross_environment",
            Self::Compliance => "compliance",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningSeverity {
    Low,
    Medium,
    High,
}

/// A rule already present on the estate, as exposed by the read-only
/// existing-rule lookup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistingRule {
    pub id: String,
    pub cidr: IpNet,
    pub port: Option<u16>,
    pub action: RuleAction,
    pub description: String,
}

/// A detected logical collision between the requested rule and an existing
/// rule.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub conflict_type: ConflictType,
    pub severity: ConflictSeverity,
    pub existing_rule: ExistingRule,
    pub message: String,
    pub remediation: String,
}

/// A risk signal that does not collide with an existing rule but elevates
/// risk.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub warning_type: WarningType,
    pub severity: WarningSeverity,
    pub message: String,
}

/// The full advisory bundle computed once at analysis time and frozen on the
/// ticket.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictCheck {
    pub conflicts: Vec<Conflict>,
    pub warnings: Vec<Warning>,
}

impl ConflictCheck {
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }
}
