use ipnet::IpNet;
use serde::{Deserialize, Serialize};

use crate::domain::enforcement::EnforcementPoint;
use crate::domain::request::Protocol;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    Allow,
    Deny,
}

impl RuleAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
        }
    }
}

/// The platform-agnostic form of a rule. The rendered syntax for a given
/// enforcement point must reflect every field of this struct exactly.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbstractRule {
    pub source: IpNet,
    pub destination: IpNet,
    pub port: u16,
    pub protocol: Protocol,
    pub action: RuleAction,
}

/// One generated rule per enforcement point: the abstract rule plus the
/// platform-specific syntax. Derived and read-only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleRecommendation {
    pub point: EnforcementPoint,
    pub rule: AbstractRule,
    pub syntax: String,
    /// sha256 of the rendered syntax, recorded when the rule is applied.
    pub fingerprint: String,
}
