//! Approval chain derivation.
//!
//! The chain is computed once at ticket creation from a declarative rule
//! table: each row pairs a condition on (risk level, environment) with a
//! step template, and matching rows append their step in table order. The
//! sequence is never reordered or resized afterward.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::approval::{ApprovalStep, ApprovalStepId, ApprovalStepStatus};
use crate::domain::request::Environment;
use crate::domain::risk::RiskLevel;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainCondition {
    Always,
    RiskAtLeast(RiskLevel),
    EnvironmentIs(Environment),
}

impl ChainCondition {
    fn matches(&self, level: RiskLevel, environment: Environment) -> bool {
        match self {
            Self::Always => true,
            Self::RiskAtLeast(threshold) => level >= *threshold,
            Self::EnvironmentIs(target) => environment == *target,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepTemplate {
    pub name: String,
    pub approver_role: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainRule {
    pub condition: ChainCondition,
    pub step: StepTemplate,
}

#[derive(Clone, Debug)]
pub struct ApprovalChainBuilder {
    rules: Vec<ChainRule>,
}

impl ApprovalChainBuilder {
    pub fn new(rules: Vec<ChainRule>) -> Self {
        Self { rules }
    }

    pub fn build(&self, level: RiskLevel, environment: Environment) -> Vec<ApprovalStep> {
        self.rules
            .iter()
            .filter(|rule| rule.condition.matches(level, environment))
            .map(|rule| ApprovalStep {
                id: ApprovalStepId(Uuid::new_v4().to_string()),
                name: rule.step.name.clone(),
                approver_role: rule.step.approver_role.clone(),
                status: ApprovalStepStatus::Pending,
                decided_by: None,
                decided_at: None,
                comment: None,
            })
            .collect()
    }
}

impl Default for ApprovalChainBuilder {
    /// Base network engineering review always, security review for
    /// high/critical risk, change advisory board last for production.
    fn default() -> Self {
        Self::new(vec![
            ChainRule {
                condition: ChainCondition::Always,
                step: StepTemplate {
                    name: "Network engineering review".to_string(),
                    approver_role: "network_engineering".to_string(),
                },
            },
            ChainRule {
                condition: ChainCondition::RiskAtLeast(RiskLevel::High),
                step: StepTemplate {
                    name: "Security architecture review".to_string(),
                    approver_role: "security_review".to_string(),
                },
            },
            ChainRule {
                condition: ChainCondition::EnvironmentIs(Environment::Production),
                step: StepTemplate {
                    name: "Change advisory board".to_string(),
                    approver_role: "cab".to_string(),
                },
            },
        ])
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::request::Environment;
    use crate::domain::risk::RiskLevel;

    use super::ApprovalChainBuilder;

    #[test]
    fn production_always_ends_with_cab() {
        let builder = ApprovalChainBuilder::default();
        for level in [RiskLevel::Low, RiskLevel::Medium, RiskLevel::High, RiskLevel::Critical] {
            let chain = builder.build(level, Environment::Production);
            let last = chain.last().expect("production chain is never empty");
            assert_eq!(last.approver_role, "cab");
        }
    }

    #[test]
    fn high_and_critical_risk_insert_security_review() {
        let builder = ApprovalChainBuilder::default();
        for level in [RiskLevel::High, RiskLevel::Critical] {
            let chain = builder.build(level, Environment::Uat);
            assert!(chain.iter().any(|step| step.approver_role == "security_review"));
        }
        let medium = builder.build(RiskLevel::Medium, Environment::Uat);
        assert!(!medium.iter().any(|step| step.approver_role == "security_review"));
    }

    #[test]
    fn production_and_critical_conditions_compose() {
        let chain = ApprovalChainBuilder::default().build(RiskLevel::Critical, Environment::Production);

        assert_eq!(chain.len(), 3);
        assert_eq!(chain[0].approver_role, "network_engineering");
        assert_eq!(chain[1].approver_role, "security_review");
        assert_eq!(chain[2].approver_role, "cab");
    }

    #[test]
    fn development_low_risk_keeps_only_the_base_step() {
        let chain = ApprovalChainBuilder::default().build(RiskLevel::Low, Environment::Development);

        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].approver_role, "network_engineering");
    }

    #[test]
    fn every_generated_step_starts_pending_with_unique_id() {
        let chain = ApprovalChainBuilder::default().build(RiskLevel::Critical, Environment::Production);

        assert!(chain.iter().all(|step| step.is_pending()));
        assert_ne!(chain[0].id, chain[1].id);
    }
}
