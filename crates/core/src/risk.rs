//! Risk scoring.
//!
//! The score starts from a fixed base, adds a weight per environment, per
//! conflict severity, and per warning severity, then clamps to [0, 100].
//! Summation is commutative, so the assessment is independent of the order
//! in which conflicts and warnings were detected.

use serde::{Deserialize, Serialize};

use crate::domain::conflict::{ConflictCheck, ConflictSeverity, WarningSeverity};
use crate::domain::request::{Environment, RuleRequest};
use crate::domain::risk::{FactorImpact, RiskAssessment, RiskFactor, RiskLevel};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskWeights {
    pub base: i32,
    pub production: i32,
    pub uat: i32,
    pub development: i32,
    pub conflict_critical: i32,
    pub conflict_high: i32,
    pub conflict_medium: i32,
    pub conflict_low: i32,
    pub warning_high: i32,
    pub warning_medium: i32,
    pub warning_low: i32,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            base: 20,
            production: 15,
            uat: 8,
            development: -5,
            conflict_critical: 25,
            conflict_high: 18,
            conflict_medium: 12,
            conflict_low: 6,
            warning_high: 12,
            warning_medium: 7,
            warning_low: 3,
        }
    }
}

impl RiskWeights {
    fn environment(&self, environment: Environment) -> i32 {
        match environment {
            Environment::Production => self.production,
            Environment::Uat => self.uat,
            Environment::Development => self.development,
        }
    }

    fn conflict(&self, severity: ConflictSeverity) -> i32 {
        match severity {
            ConflictSeverity::Critical => self.conflict_critical,
            ConflictSeverity::High => self.conflict_high,
            ConflictSeverity::Medium => self.conflict_medium,
            ConflictSeverity::Low => self.conflict_low,
        }
    }

    fn warning(&self, severity: WarningSeverity) -> i32 {
        match severity {
            WarningSeverity::High => self.warning_high,
            WarningSeverity::Medium => self.warning_medium,
            WarningSeverity::Low => self.warning_low,
        }
    }
}

#[derive(Clone, Debug)]
pub struct RiskScorer {
    weights: RiskWeights,
    well_known_ports: Vec<u16>,
}

impl RiskScorer {
    pub fn new(weights: RiskWeights) -> Self {
        Self { weights, well_known_ports: vec![25, 53, 80, 110, 143, 443] }
    }

    pub fn assess(&self, request: &RuleRequest, check: &ConflictCheck) -> RiskAssessment {
        let mut factors = Vec::new();

        let environment_weight = self.weights.environment(request.environment);
        factors.push(RiskFactor {
            name: "environment".to_string(),
            impact: impact_of(environment_weight),
            weight: environment_weight,
            description: format!("target environment is {}", request.environment),
        });

        for conflict in &check.conflicts {
            let weight = self.weights.conflict(conflict.severity);
            factors.push(RiskFactor {
                name: conflict.conflict_type.as_str().to_string(),
                impact: impact_of(weight),
                weight,
                description: conflict.message.clone(),
            });
        }

        for warning in &check.warnings {
            let weight = self.weights.warning(warning.severity);
            factors.push(RiskFactor {
                name: warning.warning_type.as_str().to_string(),
                impact: impact_of(weight),
                weight,
                description: warning.message.clone(),
            });
        }

        if self.well_known_ports.contains(&request.port) {
            factors.push(RiskFactor {
                name: "well_known_port".to_string(),
                impact: FactorImpact::Neutral,
                weight: 0,
                description: format!("port {} is a well-known service port", request.port),
            });
        }

        let raw: i32 = self.weights.base + factors.iter().map(|factor| factor.weight).sum::<i32>();
        let score = raw.clamp(0, 100) as u8;
        let level = RiskLevel::from_score(score);

        RiskAssessment {
            score,
            level,
            factors,
            recommendation: level.recommendation().to_string(),
        }
    }
}

impl Default for RiskScorer {
    fn default() -> Self {
        Self::new(RiskWeights::default())
    }
}

fn impact_of(weight: i32) -> FactorImpact {
    match weight {
        0 => FactorImpact::Neutral,
        weight if weight > 0 => FactorImpact::Increase,
        _ => FactorImpact::Decrease,
    }
}

#[cfg(test)]
mod tests {
    use ipnet::IpNet;

    use crate::domain::conflict::{
        Conflict, ConflictCheck, ConflictSeverity, ConflictType, ExistingRule, Warning,
        WarningSeverity, WarningType,
    };
    use crate::domain::request::{Environment, Protocol, RuleRequest};
    use crate::domain::risk::{FactorImpact, RiskLevel};
    use crate::domain::rule::RuleAction;

    use super::RiskScorer;

    fn request(environment: Environment, port: u16) -> RuleRequest {
        RuleRequest {
            source: "10.100.5.0/24".parse::<IpNet>().expect("source"),
            destination: "172.16.20.50/32".parse::<IpNet>().expect("destination"),
            port,
            protocol: Protocol::Tcp,
            environment,
            description: String::new(),
            justification: String::new(),
        }
    }

    fn conflict(severity: ConflictSeverity) -> Conflict {
        Conflict {
            conflict_type: ConflictType::Shadowing,
            severity,
            existing_rule: ExistingRule {
                id: "deny-corp-user-space".to_string(),
                cidr: "10.100.0.0/16".parse::<IpNet>().expect("supernet"),
                port: None,
                action: RuleAction::Deny,
                description: "blanket deny".to_string(),
            },
            message: "shadowed".to_string(),
            remediation: "narrow the source".to_string(),
        }
    }

    fn warning(severity: WarningSeverity) -> Warning {
        Warning {
            warning_type: WarningType::HighRiskPort,
            severity,
            message: "high risk port".to_string(),
        }
    }

    #[test]
    fn score_is_base_plus_factor_sum() {
        let check = ConflictCheck {
            conflicts: vec![conflict(ConflictSeverity::Medium)],
            warnings: vec![warning(WarningSeverity::High)],
        };
        let assessment =
            RiskScorer::default().assess(&request(Environment::Production, 8443), &check);

        // 20 base + 15 production + 12 medium conflict + 12 high warning
        assert_eq!(assessment.score, 59);
        assert_eq!(assessment.level, RiskLevel::High);
        let factor_sum: i32 = assessment.factors.iter().map(|f| f.weight).sum();
        assert_eq!(assessment.score as i32, 20 + factor_sum);
    }

    #[test]
    fn development_environment_lowers_score() {
        let assessment = RiskScorer::default()
            .assess(&request(Environment::Development, 8443), &ConflictCheck::default());

        assert_eq!(assessment.score, 15);
        assert_eq!(assessment.level, RiskLevel::Low);
        assert!(assessment
            .factors
            .iter()
            .any(|f| f.name == "environment" && f.impact == FactorImpact::Decrease));
    }

    #[test]
    fn score_clamps_at_one_hundred() {
        let check = ConflictCheck {
            conflicts: vec![
                conflict(ConflictSeverity::Critical),
                conflict(ConflictSeverity::Critical),
                conflict(ConflictSeverity::Critical),
                conflict(ConflictSeverity::High),
            ],
            warnings: vec![warning(WarningSeverity::High)],
        };
        let assessment =
            RiskScorer::default().assess(&request(Environment::Production, 8443), &check);

        assert_eq!(assessment.score, 100);
        assert_eq!(assessment.level, RiskLevel::Critical);
    }

    #[test]
    fn well_known_port_records_neutral_factor() {
        let assessment = RiskScorer::default()
            .assess(&request(Environment::Uat, 443), &ConflictCheck::default());

        let neutral = assessment
            .factors
            .iter()
            .find(|f| f.name == "well_known_port")
            .expect("port 443 should record an informational factor");
        assert_eq!(neutral.weight, 0);
        assert_eq!(neutral.impact, FactorImpact::Neutral);
        assert_eq!(assessment.score, 28);
    }

    #[test]
    fn recommendation_matches_level() {
        let assessment = RiskScorer::default()
            .assess(&request(Environment::Production, 8443), &ConflictCheck::default());

        assert_eq!(assessment.recommendation, assessment.level.recommendation());
    }
}
