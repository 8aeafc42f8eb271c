//! Conflict and warning detection.
//!
//! The detector runs a fixed, ordered list of independent predicate rules
//! against the requested change and a read-only view of existing rules.
//! Each rule is independently evaluable and the resulting set does not
//! depend on evaluation order. Heuristic constants (reserved supernets,
//! high-risk ports, broad-prefix threshold) are data on `DetectorConfig`,
//! not code branches.

use ipnet::IpNet;
use serde::{Deserialize, Serialize};

use crate::domain::conflict::{
    Conflict, ConflictCheck, ConflictSeverity, ConflictType, ExistingRule, Warning,
    WarningSeverity, WarningType,
};
use crate::domain::request::{Environment, RuleRequest};
use crate::domain::rule::RuleAction;

/// Tunable heuristics for the built-in rule set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Destination ports that always raise a high-severity warning.
    pub high_risk_ports: Vec<u16>,
    /// Source blocks at or above this breadth (prefix length at or below the
    /// threshold) raise a broad-rule warning.
    pub broad_prefix_threshold: u8,
    /// Supernets considered non-production address space.
    pub nonprod_supernets: Vec<IpNet>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            high_risk_ports: vec![22, 23, 3389, 445, 139],
            broad_prefix_threshold: 16,
            nonprod_supernets: vec!["10.200.0.0/16".parse().expect("builtin supernet")],
        }
    }
}

/// Read-only lookup over the existing rule estate. Must not be written to
/// while an analysis is in flight.
pub trait ExistingRuleStore: Send + Sync {
    /// Rules whose CIDR fully contains the given network.
    fn covering_rules(&self, net: &IpNet) -> Vec<ExistingRule>;
}

#[derive(Clone, Debug, Default)]
pub struct InMemoryExistingRuleStore {
    rules: Vec<ExistingRule>,
}

impl InMemoryExistingRuleStore {
    pub fn with_rules(rules: Vec<ExistingRule>) -> Self {
        Self { rules }
    }
}

impl ExistingRuleStore for InMemoryExistingRuleStore {
    fn covering_rules(&self, net: &IpNet) -> Vec<ExistingRule> {
        self.rules.iter().filter(|rule| rule.cidr.contains(net)).cloned().collect()
    }
}

/// One independent predicate in the detector's rule set.
pub trait ConflictRule: Send + Sync {
    fn name(&self) -> &'static str;
    fn evaluate(
        &self,
        request: &RuleRequest,
        store: &dyn ExistingRuleStore,
        config: &DetectorConfig,
    ) -> Option<Annotation>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Annotation {
    Conflict(Conflict),
    Warning(Warning),
}

/// Fires when the requested source sits inside a broader existing deny rule.
#[derive(Clone, Debug, Default)]
pub struct ShadowingRule;

impl ConflictRule for ShadowingRule {
    fn name(&self) -> &'static str {
        "shadowing"
    }

    fn evaluate(
        &self,
        request: &RuleRequest,
        store: &dyn ExistingRuleStore,
        _config: &DetectorConfig,
    ) -> Option<Annotation> {
        let shadowing = store
            .covering_rules(&request.source)
            .into_iter()
            .find(|rule| {
                rule.action == RuleAction::Deny
                    && rule.cidr.prefix_len() < request.source.prefix_len()
            })?;

        let message = format!(
            "requested source {} is shadowed by broader deny rule `{}` ({})",
            request.source, shadowing.id, shadowing.description
        );
        Some(Annotation::Conflict(Conflict {
            conflict_type: ConflictType::Shadowing,
            severity: ConflictSeverity::Medium,
            message,
            remediation: format!(
                "Narrow the source block or carve an exception out of `{}` before implementing.",
                shadowing.id
            ),
            existing_rule: shadowing,
        }))
    }
}

/// Fires for destination ports on the administrative/lateral-movement list.
#[derive(Clone, Debug, Default)]
pub struct HighRiskPortRule;

impl ConflictRule for HighRiskPortRule {
    fn name(&self) -> &'static str {
        "high_risk_port"
    }

    fn evaluate(
        &self,
        request: &RuleRequest,
        _store: &dyn ExistingRuleStore,
        config: &DetectorConfig,
    ) -> Option<Annotation> {
        if !config.high_risk_ports.contains(&request.port) {
            return None;
        }
        Some(Annotation::Warning(Warning {
            warning_type: WarningType::HighRiskPort,
            severity: WarningSeverity::High,
            message: format!(
                "destination port {} is on the high-risk service list",
                request.port
            ),
        }))
    }
}

/// Fires when the source is a /16 or broader block.
#[derive(Clone, Debug, Default)]
pub struct BroadSourceRule;

impl ConflictRule for BroadSourceRule {
    fn name(&self) -> &'static str {
        "broad_rule"
    }

    fn evaluate(
        &self,
        request: &RuleRequest,
        _store: &dyn ExistingRuleStore,
        config: &DetectorConfig,
    ) -> Option<Annotation> {
        if request.source.prefix_len() > config.broad_prefix_threshold {
            return None;
        }
        Some(Annotation::Warning(Warning {
            warning_type: WarningType::BroadRule,
            severity: WarningSeverity::Medium,
            message: format!(
                "source {} is a /{} block; prefer the narrowest block that covers the clients",
                request.source,
                request.source.prefix_len()
            ),
        }))
    }
}

/// Fires when a production request sources from known non-production space.
#[derive(Clone, Debug, Default)]
pub struct CrossEnvironmentRule;

impl ConflictRule for CrossEnvironmentRule {
    fn name(&self) -> &'static str {
        "cross_environment"
    }

    fn evaluate(
        &self,
        request: &RuleRequest,
        _store: &dyn ExistingRuleStore,
        config: &DetectorConfig,
    ) -> Option<Annotation> {
        if request.environment != Environment::Production {
            return None;
        }
        let supernet =
            config.nonprod_supernets.iter().find(|net| net.contains(&request.source))?;
        Some(Annotation::Warning(Warning {
            warning_type: WarningType::CrossEnvironment,
            severity: WarningSeverity::High,
            message: format!(
                "production rule sources from non-production space {} (within {})",
                request.source, supernet
            ),
        }))
    }
}

pub struct ConflictDetector {
    config: DetectorConfig,
    rules: Vec<Box<dyn ConflictRule>>,
}

impl ConflictDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self::with_rules(
            config,
            vec![
                Box::new(ShadowingRule),
                Box::new(HighRiskPortRule),
                Box::new(BroadSourceRule),
                Box::new(CrossEnvironmentRule),
            ],
        )
    }

    pub fn with_rules(config: DetectorConfig, rules: Vec<Box<dyn ConflictRule>>) -> Self {
        Self { config, rules }
    }

    pub fn detect(&self, request: &RuleRequest, store: &dyn ExistingRuleStore) -> ConflictCheck {
        let mut check = ConflictCheck::default();
        for rule in &self.rules {
            match rule.evaluate(request, store, &self.config) {
                Some(Annotation::Conflict(conflict)) => check.conflicts.push(conflict),
                Some(Annotation::Warning(warning)) => check.warnings.push(warning),
                None => {}
            }
        }
        check
    }
}

impl Default for ConflictDetector {
    fn default() -> Self {
        Self::new(DetectorConfig::default())
    }
}
