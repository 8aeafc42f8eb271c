//! Deterministic seed data for demos and tests: change-request records the
//! reference resolver can serve, the existing-rule estate the conflict
//! detector reads, and a minimal ticket builder for repository tests.

use chrono::Utc;
use ipnet::IpNet;

use changegate_core::conflicts::InMemoryExistingRuleStore;
use changegate_core::domain::conflict::{ConflictCheck, ExistingRule};
use changegate_core::domain::request::{Environment, Protocol, RuleRequest};
use changegate_core::domain::risk::{RiskAssessment, RiskLevel};
use changegate_core::domain::rule::RuleAction;
use changegate_core::domain::ticket::{Ticket, TicketId, TicketMode, TicketStatus};
use changegate_core::intake::{InMemoryReferenceResolver, RawChangeRecord};

/// References served by the seeded resolver.
pub const SEED_REFERENCES: &[&str] = &["SNOW-48213", "SNOW-48214", "SNOW-48215", "SNOW-48216"];

pub fn seed_change_records() -> Vec<RawChangeRecord> {
    vec![
        RawChangeRecord {
            reference: "SNOW-48213".to_string(),
            source: Some("10.100.5.0/24".to_string()),
            destination: Some("172.16.20.50".to_string()),
            port: Some("443".to_string()),
            protocol: Some("tcp".to_string()),
            environment: Some("production".to_string()),
            description: Some("App tier to database listener".to_string()),
            justification: Some("Release 26.3 cutover".to_string()),
        },
        RawChangeRecord {
            reference: "SNOW-48214".to_string(),
            source: Some("192.168.40.0/24".to_string()),
            destination: Some("172.16.30.10".to_string()),
            port: Some("22".to_string()),
            protocol: Some("tcp".to_string()),
            environment: Some("uat".to_string()),
            description: Some("Jump host SSH access for test automation".to_string()),
            justification: Some("Nightly regression runners".to_string()),
        },
        RawChangeRecord {
            reference: "SNOW-48215".to_string(),
            source: Some("10.0.0.0/8".to_string()),
            destination: Some("172.16.40.25".to_string()),
            port: Some("8080".to_string()),
            protocol: Some("tcp".to_string()),
            environment: Some("development".to_string()),
            description: Some("Developer sandbox web tier".to_string()),
            justification: Some("Internal tooling spike".to_string()),
        },
        RawChangeRecord {
            reference: "SNOW-48216".to_string(),
            source: Some("10.200.8.0/24".to_string()),
            destination: Some("172.16.20.60".to_string()),
            port: Some("3389".to_string()),
            protocol: Some("tcp".to_string()),
            environment: Some("production".to_string()),
            description: Some("Lab segment RDP into production bastion".to_string()),
            justification: Some("Vendor troubleshooting session".to_string()),
        },
    ]
}

pub fn seeded_reference_resolver() -> InMemoryReferenceResolver {
    InMemoryReferenceResolver::with_records(seed_change_records())
}

/// The simplified existing-rule estate: blanket deny rules over the reserved
/// supernets that drive the shadowing heuristic.
pub fn seed_existing_rules() -> Vec<ExistingRule> {
    vec![
        ExistingRule {
            id: "deny-corp-user-space".to_string(),
            cidr: "10.100.0.0/16".parse::<IpNet>().expect("seed supernet"),
            port: None,
            action: RuleAction::Deny,
            description: "blanket deny from corporate user space".to_string(),
        },
        ExistingRule {
            id: "deny-lab-space".to_string(),
            cidr: "10.200.0.0/16".parse::<IpNet>().expect("seed supernet"),
            port: None,
            action: RuleAction::Deny,
            description: "blanket deny from lab segments".to_string(),
        },
    ]
}

pub fn seeded_rule_store() -> InMemoryExistingRuleStore {
    InMemoryExistingRuleStore::with_rules(seed_existing_rules())
}

/// Minimal analyzed ticket for repository tests.
pub fn sample_ticket(id: &str, status: TicketStatus) -> Ticket {
    let now = Utc::now();
    Ticket {
        id: TicketId(id.to_string()),
        external_ref: "SNOW-48213".to_string(),
        status,
        mode: TicketMode::Manual,
        request: RuleRequest {
            source: "10.100.5.0/24".parse::<IpNet>().expect("sample source"),
            destination: "172.16.20.50/32".parse::<IpNet>().expect("sample destination"),
            port: 443,
            protocol: Protocol::Tcp,
            environment: Environment::Production,
            description: "App tier to database listener".to_string(),
            justification: "Release 26.3 cutover".to_string(),
        },
        path: Vec::new(),
        recommendations: Vec::new(),
        risk: RiskAssessment {
            score: 47,
            level: RiskLevel::Medium,
            factors: Vec::new(),
            recommendation: RiskLevel::Medium.recommendation().to_string(),
        },
        check: ConflictCheck::default(),
        approvals: Vec::new(),
        implementation: None,
        rollback_available: false,
        rollback_plan: None,
        created_by: "seed".to_string(),
        created_at: now,
        updated_at: now,
        completed_at: None,
    }
}

#[cfg(test)]
mod tests {
    use changegate_core::conflicts::ExistingRuleStore;
    use changegate_core::intake::{ReferenceResolver, RuleRequestParser};

    use super::{seed_change_records, seeded_reference_resolver, seeded_rule_store};

    #[test]
    fn every_seed_record_parses() {
        let parser = RuleRequestParser;
        for record in seed_change_records() {
            parser.parse(&record).expect("seed records must be parseable");
        }
    }

    #[tokio::test]
    async fn seeded_resolver_serves_all_references() {
        let resolver = seeded_reference_resolver();
        for reference in super::SEED_REFERENCES {
            let record = resolver.resolve(reference).await.expect("resolve");
            assert!(record.is_some(), "missing seed record for {reference}");
        }
    }

    #[test]
    fn seeded_store_covers_the_reserved_supernets() {
        let store = seeded_rule_store();
        let inside = "10.100.5.0/24".parse().expect("net");
        assert_eq!(store.covering_rules(&inside).len(), 1);

        let outside = "192.168.40.0/24".parse().expect("net");
        assert!(store.covering_rules(&outside).is_empty());
    }
}
