//! Contract tests for the deterministic seed dataset: the records the demo
//! resolver serves must stay analyzable and must keep exercising the
//! conflict heuristics they were designed around.

use changegate_core::conflicts::ExistingRuleStore;
use changegate_core::domain::request::Environment;
use changegate_core::domain::rule::RuleAction;
use changegate_core::domain::ticket::TicketStatus;
use changegate_core::intake::RuleRequestParser;
use changegate_db::repositories::{SqlTicketRepository, TicketRepository};
use changegate_db::{
    connect_with_settings, migrations, sample_ticket, seed_change_records, seed_existing_rules,
    seeded_rule_store, SEED_REFERENCES,
};

#[test]
fn references_and_records_stay_in_lockstep() {
    let records = seed_change_records();
    assert_eq!(records.len(), SEED_REFERENCES.len());
    for (reference, record) in SEED_REFERENCES.iter().zip(&records) {
        assert_eq!(&record.reference, reference);
    }
}

#[test]
fn production_seed_exercises_the_shadowing_heuristic() {
    let records = seed_change_records();
    let request = RuleRequestParser.parse(&records[0]).expect("production seed parses");

    assert_eq!(request.environment, Environment::Production);
    assert_eq!(request.port, 443);

    let covering = seeded_rule_store().covering_rules(&request.source);
    assert!(
        covering.iter().any(|rule| rule.action == RuleAction::Deny),
        "production seed source must sit inside a seeded deny supernet"
    );
}

#[test]
fn uat_seed_targets_a_high_risk_port_outside_reserved_space() {
    let records = seed_change_records();
    let request = RuleRequestParser.parse(&records[1]).expect("uat seed parses");

    assert_eq!(request.environment, Environment::Uat);
    assert_eq!(request.port, 22);
    assert!(seeded_rule_store().covering_rules(&request.source).is_empty());
}

#[test]
fn seeded_deny_rules_are_all_denies() {
    for rule in seed_existing_rules() {
        assert_eq!(rule.action, RuleAction::Deny, "seed rule {} must be a deny", rule.id);
    }
}

#[tokio::test]
async fn seeded_tickets_round_trip_through_sqlite() {
    let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
    migrations::run_pending(&pool).await.expect("migrations");
    let repo = SqlTicketRepository::new(pool);

    for (index, status) in
        [TicketStatus::Analyzed, TicketStatus::PendingApproval, TicketStatus::Completed]
            .into_iter()
            .enumerate()
    {
        repo.save(sample_ticket(&format!("CHG-{index}"), status)).await.expect("save");
    }

    let all = repo.list(None).await.expect("list");
    assert_eq!(all.len(), 3);
    let completed = repo.list(Some(TicketStatus::Completed)).await.expect("list completed");
    assert_eq!(completed.len(), 1);
}
