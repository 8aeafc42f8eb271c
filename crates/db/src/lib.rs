pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_with_settings, DbPool};
pub use fixtures::{
    sample_ticket, seed_change_records, seed_existing_rules, seeded_reference_resolver,
    seeded_rule_store, SEED_REFERENCES,
};
pub use repositories::{
    InMemoryTicketRepository, RepositoryError, SqlTicketRepository, TicketRepository,
};
