use async_trait::async_trait;
use thiserror::Error;

use changegate_core::domain::ticket::{Ticket, TicketId, TicketStatus};

pub mod memory;
pub mod ticket;

pub use memory::InMemoryTicketRepository;
pub use ticket::SqlTicketRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

#[async_trait]
pub trait TicketRepository: Send + Sync {
    async fn find_by_id(&self, id: &TicketId) -> Result<Option<Ticket>, RepositoryError>;

    async fn list(&self, status: Option<TicketStatus>) -> Result<Vec<Ticket>, RepositoryError>;

    async fn save(&self, ticket: Ticket) -> Result<(), RepositoryError>;
}
