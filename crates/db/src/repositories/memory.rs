use std::collections::HashMap;

use tokio::sync::RwLock;

use changegate_core::domain::ticket::{Ticket, TicketId, TicketStatus};

use super::{RepositoryError, TicketRepository};

#[derive(Default)]
pub struct InMemoryTicketRepository {
    tickets: RwLock<HashMap<String, Ticket>>,
}

#[async_trait::async_trait]
impl TicketRepository for InMemoryTicketRepository {
    async fn find_by_id(&self, id: &TicketId) -> Result<Option<Ticket>, RepositoryError> {
        let tickets = self.tickets.read().await;
        Ok(tickets.get(&id.0).cloned())
    }

    async fn list(&self, status: Option<TicketStatus>) -> Result<Vec<Ticket>, RepositoryError> {
        let tickets = self.tickets.read().await;
        let mut matching: Vec<Ticket> = tickets
            .values()
            .filter(|ticket| status.map_or(true, |wanted| ticket.status == wanted))
            .cloned()
            .collect();
        matching.sort_by(|left, right| right.created_at.cmp(&left.created_at));
        Ok(matching)
    }

    async fn save(&self, ticket: Ticket) -> Result<(), RepositoryError> {
        let mut tickets = self.tickets.write().await;
        tickets.insert(ticket.id.0.clone(), ticket);
        Ok(())
    }
}
