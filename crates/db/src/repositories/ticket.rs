use sqlx::Row;

use changegate_core::domain::ticket::{Ticket, TicketId, TicketStatus};

use super::{RepositoryError, TicketRepository};
use crate::DbPool;

/// SQLite-backed ticket store. Each ticket is one self-contained row: the
/// full aggregate is embedded as JSON, with status/mode/timestamps lifted
/// into columns for filtering.
pub struct SqlTicketRepository {
    pool: DbPool,
}

impl SqlTicketRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_ticket(row: &sqlx::sqlite::SqliteRow) -> Result<Ticket, RepositoryError> {
    let payload: String =
        row.try_get("payload").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    serde_json::from_str(&payload).map_err(|e| RepositoryError::Decode(e.to_string()))
}

#[async_trait::async_trait]
impl TicketRepository for SqlTicketRepository {
    async fn find_by_id(&self, id: &TicketId) -> Result<Option<Ticket>, RepositoryError> {
        let row = sqlx::query("SELECT payload FROM ticket WHERE id = ?")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_ticket(r)?)),
            None => Ok(None),
        }
    }

    async fn list(&self, status: Option<TicketStatus>) -> Result<Vec<Ticket>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = if let Some(status) = status {
            sqlx::query("SELECT payload FROM ticket WHERE status = ? ORDER BY created_at DESC")
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await?
        } else {
            sqlx::query("SELECT payload FROM ticket ORDER BY created_at DESC")
                .fetch_all(&self.pool)
                .await?
        };

        rows.iter().map(row_to_ticket).collect::<Result<Vec<_>, _>>()
    }

    async fn save(&self, ticket: Ticket) -> Result<(), RepositoryError> {
        let payload =
            serde_json::to_string(&ticket).map_err(|e| RepositoryError::Decode(e.to_string()))?;

        sqlx::query(
            "INSERT INTO ticket (id, external_ref, status, mode, payload, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 external_ref = excluded.external_ref,
                 status = excluded.status,
                 mode = excluded.mode,
                 payload = excluded.payload,
                 updated_at = excluded.updated_at",
        )
        .bind(&ticket.id.0)
        .bind(&ticket.external_ref)
        .bind(ticket.status.as_str())
        .bind(ticket.mode.as_str())
        .bind(&payload)
        .bind(ticket.created_at.to_rfc3339())
        .bind(ticket.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use changegate_core::domain::ticket::{TicketId, TicketStatus};

    use crate::fixtures::sample_ticket;
    use crate::repositories::{SqlTicketRepository, TicketRepository};
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    #[tokio::test]
    async fn save_and_find_by_id_round_trips_the_aggregate() {
        let pool = setup().await;
        let repo = SqlTicketRepository::new(pool);
        let ticket = sample_ticket("CHG-001", TicketStatus::Analyzed);

        repo.save(ticket.clone()).await.expect("save");
        let found = repo
            .find_by_id(&TicketId("CHG-001".to_string()))
            .await
            .expect("find")
            .expect("should exist");

        assert_eq!(found, ticket);
    }

    #[tokio::test]
    async fn list_filters_by_status() {
        let pool = setup().await;
        let repo = SqlTicketRepository::new(pool);

        repo.save(sample_ticket("CHG-001", TicketStatus::Analyzed)).await.expect("save 1");
        repo.save(sample_ticket("CHG-002", TicketStatus::Rejected)).await.expect("save 2");
        repo.save(sample_ticket("CHG-003", TicketStatus::Analyzed)).await.expect("save 3");

        let analyzed = repo.list(Some(TicketStatus::Analyzed)).await.expect("list analyzed");
        assert_eq!(analyzed.len(), 2);

        let all = repo.list(None).await.expect("list all");
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn save_upserts_on_conflict() {
        let pool = setup().await;
        let repo = SqlTicketRepository::new(pool);

        let ticket = sample_ticket("CHG-001", TicketStatus::Analyzed);
        repo.save(ticket.clone()).await.expect("save");

        let mut updated = ticket;
        updated.status = TicketStatus::Rejected;
        repo.save(updated).await.expect("upsert");

        let found = repo
            .find_by_id(&TicketId("CHG-001".to_string()))
            .await
            .expect("find")
            .expect("should exist");
        assert_eq!(found.status, TicketStatus::Rejected);
    }
}
