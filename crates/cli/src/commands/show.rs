use anyhow::{bail, Result};

use changegate_core::config::AppConfig;
use changegate_core::domain::ticket::{TicketId, TicketStatus};

use super::{build_service, render_ticket};

pub async fn run(config: &AppConfig, ticket_id: &str, json: bool) -> Result<String> {
    let service = build_service(config).await?;
    let ticket = service.get_ticket(&TicketId(ticket_id.to_string())).await?;
    render_ticket(&ticket, json)
}

pub async fn list(config: &AppConfig, status: Option<&str>) -> Result<String> {
    let status = match status {
        Some(raw) => match TicketStatus::parse(raw) {
            Some(status) => Some(status),
            None => bail!("unknown ticket status `{raw}`"),
        },
        None => None,
    };

    let service = build_service(config).await?;
    let tickets = service.list_tickets(status).await?;
    if tickets.is_empty() {
        return Ok("no tickets".to_string());
    }

    let lines: Vec<String> = tickets
        .iter()
        .map(|ticket| {
            format!(
                "{}  {:16} {:>3} ({})  {}",
                ticket.id,
                ticket.status.as_str(),
                ticket.risk.score,
                ticket.risk.level,
                ticket.external_ref
            )
        })
        .collect();
    Ok(lines.join("\n"))
}
