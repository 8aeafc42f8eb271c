use anyhow::{bail, Result};

use changegate_core::config::AppConfig;
use changegate_core::domain::ticket::TicketMode;

use super::{build_service, render_ticket};

pub async fn run(config: &AppConfig, reference: &str, mode: &str, json: bool) -> Result<String> {
    let Some(mode) = TicketMode::parse(mode) else {
        bail!("unknown mode `{mode}`; expected `manual` or `automatic`");
    };

    let service = build_service(config).await?;
    let ticket = service.process_change_request(reference, mode, "operator").await?;
    render_ticket(&ticket, json)
}
