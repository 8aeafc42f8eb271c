use anyhow::{Context, Result};

use changegate_core::config::AppConfig;
use changegate_core::domain::approval::ApprovalStepId;
use changegate_core::domain::ticket::TicketId;
use changegate_engine::ImplementationRun;

use super::{build_service, render_ticket};

pub async fn approve(
    config: &AppConfig,
    ticket_id: &str,
    step_id: &str,
    approver: &str,
    comment: Option<String>,
) -> Result<String> {
    let service = build_service(config).await?;
    let ticket = service
        .approve_step(
            &TicketId(ticket_id.to_string()),
            &ApprovalStepId(step_id.to_string()),
            approver,
            comment,
        )
        .await?;
    render_ticket(&ticket, false)
}

pub async fn reject(
    config: &AppConfig,
    ticket_id: &str,
    step_id: &str,
    approver: &str,
    comment: String,
) -> Result<String> {
    let service = build_service(config).await?;
    let ticket = service
        .reject_step(
            &TicketId(ticket_id.to_string()),
            &ApprovalStepId(step_id.to_string()),
            approver,
            comment,
        )
        .await?;
    render_ticket(&ticket, false)
}

pub async fn implement(config: &AppConfig, ticket_id: &str) -> Result<String> {
    let service = build_service(config).await?;
    let run = service.implement(&TicketId(ticket_id.to_string())).await?;
    drive(run).await
}

pub async fn rollback(config: &AppConfig, ticket_id: &str) -> Result<String> {
    let service = build_service(config).await?;
    let run = service.rollback(&TicketId(ticket_id.to_string())).await?;
    drive(run).await
}

/// Stream progress to stdout until the run settles; ctrl-c requests
/// cancellation, which takes effect at the next point boundary.
async fn drive(mut run: ImplementationRun) -> Result<String> {
    loop {
        tokio::select! {
            update = run.progress.recv() => match update {
                Some(update) => println!("[{:>3}%] {}", update.percent, update.message),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                run.cancel.cancel();
                eprintln!("cancellation requested; stopping at the next point boundary");
            }
        }
    }

    let ticket = run.outcome.await.context("implementation task panicked")??;
    render_ticket(&ticket, false)
}
