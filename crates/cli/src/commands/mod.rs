pub mod analyze;
pub mod lifecycle;
pub mod seed;
pub mod show;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use changegate_core::audit::{AuditEvent, AuditSink};
use changegate_core::chain::ApprovalChainBuilder;
use changegate_core::config::AppConfig;
use changegate_core::conflicts::ConflictDetector;
use changegate_core::domain::ticket::Ticket;
use changegate_core::pathing::StaticPathResolver;
use changegate_core::risk::RiskScorer;
use changegate_db::repositories::SqlTicketRepository;
use changegate_db::{migrations, seeded_reference_resolver, seeded_rule_store};
use changegate_engine::{
    ChangeRequestService, ExecutorSettings, InstantEnforcementClient, ServiceDeps,
};

/// Audit sink that forwards events to the tracing subscriber.
struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, event: AuditEvent) {
        tracing::info!(
            event_name = %event.event_type,
            ticket_id = event.ticket_id.as_ref().map(|id| id.0.as_str()).unwrap_or("unknown"),
            correlation_id = %event.correlation_id,
            actor = %event.actor,
            "audit event"
        );
    }
}

pub(crate) async fn build_service(config: &AppConfig) -> Result<ChangeRequestService> {
    let pool = changegate_db::connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .with_context(|| format!("connecting to {}", config.database.url))?;
    migrations::run_pending(&pool).await.context("running migrations")?;

    Ok(ChangeRequestService::new(ServiceDeps {
        resolver: Arc::new(seeded_reference_resolver()),
        path_resolver: Arc::new(StaticPathResolver),
        rule_store: Arc::new(seeded_rule_store()),
        tickets: Arc::new(SqlTicketRepository::new(pool)),
        client: Arc::new(InstantEnforcementClient),
        audit: Arc::new(TracingAuditSink),
        detector: ConflictDetector::default(),
        scorer: RiskScorer::default(),
        chain_builder: ApprovalChainBuilder::default(),
        stage_timeout: Duration::from_millis(config.pipeline.stage_timeout_ms),
        executor_settings: ExecutorSettings::from_config(&config.executor),
    }))
}

pub(crate) fn render_ticket(ticket: &Ticket, json: bool) -> Result<String> {
    if json {
        return serde_json::to_string_pretty(ticket).context("serializing ticket");
    }

    let mut lines = Vec::new();
    lines.push(format!("ticket      {}", ticket.id));
    lines.push(format!("reference   {}", ticket.external_ref));
    lines.push(format!("status      {}  (mode: {})", ticket.status, ticket.mode.as_str()));
    lines.push(format!(
        "request     {} -> {} port {}/{} [{}]",
        ticket.request.source,
        ticket.request.destination,
        ticket.request.port,
        ticket.request.protocol,
        ticket.request.environment
    ));
    lines.push(format!(
        "risk        {} ({})  conflicts: {}  warnings: {}",
        ticket.risk.score,
        ticket.risk.level,
        ticket.check.conflicts.len(),
        ticket.check.warnings.len()
    ));
    lines.push(format!("            {}", ticket.risk.recommendation));

    lines.push("path".to_string());
    for (index, point) in ticket.path.iter().enumerate() {
        lines.push(format!(
            "  {}. {} [{} / {}]",
            index + 1,
            point.name,
            point.platform.as_str(),
            point.kind.as_str()
        ));
    }

    lines.push("approvals".to_string());
    for step in &ticket.approvals {
        lines.push(format!(
            "  [{}] {}  ({}, step {})",
            step.status.as_str(),
            step.name,
            step.approver_role,
            step.id
        ));
    }

    if let Some(record) = &ticket.implementation {
        lines.push(format!(
            "implementation  {:?}  applied: {}",
            record.state,
            record.applied.len()
        ));
        if let Some(failure) = &record.failed_point {
            lines.push(format!("  failed at {}: {}", failure.point_id, failure.message));
        }
        for failure in &record.revert_failures {
            lines.push(format!("  failed to revert {}: {}", failure.point_id, failure.message));
        }
    }
    if let Some(plan) = &ticket.rollback_plan {
        lines.push("rollback plan".to_string());
        for line in plan.lines() {
            lines.push(format!("  {line}"));
        }
    }

    Ok(lines.join("\n"))
}
