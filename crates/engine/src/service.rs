//! The change-request service facade.
//!
//! Runs the analysis pipeline as one ordered pass per ticket, drives
//! approval decisions under a per-ticket lock, and owns the long-running
//! implement/rollback operations (spawned tasks that stream progress and
//! settle the ticket's final state when the executor finishes).

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

use changegate_core::audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink};
use changegate_core::chain::ApprovalChainBuilder;
use changegate_core::conflicts::{ConflictDetector, ExistingRuleStore};
use changegate_core::domain::approval::ApprovalStepId;
use changegate_core::domain::ticket::{
    ImplementationProgress, PointFailure, Ticket, TicketId, TicketMode, TicketStatus,
};
use changegate_core::errors::{ApplicationError, DomainError, ParseError, PathError, PipelineError};
use changegate_core::intake::{ReferenceResolver, RuleRequestParser};
use changegate_core::lifecycle::{LifecycleAction, TicketLifecycle};
use changegate_core::pathing::EnforcementPathResolver;
use changegate_core::risk::RiskScorer;
use changegate_core::syntax::RuleSyntaxGenerator;
use changegate_db::repositories::{RepositoryError, TicketRepository};

use crate::client::EnforcementClient;
use crate::executor::{ExecutorSettings, ImplementOutcome, ImplementationExecutor, RollbackReport};

/// Everything the service needs injected. Mock every seam in tests.
pub struct ServiceDeps {
    pub resolver: Arc<dyn ReferenceResolver>,
    pub path_resolver: Arc<dyn EnforcementPathResolver>,
    pub rule_store: Arc<dyn ExistingRuleStore>,
    pub tickets: Arc<dyn TicketRepository>,
    pub client: Arc<dyn EnforcementClient>,
    pub audit: Arc<dyn AuditSink>,
    pub detector: ConflictDetector,
    pub scorer: RiskScorer,
    pub chain_builder: ApprovalChainBuilder,
    pub stage_timeout: Duration,
    pub executor_settings: ExecutorSettings,
}

/// Handle onto a running implement/rollback operation: progress stream,
/// cancellation, and the terminal ticket.
#[derive(Debug)]
pub struct ImplementationRun {
    pub ticket_id: TicketId,
    pub progress: mpsc::Receiver<ImplementationProgress>,
    pub cancel: CancelHandle,
    pub outcome: JoinHandle<Result<Ticket, ApplicationError>>,
}

#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Request cancellation. Takes effect at the next point boundary.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

pub struct ChangeRequestService {
    resolver: Arc<dyn ReferenceResolver>,
    path_resolver: Arc<dyn EnforcementPathResolver>,
    rule_store: Arc<dyn ExistingRuleStore>,
    tickets: Arc<dyn TicketRepository>,
    client: Arc<dyn EnforcementClient>,
    audit: Arc<dyn AuditSink>,
    parser: RuleRequestParser,
    generator: RuleSyntaxGenerator,
    detector: ConflictDetector,
    scorer: RiskScorer,
    chain_builder: ApprovalChainBuilder,
    lifecycle: TicketLifecycle,
    stage_timeout: Duration,
    executor_settings: ExecutorSettings,
    locks: StdMutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl ChangeRequestService {
    pub fn new(deps: ServiceDeps) -> Self {
        Self {
            resolver: deps.resolver,
            path_resolver: deps.path_resolver,
            rule_store: deps.rule_store,
            tickets: deps.tickets,
            client: deps.client,
            audit: deps.audit,
            parser: RuleRequestParser,
            generator: RuleSyntaxGenerator,
            detector: deps.detector,
            scorer: deps.scorer,
            chain_builder: deps.chain_builder,
            lifecycle: TicketLifecycle,
            stage_timeout: deps.stage_timeout,
            executor_settings: deps.executor_settings,
            locks: StdMutex::new(HashMap::new()),
        }
    }

    /// Run the full pipeline once: resolve the reference, parse, resolve the
    /// enforcement path, generate per-point syntax, detect conflicts, score
    /// risk, and derive the approval chain. Input failures surface before a
    /// ticket is created.
    pub async fn process_change_request(
        &self,
        reference: &str,
        mode: TicketMode,
        requested_by: &str,
    ) -> Result<Ticket, ApplicationError> {
        let correlation_id = Uuid::new_v4().to_string();

        let record = tokio::time::timeout(self.stage_timeout, self.resolver.resolve(reference))
            .await
            .map_err(|_| PipelineError::StageTimeout { stage: "reference_resolution" })?
            .map_err(|message| {
                ParseError::ResolverUnavailable { reference: reference.to_owned(), message }
            })?
            .ok_or_else(|| ParseError::ReferenceNotFound { reference: reference.to_owned() })?;

        let request = self.parser.parse(&record)?;

        let path = tokio::time::timeout(
            self.stage_timeout,
            self.path_resolver.resolve(&request.source, &request.destination, request.environment),
        )
        .await
        .map_err(|_| PipelineError::StageTimeout { stage: "path_resolution" })??;
        if path.is_empty() {
            return Err(PathError::EmptyPath { environment: request.environment }.into());
        }

        let recommendations = path
            .iter()
            .map(|point| self.generator.generate(&request, point))
            .collect::<Result<Vec<_>, _>>()?;

        let check = self.detector.detect(&request, self.rule_store.as_ref());
        let risk = self.scorer.assess(&request, &check);
        let approvals = self.chain_builder.build(risk.level, request.environment);

        let now = Utc::now();
        let ticket = Ticket {
            id: TicketId(Uuid::new_v4().to_string()),
            external_ref: reference.to_owned(),
            status: TicketStatus::Analyzed,
            mode,
            request,
            path,
            recommendations,
            risk,
            check,
            approvals,
            implementation: None,
            rollback_available: false,
            rollback_plan: None,
            created_by: requested_by.to_owned(),
            created_at: now,
            updated_at: now,
            completed_at: None,
        };
        self.tickets.save(ticket.clone()).await.map_err(persistence)?;

        self.audit.emit(
            AuditEvent::new(
                Some(ticket.id.clone()),
                correlation_id.clone(),
                "ticket.analyzed",
                AuditCategory::Analysis,
                requested_by,
                AuditOutcome::Success,
            )
            .with_metadata("score", ticket.risk.score.to_string())
            .with_metadata("level", ticket.risk.level.to_string())
            .with_metadata("conflicts", ticket.check.conflicts.len().to_string())
            .with_metadata("approval_steps", ticket.approvals.len().to_string()),
        );
        tracing::info!(
            event_name = "ticket.analyzed",
            ticket_id = %ticket.id,
            correlation_id = %correlation_id,
            risk_level = %ticket.risk.level,
            "change request analyzed"
        );

        Ok(ticket)
    }

    pub async fn get_ticket(&self, ticket_id: &TicketId) -> Result<Ticket, ApplicationError> {
        self.load(ticket_id).await
    }

    pub async fn list_tickets(
        &self,
        status: Option<TicketStatus>,
    ) -> Result<Vec<Ticket>, ApplicationError> {
        self.tickets.list(status).await.map_err(persistence)
    }

    /// Approve one step. The "last pending step advances the ticket" check
    /// runs under the ticket's lock so concurrent decisions cannot
    /// interleave. Automatic-mode tickets start implementing as a detached
    /// side effect of their final approval.
    pub async fn approve_step(
        &self,
        ticket_id: &TicketId,
        step_id: &ApprovalStepId,
        approver: &str,
        comment: Option<String>,
    ) -> Result<Ticket, ApplicationError> {
        let lock = self.lock_for(ticket_id);
        let _guard = lock.lock().await;

        let mut ticket = self.load(ticket_id).await?;
        let outcome = self.lifecycle.approve_step(&mut ticket, step_id, approver, comment)?;
        self.tickets.save(ticket.clone()).await.map_err(persistence)?;

        self.audit.emit(
            AuditEvent::new(
                Some(ticket.id.clone()),
                Uuid::new_v4().to_string(),
                "approval.step_approved",
                AuditCategory::Approval,
                approver,
                AuditOutcome::Success,
            )
            .with_metadata("step_id", step_id.to_string())
            .with_metadata("from", outcome.from.to_string())
            .with_metadata("to", outcome.to.to_string()),
        );

        if outcome.actions.contains(&LifecycleAction::BeginImplementation) {
            // Detached: the automatic run reports through audit/tracing.
            let run = self.start_implementation(&mut ticket).await?;
            drop(run);
        }

        Ok(ticket)
    }

    /// A single rejection makes the whole ticket terminal; the other steps
    /// are left untouched.
    pub async fn reject_step(
        &self,
        ticket_id: &TicketId,
        step_id: &ApprovalStepId,
        approver: &str,
        comment: String,
    ) -> Result<Ticket, ApplicationError> {
        let lock = self.lock_for(ticket_id);
        let _guard = lock.lock().await;

        let mut ticket = self.load(ticket_id).await?;
        let outcome =
            self.lifecycle.reject_step(&mut ticket, step_id, approver, Some(comment))?;
        self.tickets.save(ticket.clone()).await.map_err(persistence)?;

        self.audit.emit(
            AuditEvent::new(
                Some(ticket.id.clone()),
                Uuid::new_v4().to_string(),
                "approval.step_rejected",
                AuditCategory::Approval,
                approver,
                AuditOutcome::Rejected,
            )
            .with_metadata("step_id", step_id.to_string())
            .with_metadata("from", outcome.from.to_string()),
        );

        Ok(ticket)
    }

    /// Explicit implementation trigger (the only way manual-mode tickets
    /// start implementing).
    pub async fn implement(
        &self,
        ticket_id: &TicketId,
    ) -> Result<ImplementationRun, ApplicationError> {
        let lock = self.lock_for(ticket_id);
        let _guard = lock.lock().await;

        let mut ticket = self.load(ticket_id).await?;
        self.start_implementation(&mut ticket).await
    }

    /// Reverse already-applied rules in exact reverse application order.
    /// Legal for completed tickets with rollback available and for tickets
    /// whose implementation failed mid-sequence.
    pub async fn rollback(
        &self,
        ticket_id: &TicketId,
    ) -> Result<ImplementationRun, ApplicationError> {
        let lock = self.lock_for(ticket_id);
        let _guard = lock.lock().await;

        let ticket = self.load(ticket_id).await?;
        if !ticket.can_transition_to(TicketStatus::RolledBack) {
            return Err(DomainError::InvalidTicketTransition {
                from: ticket.status,
                to: TicketStatus::RolledBack,
            }
            .into());
        }

        let applied = ticket
            .implementation
            .as_ref()
            .map(|record| record.applied.clone())
            .unwrap_or_default();

        self.audit.emit(
            AuditEvent::new(
                Some(ticket.id.clone()),
                Uuid::new_v4().to_string(),
                "rollback.started",
                AuditCategory::Rollback,
                "executor",
                AuditOutcome::Success,
            )
            .with_metadata("points_to_revert", applied.len().to_string()),
        );

        let (progress_tx, progress_rx) = mpsc::channel(32);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let executor = ImplementationExecutor::new(self.client.clone(), self.executor_settings);
        let ctx = FinishContext {
            tickets: self.tickets.clone(),
            audit: self.audit.clone(),
            lock: self.lock_for(&ticket.id),
            ticket_id: ticket.id.clone(),
        };
        let recommendations = ticket.recommendations.clone();

        let outcome = tokio::spawn(async move {
            let report =
                executor.rollback(&recommendations, &applied, &progress_tx, &cancel_rx).await;
            finish_rollback(ctx, applied, report).await
        });

        Ok(ImplementationRun {
            ticket_id: ticket.id,
            progress: progress_rx,
            cancel: CancelHandle { tx: cancel_tx },
            outcome,
        })
    }

    /// Transition to implementing, persist, and spawn the executor task.
    /// Callers must hold the ticket lock.
    async fn start_implementation(
        &self,
        ticket: &mut Ticket,
    ) -> Result<ImplementationRun, ApplicationError> {
        self.lifecycle.begin_implementation(ticket)?;
        self.tickets.save(ticket.clone()).await.map_err(persistence)?;

        self.audit.emit(
            AuditEvent::new(
                Some(ticket.id.clone()),
                Uuid::new_v4().to_string(),
                "implementation.started",
                AuditCategory::Implementation,
                "executor",
                AuditOutcome::Success,
            )
            .with_metadata("points", ticket.recommendations.len().to_string())
            .with_metadata("mode", ticket.mode.as_str()),
        );
        tracing::info!(
            event_name = "implementation.started",
            ticket_id = %ticket.id,
            points = ticket.recommendations.len(),
            "implementation sequence started"
        );

        let (progress_tx, progress_rx) = mpsc::channel(32);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let executor = ImplementationExecutor::new(self.client.clone(), self.executor_settings);
        let ctx = FinishContext {
            tickets: self.tickets.clone(),
            audit: self.audit.clone(),
            lock: self.lock_for(&ticket.id),
            ticket_id: ticket.id.clone(),
        };
        let recommendations = ticket.recommendations.clone();

        let outcome = tokio::spawn(async move {
            let report = executor.implement(&recommendations, &progress_tx, &cancel_rx).await;
            finish_implementation(ctx, report.applied, report.outcome).await
        });

        Ok(ImplementationRun {
            ticket_id: ticket.id.clone(),
            progress: progress_rx,
            cancel: CancelHandle { tx: cancel_tx },
            outcome,
        })
    }

    async fn load(&self, ticket_id: &TicketId) -> Result<Ticket, ApplicationError> {
        self.tickets
            .find_by_id(ticket_id)
            .await
            .map_err(persistence)?
            .ok_or_else(|| ApplicationError::TicketNotFound { ticket_id: ticket_id.0.clone() })
    }

    fn lock_for(&self, ticket_id: &TicketId) -> Arc<AsyncMutex<()>> {
        let mut locks = match self.locks.lock() {
            Ok(locks) => locks,
            Err(poisoned) => poisoned.into_inner(),
        };
        locks
            .entry(ticket_id.0.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }
}

struct FinishContext {
    tickets: Arc<dyn TicketRepository>,
    audit: Arc<dyn AuditSink>,
    lock: Arc<AsyncMutex<()>>,
    ticket_id: TicketId,
}

async fn finish_implementation(
    ctx: FinishContext,
    applied: Vec<changegate_core::domain::enforcement::EnforcementPointId>,
    outcome: ImplementOutcome,
) -> Result<Ticket, ApplicationError> {
    let _guard = ctx.lock.lock().await;
    let mut ticket = ctx
        .tickets
        .find_by_id(&ctx.ticket_id)
        .await
        .map_err(persistence)?
        .ok_or_else(|| ApplicationError::TicketNotFound { ticket_id: ctx.ticket_id.0.clone() })?;

    let lifecycle = TicketLifecycle;
    let (event_type, audit_outcome) = match outcome {
        ImplementOutcome::Completed => {
            lifecycle.complete_implementation(&mut ticket, applied)?;
            ("implementation.completed", AuditOutcome::Success)
        }
        ImplementOutcome::Failed { point, message } => {
            tracing::warn!(
                event_name = "implementation.point_failed",
                ticket_id = %ticket.id,
                point_id = %point,
                error = %message,
                "implementation halted at enforcement point"
            );
            lifecycle.fail_implementation(
                &mut ticket,
                applied,
                Some(PointFailure { point_id: point, message }),
                false,
            )?;
            ("implementation.failed", AuditOutcome::Failed)
        }
        ImplementOutcome::Cancelled => {
            lifecycle.fail_implementation(&mut ticket, applied, None, true)?;
            ("implementation.cancelled", AuditOutcome::Rejected)
        }
    };

    ctx.tickets.save(ticket.clone()).await.map_err(persistence)?;
    ctx.audit.emit(
        AuditEvent::new(
            Some(ticket.id.clone()),
            Uuid::new_v4().to_string(),
            event_type,
            AuditCategory::Implementation,
            "executor",
            audit_outcome,
        )
        .with_metadata("status", ticket.status.to_string()),
    );

    Ok(ticket)
}

async fn finish_rollback(
    ctx: FinishContext,
    applied: Vec<changegate_core::domain::enforcement::EnforcementPointId>,
    report: RollbackReport,
) -> Result<Ticket, ApplicationError> {
    let _guard = ctx.lock.lock().await;
    let mut ticket = ctx
        .tickets
        .find_by_id(&ctx.ticket_id)
        .await
        .map_err(persistence)?
        .ok_or_else(|| ApplicationError::TicketNotFound { ticket_id: ctx.ticket_id.0.clone() })?;

    let still_applied: Vec<_> =
        applied.into_iter().filter(|point| !report.reverted.contains(point)).collect();
    let failure_count = report.failures.len();

    TicketLifecycle.record_rollback(&mut ticket, still_applied, report.failures)?;
    ctx.tickets.save(ticket.clone()).await.map_err(persistence)?;

    ctx.audit.emit(
        AuditEvent::new(
            Some(ticket.id.clone()),
            Uuid::new_v4().to_string(),
            "rollback.recorded",
            AuditCategory::Rollback,
            "executor",
            if failure_count == 0 { AuditOutcome::Success } else { AuditOutcome::Failed },
        )
        .with_metadata("reverted", report.reverted.len().to_string())
        .with_metadata("revert_failures", failure_count.to_string()),
    );

    Ok(ticket)
}

fn persistence(error: RepositoryError) -> ApplicationError {
    ApplicationError::Persistence(error.to_string())
}
