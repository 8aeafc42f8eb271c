//! Ticket lifecycle operations.
//!
//! Each operation validates the status machine on the ticket, mutates it in
//! place, and reports what happened as a `LifecycleOutcome`. Outcome actions
//! tell the caller what to do next (for automatic-mode tickets, start
//! implementation); the lifecycle itself performs no I/O.

use chrono::Utc;

use crate::domain::approval::{ApprovalStepId, ApprovalStepStatus};
use crate::domain::enforcement::EnforcementPointId;
use crate::domain::ticket::{
    ImplementationRecord, ImplementationState, PointFailure, Ticket, TicketMode, TicketStatus,
};
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LifecycleAction {
    BeginImplementation,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LifecycleOutcome {
    pub from: TicketStatus,
    pub to: TicketStatus,
    pub actions: Vec<LifecycleAction>,
}

#[derive(Clone, Debug, Default)]
pub struct TicketLifecycle;

impl TicketLifecycle {
    /// Approve one step. Never advances the ticket except when this was the
    /// last pending step, in which case the ticket moves to `approved` (and,
    /// for automatic-mode tickets, the outcome asks for implementation).
    pub fn approve_step(
        &self,
        ticket: &mut Ticket,
        step_id: &ApprovalStepId,
        approver: &str,
        comment: Option<String>,
    ) -> Result<LifecycleOutcome, DomainError> {
        self.require_pending_approval_state(ticket, TicketStatus::Approved)?;
        decide_step(ticket, step_id, ApprovalStepStatus::Approved, approver, comment)?;

        let from = ticket.status;
        let mut actions = Vec::new();
        if ticket.all_steps_approved() {
            ticket.transition_to(TicketStatus::Approved)?;
            if ticket.mode == TicketMode::Automatic {
                actions.push(LifecycleAction::BeginImplementation);
            }
        } else if ticket.status == TicketStatus::Analyzed {
            ticket.transition_to(TicketStatus::PendingApproval)?;
        }
        ticket.updated_at = Utc::now();

        Ok(LifecycleOutcome { from, to: ticket.status, actions })
    }

    /// A single step rejection rejects the whole ticket. Remaining steps are
    /// left untouched; the ticket is terminal regardless.
    pub fn reject_step(
        &self,
        ticket: &mut Ticket,
        step_id: &ApprovalStepId,
        approver: &str,
        comment: Option<String>,
    ) -> Result<LifecycleOutcome, DomainError> {
        self.require_pending_approval_state(ticket, TicketStatus::Rejected)?;
        decide_step(ticket, step_id, ApprovalStepStatus::Rejected, approver, comment)?;

        let from = ticket.status;
        ticket.transition_to(TicketStatus::Rejected)?;
        ticket.updated_at = Utc::now();

        Ok(LifecycleOutcome { from, to: ticket.status, actions: Vec::new() })
    }

    pub fn begin_implementation(&self, ticket: &mut Ticket) -> Result<LifecycleOutcome, DomainError> {
        let from = ticket.status;
        ticket.transition_to(TicketStatus::Implementing)?;
        ticket.implementation = Some(ImplementationRecord {
            state: ImplementationState::InProgress,
            applied: Vec::new(),
            failed_point: None,
            revert_failures: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        });
        ticket.updated_at = Utc::now();

        Ok(LifecycleOutcome { from, to: ticket.status, actions: Vec::new() })
    }

    /// Record a fully successful implementation and open the rollback window.
    pub fn complete_implementation(
        &self,
        ticket: &mut Ticket,
        applied: Vec<EnforcementPointId>,
    ) -> Result<LifecycleOutcome, DomainError> {
        let from = ticket.status;
        ticket.transition_to(TicketStatus::Completed)?;

        let record = implementation_mut(ticket)?;
        record.state = ImplementationState::Succeeded;
        record.applied = applied;
        record.finished_at = Some(Utc::now());

        ticket.rollback_plan = Some(render_rollback_plan(ticket));
        ticket.rollback_available = true;
        let now = Utc::now();
        ticket.completed_at = Some(now);
        ticket.updated_at = now;

        Ok(LifecycleOutcome { from, to: ticket.status, actions: Vec::new() })
    }

    /// Record a mid-sequence failure (or a cancellation at a point boundary).
    /// Already-applied points stay in place and the ticket remains in
    /// `implementing` until a human or an explicit rollback resolves it.
    pub fn fail_implementation(
        &self,
        ticket: &mut Ticket,
        applied: Vec<EnforcementPointId>,
        failed_point: Option<PointFailure>,
        cancelled: bool,
    ) -> Result<LifecycleOutcome, DomainError> {
        if ticket.status != TicketStatus::Implementing {
            return Err(DomainError::InvalidTicketTransition {
                from: ticket.status,
                to: TicketStatus::Implementing,
            });
        }

        let has_applied = !applied.is_empty();
        let record = implementation_mut(ticket)?;
        record.state =
            if cancelled { ImplementationState::Cancelled } else { ImplementationState::Failed };
        record.applied = applied;
        record.failed_point = failed_point;
        record.finished_at = Some(Utc::now());

        if has_applied {
            ticket.rollback_plan = Some(render_rollback_plan(ticket));
        }
        ticket.rollback_available = has_applied;
        ticket.updated_at = Utc::now();

        Ok(LifecycleOutcome {
            from: TicketStatus::Implementing,
            to: ticket.status,
            actions: Vec::new(),
        })
    }

    /// Record the result of a rollback pass. Points that failed to revert
    /// remain in the applied list so a later pass can retry them.
    pub fn record_rollback(
        &self,
        ticket: &mut Ticket,
        still_applied: Vec<EnforcementPointId>,
        revert_failures: Vec<PointFailure>,
    ) -> Result<LifecycleOutcome, DomainError> {
        let from = ticket.status;
        ticket.transition_to(TicketStatus::RolledBack)?;

        let record = implementation_mut(ticket)?;
        record.state = ImplementationState::RolledBack;
        record.applied = still_applied;
        record.revert_failures = revert_failures;
        record.finished_at = Some(Utc::now());
        ticket.updated_at = Utc::now();

        Ok(LifecycleOutcome { from, to: ticket.status, actions: Vec::new() })
    }

    fn require_pending_approval_state(
        &self,
        ticket: &Ticket,
        attempted: TicketStatus,
    ) -> Result<(), DomainError> {
        match ticket.status {
            TicketStatus::Analyzed | TicketStatus::PendingApproval => Ok(()),
            from => Err(DomainError::InvalidTicketTransition { from, to: attempted }),
        }
    }
}

fn decide_step(
    ticket: &mut Ticket,
    step_id: &ApprovalStepId,
    decision: ApprovalStepStatus,
    approver: &str,
    comment: Option<String>,
) -> Result<(), DomainError> {
    let ticket_id = ticket.id.0.clone();
    let step = ticket.step_mut(step_id).ok_or_else(|| DomainError::UnknownApprovalStep {
        ticket_id,
        step_id: step_id.0.clone(),
    })?;
    if !step.is_pending() {
        return Err(DomainError::StepAlreadyDecided {
            step_id: step_id.0.clone(),
            status: step.status,
        });
    }

    step.status = decision;
    step.decided_by = Some(approver.to_owned());
    step.decided_at = Some(Utc::now());
    step.comment = comment;
    Ok(())
}

fn implementation_mut(ticket: &mut Ticket) -> Result<&mut ImplementationRecord, DomainError> {
    ticket.implementation.as_mut().ok_or_else(|| {
        DomainError::InvariantViolation("ticket has no implementation record".to_owned())
    })
}

/// Human-readable reversal plan: applied points in reverse application order.
fn render_rollback_plan(ticket: &Ticket) -> String {
    let applied = ticket
        .implementation
        .as_ref()
        .map(|record| record.applied.clone())
        .unwrap_or_default();
    let steps: Vec<String> = applied
        .iter()
        .rev()
        .enumerate()
        .map(|(index, point_id)| {
            let name = ticket
                .path
                .iter()
                .find(|point| &point.id == point_id)
                .map(|point| point.name.as_str())
                .unwrap_or(point_id.0.as_str());
            format!("{}. remove rule from {}", index + 1, name)
        })
        .collect();
    steps.join("\n")
}
