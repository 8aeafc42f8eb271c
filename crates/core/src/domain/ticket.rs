use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::approval::{ApprovalStep, ApprovalStepId, ApprovalStepStatus};
use crate::domain::conflict::ConflictCheck;
use crate::domain::enforcement::{EnforcementPoint, EnforcementPointId};
use crate::domain::request::RuleRequest;
use crate::domain::risk::RiskAssessment;
use crate::domain::rule::RuleRecommendation;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TicketId(pub String);

impl std::fmt::Display for TicketId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Analyzed,
    PendingApproval,
    Approved,
    Implementing,
    Completed,
    Rejected,
    RolledBack,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Analyzed => "analyzed",
            Self::PendingApproval => "pending_approval",
            Self::Approved => "approved",
            Self::Implementing => "implementing",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
            Self::RolledBack => "rolled_back",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "analyzed" => Some(Self::Analyzed),
            "pending_approval" => Some(Self::PendingApproval),
            "approved" => Some(Self::Approved),
            "implementing" => Some(Self::Implementing),
            "completed" => Some(Self::Completed),
            "rejected" => Some(Self::Rejected),
            "rolled_back" => Some(Self::RolledBack),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Rejected | Self::RolledBack)
    }
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketMode {
    Manual,
    Automatic,
}

impl TicketMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Automatic => "automatic",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "manual" => Some(Self::Manual),
            "automatic" => Some(Self::Automatic),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImplementationState {
    InProgress,
    Failed,
    Cancelled,
    Succeeded,
    RolledBack,
}

/// A per-point failure observed during implementation or rollback.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointFailure {
    pub point_id: EnforcementPointId,
    pub message: String,
}

/// The mutable implementation envelope on a ticket. `applied` preserves
/// application order so rollback can walk it in exact reverse.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImplementationRecord {
    pub state: ImplementationState,
    pub applied: Vec<EnforcementPointId>,
    pub failed_point: Option<PointFailure>,
    pub revert_failures: Vec<PointFailure>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Progress emitted after each enforcement point during implement/rollback.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImplementationProgress {
    pub step: String,
    pub percent: u8,
    pub message: String,
}

/// Aggregate root for one change request: an immutable analysis snapshot
/// (request, path, recommendations, risk, conflict check, chain shape) plus
/// a mutable status/approval/implementation envelope.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    pub external_ref: String,
    pub status: TicketStatus,
    pub mode: TicketMode,
    pub request: RuleRequest,
    pub path: Vec<EnforcementPoint>,
    pub recommendations: Vec<RuleRecommendation>,
    pub risk: RiskAssessment,
    pub check: ConflictCheck,
    pub approvals: Vec<ApprovalStep>,
    pub implementation: Option<ImplementationRecord>,
    pub rollback_available: bool,
    pub rollback_plan: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Ticket {
    pub fn all_steps_approved(&self) -> bool {
        self.approvals.iter().all(|step| step.status == ApprovalStepStatus::Approved)
    }

    pub fn step(&self, id: &ApprovalStepId) -> Option<&ApprovalStep> {
        self.approvals.iter().find(|step| &step.id == id)
    }

    pub fn step_mut(&mut self, id: &ApprovalStepId) -> Option<&mut ApprovalStep> {
        self.approvals.iter_mut().find(|step| &step.id == id)
    }

    fn implementation_resolvable(&self) -> bool {
        self.implementation.as_ref().is_some_and(|record| {
            matches!(record.state, ImplementationState::Failed | ImplementationState::Cancelled)
        })
    }

    pub fn can_transition_to(&self, next: TicketStatus) -> bool {
        use TicketStatus::{
            Analyzed, Approved, Completed, Implementing, PendingApproval, Rejected, RolledBack,
        };

        match (self.status, next) {
            (Analyzed, PendingApproval) => true,
            (Analyzed | PendingApproval, Approved) => self.all_steps_approved(),
            (Analyzed | PendingApproval, Rejected) => true,
            (Approved, Implementing) => self.all_steps_approved(),
            (Implementing, Completed) => true,
            (Completed | RolledBack, RolledBack) => self.rollback_available,
            // A partial implementation is resolved by an explicit rollback.
            (Implementing, RolledBack) => self.implementation_resolvable(),
            _ => false,
        }
    }

    pub fn transition_to(&mut self, next: TicketStatus) -> Result<(), DomainError> {
        if self.can_transition_to(next) {
            self.status = next;
            return Ok(());
        }

        Err(DomainError::InvalidTicketTransition { from: self.status, to: next })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use ipnet::IpNet;

    use crate::domain::approval::{ApprovalStep, ApprovalStepId, ApprovalStepStatus};
    use crate::domain::conflict::ConflictCheck;
    use crate::domain::request::{Environment, Protocol, RuleRequest};
    use crate::domain::risk::{RiskAssessment, RiskLevel};
    use crate::errors::DomainError;

    use super::{Ticket, TicketId, TicketMode, TicketStatus};

    fn step(id: &str, status: ApprovalStepStatus) -> ApprovalStep {
        ApprovalStep {
            id: ApprovalStepId(id.to_string()),
            name: "Network engineering review".to_string(),
            approver_role: "network_engineering".to_string(),
            status,
            decided_by: None,
            decided_at: None,
            comment: None,
        }
    }

    fn ticket(status: TicketStatus, approvals: Vec<ApprovalStep>) -> Ticket {
        let now = Utc::now();
        Ticket {
            id: TicketId("CHG-1".to_string()),
            external_ref: "SNOW-100".to_string(),
            status,
            mode: TicketMode::Manual,
            request: RuleRequest {
                source: "10.100.5.0/24".parse::<IpNet>().expect("source cidr"),
                destination: "172.16.20.50/32".parse::<IpNet>().expect("destination cidr"),
                port: 443,
                protocol: Protocol::Tcp,
                environment: Environment::Production,
                description: String::new(),
                justification: String::new(),
            },
            path: Vec::new(),
            recommendations: Vec::new(),
            risk: RiskAssessment {
                score: 47,
                level: RiskLevel::Medium,
                factors: Vec::new(),
                recommendation: RiskLevel::Medium.recommendation().to_string(),
            },
            check: ConflictCheck::default(),
            approvals,
            implementation: None,
            rollback_available: false,
            rollback_plan: None,
            created_by: "ops".to_string(),
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    #[test]
    fn approval_requires_every_step_approved() {
        let mut partial = ticket(
            TicketStatus::PendingApproval,
            vec![step("s1", ApprovalStepStatus::Approved), step("s2", ApprovalStepStatus::Pending)],
        );
        let error = partial
            .transition_to(TicketStatus::Approved)
            .expect_err("partial approval must not advance");
        assert!(matches!(error, DomainError::InvalidTicketTransition { .. }));

        let mut full = ticket(
            TicketStatus::PendingApproval,
            vec![step("s1", ApprovalStepStatus::Approved), step("s2", ApprovalStepStatus::Approved)],
        );
        full.transition_to(TicketStatus::Approved).expect("all approved should advance");
        assert_eq!(full.status, TicketStatus::Approved);
    }

    #[test]
    fn rejection_is_reachable_from_pre_approval_states() {
        for status in [TicketStatus::Analyzed, TicketStatus::PendingApproval] {
            let mut t = ticket(status, vec![step("s1", ApprovalStepStatus::Pending)]);
            t.transition_to(TicketStatus::Rejected).expect("rejection always possible");
            assert!(t.status.is_terminal());
        }
    }

    #[test]
    fn rollback_requires_availability_flag() {
        let mut t = ticket(TicketStatus::Completed, vec![step("s1", ApprovalStepStatus::Approved)]);
        assert!(t.transition_to(TicketStatus::RolledBack).is_err());

        t.rollback_available = true;
        t.transition_to(TicketStatus::RolledBack).expect("rollback with flag set");
    }

    #[test]
    fn ticket_serializes_as_one_self_contained_record() {
        let t = ticket(
            TicketStatus::PendingApproval,
            vec![step("s1", ApprovalStepStatus::Approved), step("s2", ApprovalStepStatus::Pending)],
        );

        let payload = serde_json::to_string(&t).expect("serialize");
        let decoded: Ticket = serde_json::from_str(&payload).expect("deserialize");

        assert_eq!(decoded, t);
        assert!(payload.contains("\"pending_approval\""));
    }

    #[test]
    fn completed_cannot_reenter_implementing() {
        let mut t = ticket(TicketStatus::Completed, vec![step("s1", ApprovalStepStatus::Approved)]);
        let error = t
            .transition_to(TicketStatus::Implementing)
            .expect_err("completed is terminal for implementation");
        assert!(matches!(
            error,
            DomainError::InvalidTicketTransition { from: TicketStatus::Completed, .. }
        ));
    }
}
