pub mod audit;
pub mod chain;
pub mod config;
pub mod conflicts;
pub mod domain;
pub mod errors;
pub mod intake;
pub mod lifecycle;
pub mod pathing;
pub mod risk;
pub mod syntax;

pub use audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink};
pub use chain::{ApprovalChainBuilder, ChainCondition, ChainRule, StepTemplate};
pub use conflicts::{
    Annotation, ConflictDetector, ConflictRule, DetectorConfig, ExistingRuleStore,
    InMemoryExistingRuleStore,
};
pub use domain::approval::{ApprovalStep, ApprovalStepId, ApprovalStepStatus};
pub use domain::conflict::{
    Conflict, ConflictCheck, ConflictSeverity, ConflictType, ExistingRule, Warning,
    WarningSeverity, WarningType,
};
pub use domain::enforcement::{EnforcementKind, EnforcementPoint, EnforcementPointId, Platform};
pub use domain::request::{Environment, Protocol, RuleRequest};
pub use domain::risk::{FactorImpact, RiskAssessment, RiskFactor, RiskLevel};
pub use domain::rule::{AbstractRule, RuleAction, RuleRecommendation};
pub use domain::ticket::{
    ImplementationProgress, ImplementationRecord, ImplementationState, PointFailure, Ticket,
    TicketId, TicketMode, TicketStatus,
};
pub use errors::{
    ApplicationError, DomainError, InterfaceError, ParseError, PathError, PipelineError,
};
pub use intake::{InMemoryReferenceResolver, RawChangeRecord, ReferenceResolver, RuleRequestParser};
pub use lifecycle::{LifecycleAction, LifecycleOutcome, TicketLifecycle};
pub use pathing::{EnforcementPathResolver, StaticPathResolver};
pub use risk::{RiskScorer, RiskWeights};
pub use syntax::{syntax_fingerprint, RuleSyntaxGenerator};
