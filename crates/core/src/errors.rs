use thiserror::Error;

use crate::domain::approval::ApprovalStepStatus;
use crate::domain::request::Environment;
use crate::domain::ticket::TicketStatus;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid ticket transition from {from:?} to {to:?}")]
    InvalidTicketTransition { from: TicketStatus, to: TicketStatus },
    #[error("approval step `{step_id}` not found on ticket `{ticket_id}`")]
    UnknownApprovalStep { ticket_id: String, step_id: String },
    #[error("approval step `{step_id}` is already {status:?}")]
    StepAlreadyDecided { step_id: String, status: ApprovalStepStatus },
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("change reference `{reference}` could not be resolved")]
    ReferenceNotFound { reference: String },
    #[error("reference resolver unavailable for `{reference}`: {message}")]
    ResolverUnavailable { reference: String, message: String },
    #[error("record `{reference}` is missing required field `{field}`")]
    MissingField { reference: String, field: &'static str },
    #[error("invalid CIDR in `{field}`: `{value}`")]
    InvalidCidr { field: &'static str, value: String },
    #[error("invalid port `{value}`")]
    InvalidPort { value: String },
    #[error("invalid protocol `{value}`")]
    InvalidProtocol { value: String },
    #[error("invalid environment `{value}`")]
    InvalidEnvironment { value: String },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("environment `{value}` is not a recognized enforcement domain")]
    UnknownEnvironment { value: String },
    #[error("resolver returned no enforcement points for {environment}")]
    EmptyPath { environment: Environment },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    UnresolvedPath(#[from] PathError),
    #[error("no rule syntax template for platform `{platform}` point kind `{kind}`")]
    UnsupportedPlatform { platform: String, kind: String },
    #[error("analysis stage `{stage}` timed out")]
    StageTimeout { stage: &'static str },
}

impl PipelineError {
    /// Stage timeouts and resolver outages are transient; every other
    /// pipeline failure reflects bad input and is not retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::StageTimeout { .. } | Self::Parse(ParseError::ResolverUnavailable { .. })
        )
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("ticket `{ticket_id}` not found")]
    TicketNotFound { ticket_id: String },
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("integration failure: {0}")]
    Integration(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl From<ParseError> for ApplicationError {
    fn from(value: ParseError) -> Self {
        Self::Pipeline(PipelineError::from(value))
    }
}

impl From<PathError> for ApplicationError {
    fn from(value: PathError) -> Self {
        Self::Pipeline(PipelineError::from(value))
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The change request could not be processed. Check inputs and try again."
            }
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        match value {
            ApplicationError::Domain(_)
            | ApplicationError::Pipeline(_)
            | ApplicationError::TicketNotFound { .. } => Self::BadRequest {
                message: "request validation failed".to_owned(),
                correlation_id: "unassigned".to_owned(),
            },
            ApplicationError::Persistence(message) | ApplicationError::Integration(message) => {
                Self::ServiceUnavailable { message, correlation_id: "unassigned".to_owned() }
            }
            ApplicationError::Configuration(message) => {
                Self::Internal { message, correlation_id: "unassigned".to_owned() }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{
        ApplicationError, InterfaceError, ParseError, PathError, PipelineError,
    };

    #[test]
    fn pipeline_error_maps_to_bad_request_interface_error() {
        let interface = ApplicationError::from(ParseError::MissingField {
            reference: "SNOW-9".to_owned(),
            field: "port",
        })
        .into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest {
                ref correlation_id,
                ..
            } if correlation_id == "req-1"
        ));
    }

    #[test]
    fn bad_request_has_user_safe_message() {
        let interface = ApplicationError::from(PathError::UnknownEnvironment {
            value: "staging".to_owned(),
        })
        .into_interface("req-2");

        assert_eq!(
            interface.user_message(),
            "The change request could not be processed. Check inputs and try again."
        );
    }

    #[test]
    fn persistence_error_maps_to_service_unavailable() {
        let interface = ApplicationError::Persistence("database lock timeout".to_owned())
            .into_interface("req-3");

        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
    }

    #[test]
    fn stage_timeout_is_retryable_but_bad_input_is_not() {
        assert!(PipelineError::StageTimeout { stage: "path_resolution" }.is_retryable());
        assert!(PipelineError::Parse(ParseError::ResolverUnavailable {
            reference: "SNOW-9".to_owned(),
            message: "socket closed".to_owned(),
        })
        .is_retryable());
        assert!(!PipelineError::Parse(ParseError::InvalidPort { value: "0".to_owned() })
            .is_retryable());
    }
}
