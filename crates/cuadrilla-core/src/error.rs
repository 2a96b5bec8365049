use crate::types::{IncidentId, IncidentStatus};
use crate::workflow::Action;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoginError {
    #[error("login rejected: {0}")]
    InvalidCredentials(String),
    #[error("could not connect to the server")]
    Unreachable,
    #[error("login failed: {0}")]
    Unknown(String),
}

/// Failures of a call through the API gateway
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("session expired")]
    AuthExpired,
    #[error("server unreachable: {0}")]
    Unreachable(String),
    #[error("server answered {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected response: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("a closing comment is required")]
    EmptyComment,
    #[error("a rejection reason is required")]
    EmptyReason,
    #[error("select at least one file")]
    NoFiles,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("cannot {action} incident {id} while it is {status}")]
    IllegalTransition {
        id: IncidentId,
        status: IncidentStatus,
        action: Action,
    },
    #[error("incident {0} already has a request in flight")]
    Busy(IncidentId),
    #[error("session expired")]
    AuthExpired,
    #[error("operation failed: {0}")]
    OperationFailed(ApiError),
    /// The backend applied `applied`; only reading the incident back failed
    #[error("request to {applied} incident {id} went through, but reloading it failed: {source}")]
    Refresh {
        id: IncidentId,
        applied: Action,
        source: ApiError,
    },
}

impl From<ApiError> for WorkflowError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::AuthExpired => WorkflowError::AuthExpired,
            other => WorkflowError::OperationFailed(other),
        }
    }
}
