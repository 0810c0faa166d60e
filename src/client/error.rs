//! Errors returned at the client boundary

use crate::client::state::{ErrorInfo, ErrorKind, ErrorPhase};
use crate::contract::Field;
use crate::gateway::GatewayError;
use crate::wallet::AuthorizationError;
use thiserror::Error;

/// Client errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("Authorization denied: {0}")]
    AuthorizationDenied(String),
    #[error("Account rejected call: {0}")]
    AccountRejectedCall(String),
    #[error("Remote rejected call: {0}")]
    RemoteRejected(String),
    #[error("Remote unavailable: {0}")]
    RemoteUnavailable(String),
    #[error("Operation already in progress on field {0}")]
    OperationInProgress(Field),
    #[error("Cancelled: {0}")]
    Cancelled(String),
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),
    #[error("Unknown field: {0}")]
    UnknownField(String),
    #[error("Invalid inputs for {operation}: {reason}")]
    InvalidInputs { operation: String, reason: String },
}

impl ClientError {
    /// Taxonomy kind, or `None` for request validation errors
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            ClientError::AuthorizationDenied(_) => Some(ErrorKind::AuthorizationDenied),
            ClientError::AccountRejectedCall(_) => Some(ErrorKind::AccountRejectedCall),
            ClientError::RemoteRejected(_) => Some(ErrorKind::RemoteRejected),
            ClientError::RemoteUnavailable(_) => Some(ErrorKind::RemoteUnavailable),
            ClientError::OperationInProgress(_) => Some(ErrorKind::OperationInProgress),
            ClientError::Cancelled(_) => Some(ErrorKind::Cancelled),
            ClientError::UnknownOperation(_)
            | ClientError::UnknownField(_)
            | ClientError::InvalidInputs { .. } => None,
        }
    }

    /// Project into the record stored on a field
    pub fn info(&self, phase: ErrorPhase, operation: &str) -> ErrorInfo {
        let kind = self.kind().unwrap_or(ErrorKind::RemoteRejected);
        ErrorInfo::new(kind, phase, operation, self.to_string())
    }
}

impl From<GatewayError> for ClientError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Unavailable(msg) => ClientError::RemoteUnavailable(msg),
            GatewayError::Rejected(msg) => ClientError::RemoteRejected(msg),
            GatewayError::AccountRejected(msg) => ClientError::AccountRejectedCall(msg),
        }
    }
}

impl From<AuthorizationError> for ClientError {
    fn from(err: AuthorizationError) -> Self {
        ClientError::AuthorizationDenied(err.to_string())
    }
}
