//! Cached field state
//!
//! Each readable contract field is mirrored locally as a [`FieldState`]:
//! the last known good value plus its freshness and, when something went
//! wrong, what it was.

use crate::contract::{Field, Value};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Freshness of a cached value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldStatus {
    /// Never read, or a placeholder
    Stale,
    /// A read or mutation owns the field
    Pending,
    /// Matches the last authoritative read
    Fresh,
    /// The last attempt failed; `value` is the last known good one
    Errored,
}

/// Failure taxonomy surfaced to the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    AuthorizationDenied,
    AccountRejectedCall,
    RemoteRejected,
    RemoteUnavailable,
    OperationInProgress,
    Cancelled,
}

/// Which step of an operation failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPhase {
    /// A plain field read
    Read,
    /// Waiting on the account holder
    Authorization,
    /// The state-changing call itself
    Submission,
    /// The read-after-write following an included call
    Confirmation,
}

/// Serializable record of a failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub phase: ErrorPhase,
    pub operation: String,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl ErrorInfo {
    pub fn new(kind: ErrorKind, phase: ErrorPhase, operation: &str, message: String) -> Self {
        Self {
            kind,
            phase,
            operation: operation.to_string(),
            message,
            at: Utc::now(),
        }
    }

    /// The call went through but its effect could not be read back
    pub fn is_unconfirmed_mutation(&self) -> bool {
        self.phase == ErrorPhase::Confirmation
    }
}

/// Local view of one authoritative value
///
/// `last_error` is `Some` exactly when `status` is `Errored`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldState<T> {
    pub value: T,
    pub status: FieldStatus,
    pub last_error: Option<ErrorInfo>,
    pub updated_at: DateTime<Utc>,
}

impl<T> FieldState<T> {
    /// Placeholder state before the first read
    pub fn stale(value: T) -> Self {
        Self {
            value,
            status: FieldStatus::Stale,
            last_error: None,
            updated_at: Utc::now(),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == FieldStatus::Pending
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> FieldState<U> {
        FieldState {
            value: f(self.value),
            status: self.status,
            last_error: self.last_error,
            updated_at: self.updated_at,
        }
    }

    pub(crate) fn mark_pending(&mut self) {
        self.status = FieldStatus::Pending;
        self.last_error = None;
        self.updated_at = Utc::now();
    }

    pub(crate) fn mark_fresh(&mut self, value: T) {
        self.value = value;
        self.status = FieldStatus::Fresh;
        self.last_error = None;
        self.updated_at = Utc::now();
    }

    /// Record a failure, keeping the last known good value
    pub(crate) fn mark_errored(&mut self, error: ErrorInfo) {
        self.status = FieldStatus::Errored;
        self.last_error = Some(error);
        self.updated_at = Utc::now();
    }

    /// Put back a status observed before a claim
    pub(crate) fn restore(&mut self, status: FieldStatus, last_error: Option<ErrorInfo>) {
        self.status = status;
        self.last_error = last_error;
        self.updated_at = Utc::now();
    }
}

/// What the presentation layer renders
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSnapshot {
    pub contract_address: String,
    pub number: u64,
    pub message: String,
    /// Operations currently in flight (reads and mutations)
    pub pending_operations: BTreeSet<String>,
    pub fields: BTreeMap<Field, FieldState<Value>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_keeps_value() {
        let mut state = FieldState::stale(0u64);
        state.mark_fresh(5);
        state.mark_pending();
        state.mark_errored(ErrorInfo::new(
            ErrorKind::RemoteRejected,
            ErrorPhase::Submission,
            "increaseNumber",
            "reverted".to_string(),
        ));

        assert_eq!(state.value, 5);
        assert_eq!(state.status, FieldStatus::Errored);
        assert!(state.last_error.is_some());

        state.mark_fresh(6);
        assert!(state.last_error.is_none());
    }

    #[test]
    fn test_error_info_serialization() {
        let info = ErrorInfo::new(
            ErrorKind::RemoteUnavailable,
            ErrorPhase::Confirmation,
            "setMessage",
            "timeout".to_string(),
        );
        assert!(info.is_unconfirmed_mutation());

        let json = serde_json::to_string(&info).unwrap();
        assert!(json.contains("RemoteUnavailable"));
        assert!(json.contains("confirmation"));
    }
}
