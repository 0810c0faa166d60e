//! Remote call gateway
//!
//! The seam between the state client and whatever transport reaches the
//! ledger. Reads need no account; writes carry the authorized account and
//! resolve only once the call is included or has conclusively failed.

use crate::contract::{RemoteOperation, Value};
use crate::wallet::Account;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Gateway failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Transport or provider failure before a result was known
    #[error("Remote unavailable: {0}")]
    Unavailable(String),
    /// Contract-side revert or validation failure
    #[error("Remote rejected call: {0}")]
    Rejected(String),
    /// The account holder declined after the call was dispatched
    #[error("Account rejected call: {0}")]
    AccountRejected(String),
}

/// Inclusion receipt of a state-changing call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub tx_hash: String,
    pub block_number: u64,
    pub from: String,
    pub operation: String,
    /// Whatever the call returned; never treated as proof of new state
    #[serde(default)]
    pub return_data: Vec<Value>,
}

#[async_trait]
pub trait RemoteCallGateway: Send + Sync {
    /// Invoke a read-only operation
    async fn call_read(
        &self,
        operation: &RemoteOperation,
        inputs: &[Value],
    ) -> Result<Vec<Value>, GatewayError>;

    /// Submit a state-changing operation and wait for its inclusion
    async fn call_write(
        &self,
        operation: &RemoteOperation,
        inputs: &[Value],
        account: &Account,
    ) -> Result<Receipt, GatewayError>;
}
