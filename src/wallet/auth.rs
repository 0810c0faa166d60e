//! Authorization capability consumed by the state client
//!
//! Anything that can hand out an account for a state-changing call (a local
//! key file, a browser wallet bridge, a hardware signer) implements
//! [`AuthorizationProvider`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Authorization failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationError {
    #[error("Authorization denied: {0}")]
    Denied(String),
    #[error("No account available")]
    NoAccount,
}

/// An account the holder agreed to act with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub address: String,
    pub public_key: Option<String>,
}

impl Account {
    pub fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
            public_key: None,
        }
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address)
    }
}

/// Grants (or refuses) the active account
///
/// `request_account` may wait on a human for as long as it likes; callers
/// bound it themselves.
#[async_trait]
pub trait AuthorizationProvider: Send + Sync {
    async fn request_account(&self) -> Result<Account, AuthorizationError>;
}
