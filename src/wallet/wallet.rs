//! Local development wallet
//!
//! Holds a single secp256k1 key pair on disk and grants its account to the
//! state client according to an [`ApprovalPolicy`].

use crate::crypto::{KeyError, KeyPair};
use crate::wallet::auth::{Account, AuthorizationError, AuthorizationProvider};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

/// Wallet-related errors
#[derive(Error, Debug)]
pub enum WalletError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Crypto error: {0}")]
    CryptoError(#[from] KeyError),
}

/// Serializable wallet data for persistence
#[derive(Debug, Serialize, Deserialize)]
struct WalletData {
    private_key_hex: String,
    address: String,
    label: Option<String>,
}

/// A pending approval, answered by whoever holds the receiving end
#[derive(Debug)]
pub struct ApprovalRequest {
    pub account: Account,
    pub reply: oneshot::Sender<bool>,
}

/// How the wallet answers account requests
#[derive(Debug, Clone, Default)]
pub enum ApprovalPolicy {
    /// Grant every request
    #[default]
    AutoApprove,
    /// Refuse every request
    Deny,
    /// Forward each request to a human and wait for the answer
    Prompt(mpsc::Sender<ApprovalRequest>),
}

/// A wallet with one key pair
pub struct LocalWallet {
    key_pair: KeyPair,
    /// Optional label for the wallet
    pub label: Option<String>,
    policy: ApprovalPolicy,
    requests: AtomicUsize,
}

impl LocalWallet {
    /// Create a new wallet with a fresh key pair
    pub fn new() -> Self {
        Self::from_key_pair(KeyPair::generate(), None)
    }

    /// Create a wallet with a label
    pub fn with_label(label: &str) -> Self {
        Self::from_key_pair(KeyPair::generate(), Some(label.to_string()))
    }

    /// Import a wallet from a private key
    pub fn from_private_key(private_key_hex: &str) -> Result<Self, WalletError> {
        let key_pair = KeyPair::from_private_key_hex(private_key_hex)?;
        Ok(Self::from_key_pair(key_pair, None))
    }

    fn from_key_pair(key_pair: KeyPair, label: Option<String>) -> Self {
        Self {
            key_pair,
            label,
            policy: ApprovalPolicy::default(),
            requests: AtomicUsize::new(0),
        }
    }

    /// Replace the approval policy
    pub fn with_policy(mut self, policy: ApprovalPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Get the wallet's address
    pub fn address(&self) -> String {
        self.key_pair.address()
    }

    /// The account this wallet grants
    pub fn account(&self) -> Account {
        Account {
            address: self.address(),
            public_key: Some(self.key_pair.public_key_hex()),
        }
    }

    /// Number of account requests received so far
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Save wallet to file
    pub fn save(&self, path: &Path) -> Result<(), WalletError> {
        let data = WalletData {
            private_key_hex: self.key_pair.private_key_hex(),
            address: self.address(),
            label: self.label.clone(),
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&data)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Load wallet from file
    pub fn load(path: &Path) -> Result<Self, WalletError> {
        let json = fs::read_to_string(path)?;
        let data: WalletData = serde_json::from_str(&json)?;

        let mut wallet = Self::from_private_key(&data.private_key_hex)?;
        wallet.label = data.label;
        Ok(wallet)
    }

    /// Load the wallet at `path`, creating and saving a new one if absent
    pub fn load_or_create(path: &Path) -> Result<Self, WalletError> {
        if path.exists() {
            return Self::load(path);
        }

        let wallet = Self::new();
        wallet.save(path)?;
        log::info!("Created wallet {} at {:?}", wallet.address(), path);
        Ok(wallet)
    }

    /// Export wallet info (without private key)
    pub fn export_public_info(&self) -> WalletInfo {
        WalletInfo {
            address: self.address(),
            public_key: self.key_pair.public_key_hex(),
            label: self.label.clone(),
        }
    }
}

impl Default for LocalWallet {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthorizationProvider for LocalWallet {
    async fn request_account(&self) -> Result<Account, AuthorizationError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let account = self.account();

        match &self.policy {
            ApprovalPolicy::AutoApprove => Ok(account),
            ApprovalPolicy::Deny => Err(AuthorizationError::Denied(
                "wallet is set to refuse requests".to_string(),
            )),
            ApprovalPolicy::Prompt(approver) => {
                let (reply, answer) = oneshot::channel();
                let request = ApprovalRequest {
                    account: account.clone(),
                    reply,
                };

                if approver.send(request).await.is_err() {
                    return Err(AuthorizationError::NoAccount);
                }

                match answer.await {
                    Ok(true) => Ok(account),
                    Ok(false) => Err(AuthorizationError::Denied(
                        "request declined by account holder".to_string(),
                    )),
                    Err(_) => Err(AuthorizationError::Denied(
                        "approver went away without answering".to_string(),
                    )),
                }
            }
        }
    }
}

/// Public wallet information (safe to share)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletInfo {
    pub address: String,
    pub public_key: String,
    pub label: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallet_import() {
        let wallet1 = LocalWallet::new();
        let private_key = wallet1.key_pair.private_key_hex();

        let wallet2 = LocalWallet::from_private_key(&private_key).unwrap();
        assert_eq!(wallet1.address(), wallet2.address());
    }

    #[test]
    fn test_wallet_save_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("wallet.json");

        let wallet1 = LocalWallet::with_label("Test Wallet");
        wallet1.save(&path).unwrap();

        let wallet2 = LocalWallet::load(&path).unwrap();
        assert_eq!(wallet1.address(), wallet2.address());
        assert_eq!(wallet1.label, wallet2.label);

        let wallet3 = LocalWallet::load_or_create(&path).unwrap();
        assert_eq!(wallet1.address(), wallet3.address());
    }

    #[tokio::test]
    async fn test_auto_approve_grants_account() {
        let wallet = LocalWallet::new();
        let account = wallet.request_account().await.unwrap();

        assert_eq!(account.address, wallet.address());
        assert!(account.public_key.is_some());
        assert_eq!(wallet.request_count(), 1);
    }

    #[tokio::test]
    async fn test_deny_policy() {
        let wallet = LocalWallet::new().with_policy(ApprovalPolicy::Deny);
        let err = wallet.request_account().await.unwrap_err();
        assert!(matches!(err, AuthorizationError::Denied(_)));
    }

    #[tokio::test]
    async fn test_prompt_policy() {
        let (tx, mut rx) = mpsc::channel(1);
        let wallet = LocalWallet::new().with_policy(ApprovalPolicy::Prompt(tx));

        let approver = tokio::spawn(async move {
            let first = rx.recv().await.unwrap();
            first.reply.send(true).unwrap();
            let second = rx.recv().await.unwrap();
            second.reply.send(false).unwrap();
        });

        assert!(wallet.request_account().await.is_ok());
        assert!(matches!(
            wallet.request_account().await,
            Err(AuthorizationError::Denied(_))
        ));
        approver.await.unwrap();
    }

    #[tokio::test]
    async fn test_prompt_without_approver() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let wallet = LocalWallet::new().with_policy(ApprovalPolicy::Prompt(tx));

        assert_eq!(
            wallet.request_account().await.unwrap_err(),
            AuthorizationError::NoAccount
        );
    }
}
