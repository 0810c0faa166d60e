//! Wallet module: accounts and authorization of state-changing calls

pub mod auth;
pub mod wallet;

pub use auth::{Account, AuthorizationError, AuthorizationProvider};
pub use wallet::{ApprovalPolicy, ApprovalRequest, LocalWallet, WalletError, WalletInfo};
