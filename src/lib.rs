//! Contract State Client: a reconciling client for a ledger-backed contract
//!
//! The remote counter/message contract is the source of truth. This crate
//! keeps a local cached copy of its fields and reconciles it with the
//! mutations a user submits:
//! - Reads coalesce while a field is already owned by an operation
//! - Mutations are authorized through an [`AuthorizationProvider`], submitted
//!   through a [`RemoteCallGateway`] and confirmed by reading the field back
//! - At most one operation owns a field at a time; a second one fails fast
//! - Failures land in the field's `last_error`, keeping the last good value
//! - Every transition is pushed to subscribers (in-process or over WebSocket)
//!
//! # Example
//!
//! ```rust
//! use contract_state_client::client::ContractStateClient;
//! use contract_state_client::config::ClientConfig;
//! use contract_state_client::contract::{Field, InMemoryLedger};
//! use contract_state_client::wallet::LocalWallet;
//! use std::sync::Arc;
//!
//! let config = ClientConfig::default();
//! let client = ContractStateClient::new(
//!     config.descriptor().unwrap(),
//!     Arc::new(InMemoryLedger::new(&config.contract_address)),
//!     Arc::new(LocalWallet::new()),
//!     &config,
//! );
//!
//! // Nothing has been read yet
//! assert_eq!(client.number().value, 0);
//! assert!(client.snapshot().pending_operations.is_empty());
//! assert!(!client.field_state(Field::Message).is_pending());
//! ```

pub mod api;
pub mod cli;
pub mod client;
pub mod config;
pub mod contract;
pub mod crypto;
pub mod gateway;
pub mod wallet;

// Re-export commonly used types
pub use api::{create_router, ApiState};
pub use client::{
    ClientError, ClientEvent, ClientSnapshot, ContractStateClient, ErrorInfo, ErrorKind,
    FieldState, FieldStatus, MutationOutcome,
};
pub use config::ClientConfig;
pub use contract::{Field, InMemoryLedger, RemoteContractDescriptor, RemoteOperation, Value};
pub use gateway::{GatewayError, Receipt, RemoteCallGateway};
pub use wallet::{Account, AuthorizationError, AuthorizationProvider, LocalWallet};
