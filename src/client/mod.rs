//! Contract state client
//!
//! Caches the contract's readable fields, orchestrates authorized mutations
//! and republishes the confirmed state to subscribers.
//!
//! # Example
//!
//! ```rust,no_run
//! use contract_state_client::client::ContractStateClient;
//! use contract_state_client::config::ClientConfig;
//! use contract_state_client::contract::{Field, InMemoryLedger, Value};
//! use contract_state_client::wallet::LocalWallet;
//! use std::sync::Arc;
//!
//! # async fn demo() {
//! let config = ClientConfig::default();
//! let ledger = Arc::new(InMemoryLedger::new(&config.contract_address));
//! let client = ContractStateClient::new(
//!     config.descriptor().unwrap(),
//!     ledger,
//!     Arc::new(LocalWallet::new()),
//!     &config,
//! );
//!
//! client.read_field(Field::Number).await;
//! client.mutate("setMessage", vec![Value::Text("hi".into())]).await.unwrap();
//! println!("{}", client.message().value);
//! # }
//! ```

pub mod client;
pub mod error;
pub mod events;
pub mod state;

pub use client::{ContractStateClient, MutationOutcome, PendingMutation, Timeouts};
pub use error::ClientError;
pub use events::{ClientEvent, EventBroadcaster};
pub use state::{ClientSnapshot, ErrorInfo, ErrorKind, ErrorPhase, FieldState, FieldStatus};
