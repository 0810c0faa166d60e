//! Contract module
//!
//! Describes the remote counter/message contract and provides a local,
//! in-memory deployment of it.
//!
//! # Example
//!
//! ```rust
//! use contract_state_client::contract::{Field, RemoteContractDescriptor};
//!
//! let descriptor = RemoteContractDescriptor::counter_message("0x0f56");
//! assert_eq!(descriptor.affected_fields("setMessage"), vec![Field::Message]);
//! ```

pub mod descriptor;
pub mod ledger;

pub use descriptor::{
    DescriptorError, Field, FieldBinding, Mutability, Param, ParamType, RemoteContractDescriptor,
    RemoteOperation, Value, COUNTER_MESSAGE_ABI,
};
pub use ledger::{InMemoryLedger, LedgerError, LedgerState};
