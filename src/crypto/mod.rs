//! Cryptographic utilities
//!
//! This module provides:
//! - SHA-256 hashing (transaction hashes, address derivation)
//! - ECDSA key management (secp256k1) for the local wallet

pub mod hash;
pub mod keys;

pub use hash::{sha256, transaction_hash};
pub use keys::{public_key_to_address, KeyError, KeyPair};
