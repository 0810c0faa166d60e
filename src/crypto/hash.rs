//! Hashing for addresses and transaction ids

use sha2::{Digest, Sha256};

/// SHA-256 digest of `data`
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// `0x`-prefixed id of the `nonce`-th call `from` made to `contract`
pub fn transaction_hash(contract: &str, from: &str, operation: &str, nonce: u64) -> String {
    let mut hasher = Sha256::new();
    for part in [contract, from, operation] {
        hasher.update(part.as_bytes());
        hasher.update(b":");
    }
    hasher.update(nonce.to_be_bytes());
    format!("0x{}", hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256() {
        assert_eq!(
            hex::encode(sha256(b"hello world")),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_transaction_hash_depends_on_nonce() {
        let first = transaction_hash("0xc0", "0xa1", "increaseNumber", 1);
        let second = transaction_hash("0xc0", "0xa1", "increaseNumber", 2);

        assert_ne!(first, second);
        assert_eq!(first.len(), 66);
        assert_eq!(first, transaction_hash("0xc0", "0xa1", "increaseNumber", 1));
    }
}
