// exchange-crypto/src/lib.rs

//! Cryptographic primitives for the exchange core
//!
//! This crate provides:
//! - Hashing (SHA256 for parameter hashes, Blake3 for address derivation)
//! - Ed25519 signatures for permit authorization
//! - Key pair generation and address derivation

pub mod hash;
pub mod keypair;

pub use hash::{Hash, Hashable};
pub use keypair::{Address, KeyPair, PublicKey, SecretKey, Signature};

/// Result type for cryptographic operations
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur during cryptographic operations
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Invalid public key")]
    InvalidPublicKey,

    #[error("Invalid secret key")]
    InvalidSecretKey,

    #[error("Invalid hash")]
    InvalidHash,

    #[error("Deserialization error: {0}")]
    DeserializationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_verify_roundtrip() {
        let keypair = KeyPair::generate();
        let message = b"launch pair 0";
        let signature = keypair.sign(message);
        assert!(keypair.public_key().verify(message, &signature));
    }
}
