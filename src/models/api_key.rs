//! API key generation and hashing.
//!
//! Every user authenticates with a bearer API key. Keys are stored in
//! `api_keys` as SHA-256 hashes; the plaintext is only returned when the key
//! is issued. A user may own several rows, but rotation deactivates all
//! previous ones.

use sha2::{Digest, Sha256};

/// Hash a plaintext API key into its stored form.
pub fn hash_key(plaintext: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(plaintext.as_bytes());
    hex::encode(hasher.finalize())
}

/// Generate a new plaintext API key: 32 random bytes, hex encoded.
pub fn generate_key() -> String {
    let bytes: [u8; 32] = rand::random();
    format!("lm_{}", hex::encode(bytes))
}
