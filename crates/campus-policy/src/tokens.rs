//! Opaque registration and password-reset tokens.
//!
//! The raw token goes out to the user (by the mail collaborator); only
//! its SHA-256 digest is stored, so a leaked user document cannot be
//! replayed.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use sha2::{Digest, Sha256};

const TOKEN_BYTES: usize = 32;

/// Generate a fresh token. Returns `(raw, stored_hash)`.
pub fn issue() -> (String, String) {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    let raw = URL_SAFE_NO_PAD.encode(bytes);
    let hash = hash(&raw);
    (raw, hash)
}

/// Digest a raw token the way [`issue`] stores it.
pub fn hash(raw: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(raw.as_bytes()))
}

/// Constant-shape check of a presented token against the stored hash.
pub fn verify(raw: &str, stored_hash: &str) -> bool {
    hash(raw) == stored_hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_tokens_verify_against_their_hash() {
        let (raw, stored) = issue();
        assert!(verify(&raw, &stored));
        assert!(!verify("not-the-token", &stored));
    }

    #[test]
    fn tokens_are_unique_per_issue() {
        let (a, _) = issue();
        let (b, _) = issue();
        assert_ne!(a, b);
    }
}
