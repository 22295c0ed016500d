//! PKCE (Proof Key for Code Exchange) verification.
//!
//! Implements S256 code challenge verification per RFC 7636, plus the
//! timing-safe comparison used for client secrets.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};

/// Compute `BASE64URL(SHA256(code_verifier))`.
#[must_use]
pub fn s256_challenge(code_verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(code_verifier.as_bytes()))
}

/// Verify a PKCE S256 code challenge against the presented verifier.
#[must_use]
pub fn verify_s256(code_verifier: &str, code_challenge: &str) -> bool {
    digests_match(&s256_challenge(code_verifier), code_challenge)
}

/// Compare two secrets in time independent of where they differ.
///
/// Both sides are hashed first so neither the position of the first
/// mismatch nor the length of the expected value leaks.
#[must_use]
pub fn digests_match(presented: &str, expected: &str) -> bool {
    let presented = Sha256::digest(presented.as_bytes());
    let expected = Sha256::digest(expected.as_bytes());
    presented.iter().zip(expected.iter()).fold(0u8, |acc, (a, b)| acc | (a ^ b)) == 0
}
