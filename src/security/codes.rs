use anyhow::{Result, anyhow};
use rand::{Rng, RngCore};

use super::{calculate_hmac, generate_encryption_key, verify_hmac};

/// Smallest code handed out. Codes never start with a zero.
pub const CODE_MIN: u32 = 100_000;
/// Largest code handed out
pub const CODE_MAX: u32 = 999_999;
/// Number of digits in a verification code
pub const CODE_DIGITS: usize = 6;

const TOKEN_BYTES: usize = 32;

/// Draw a 6-digit verification code from `rng`
pub fn generate_verification_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    rng.gen_range(CODE_MIN..=CODE_MAX).to_string()
}

/// Draw a hex-encoded 256-bit verification token from `rng`
pub fn generate_verification_token<R: RngCore + ?Sized>(rng: &mut R) -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Whether `input` has the shape of a verification code
pub fn is_well_formed_code(input: &str) -> bool {
    input.len() == CODE_DIGITS && input.chars().all(|c| c.is_ascii_digit())
}

/// Keyed comparison of secrets.
///
/// Both sides are run through HMAC-SHA256 and the tags are compared with
/// `verify_slice`, so the time taken does not depend on where the first
/// differing character sits.
pub struct CodeVerifier {
    key: [u8; 32],
}

impl CodeVerifier {
    pub fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Verifier with a throwaway key, for values that never outlive the process
    pub fn random() -> Self {
        Self { key: generate_encryption_key() }
    }

    /// Hex digest of `value`, safe to persist in place of the value itself
    pub fn digest(&self, value: &str) -> Result<String> {
        Ok(hex::encode(calculate_hmac(value.as_bytes(), &self.key)?))
    }

    /// Compare a stored secret with user input
    pub fn matches(&self, expected: &str, candidate: &str) -> Result<bool> {
        let expected_tag = calculate_hmac(expected.as_bytes(), &self.key)?;
        verify_hmac(candidate.as_bytes(), &self.key, &expected_tag)
    }

    /// Compare user input with a digest produced by [`CodeVerifier::digest`]
    pub fn matches_digest(&self, candidate: &str, digest_hex: &str) -> Result<bool> {
        let expected_tag = hex::decode(digest_hex)
            .map_err(|e| anyhow!("Stored digest is not valid hex: {}", e))?;
        verify_hmac(candidate.as_bytes(), &self.key, &expected_tag)
    }
}
