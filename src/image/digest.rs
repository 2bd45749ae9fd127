//! Digest validation for `name@algorithm:hex` references
//!
//! Only the shape of a digest is checked here; content verification belongs to
//! the transfer layer.

use crate::error::{ResolverError, Result};

/// Utilities for working with content digests in references
pub struct DigestUtils;

impl DigestUtils {
    /// Expected decoded length in bytes for the algorithms we know about
    fn expected_len(algorithm: &str) -> Option<usize> {
        match algorithm {
            "sha256" => Some(32),
            "sha384" => Some(48),
            "sha512" => Some(64),
            _ => None,
        }
    }

    fn is_valid_algorithm(algorithm: &str) -> bool {
        !algorithm.is_empty()
            && algorithm.starts_with(|c: char| c.is_ascii_lowercase())
            && algorithm
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '+' | '.' | '_' | '-'))
    }

    /// Validate a full digest (`algorithm:hex`)
    pub fn validate(digest: &str) -> Result<()> {
        let (algorithm, encoded) = digest.split_once(':').ok_or_else(|| {
            ResolverError::InvalidReference(format!(
                "invalid digest '{}': expected algorithm:hex",
                digest
            ))
        })?;

        if !Self::is_valid_algorithm(algorithm) {
            return Err(ResolverError::InvalidReference(format!(
                "invalid digest algorithm '{}'",
                algorithm
            )));
        }

        let bytes = hex::decode(encoded).map_err(|e| {
            ResolverError::InvalidReference(format!("invalid digest '{}': {}", digest, e))
        })?;

        if bytes.is_empty() {
            return Err(ResolverError::InvalidReference(format!(
                "invalid digest '{}': empty hex part",
                digest
            )));
        }

        if let Some(expected) = Self::expected_len(algorithm) {
            if bytes.len() != expected {
                return Err(ResolverError::InvalidReference(format!(
                    "invalid {} digest length: expected {} hex characters, got {}",
                    algorithm,
                    expected * 2,
                    encoded.len()
                )));
            }
        }

        Ok(())
    }

    pub fn is_valid(digest: &str) -> bool {
        Self::validate(digest).is_ok()
    }
}
