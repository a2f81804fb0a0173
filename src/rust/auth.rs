//! Shared-secret authentication for the prediction endpoints.

use sha2::{Digest, Sha256};

/// Source of the secrets accepted in the `x-api-key` header.
pub trait CredentialStore: Send + Sync {
    /// True when `presented` matches one of the accepted secrets.
    fn verify(&self, presented: &str) -> bool;

    /// Number of accepted secrets.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A fixed set of accepted keys, held only as SHA-256 digests.
///
/// Holding more than one key lets a deployment rotate secrets: add the new
/// key, move clients over, then drop the old one.
#[derive(Clone)]
pub struct StaticCredentials {
    digests: Vec<[u8; 32]>,
}

impl std::fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticCredentials")
            .field("keys", &self.digests.len())
            .finish()
    }
}

fn digest(value: &str) -> [u8; 32] {
    Sha256::digest(value.as_bytes()).into()
}

// Compares every byte so timing does not reveal the matching prefix.
fn constant_time_eq(a: &[u8; 32], b: &[u8; 32]) -> bool {
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

impl StaticCredentials {
    /// Accepts the given keys. Blank keys are ignored; at least one must remain.
    pub fn new<I, S>(keys: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let digests: Vec<[u8; 32]> = keys
            .into_iter()
            .map(|k| k.as_ref().trim().to_string())
            .filter(|k| !k.is_empty())
            .map(|k| digest(&k))
            .collect();
        if digests.is_empty() {
            return Err("At least one non-empty API key is required".to_string());
        }
        Ok(Self { digests })
    }

    /// Parses a comma separated key list, as found in `NEUROPATH_API_KEYS`.
    pub fn from_list(raw: &str) -> Result<Self, String> {
        Self::new(raw.split(','))
    }
}

impl CredentialStore for StaticCredentials {
    fn verify(&self, presented: &str) -> bool {
        let presented = digest(presented);
        // No early exit: every stored key is compared.
        self.digests
            .iter()
            .fold(false, |found, stored| constant_time_eq(stored, &presented) | found)
    }

    fn len(&self) -> usize {
        self.digests.len()
    }
}
