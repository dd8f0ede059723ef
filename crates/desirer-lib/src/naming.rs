//! StatefulSet naming
//!
//! Application names are arbitrary user text while Kubernetes object names
//! must be lowercase DNS labels. The generated name is lossy: uniqueness is
//! carried by the hash suffix and lookups always go through labels.

use crate::models::LrpIdentifier;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Longest `<app>-<space>` prefix kept before the hash suffix
const MAX_PREFIX_LEN: usize = 40;

/// Number of hex characters kept by [`TruncatedSha256Hasher`]
const HASH_LEN: usize = 10;

#[derive(Debug, Error)]
#[error("failed to hash {seed:?}: {reason}")]
pub struct HashError {
    pub seed: String,
    pub reason: String,
}

/// Produces the short suffix that keeps generated names unique
pub trait Hasher: Send + Sync {
    fn hash(&self, seed: &str) -> Result<String, HashError>;
}

/// Lowercase hex SHA-256 digest truncated to ten characters
#[derive(Debug, Clone, Copy, Default)]
pub struct TruncatedSha256Hasher;

impl Hasher for TruncatedSha256Hasher {
    fn hash(&self, seed: &str) -> Result<String, HashError> {
        let digest = Sha256::digest(seed.as_bytes());
        let mut encoded = hex::encode(digest);
        encoded.truncate(HASH_LEN);
        Ok(encoded)
    }
}

/// Keep only `[a-z0-9]` after lowercasing
pub fn sanitize(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect()
}

/// Build the StatefulSet name for an LRP
pub fn stateful_set_name(
    app_name: &str,
    space_name: &str,
    identifier: &LrpIdentifier,
    hasher: &dyn Hasher,
) -> Result<String, HashError> {
    let seed = format!("{}-{}", identifier.guid, identifier.version);
    let hash = hasher.hash(&seed)?;

    let app = sanitize(app_name);
    if app.is_empty() {
        return Ok(format!("{}-{}", identifier.guid, hash));
    }

    let mut prefix = format!("{}-{}", app, space_name).to_lowercase();
    truncate_chars(&mut prefix, MAX_PREFIX_LEN);
    Ok(format!("{}-{}", prefix, hash))
}

fn truncate_chars(s: &mut String, max: usize) {
    if let Some((idx, _)) = s.char_indices().nth(max) {
        s.truncate(idx);
    }
}
