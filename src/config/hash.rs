//! Definition hashing for change detection.
//!
//! A definition's fingerprint is recorded when it is applied, so the host can
//! tell which resources were last applied from an older definition.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::{GceError, Result, StateError};

/// Hasher for computing definition fingerprints.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefinitionHasher;

impl DefinitionHasher {
    /// Creates a new definition hasher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes the fingerprint of a resource's options.
    ///
    /// The options are hashed through their JSON form. All option maps are
    /// ordered, so equal options always hash equally.
    ///
    /// # Errors
    ///
    /// Returns an error if the options cannot be serialized.
    pub fn hash_options<T: Serialize>(
        &self,
        resource_type: &str,
        name: &str,
        options: &T,
    ) -> Result<String> {
        let encoded = serde_json::to_vec(options).map_err(|e| {
            GceError::State(StateError::serialization(format!(
                "Failed to encode {resource_type}.{name} for hashing: {e}"
            )))
        })?;

        let mut hasher = Sha256::new();
        hasher.update(resource_type.as_bytes());
        hasher.update([0u8]);
        hasher.update(name.as_bytes());
        hasher.update([0u8]);
        hasher.update(&encoded);

        Ok(hex::encode(hasher.finalize()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StaticIpOptions;
    use crate::credentials::CredentialOptions;

    fn options(region: &str) -> StaticIpOptions {
        StaticIpOptions {
            name: None,
            region: region.to_string(),
            ip_address: None,
            credentials: CredentialOptions::default(),
        }
    }

    #[test]
    fn test_hash_deterministic() {
        let hasher = DefinitionHasher::new();
        let a = hasher.hash_options("gceStaticIPs", "ip", &options("europe-west1")).expect("hash");
        let b = hasher.hash_options("gceStaticIPs", "ip", &options("europe-west1")).expect("hash");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_hash_covers_name_and_options() {
        let hasher = DefinitionHasher::new();
        let hash = |name: &str, region: &str| {
            hasher
                .hash_options("gceStaticIPs", name, &options(region))
                .expect("hash")
        };
        let base = hash("ip", "europe-west1");
        let renamed = hash("ip2", "europe-west1");
        let moved = hash("ip", "us-central1");
        assert_ne!(base, renamed);
        assert_ne!(base, moved);
    }
}
