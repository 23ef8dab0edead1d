//! Persisted deployment state.
//!
//! A deployment's state is the set of per-resource records, keyed by
//! logical name, that the reconcilers read and write.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::StateError;
use crate::resources::{ResourceKind, ResourceRecord};

/// Current version of the state format.
pub const STATE_VERSION: &str = "1.0";

/// The complete deployment state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentState {
    /// State format version.
    pub version: String,
    /// Deployment name.
    pub deployment: String,
    /// Resource records by logical name.
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceRecord>,
    /// When the state was last updated.
    pub last_updated: DateTime<Utc>,
}

impl DeploymentState {
    /// Creates a new empty deployment state.
    #[must_use]
    pub fn new(deployment: &str) -> Self {
        Self {
            version: STATE_VERSION.to_string(),
            deployment: deployment.to_string(),
            resources: BTreeMap::new(),
            last_updated: Utc::now(),
        }
    }

    /// Fails if the state was written by an incompatible format version.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::VersionMismatch`] on a different version.
    pub fn check_version(&self) -> Result<(), StateError> {
        if self.version == STATE_VERSION {
            Ok(())
        } else {
            Err(StateError::VersionMismatch {
                expected: STATE_VERSION.to_string(),
                found: self.version.clone(),
            })
        }
    }

    /// Gets a resource record by logical name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ResourceRecord> {
        self.resources.get(name)
    }

    /// Adds or replaces a resource record.
    pub fn set_resource(&mut self, name: String, record: ResourceRecord) {
        self.resources.insert(name, record);
        self.last_updated = Utc::now();
    }

    /// Removes a resource record by logical name.
    pub fn remove_resource(&mut self, name: &str) -> Option<ResourceRecord> {
        let result = self.resources.remove(name);
        if result.is_some() {
            self.last_updated = Utc::now();
        }
        result
    }

    /// Logical names of the records of one kind.
    #[must_use]
    pub fn names_of(&self, kind: ResourceKind) -> Vec<&str> {
        self.resources
            .iter()
            .filter(|(_, record)| record.kind() == kind)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_remove() {
        let mut state = DeploymentState::new("web");
        let before = state.last_updated;
        state.set_resource(String::from("data"), ResourceRecord::new(ResourceKind::Disk, "data"));
        state.set_resource(String::from("net"), ResourceRecord::new(ResourceKind::Network, "net"));

        assert!(state.last_updated >= before);
        assert_eq!(state.get("data").map(ResourceRecord::kind), Some(ResourceKind::Disk));
        assert_eq!(state.names_of(ResourceKind::Network), vec!["net"]);

        assert!(state.remove_resource("data").is_some());
        assert!(state.remove_resource("data").is_none());
        assert!(state.get("data").is_none());
    }

    #[test]
    fn test_serialized_records_are_kind_tagged() {
        let mut state = DeploymentState::new("web");
        let record = ResourceRecord::new(ResourceKind::HttpHealthCheck, "hc");
        state.set_resource(String::from("hc"), record);

        let json = serde_json::to_value(&state).expect("serialize");
        assert_eq!(json["resources"]["hc"]["type"], "gce-http-health-check");

        let back: DeploymentState = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back.get("hc").map(ResourceRecord::kind), Some(ResourceKind::HttpHealthCheck));
    }

    #[test]
    fn test_version_mismatch() {
        let mut state = DeploymentState::new("web");
        assert!(state.check_version().is_ok());

        state.version = String::from("0.1");
        let err = state.check_version().expect_err("mismatch");
        assert_eq!(err.to_string(), "State version mismatch: expected 1.0, found 0.1");
    }
}
