//! Error types for the GCE deployment resources.
//!
//! This module provides the error hierarchy for every stage of an apply:
//! configuration and credentials, persisted state, provider calls, and
//! reconciliation.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the crate.
#[derive(Debug, Error)]
pub enum GceError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// State management errors.
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// Provider API errors.
    #[error("GCE API error: {0}")]
    Provider(#[from] ProviderError),

    /// Reconciliation errors.
    #[error("Reconciliation error: {0}")]
    Reconcile(#[from] ReconcileError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
///
/// All of these are raised before any remote call is made.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// A provider-side resource name does not follow the GCE naming rules.
    #[error(
        "resource name '{name}' must be 1-63 characters long and match the regular expression \
         [a-z]([-a-z0-9]*[a-z0-9])? which means the first character must be a lowercase letter, \
         and all following characters must be a dash, lowercase letter, or digit, except the last \
         character, which cannot be a dash. You may set a different name using the resource 'name' option."
    )]
    InvalidResourceName {
        /// The rejected name.
        name: String,
    },

    /// A credential is missing from both the definition and the environment.
    #[error("please set '{option}' or ${env_var}")]
    MissingCredential {
        /// Config path of the option.
        option: String,
        /// Environment variable consulted as a fallback.
        env_var: String,
    },

    /// A definition tries to change a field that has no update path.
    #[error("cannot change the {property} of a deployed {resource}")]
    ImmutableChange {
        /// Human-readable property name.
        property: String,
        /// Full name of the resource.
        resource: String,
    },

    /// An image reference names a project but neither an image nor a family.
    #[error("Specify image name or image family alongside the project '{project}'..")]
    IncompleteImage {
        /// The project that was given alone.
        project: String,
    },
}

/// State management errors.
#[derive(Debug, Error)]
pub enum StateError {
    /// State is corrupted.
    #[error("State is corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// State could not be written.
    #[error("Failed to write state: {message}")]
    WriteFailed {
        /// Description of the write failure.
        message: String,
    },

    /// Serialization error.
    #[error("State serialization error: {message}")]
    SerializationError {
        /// Description of the serialization error.
        message: String,
    },

    /// State version mismatch.
    #[error("State version mismatch: expected {expected}, found {found}")]
    VersionMismatch {
        /// Expected state version.
        expected: String,
        /// Found state version.
        found: String,
    },
}

/// Errors reported by the provider, distinguished by their reason code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The resource does not exist.
    #[error("resource not found: {resource}")]
    NotFound {
        /// Name or path of the missing resource.
        resource: String,
    },

    /// The resource already exists.
    #[error("resource already exists: {resource}")]
    AlreadyExists {
        /// Name of the existing resource.
        resource: String,
    },

    /// The caller is not allowed to access the resource.
    #[error("forbidden: {message}")]
    Forbidden {
        /// Message returned by the provider.
        message: String,
    },

    /// The project does not exist or the Compute Engine API is disabled.
    #[error("access not configured: {message}")]
    AccessNotConfigured {
        /// Message returned by the provider.
        message: String,
    },

    /// A quota was exceeded.
    #[error("quota exceeded: {message}")]
    QuotaExceeded {
        /// Message returned by the provider.
        message: String,
    },

    /// Any other API failure.
    #[error("{reason}: {message}")]
    Api {
        /// Provider reason code.
        reason: String,
        /// Message returned by the provider.
        message: String,
    },

    /// The connection could not be established.
    #[error("failed to connect: {message}")]
    ConnectionFailed {
        /// Description of the failure.
        message: String,
    },
}

/// Reconciliation errors.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Creation hit an existing resource that the state does not know about.
    #[error("tried creating a {what} that already exists; please run 'deploy --check' to fix this")]
    AlreadyExists {
        /// Kind of resource ("disk", "firewall rule", ...).
        what: String,
    },

    /// An update targeted a resource that is gone.
    #[error("tried updating a {what} that doesn't exist; please run 'deploy --check' to fix this")]
    MissingForUpdate {
        /// Kind of resource.
        what: String,
    },

    /// The operator declined a destructive action.
    #[error("Reconciliation aborted: {reason}")]
    Aborted {
        /// Reason for abort.
        reason: String,
    },

    /// No image exists in the requested family.
    #[error("Image family '{family}' was not found..")]
    ImageFamilyNotFound {
        /// Requested family.
        family: String,
    },

    /// No image with the requested name exists.
    #[error("Image '{image}' was not found..")]
    ImageNotFound {
        /// Requested image.
        image: String,
    },

    /// The image exists but is not shared with the caller.
    #[error("{subject} has not been made public in project '{project}'")]
    ImageNotPublic {
        /// "Image 'x'" or "Image family 'x'".
        subject: String,
        /// Project owning the image.
        project: String,
    },

    /// The image project is missing or misconfigured.
    #[error("Project '{project}' does not exist or the Compute Engine API is disabled")]
    ProjectUnavailable {
        /// The project.
        project: String,
    },

    /// A disk snapshot could not be found.
    #[error("Snapshot '{snapshot}' was not found")]
    SnapshotNotFound {
        /// Requested snapshot.
        snapshot: String,
    },

    /// The provider refused an action.
    #[error("{action} was rejected: {message}")]
    Rejected {
        /// What was being attempted.
        action: String,
        /// Translated provider message.
        message: String,
    },

    /// A same-deployment reference could not be resolved.
    #[error("{kind} '{name}' referenced by {resource} is not deployed")]
    UnresolvedReference {
        /// Kind of the referenced resource.
        kind: String,
        /// Logical name of the referenced resource.
        name: String,
        /// Full name of the referencing resource.
        resource: String,
    },

    /// A definition was applied to a state of another kind.
    #[error("cannot apply a {found} definition to a {expected} resource")]
    KindMismatch {
        /// Kind of the state.
        expected: String,
        /// Kind of the definition.
        found: String,
    },

    /// The definition changed and the resource can only be replaced.
    #[error("{resource} definition changed ({property}); re-run with allow-recreate to replace it")]
    RecreateRequired {
        /// Full name of the resource.
        resource: String,
        /// Changed properties.
        property: String,
    },
}

/// Result type alias for crate operations.
pub type Result<T> = std::result::Result<T, GceError>;

impl GceError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if the error is a provider "not found".
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Provider(ProviderError::NotFound { .. }))
    }

    /// Returns true if the error is a provider "already exists".
    #[must_use]
    pub const fn is_already_exists(&self) -> bool {
        matches!(self, Self::Provider(ProviderError::AlreadyExists { .. }))
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates a validation error without a specific field.
    #[must_use]
    pub fn validation_general(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: None,
        }
    }
}

impl StateError {
    /// Creates a serialization error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }

    /// Creates a write error with the given message.
    #[must_use]
    pub fn write(message: impl Into<String>) -> Self {
        Self::WriteFailed {
            message: message.into(),
        }
    }
}

impl ProviderError {
    /// Builds a provider error from a GCE reason code.
    #[must_use]
    pub fn from_reason(reason: &str, resource: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        match reason {
            "notFound" | "resourceNotFound" => Self::NotFound {
                resource: resource.to_string(),
            },
            "alreadyExists" | "resourceAlreadyExists" | "conflict" => Self::AlreadyExists {
                resource: resource.to_string(),
            },
            "forbidden" => Self::Forbidden { message },
            "accessNotConfigured" => Self::AccessNotConfigured { message },
            "quotaExceeded" | "rateLimitExceeded" => Self::QuotaExceeded { message },
            other => Self::Api {
                reason: other.to_string(),
                message,
            },
        }
    }

    /// Returns the GCE reason code for this error.
    #[must_use]
    pub fn reason(&self) -> &str {
        match self {
            Self::NotFound { .. } => "notFound",
            Self::AlreadyExists { .. } => "alreadyExists",
            Self::Forbidden { .. } => "forbidden",
            Self::AccessNotConfigured { .. } => "accessNotConfigured",
            Self::QuotaExceeded { .. } => "quotaExceeded",
            Self::Api { reason, .. } => reason,
            Self::ConnectionFailed { .. } => "connectionFailed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_round_trip() {
        let reasons = [
            "notFound",
            "alreadyExists",
            "forbidden",
            "accessNotConfigured",
            "quotaExceeded",
        ];
        for reason in reasons {
            let err = ProviderError::from_reason(reason, "x", "msg");
            assert_eq!(err.reason(), reason);
        }

        let other = ProviderError::from_reason("backendError", "x", "boom");
        assert_eq!(other.reason(), "backendError");
        assert_eq!(other.to_string(), "backendError: boom");
    }

    #[test]
    fn test_missing_credential_message() {
        let err = ConfigError::MissingCredential {
            option: String::from("resources.gceDisks.data.project"),
            env_var: String::from("GCE_PROJECT"),
        };
        assert_eq!(
            err.to_string(),
            "please set 'resources.gceDisks.data.project' or $GCE_PROJECT"
        );
    }

    #[test]
    fn test_not_found_predicate() {
        let err: GceError = ProviderError::NotFound {
            resource: String::from("disk"),
        }
        .into();
        assert!(err.is_not_found());
        assert!(!err.is_already_exists());
    }
}
