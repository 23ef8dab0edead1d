//! Configuration validation for GCE deployments.
//!
//! This module checks a parsed configuration as a whole before any resource
//! is reconciled. Per-resource checks also run when definitions are built,
//! through the helpers exported here.

use crate::error::{ConfigError, GceError, Result};
use std::collections::BTreeMap;
use tracing::debug;

use super::spec::{DeployConfig, DiskOptions, HttpHealthCheckOptions, NetworkOptions};

/// Maximum length of a provider-side resource name.
pub const MAX_NAME_LEN: usize = 63;

/// Validator for deployment configurations.
#[derive(Debug, Default)]
pub struct ConfigValidator;

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a deployment configuration.
    ///
    /// # Errors
    ///
    /// Returns the first error found as a [`ConfigError::ValidationError`].
    pub fn validate(&self, config: &DeployConfig) -> Result<ValidationResult> {
        let mut result = ValidationResult::default();
        let res = &config.resources;

        Self::validate_names(
            "gceDisks",
            res.disks.iter().map(|(k, v)| (k, v.name.as_ref())),
            &mut result,
        );
        Self::validate_names(
            "gceNetworks",
            res.networks.iter().map(|(k, v)| (k, v.name.as_ref())),
            &mut result,
        );
        Self::validate_names(
            "gceImages",
            res.images.iter().map(|(k, v)| (k, v.name.as_ref())),
            &mut result,
        );
        Self::validate_names(
            "gceStaticIPs",
            res.static_ips.iter().map(|(k, v)| (k, v.name.as_ref())),
            &mut result,
        );
        Self::validate_names(
            "gceForwardingRules",
            res.forwarding_rules.iter().map(|(k, v)| (k, v.name.as_ref())),
            &mut result,
        );
        Self::validate_names(
            "gceHTTPHealthChecks",
            res.http_health_checks.iter().map(|(k, v)| (k, v.name.as_ref())),
            &mut result,
        );
        Self::validate_names(
            "gceTargetPools",
            res.target_pools.iter().map(|(k, v)| (k, v.name.as_ref())),
            &mut result,
        );
        Self::validate_names(
            "gceRoutes",
            res.routes.iter().map(|(k, v)| (k, v.name.as_ref())),
            &mut result,
        );
        Self::validate_names(
            "gseBuckets",
            res.buckets.iter().map(|(k, v)| (k, v.name.as_ref())),
            &mut result,
        );

        for (name, disk) in &res.disks {
            Self::validate_disk(name, disk, &mut result);
        }
        for (name, network) in &res.networks {
            Self::validate_network(name, network, &mut result);
        }
        for (name, check) in &res.http_health_checks {
            Self::validate_health_check(name, check, &mut result);
        }
        for (name, pool) in &res.target_pools {
            if pool.machines.is_empty() {
                result
                    .warnings
                    .push(format!("Target pool '{name}' has no machines"));
            }
        }

        if result.errors.is_empty() {
            debug!("Configuration validation passed");
            Ok(result)
        } else {
            let first_error = &result.errors[0];
            Err(GceError::Config(ConfigError::ValidationError {
                message: first_error.message.clone(),
                field: Some(first_error.field.clone()),
            }))
        }
    }

    /// Checks provider names for validity and uniqueness within one type.
    fn validate_names<'a>(
        resource_type: &str,
        entries: impl Iterator<Item = (&'a String, Option<&'a String>)>,
        result: &mut ValidationResult,
    ) {
        let mut seen: BTreeMap<&str, &str> = BTreeMap::new();

        for (logical, declared) in entries {
            let name = declared.unwrap_or(logical);
            let field = format!("resources.{resource_type}.{logical}.name");

            if !is_valid_resource_name(name) {
                result.errors.push(ValidationError {
                    field: field.clone(),
                    message: format!("resource name '{name}' is not a valid GCE name"),
                });
            }

            if let Some(other) = seen.insert(name, logical) {
                result.errors.push(ValidationError {
                    field,
                    message: format!("'{logical}' and '{other}' both use the name '{name}'"),
                });
            }
        }
    }

    fn validate_disk(name: &str, disk: &DiskOptions, result: &mut ValidationResult) {
        let field = format!("resources.gceDisks.{name}");
        let has_image = disk.image.name.is_some() || disk.image.family.is_some();

        if disk.snapshot.is_some() && has_image {
            result.errors.push(ValidationError {
                field: format!("{field}.snapshot"),
                message: String::from("a disk cannot be created from both a snapshot and an image"),
            });
        }
        if disk.image.project.is_some() && !has_image {
            result.errors.push(ValidationError {
                field: format!("{field}.image"),
                message: String::from("image project given without an image name or family"),
            });
        }
        if disk.size == Some(0) {
            result.errors.push(ValidationError {
                field: format!("{field}.size"),
                message: String::from("size must be a positive integer"),
            });
        }
        if disk.size.is_none() && disk.snapshot.is_none() && !has_image {
            result.warnings.push(format!(
                "Disk '{name}' has no size, snapshot or image; the provider default size will be used"
            ));
        }
    }

    fn validate_network(name: &str, network: &NetworkOptions, result: &mut ValidationResult) {
        for (rule, fw) in &network.firewall {
            let field = format!("resources.gceNetworks.{name}.firewall.{rule}");
            if fw.allowed.is_empty() {
                result.errors.push(ValidationError {
                    field: format!("{field}.allowed"),
                    message: format!(
                        "Firewall rule '{rule}' must provide at least one protocol/port specification"
                    ),
                });
            }
            if fw.source_ranges.as_ref().is_some_and(Vec::is_empty) && fw.source_tags.is_empty() {
                result.warnings.push(format!(
                    "Firewall rule '{rule}' has no sources; it will allow 0.0.0.0/0"
                ));
            }
        }
    }

    fn validate_health_check(
        name: &str,
        check: &HttpHealthCheckOptions,
        result: &mut ValidationResult,
    ) {
        let field = format!("resources.gceHTTPHealthChecks.{name}");
        let positives = [
            ("port", u32::from(check.port)),
            ("checkInterval", check.check_interval),
            ("timeout", check.timeout),
            ("healthyThreshold", check.healthy_threshold),
            ("unhealthyThreshold", check.unhealthy_threshold),
        ];
        for (option, value) in positives {
            if value == 0 {
                result.errors.push(ValidationError {
                    field: format!("{field}.{option}"),
                    message: format!("{option} must be a positive integer"),
                });
            }
        }
        if check.path.is_empty() {
            result.errors.push(ValidationError {
                field: format!("{field}.path"),
                message: String::from("path must not be empty"),
            });
        }
    }
}

/// Returns true if `name` is a valid GCE resource name.
///
/// Names are 1-63 characters, start with a lowercase letter, continue with
/// lowercase letters, digits or dashes, and do not end with a dash.
#[must_use]
pub fn is_valid_resource_name(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return false;
    }

    let mut chars = name.chars();
    if !chars.next().is_some_and(|c| c.is_ascii_lowercase()) {
        return false;
    }

    if !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
        return false;
    }

    !name.ends_with('-')
}

/// Rejects a name that [`is_valid_resource_name`] does not accept.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidResourceName`].
pub fn ensure_valid_name(name: &str) -> Result<()> {
    if is_valid_resource_name(name) {
        Ok(())
    } else {
        Err(GceError::Config(ConfigError::InvalidResourceName {
            name: name.to_string(),
        }))
    }
}

/// Rejects an empty value.
///
/// # Errors
///
/// Returns a validation error naming the option.
pub fn ensure_not_empty(value: &str, name: &str) -> Result<()> {
    if value.is_empty() {
        return Err(GceError::Config(ConfigError::validation(
            format!("{name} must not be empty"),
            name,
        )));
    }
    Ok(())
}

/// Rejects zero.
///
/// # Errors
///
/// Returns a validation error naming the option.
pub fn ensure_positive(value: u64, name: &str) -> Result<()> {
    if value == 0 {
        return Err(GceError::Config(ConfigError::validation(
            format!("{name} must be a positive integer"),
            name,
        )));
    }
    Ok(())
}

impl ValidationResult {
    /// Returns true if validation passed (no errors).
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of errors.
    #[must_use]
    pub const fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Returns the number of warnings.
    #[must_use]
    pub const fn warning_count(&self) -> usize {
        self.warnings.len()
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigParser;

    #[test]
    fn test_valid_name() {
        assert!(is_valid_resource_name("data-disk"));
        assert!(is_valid_resource_name("a"));
        assert!(is_valid_resource_name("web--1"));
        assert!(is_valid_resource_name(&format!("a{}", "b".repeat(62))));
    }

    #[test]
    fn test_invalid_name() {
        assert!(!is_valid_resource_name(""));
        assert!(!is_valid_resource_name("Disk")); // uppercase
        assert!(!is_valid_resource_name("1disk")); // starts with digit
        assert!(!is_valid_resource_name("disk_a")); // underscore
        assert!(!is_valid_resource_name("disk-")); // trailing dash
        assert!(!is_valid_resource_name(&format!("a{}", "b".repeat(63)))); // 64 chars
    }

    #[test]
    fn test_ensure_helpers() {
        assert!(ensure_not_empty("x", "path").is_ok());
        let err = ensure_not_empty("", "path").expect_err("empty");
        assert!(err.to_string().contains("path must not be empty"));
        assert!(ensure_positive(0, "port").is_err());
        assert!(ensure_positive(1, "port").is_ok());
    }

    #[test]
    fn test_duplicate_provider_names() {
        let yaml = r"
resources:
  gceDisks:
    a:
      name: shared
      region: europe-west1-b
      size: 10
    b:
      name: shared
      region: europe-west1-b
      size: 10
";
        let config = ConfigParser::new().parse_yaml(yaml, None).expect("parse");
        let err = ConfigValidator::new().validate(&config).expect_err("duplicate");
        assert!(err.to_string().contains("both use the name 'shared'"));
    }

    #[test]
    fn test_snapshot_and_image_conflict() {
        let yaml = r"
resources:
  gceDisks:
    data:
      region: europe-west1-b
      snapshot: snap-1
      image:
        family: debian-12
";
        let config = ConfigParser::new().parse_yaml(yaml, None).expect("parse");
        assert!(ConfigValidator::new().validate(&config).is_err());
    }

    #[test]
    fn test_warnings_do_not_fail() {
        let yaml = r"
resources:
  gceTargetPools:
    pool:
      region: europe-west1
";
        let config = ConfigParser::new().parse_yaml(yaml, None).expect("parse");
        let result = ConfigValidator::new().validate(&config).expect("valid");
        assert!(result.is_valid());
        assert_eq!(result.warning_count(), 1);
    }
}
