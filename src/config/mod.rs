//! Configuration module for GCE deployments.
//!
//! This module handles all configuration-related functionality:
//! - Parsing and deserializing `gce.deploy.yaml`
//! - Validation of configuration values
//! - Computing definition hashes for change detection

mod hash;
mod parser;
mod spec;
mod validator;

pub use hash::DefinitionHasher;
pub use parser::{ConfigParser, DEFAULT_CONFIG_FILES, find_config_file};
pub use spec::{
    BucketOptions, DeployConfig, DiskOptions, FirewallOptions, ForwardingRuleOptions,
    HttpHealthCheckOptions, ImageOptions, ImageSelector, NetworkOptions, PortSpec, ResourceRef,
    ResourcesConfig, RouteOptions, StaticIpOptions, TargetPoolOptions, VersioningOptions,
};
pub use validator::{
    ConfigValidator, MAX_NAME_LEN, ValidationError, ValidationResult, ensure_not_empty,
    ensure_positive, ensure_valid_name, is_valid_resource_name,
};
