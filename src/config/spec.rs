//! Configuration specification types for GCE deployments.
//!
//! This module defines the structs that map to the `gce.deploy.yaml` file.
//! Every resource is declared under `resources.<type>.<logical name>` with
//! camelCase options, and every option struct carries the three credential
//! fields (`project`, `serviceAccount`, `accessKey`).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::credentials::CredentialOptions;
use crate::provider::{BucketLogging, BucketWebsite, CorsRule, LifecycleRule};

/// The root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DeployConfig {
    /// Deployment name, used to label the state file.
    #[serde(default = "default_deployment")]
    pub deployment: String,
    /// Declared resources.
    #[serde(default)]
    pub resources: ResourcesConfig,
}

/// All declared resources, grouped by resource type.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResourcesConfig {
    /// Persistent disks.
    #[serde(default, rename = "gceDisks")]
    pub disks: BTreeMap<String, DiskOptions>,
    /// Networks and their firewall rules.
    #[serde(default, rename = "gceNetworks")]
    pub networks: BTreeMap<String, NetworkOptions>,
    /// Images built from tarballs.
    #[serde(default, rename = "gceImages")]
    pub images: BTreeMap<String, ImageOptions>,
    /// Reserved static IP addresses.
    #[serde(default, rename = "gceStaticIPs")]
    pub static_ips: BTreeMap<String, StaticIpOptions>,
    /// Forwarding rules.
    #[serde(default, rename = "gceForwardingRules")]
    pub forwarding_rules: BTreeMap<String, ForwardingRuleOptions>,
    /// HTTP health checks.
    #[serde(default, rename = "gceHTTPHealthChecks")]
    pub http_health_checks: BTreeMap<String, HttpHealthCheckOptions>,
    /// Target pools.
    #[serde(default, rename = "gceTargetPools")]
    pub target_pools: BTreeMap<String, TargetPoolOptions>,
    /// Routes.
    #[serde(default, rename = "gceRoutes")]
    pub routes: BTreeMap<String, RouteOptions>,
    /// Cloud Storage buckets.
    #[serde(default, rename = "gseBuckets")]
    pub buckets: BTreeMap<String, BucketOptions>,
}

/// A reference to another resource.
///
/// Either a provider-side name given verbatim, or `{ resource: <logical name> }`
/// naming a resource of the same deployment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ResourceRef {
    /// A resource declared in the same deployment.
    Resource {
        /// Logical name of the resource.
        resource: String,
    },
    /// A provider-side name.
    Name(String),
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resource { resource } => write!(f, "resource '{resource}'"),
            Self::Name(name) => write!(f, "{name}"),
        }
    }
}

/// Image selection for a disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImageSelector {
    /// Image name, full URL, or same-deployment image resource.
    #[serde(default)]
    pub name: Option<ResourceRef>,
    /// Image family; the newest image of the family is used.
    #[serde(default)]
    pub family: Option<String>,
    /// Project owning the image, for cross-project images.
    #[serde(default)]
    pub project: Option<String>,
}

/// `gceDisks.<name>`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DiskOptions {
    /// Provider-side disk name; defaults to the logical name.
    #[serde(default)]
    pub name: Option<String>,
    /// Zone the disk lives in.
    pub region: String,
    /// Size in GiB; may be omitted when restoring from a snapshot or image.
    #[serde(default)]
    pub size: Option<u64>,
    /// Snapshot to restore from.
    #[serde(default)]
    pub snapshot: Option<String>,
    /// Image to create the disk from.
    #[serde(default)]
    pub image: ImageSelector,
    /// `standard` or `ssd`.
    #[serde(default = "default_disk_type")]
    pub disk_type: String,
    /// Credentials.
    #[serde(flatten)]
    pub credentials: CredentialOptions,
}

/// A port or port range in a firewall rule; YAML may give either form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum PortSpec {
    /// A single port number.
    Number(u32),
    /// A port or range such as `"8000-8080"`.
    Text(String),
}

impl fmt::Display for PortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(port) => write!(f, "{port}"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

/// `gceNetworks.<name>.firewall.<rule>`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FirewallOptions {
    /// Protocol to ports; `null` ports allow every port.
    #[serde(default)]
    pub allowed: BTreeMap<String, Option<Vec<PortSpec>>>,
    /// Source CIDR ranges; defaults to `0.0.0.0/0`.
    #[serde(default)]
    pub source_ranges: Option<Vec<String>>,
    /// Source instance tags.
    #[serde(default)]
    pub source_tags: Vec<String>,
    /// Target instance tags.
    #[serde(default)]
    pub target_tags: Vec<String>,
}

/// `gceNetworks.<name>`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NetworkOptions {
    /// Provider-side network name; defaults to the logical name.
    #[serde(default)]
    pub name: Option<String>,
    /// IPv4 range in CIDR notation.
    #[serde(default)]
    pub address_range: Option<String>,
    /// Firewall rules keyed by rule name.
    #[serde(default)]
    pub firewall: BTreeMap<String, FirewallOptions>,
    /// Credentials.
    #[serde(flatten)]
    pub credentials: CredentialOptions,
}

/// `gceImages.<name>`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImageOptions {
    /// Provider-side image name; defaults to the logical name.
    #[serde(default)]
    pub name: Option<String>,
    /// Cloud Storage URI of the raw disk tarball.
    pub source_uri: String,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Credentials.
    #[serde(flatten)]
    pub credentials: CredentialOptions,
}

/// `gceStaticIPs.<name>`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StaticIpOptions {
    /// Provider-side address name; defaults to the logical name.
    #[serde(default)]
    pub name: Option<String>,
    /// Region.
    pub region: String,
    /// A specific address to reserve.
    #[serde(default)]
    pub ip_address: Option<String>,
    /// Credentials.
    #[serde(flatten)]
    pub credentials: CredentialOptions,
}

/// `gceForwardingRules.<name>`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ForwardingRuleOptions {
    /// Provider-side rule name; defaults to the logical name.
    #[serde(default)]
    pub name: Option<String>,
    /// Region.
    pub region: String,
    /// Target pool receiving the traffic.
    pub target_pool: ResourceRef,
    /// IP protocol.
    #[serde(default = "default_protocol")]
    pub protocol: String,
    /// Port range, e.g. `"80"` or `"8000-8080"`.
    #[serde(default)]
    pub port_range: Option<String>,
    /// External address, or a same-deployment static IP.
    #[serde(default)]
    pub ip_address: Option<ResourceRef>,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Credentials.
    #[serde(flatten)]
    pub credentials: CredentialOptions,
}

/// `gceHTTPHealthChecks.<name>`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HttpHealthCheckOptions {
    /// Provider-side check name; defaults to the logical name.
    #[serde(default)]
    pub name: Option<String>,
    /// Host header value.
    #[serde(default)]
    pub host: Option<String>,
    /// Request path.
    #[serde(default = "default_path")]
    pub path: String,
    /// TCP port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Seconds between checks.
    #[serde(default = "default_check_interval")]
    pub check_interval: u32,
    /// Seconds before a check times out.
    #[serde(default = "default_timeout")]
    pub timeout: u32,
    /// Consecutive successes before healthy.
    #[serde(default = "default_threshold")]
    pub healthy_threshold: u32,
    /// Consecutive failures before unhealthy.
    #[serde(default = "default_threshold")]
    pub unhealthy_threshold: u32,
    /// Credentials.
    #[serde(flatten)]
    pub credentials: CredentialOptions,
}

/// `gceTargetPools.<name>`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TargetPoolOptions {
    /// Provider-side pool name; defaults to the logical name.
    #[serde(default)]
    pub name: Option<String>,
    /// Region.
    pub region: String,
    /// Health check attached to the pool.
    #[serde(default)]
    pub health_check: Option<ResourceRef>,
    /// Member instances.
    #[serde(default)]
    pub machines: Vec<String>,
    /// Credentials.
    #[serde(flatten)]
    pub credentials: CredentialOptions,
}

/// `gceRoutes.<name>`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RouteOptions {
    /// Provider-side route name; defaults to the logical name.
    #[serde(default)]
    pub name: Option<String>,
    /// Network the route belongs to.
    pub network: ResourceRef,
    /// Destination CIDR range.
    pub destination: String,
    /// Route priority.
    #[serde(default = "default_priority")]
    pub priority: u32,
    /// Next hop (IP address or instance).
    #[serde(default)]
    pub next_hop: Option<String>,
    /// Instance tags the route applies to.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Credentials.
    #[serde(flatten)]
    pub credentials: CredentialOptions,
}

/// Versioning settings of a bucket.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct VersioningOptions {
    /// Whether object versioning is on.
    #[serde(default)]
    pub enabled: bool,
}

/// `gseBuckets.<name>`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BucketOptions {
    /// Provider-side bucket name; defaults to the logical name.
    #[serde(default)]
    pub name: Option<String>,
    /// Location, e.g. `EU`.
    #[serde(default = "default_location")]
    pub location: String,
    /// Default storage class.
    #[serde(default = "default_storage_class")]
    pub storage_class: String,
    /// Versioning settings.
    #[serde(default)]
    pub versioning: VersioningOptions,
    /// Website settings.
    #[serde(default)]
    pub website: BucketWebsite,
    /// Logging settings.
    #[serde(default)]
    pub logging: BucketLogging,
    /// CORS entries.
    #[serde(default)]
    pub cors: Vec<CorsRule>,
    /// Lifecycle rules.
    #[serde(default)]
    pub lifecycle: Vec<LifecycleRule>,
    /// Credentials.
    #[serde(flatten)]
    pub credentials: CredentialOptions,
}

fn default_deployment() -> String {
    String::from("default")
}

fn default_disk_type() -> String {
    String::from("standard")
}

fn default_protocol() -> String {
    String::from("TCP")
}

fn default_path() -> String {
    String::from("/")
}

const fn default_port() -> u16 {
    80
}

const fn default_check_interval() -> u32 {
    5
}

const fn default_timeout() -> u32 {
    5
}

const fn default_threshold() -> u32 {
    2
}

const fn default_priority() -> u32 {
    1000
}

fn default_location() -> String {
    String::from("US")
}

fn default_storage_class() -> String {
    String::from("STANDARD")
}
