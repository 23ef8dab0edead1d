//! Provider-side resource types.
//!
//! These are the shapes the cloud abstraction hands back and accepts. They
//! carry only what the reconcilers read or write.

use serde::{Deserialize, Serialize};

/// A persistent disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Volume {
    /// Disk name.
    pub name: String,
    /// Zone the disk lives in.
    pub zone: String,
    /// Size in GiB.
    pub size_gb: u64,
    /// Provider disk type, e.g. `pd-ssd`.
    pub disk_type: String,
}

/// Parameters for creating a persistent disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateVolumeRequest {
    /// Disk name.
    pub name: String,
    /// Zone.
    pub zone: String,
    /// Size in GiB; `None` lets the source decide.
    pub size_gb: Option<u64>,
    /// Snapshot to restore from.
    pub snapshot: Option<String>,
    /// Self link of the source image.
    pub image: Option<String>,
    /// Provider disk type, e.g. `pd-standard`.
    pub disk_type: String,
}

/// A legacy (range-based) network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Network {
    /// Network name.
    pub name: String,
    /// IPv4 range in CIDR notation.
    pub address_range: Option<String>,
}

/// One protocol/ports entry of a firewall rule.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct FirewallAllowed {
    /// IP protocol name or number.
    pub protocol: String,
    /// Ports or port ranges; empty means all ports.
    pub ports: Vec<String>,
}

/// A firewall rule attached to a network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Firewall {
    /// Rule name.
    pub name: String,
    /// Name of the network the rule belongs to.
    pub network: String,
    /// Allowed protocols and ports.
    pub allowed: Vec<FirewallAllowed>,
    /// Source CIDR ranges.
    pub source_ranges: Vec<String>,
    /// Source instance tags.
    pub source_tags: Vec<String>,
    /// Target instance tags.
    pub target_tags: Vec<String>,
}

/// A disk image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    /// Image name.
    pub name: String,
    /// Fully-qualified image URL.
    pub self_link: String,
    /// Image family, if any.
    pub family: Option<String>,
    /// Description.
    pub description: Option<String>,
}

/// Parameters for creating an image from a tarball.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateImageRequest {
    /// Image name.
    pub name: String,
    /// Cloud Storage URI of the raw disk tarball.
    pub source_uri: String,
    /// Description.
    pub description: Option<String>,
}

/// A reserved static IP address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    /// Address resource name.
    pub name: String,
    /// Region.
    pub region: String,
    /// The reserved IPv4 address.
    pub address: String,
}

/// A regional forwarding rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardingRule {
    /// Rule name.
    pub name: String,
    /// Region.
    pub region: String,
    /// Name of the target pool receiving traffic.
    pub target_pool: String,
    /// IP protocol (`TCP`, `UDP`, ...).
    pub protocol: String,
    /// Port range, e.g. `80-80`.
    pub port_range: Option<String>,
    /// External IP address.
    pub address: Option<String>,
    /// Description.
    pub description: Option<String>,
}

/// A legacy HTTP health check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpHealthCheck {
    /// Check name.
    pub name: String,
    /// Host header value.
    pub host: Option<String>,
    /// Request path.
    pub path: String,
    /// TCP port.
    pub port: u16,
    /// Description.
    pub description: Option<String>,
    /// Seconds between checks.
    pub check_interval: u32,
    /// Seconds before a check times out.
    pub timeout: u32,
    /// Consecutive successes before healthy.
    pub healthy_threshold: u32,
    /// Consecutive failures before unhealthy.
    pub unhealthy_threshold: u32,
}

/// A regional target pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetPool {
    /// Pool name.
    pub name: String,
    /// Region.
    pub region: String,
    /// Attached health check names (at most one is used).
    pub health_checks: Vec<String>,
    /// Member instance names or URLs.
    pub instances: Vec<String>,
}

/// A network route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// Route name.
    pub name: String,
    /// Network name.
    pub network: String,
    /// Destination CIDR range.
    pub destination: String,
    /// Priority.
    pub priority: u32,
    /// Next hop (IP address or instance).
    pub next_hop: Option<String>,
    /// Instance tags the route applies to.
    pub tags: Vec<String>,
    /// Description.
    pub description: Option<String>,
}

/// Static website settings of a bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketWebsite {
    /// Object served for directory requests.
    #[serde(default)]
    pub main_page_suffix: Option<String>,
    /// Object served for missing objects.
    #[serde(default)]
    pub not_found_page: Option<String>,
}

/// Access logging settings of a bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketLogging {
    /// Bucket receiving the logs.
    #[serde(default)]
    pub log_bucket: Option<String>,
    /// Prefix for log object names.
    #[serde(default)]
    pub log_object_prefix: Option<String>,
}

/// One CORS entry of a bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorsRule {
    /// Seconds browsers may cache the preflight response.
    #[serde(default)]
    pub max_age_seconds: Option<u32>,
    /// Allowed methods.
    #[serde(default)]
    pub methods: Vec<String>,
    /// Allowed origins.
    #[serde(default)]
    pub origins: Vec<String>,
    /// Response headers exposed to the browser.
    #[serde(default)]
    pub response_headers: Vec<String>,
}

/// Conditions of a lifecycle rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleConditions {
    /// Object age in days.
    #[serde(default)]
    pub age: Option<u32>,
    /// Date (`YYYY-MM-DD`) objects must be created before.
    #[serde(default)]
    pub created_before: Option<String>,
    /// Matches live (`true`) or archived (`false`) objects.
    #[serde(default)]
    pub is_live: Option<bool>,
    /// Number of newer versions.
    #[serde(default)]
    pub number_of_newer_versions: Option<u32>,
}

/// One lifecycle management rule of a bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleRule {
    /// Action, e.g. `Delete`.
    pub action: String,
    /// Conditions under which the action applies.
    #[serde(default)]
    pub conditions: LifecycleConditions,
}

/// A Cloud Storage bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    /// Bucket name.
    pub name: String,
    /// Location, e.g. `EU`.
    pub location: String,
    /// Default storage class.
    pub storage_class: String,
    /// Whether object versioning is on.
    pub versioning_enabled: bool,
    /// Website settings.
    pub website: BucketWebsite,
    /// Logging settings.
    pub logging: BucketLogging,
    /// CORS entries.
    pub cors: Vec<CorsRule>,
    /// Lifecycle rules.
    pub lifecycle: Vec<LifecycleRule>,
}
