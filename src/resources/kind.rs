//! The kind registry and kind-erased definitions and records.
//!
//! The host works with [`AnyDefinition`] and [`ResourceRecord`], which
//! dispatch to the per-kind [`Reconcile`] implementations.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::config::DeployConfig;
use crate::error::{GceError, ReconcileError, Result};
use crate::reconciler::{ApplyContext, ApplyOptions, Reconcile};

use super::bucket::{BucketDefinition, BucketState};
use super::common::ResourceMeta;
use super::disk::{DiskDefinition, DiskState};
use super::forwarding_rule::{ForwardingRuleDefinition, ForwardingRuleState};
use super::http_health_check::{HttpHealthCheckDefinition, HttpHealthCheckState};
use super::image::{ImageDefinition, ImageState};
use super::network::{NetworkDefinition, NetworkState};
use super::route::{RouteDefinition, RouteState};
use super::static_ip::{StaticIpDefinition, StaticIpState};
use super::target_pool::{TargetPoolDefinition, TargetPoolState};

/// Resource kinds, in the order a fresh deployment can create them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    /// `gce-image`
    Image,
    /// `gce-disk`
    Disk,
    /// `gce-network`
    Network,
    /// `gce-static-ip`
    StaticIp,
    /// `gce-http-health-check`
    HttpHealthCheck,
    /// `gce-target-pool`
    TargetPool,
    /// `gce-forwarding-rule`
    ForwardingRule,
    /// `gce-route`
    Route,
    /// `gse-bucket`
    Bucket,
}

impl ResourceKind {
    /// Every kind, in creation order.
    pub const ALL: [Self; 9] = [
        Self::Image,
        Self::Disk,
        Self::Network,
        Self::StaticIp,
        Self::HttpHealthCheck,
        Self::TargetPool,
        Self::ForwardingRule,
        Self::Route,
        Self::Bucket,
    ];

    /// Kind identifier, e.g. `gce-disk`.
    #[must_use]
    pub const fn type_name(self) -> &'static str {
        match self {
            Self::Image => "gce-image",
            Self::Disk => "gce-disk",
            Self::Network => "gce-network",
            Self::StaticIp => "gce-static-ip",
            Self::HttpHealthCheck => "gce-http-health-check",
            Self::TargetPool => "gce-target-pool",
            Self::ForwardingRule => "gce-forwarding-rule",
            Self::Route => "gce-route",
            Self::Bucket => "gse-bucket",
        }
    }

    /// Key of the kind in the config tree, e.g. `gceDisks`.
    #[must_use]
    pub const fn resource_type(self) -> &'static str {
        match self {
            Self::Image => "gceImages",
            Self::Disk => "gceDisks",
            Self::Network => "gceNetworks",
            Self::StaticIp => "gceStaticIPs",
            Self::HttpHealthCheck => "gceHTTPHealthChecks",
            Self::TargetPool => "gceTargetPools",
            Self::ForwardingRule => "gceForwardingRules",
            Self::Route => "gceRoutes",
            Self::Bucket => "gseBuckets",
        }
    }

    /// Kinds whose resources must exist before resources of this kind.
    #[must_use]
    pub const fn create_after(self) -> &'static [Self] {
        match self {
            Self::Disk => &[Self::Image],
            Self::TargetPool => &[Self::HttpHealthCheck],
            Self::ForwardingRule => &[Self::TargetPool, Self::StaticIp],
            Self::Route => &[Self::Network],
            Self::Image
            | Self::Network
            | Self::StaticIp
            | Self::HttpHealthCheck
            | Self::Bucket => &[],
        }
    }

    /// Looks a kind up by its identifier.
    #[must_use]
    pub fn from_type_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.type_name() == name)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// A definition of any kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnyDefinition {
    /// Image.
    Image(ImageDefinition),
    /// Disk.
    Disk(DiskDefinition),
    /// Network.
    Network(NetworkDefinition),
    /// Static IP.
    StaticIp(StaticIpDefinition),
    /// Health check.
    HttpHealthCheck(HttpHealthCheckDefinition),
    /// Target pool.
    TargetPool(TargetPoolDefinition),
    /// Forwarding rule.
    ForwardingRule(ForwardingRuleDefinition),
    /// Route.
    Route(RouteDefinition),
    /// Bucket.
    Bucket(BucketDefinition),
}

impl AnyDefinition {
    /// Builds every definition of a config tree, in kind order and then by
    /// logical name.
    ///
    /// # Errors
    ///
    /// Returns the first definition error.
    pub fn from_config(config: &DeployConfig) -> Result<Vec<Self>> {
        let r = &config.resources;
        let mut defns = Vec::new();
        for (name, o) in &r.images {
            defns.push(Self::Image(ImageDefinition::new(name, o)?));
        }
        for (name, o) in &r.disks {
            defns.push(Self::Disk(DiskDefinition::new(name, o)?));
        }
        for (name, o) in &r.networks {
            defns.push(Self::Network(NetworkDefinition::new(name, o)?));
        }
        for (name, o) in &r.static_ips {
            defns.push(Self::StaticIp(StaticIpDefinition::new(name, o)?));
        }
        for (name, o) in &r.http_health_checks {
            defns.push(Self::HttpHealthCheck(HttpHealthCheckDefinition::new(name, o)?));
        }
        for (name, o) in &r.target_pools {
            defns.push(Self::TargetPool(TargetPoolDefinition::new(name, o)?));
        }
        for (name, o) in &r.forwarding_rules {
            defns.push(Self::ForwardingRule(ForwardingRuleDefinition::new(name, o)?));
        }
        for (name, o) in &r.routes {
            defns.push(Self::Route(RouteDefinition::new(name, o)?));
        }
        for (name, o) in &r.buckets {
            defns.push(Self::Bucket(BucketDefinition::new(name, o)?));
        }
        Ok(defns)
    }

    /// The kind of the definition.
    #[must_use]
    pub const fn kind(&self) -> ResourceKind {
        match self {
            Self::Image(_) => ResourceKind::Image,
            Self::Disk(_) => ResourceKind::Disk,
            Self::Network(_) => ResourceKind::Network,
            Self::StaticIp(_) => ResourceKind::StaticIp,
            Self::HttpHealthCheck(_) => ResourceKind::HttpHealthCheck,
            Self::TargetPool(_) => ResourceKind::TargetPool,
            Self::ForwardingRule(_) => ResourceKind::ForwardingRule,
            Self::Route(_) => ResourceKind::Route,
            Self::Bucket(_) => ResourceKind::Bucket,
        }
    }

    /// Logical name in the deployment.
    #[must_use]
    pub fn logical_name(&self) -> &str {
        match self {
            Self::Image(d) => &d.name,
            Self::Disk(d) => &d.name,
            Self::Network(d) => &d.name,
            Self::StaticIp(d) => &d.name,
            Self::HttpHealthCheck(d) => &d.name,
            Self::TargetPool(d) => &d.name,
            Self::ForwardingRule(d) => &d.name,
            Self::Route(d) => &d.name,
            Self::Bucket(d) => &d.name,
        }
    }

    /// Fingerprint of the declared options.
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        match self {
            Self::Image(d) => &d.fingerprint,
            Self::Disk(d) => &d.fingerprint,
            Self::Network(d) => &d.fingerprint,
            Self::StaticIp(d) => &d.fingerprint,
            Self::HttpHealthCheck(d) => &d.fingerprint,
            Self::TargetPool(d) => &d.fingerprint,
            Self::ForwardingRule(d) => &d.fingerprint,
            Self::Route(d) => &d.fingerprint,
            Self::Bucket(d) => &d.fingerprint,
        }
    }

    /// Logical names of the declared resources that must be created first.
    ///
    /// `all` is every definition of the deployment, applied or not.
    #[must_use]
    pub fn create_after(&self, all: &[Self]) -> BTreeSet<String> {
        let kinds = self.kind().create_after();
        all.iter()
            .filter(|defn| kinds.contains(&defn.kind()))
            .map(|defn| defn.logical_name().to_string())
            .collect()
    }

    /// Short description for listings.
    #[must_use]
    pub fn show_type(&self) -> String {
        match self {
            Self::Image(d) => d.show_type(),
            Self::Disk(d) => d.show_type(),
            Self::Network(d) => d.show_type(),
            Self::StaticIp(d) => d.show_type(),
            Self::HttpHealthCheck(d) => d.show_type(),
            Self::TargetPool(d) => d.show_type(),
            Self::ForwardingRule(d) => d.show_type(),
            Self::Route(d) => d.show_type(),
            Self::Bucket(d) => d.show_type(),
        }
    }
}

/// The persisted state of one resource, tagged with its kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ResourceRecord {
    /// Image.
    #[serde(rename = "gce-image")]
    Image(ImageState),
    /// Disk.
    #[serde(rename = "gce-disk")]
    Disk(DiskState),
    /// Network.
    #[serde(rename = "gce-network")]
    Network(NetworkState),
    /// Static IP.
    #[serde(rename = "gce-static-ip")]
    StaticIp(StaticIpState),
    /// Health check.
    #[serde(rename = "gce-http-health-check")]
    HttpHealthCheck(HttpHealthCheckState),
    /// Target pool.
    #[serde(rename = "gce-target-pool")]
    TargetPool(TargetPoolState),
    /// Forwarding rule.
    #[serde(rename = "gce-forwarding-rule")]
    ForwardingRule(ForwardingRuleState),
    /// Route.
    #[serde(rename = "gce-route")]
    Route(RouteState),
    /// Bucket.
    #[serde(rename = "gse-bucket")]
    Bucket(BucketState),
}

impl ResourceRecord {
    /// Creates the record of a resource that was never applied.
    #[must_use]
    pub fn new(kind: ResourceKind, name: &str) -> Self {
        match kind {
            ResourceKind::Image => Self::Image(ImageState::new(name)),
            ResourceKind::Disk => Self::Disk(DiskState::new(name)),
            ResourceKind::Network => Self::Network(NetworkState::new(name)),
            ResourceKind::StaticIp => Self::StaticIp(StaticIpState::new(name)),
            ResourceKind::HttpHealthCheck => Self::HttpHealthCheck(HttpHealthCheckState::new(name)),
            ResourceKind::TargetPool => Self::TargetPool(TargetPoolState::new(name)),
            ResourceKind::ForwardingRule => Self::ForwardingRule(ForwardingRuleState::new(name)),
            ResourceKind::Route => Self::Route(RouteState::new(name)),
            ResourceKind::Bucket => Self::Bucket(BucketState::new(name)),
        }
    }

    /// The kind of the record.
    #[must_use]
    pub const fn kind(&self) -> ResourceKind {
        match self {
            Self::Image(_) => ResourceKind::Image,
            Self::Disk(_) => ResourceKind::Disk,
            Self::Network(_) => ResourceKind::Network,
            Self::StaticIp(_) => ResourceKind::StaticIp,
            Self::HttpHealthCheck(_) => ResourceKind::HttpHealthCheck,
            Self::TargetPool(_) => ResourceKind::TargetPool,
            Self::ForwardingRule(_) => ResourceKind::ForwardingRule,
            Self::Route(_) => ResourceKind::Route,
            Self::Bucket(_) => ResourceKind::Bucket,
        }
    }

    /// Kind-independent part of the record.
    #[must_use]
    pub const fn meta(&self) -> &ResourceMeta {
        match self {
            Self::Image(s) => &s.meta,
            Self::Disk(s) => &s.meta,
            Self::Network(s) => &s.meta,
            Self::StaticIp(s) => &s.meta,
            Self::HttpHealthCheck(s) => &s.meta,
            Self::TargetPool(s) => &s.meta,
            Self::ForwardingRule(s) => &s.meta,
            Self::Route(s) => &s.meta,
            Self::Bucket(s) => &s.meta,
        }
    }

    /// Mutable access to the kind-independent part.
    pub fn meta_mut(&mut self) -> &mut ResourceMeta {
        match self {
            Self::Image(s) => &mut s.meta,
            Self::Disk(s) => &mut s.meta,
            Self::Network(s) => &mut s.meta,
            Self::StaticIp(s) => &mut s.meta,
            Self::HttpHealthCheck(s) => &mut s.meta,
            Self::TargetPool(s) => &mut s.meta,
            Self::ForwardingRule(s) => &mut s.meta,
            Self::Route(s) => &mut s.meta,
            Self::Bucket(s) => &mut s.meta,
        }
    }

    /// Reconciles the record against a definition of the same kind.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::KindMismatch`] for a definition of another
    /// kind, or the reconciliation error.
    pub async fn create(
        &mut self,
        defn: &AnyDefinition,
        ctx: &ApplyContext<'_>,
        options: ApplyOptions,
    ) -> Result<()> {
        match (self, defn) {
            (Self::Image(s), AnyDefinition::Image(d)) => s.create(d, ctx, options).await,
            (Self::Disk(s), AnyDefinition::Disk(d)) => s.create(d, ctx, options).await,
            (Self::Network(s), AnyDefinition::Network(d)) => s.create(d, ctx, options).await,
            (Self::StaticIp(s), AnyDefinition::StaticIp(d)) => s.create(d, ctx, options).await,
            (Self::HttpHealthCheck(s), AnyDefinition::HttpHealthCheck(d)) => {
                s.create(d, ctx, options).await
            }
            (Self::TargetPool(s), AnyDefinition::TargetPool(d)) => s.create(d, ctx, options).await,
            (Self::ForwardingRule(s), AnyDefinition::ForwardingRule(d)) => {
                s.create(d, ctx, options).await
            }
            (Self::Route(s), AnyDefinition::Route(d)) => s.create(d, ctx, options).await,
            (Self::Bucket(s), AnyDefinition::Bucket(d)) => s.create(d, ctx, options).await,
            (record, defn) => Err(GceError::Reconcile(ReconcileError::KindMismatch {
                expected: record.kind().type_name().to_string(),
                found: defn.kind().type_name().to_string(),
            })),
        }
    }

    /// Destroys the live resource. Returns false if the operator declined.
    ///
    /// # Errors
    ///
    /// Returns the reconciliation error.
    pub async fn destroy(&mut self, ctx: &ApplyContext<'_>, wipe: bool) -> Result<bool> {
        match self {
            Self::Image(s) => s.destroy(ctx, wipe).await,
            Self::Disk(s) => s.destroy(ctx, wipe).await,
            Self::Network(s) => s.destroy(ctx, wipe).await,
            Self::StaticIp(s) => s.destroy(ctx, wipe).await,
            Self::HttpHealthCheck(s) => s.destroy(ctx, wipe).await,
            Self::TargetPool(s) => s.destroy(ctx, wipe).await,
            Self::ForwardingRule(s) => s.destroy(ctx, wipe).await,
            Self::Route(s) => s.destroy(ctx, wipe).await,
            Self::Bucket(s) => s.destroy(ctx, wipe).await,
        }
    }

    /// What same-deployment references to this resource resolve to.
    ///
    /// Only deployed resources can be referenced. Static IPs resolve to
    /// their address, everything else to its provider name.
    #[must_use]
    pub fn sibling_value(&self) -> Option<&str> {
        if !self.meta().is_deployed() {
            return None;
        }
        match self {
            Self::Image(s) => s.image_name.as_deref(),
            Self::Network(s) => s.network_name.as_deref(),
            Self::StaticIp(s) => s.ip_address.as_deref(),
            Self::HttpHealthCheck(s) => s.check_name.as_deref(),
            Self::TargetPool(s) => s.pool_name.as_deref(),
            Self::Disk(_) | Self::ForwardingRule(_) | Self::Route(_) | Self::Bucket(_) => None,
        }
    }

    /// Short description for listings.
    #[must_use]
    pub fn show_type(&self) -> String {
        match self {
            Self::Image(s) => s.show_type(),
            Self::Disk(s) => s.show_type(),
            Self::Network(s) => s.show_type(),
            Self::StaticIp(s) => s.show_type(),
            Self::HttpHealthCheck(s) => s.show_type(),
            Self::TargetPool(s) => s.show_type(),
            Self::ForwardingRule(s) => s.show_type(),
            Self::Route(s) => s.show_type(),
            Self::Bucket(s) => s.show_type(),
        }
    }

    /// Returns true if the resource is deployed from exactly this definition.
    #[must_use]
    pub fn is_current(&self, defn: &AnyDefinition) -> bool {
        let meta = self.meta();
        meta.is_deployed() && meta.definition_hash.as_deref() == Some(defn.fingerprint())
    }
}
