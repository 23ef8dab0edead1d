//! Resource kinds and their reconciliation.
//!
//! Each kind lives in its own module with a `*Definition` (desired state,
//! built from config options) and a `*State` (recorded state) implementing
//! [`crate::reconciler::Reconcile`].

mod bucket;
mod common;
mod disk;
mod forwarding_rule;
mod http_health_check;
mod image;
mod image_ref;
mod kind;
mod network;
mod route;
mod static_ip;
mod target_pool;

#[cfg(test)]
mod testing;

pub use bucket::{BucketDefinition, BucketProperties, BucketState};
pub use common::{
    Lifecycle, PropertyValue, ResourceMeta, confirm_destroy, normalize_list, reconcile_field,
    warn_if_changed,
};
pub use disk::{DiskDefinition, DiskState};
pub use forwarding_rule::{ForwardingRuleDefinition, ForwardingRuleState};
pub use http_health_check::{HealthCheckProperties, HttpHealthCheckDefinition, HttpHealthCheckState};
pub use image::{ImageDefinition, ImageState};
pub use image_ref::{ImageRef, image_url, resolve_image};
pub use kind::{AnyDefinition, ResourceKind, ResourceRecord};
pub use network::{DEFAULT_SOURCE_RANGE, FirewallRule, NetworkDefinition, NetworkState};
pub use route::{RouteDefinition, RouteProperties, RouteState};
pub use static_ip::{StaticIpDefinition, StaticIpState};
pub use target_pool::{TargetPoolDefinition, TargetPoolState};
