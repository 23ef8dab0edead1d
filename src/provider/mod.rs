//! Provider seam.
//!
//! This module defines the operations the reconcilers need from Google
//! Compute Engine and Cloud Storage, and the types exchanged with them.

mod api;
mod types;

#[cfg(test)]
pub(crate) mod fake;

pub use api::{CloudApi, ComputeApi, Connector, Denial, Lookup, ProviderResult, StorageApi};
pub use types::{
    Address, Bucket, BucketLogging, BucketWebsite, CorsRule, CreateImageRequest,
    CreateVolumeRequest, Firewall, FirewallAllowed, ForwardingRule, HttpHealthCheck, Image,
    LifecycleConditions, LifecycleRule, Network, Route, TargetPool, Volume,
};
