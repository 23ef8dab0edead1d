//! The cloud abstraction consumed by the reconcilers.
//!
//! The crate never talks to Google APIs directly. The host supplies a
//! [`Connector`] that turns resolved credentials into a [`CloudApi`] handle,
//! and every remote call goes through that handle.

use async_trait::async_trait;
use std::sync::Arc;

use crate::credentials::Credentials;
use crate::error::ProviderError;

use super::types::{
    Address, Bucket, CreateImageRequest, CreateVolumeRequest, Firewall, ForwardingRule,
    HttpHealthCheck, Image, Network, Route, TargetPool, Volume,
};

/// Result of a provider call.
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Why a lookup was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Denial {
    /// The caller may not see the resource.
    Forbidden(String),
    /// The owning project is missing or has the API disabled.
    AccessNotConfigured(String),
}

/// Outcome of fetching a resource by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    /// The resource exists.
    Found(T),
    /// The resource does not exist.
    NotFound,
    /// The provider refused to say.
    Denied(Denial),
}

impl<T> Lookup<T> {
    /// Folds a raw provider result into a lookup.
    ///
    /// Not-found and the two denial reasons become variants; every other
    /// error is passed through.
    ///
    /// # Errors
    ///
    /// Returns the provider error if it is not a lookup outcome.
    pub fn from_result(result: ProviderResult<T>) -> ProviderResult<Self> {
        match result {
            Ok(value) => Ok(Self::Found(value)),
            Err(ProviderError::NotFound { .. }) => Ok(Self::NotFound),
            Err(ProviderError::Forbidden { message }) => {
                Ok(Self::Denied(Denial::Forbidden(message)))
            }
            Err(ProviderError::AccessNotConfigured { message }) => {
                Ok(Self::Denied(Denial::AccessNotConfigured(message)))
            }
            Err(e) => Err(e),
        }
    }

    /// Converts to an option, turning a denial back into an error.
    ///
    /// # Errors
    ///
    /// Returns the denial as a [`ProviderError`].
    pub fn found(self) -> ProviderResult<Option<T>> {
        match self {
            Self::Found(value) => Ok(Some(value)),
            Self::NotFound => Ok(None),
            Self::Denied(Denial::Forbidden(message)) => Err(ProviderError::Forbidden { message }),
            Self::Denied(Denial::AccessNotConfigured(message)) => {
                Err(ProviderError::AccessNotConfigured { message })
            }
        }
    }
}

/// Compute Engine operations.
#[async_trait]
pub trait ComputeApi: Send + Sync {
    /// Fetches a persistent disk.
    async fn get_volume(&self, name: &str, zone: &str) -> ProviderResult<Lookup<Volume>>;
    /// Creates a persistent disk.
    async fn create_volume(&self, request: &CreateVolumeRequest) -> ProviderResult<Volume>;
    /// Deletes a persistent disk.
    async fn destroy_volume(&self, name: &str, zone: &str) -> ProviderResult<()>;

    /// Fetches a network.
    async fn get_network(&self, name: &str) -> ProviderResult<Lookup<Network>>;
    /// Creates a legacy network with the given range.
    async fn create_network(
        &self,
        name: &str,
        address_range: Option<&str>,
    ) -> ProviderResult<Network>;
    /// Deletes a network.
    async fn destroy_network(&self, name: &str) -> ProviderResult<()>;

    /// Lists all firewall rules of the project.
    async fn list_firewalls(&self) -> ProviderResult<Vec<Firewall>>;
    /// Creates a firewall rule.
    async fn create_firewall(&self, firewall: &Firewall) -> ProviderResult<Firewall>;
    /// Replaces the allowed list, ranges and tags of a firewall rule.
    async fn update_firewall(&self, firewall: &Firewall) -> ProviderResult<Firewall>;
    /// Deletes a firewall rule.
    async fn destroy_firewall(&self, name: &str) -> ProviderResult<()>;

    /// Fetches an image by name, partial name or full URL.
    ///
    /// `project` restricts the search to one project.
    async fn get_image(&self, name: &str, project: Option<&str>) -> ProviderResult<Lookup<Image>>;
    /// Fetches the newest image of a family.
    async fn get_image_from_family(
        &self,
        family: &str,
        project: Option<&str>,
    ) -> ProviderResult<Lookup<Image>>;
    /// Creates an image from a tarball.
    async fn create_image(&self, request: &CreateImageRequest) -> ProviderResult<Image>;
    /// Deletes an image.
    async fn destroy_image(&self, name: &str) -> ProviderResult<()>;

    /// Fetches a static IP address.
    async fn get_address(&self, name: &str, region: &str) -> ProviderResult<Lookup<Address>>;
    /// Reserves a static IP address, optionally a specific one.
    async fn create_address(
        &self,
        name: &str,
        region: &str,
        address: Option<&str>,
    ) -> ProviderResult<Address>;
    /// Releases a static IP address.
    async fn destroy_address(&self, name: &str, region: &str) -> ProviderResult<()>;

    /// Fetches a forwarding rule.
    async fn get_forwarding_rule(
        &self,
        name: &str,
        region: &str,
    ) -> ProviderResult<Lookup<ForwardingRule>>;
    /// Creates a forwarding rule.
    async fn create_forwarding_rule(&self, rule: &ForwardingRule) -> ProviderResult<ForwardingRule>;
    /// Points a forwarding rule at another target pool.
    async fn set_forwarding_rule_target(
        &self,
        name: &str,
        region: &str,
        target_pool: &str,
    ) -> ProviderResult<()>;
    /// Deletes a forwarding rule.
    async fn destroy_forwarding_rule(&self, name: &str, region: &str) -> ProviderResult<()>;

    /// Fetches an HTTP health check.
    async fn get_health_check(&self, name: &str) -> ProviderResult<Lookup<HttpHealthCheck>>;
    /// Creates an HTTP health check.
    async fn create_health_check(&self, check: &HttpHealthCheck) -> ProviderResult<HttpHealthCheck>;
    /// Replaces the properties of an HTTP health check.
    async fn update_health_check(&self, check: &HttpHealthCheck) -> ProviderResult<HttpHealthCheck>;
    /// Deletes an HTTP health check.
    async fn destroy_health_check(&self, name: &str) -> ProviderResult<()>;

    /// Fetches a target pool.
    async fn get_target_pool(&self, name: &str, region: &str) -> ProviderResult<Lookup<TargetPool>>;
    /// Creates an empty target pool.
    async fn create_target_pool(&self, name: &str, region: &str) -> ProviderResult<TargetPool>;
    /// Attaches a health check to a target pool.
    async fn add_target_pool_health_check(
        &self,
        pool: &str,
        region: &str,
        check: &str,
    ) -> ProviderResult<()>;
    /// Detaches a health check from a target pool.
    async fn remove_target_pool_health_check(
        &self,
        pool: &str,
        region: &str,
        check: &str,
    ) -> ProviderResult<()>;
    /// Adds an instance to a target pool.
    async fn add_target_pool_instance(
        &self,
        pool: &str,
        region: &str,
        instance: &str,
    ) -> ProviderResult<()>;
    /// Removes an instance from a target pool.
    async fn remove_target_pool_instance(
        &self,
        pool: &str,
        region: &str,
        instance: &str,
    ) -> ProviderResult<()>;
    /// Deletes a target pool.
    async fn destroy_target_pool(&self, name: &str, region: &str) -> ProviderResult<()>;

    /// Fetches a route.
    async fn get_route(&self, name: &str) -> ProviderResult<Lookup<Route>>;
    /// Creates a route.
    async fn create_route(&self, route: &Route) -> ProviderResult<Route>;
    /// Deletes a route.
    async fn destroy_route(&self, name: &str) -> ProviderResult<()>;
}

/// Cloud Storage operations.
#[async_trait]
pub trait StorageApi: Send + Sync {
    /// Fetches a bucket.
    async fn get_bucket(&self, name: &str) -> ProviderResult<Lookup<Bucket>>;
    /// Creates a bucket in a project.
    async fn create_bucket(&self, project: &str, bucket: &Bucket) -> ProviderResult<Bucket>;
    /// Patches every mutable property of a bucket.
    async fn patch_bucket(&self, bucket: &Bucket) -> ProviderResult<Bucket>;
    /// Deletes an empty bucket.
    async fn delete_bucket(&self, name: &str) -> ProviderResult<()>;
}

/// A handle to both Compute Engine and Cloud Storage.
pub trait CloudApi: ComputeApi + StorageApi {}

impl<T: ComputeApi + StorageApi> CloudApi for T {}

/// Builds provider handles from credentials.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Opens a connection for the given credentials.
    async fn connect(&self, credentials: &Credentials) -> ProviderResult<Arc<dyn CloudApi>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_from_result() {
        let found: Lookup<u32> = Lookup::from_result(Ok(3)).expect("found");
        assert_eq!(found, Lookup::Found(3));

        let missing: Lookup<u32> = Lookup::from_result(Err(ProviderError::NotFound {
            resource: String::from("x"),
        }))
        .expect("not found is a lookup outcome");
        assert_eq!(missing, Lookup::NotFound);

        let denied: Lookup<u32> = Lookup::from_result(Err(ProviderError::Forbidden {
            message: String::from("nope"),
        }))
        .expect("forbidden is a lookup outcome");
        assert_eq!(denied, Lookup::Denied(Denial::Forbidden(String::from("nope"))));

        let other = Lookup::<u32>::from_result(Err(ProviderError::QuotaExceeded {
            message: String::from("slow down"),
        }));
        assert!(other.is_err());
    }

    #[test]
    fn test_found_reraises_denial() {
        let denied: Lookup<u32> = Lookup::Denied(Denial::AccessNotConfigured(String::from("off")));
        let err = denied.found().expect_err("denial is an error");
        assert_eq!(err.reason(), "accessNotConfigured");

        assert_eq!(Lookup::<u32>::NotFound.found().expect("ok"), None);
    }
}
