//! HTTP health checks used by target pools.
//!
//! Every property of a health check can be changed in place, so drift is
//! recorded and then converged by a single update call.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{
    DefinitionHasher, HttpHealthCheckOptions, ensure_not_empty, ensure_positive, ensure_valid_name,
};
use crate::credentials::CredentialOptions;
use crate::diff::{DiffDetail, Diffable, FieldDiff, changed_fields};
use crate::error::Result;
use crate::provider::HttpHealthCheck;
use crate::reconciler::{ApplyContext, ApplyOptions, Reconcile};

use super::common::{
    ResourceMeta, confirm_destroy, create_error, deleted, reconcile_field, update_error,
    warn_destroy_missing, warn_not_supposed_to_exist,
};
use super::kind::ResourceKind;

/// The updatable properties of a health check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheckProperties {
    /// `Host` header to send.
    pub host: Option<String>,
    /// Request path.
    pub path: String,
    /// Port.
    pub port: u16,
    /// Free-form description.
    pub description: Option<String>,
    /// Seconds between probes.
    pub check_interval: u32,
    /// Seconds before a probe fails.
    pub timeout: u32,
    /// Successes before healthy.
    pub healthy_threshold: u32,
    /// Failures before unhealthy.
    pub unhealthy_threshold: u32,
}

impl HealthCheckProperties {
    fn from_provider(check: HttpHealthCheck) -> Self {
        Self {
            host: check.host,
            path: check.path,
            port: check.port,
            description: check.description,
            check_interval: check.check_interval,
            timeout: check.timeout,
            healthy_threshold: check.healthy_threshold,
            unhealthy_threshold: check.unhealthy_threshold,
        }
    }

    fn to_provider(&self, name: &str) -> HttpHealthCheck {
        HttpHealthCheck {
            name: name.to_string(),
            host: self.host.clone(),
            path: self.path.clone(),
            port: self.port,
            description: self.description.clone(),
            check_interval: self.check_interval,
            timeout: self.timeout,
            healthy_threshold: self.healthy_threshold,
            unhealthy_threshold: self.unhealthy_threshold,
        }
    }

    /// Records live values over the recorded ones, warning on each change.
    fn absorb(&mut self, live: Self, resource: &str) {
        reconcile_field(resource, "host", &mut self.host, live.host, true);
        reconcile_field(resource, "path", &mut self.path, live.path, true);
        reconcile_field(resource, "port", &mut self.port, live.port, true);
        reconcile_field(resource, "description", &mut self.description, live.description, true);
        let live_interval = live.check_interval;
        reconcile_field(resource, "check interval", &mut self.check_interval, live_interval, true);
        reconcile_field(resource, "timeout", &mut self.timeout, live.timeout, true);
        reconcile_field(
            resource,
            "healthy threshold",
            &mut self.healthy_threshold,
            live.healthy_threshold,
            true,
        );
        reconcile_field(
            resource,
            "unhealthy threshold",
            &mut self.unhealthy_threshold,
            live.unhealthy_threshold,
            true,
        );
    }
}

impl Diffable for HealthCheckProperties {
    fn diff(&self, desired: &Self) -> Vec<DiffDetail> {
        FieldDiff::new()
            .field("host", &self.host, &desired.host)
            .field("path", &self.path, &desired.path)
            .field("port", &self.port, &desired.port)
            .field("description", &self.description, &desired.description)
            .field("check interval", &self.check_interval, &desired.check_interval)
            .field("timeout", &self.timeout, &desired.timeout)
            .field("healthy threshold", &self.healthy_threshold, &desired.healthy_threshold)
            .field("unhealthy threshold", &self.unhealthy_threshold, &desired.unhealthy_threshold)
            .finish()
    }
}

/// Desired state of a health check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpHealthCheckDefinition {
    /// Logical name.
    pub name: String,
    /// Provider-side check name.
    pub check_name: String,
    /// Declared properties.
    pub properties: HealthCheckProperties,
    /// Declared credentials.
    pub credentials: CredentialOptions,
    /// Fingerprint of the options.
    pub fingerprint: String,
}

impl HttpHealthCheckDefinition {
    /// Builds a definition from its options.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid name, an empty path, or a zero port,
    /// interval, timeout or threshold.
    pub fn new(name: &str, options: &HttpHealthCheckOptions) -> Result<Self> {
        let check_name = options.name.clone().unwrap_or_else(|| name.to_string());
        ensure_valid_name(&check_name)?;
        ensure_not_empty(&options.path, "path")?;
        ensure_positive(u64::from(options.port), "port")?;
        ensure_positive(u64::from(options.check_interval), "checkInterval")?;
        ensure_positive(u64::from(options.timeout), "timeout")?;
        ensure_positive(u64::from(options.healthy_threshold), "healthyThreshold")?;
        ensure_positive(u64::from(options.unhealthy_threshold), "unhealthyThreshold")?;

        Ok(Self {
            name: name.to_string(),
            check_name,
            properties: HealthCheckProperties {
                host: options.host.clone(),
                path: options.path.clone(),
                port: options.port,
                description: options.description.clone(),
                check_interval: options.check_interval,
                timeout: options.timeout,
                healthy_threshold: options.healthy_threshold,
                unhealthy_threshold: options.unhealthy_threshold,
            },
            credentials: options.credentials.clone(),
            fingerprint: DefinitionHasher::new().hash_options(
                ResourceKind::HttpHealthCheck.resource_type(),
                name,
                options,
            )?,
        })
    }

    /// Short description for listings.
    #[must_use]
    pub fn show_type(&self) -> String {
        format!(
            "{} [:{}{}]",
            ResourceKind::HttpHealthCheck.type_name(),
            self.properties.port,
            self.properties.path
        )
    }
}

/// Recorded state of a health check.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HttpHealthCheckState {
    /// Common state.
    pub meta: ResourceMeta,
    /// Provider-side check name.
    #[serde(default)]
    pub check_name: Option<String>,
    /// Recorded properties.
    #[serde(default)]
    pub properties: Option<HealthCheckProperties>,
}

impl HttpHealthCheckState {
    /// Creates the state of a health check that was never applied.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            meta: ResourceMeta::new(name),
            ..Self::default()
        }
    }

    /// Human-readable name used in messages.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!(
            "GCE HTTP health check '{}'",
            self.check_name.as_deref().unwrap_or(&self.meta.name)
        )
    }

    /// Short description for listings.
    #[must_use]
    pub fn show_type(&self) -> String {
        let kind = ResourceKind::HttpHealthCheck.type_name();
        match &self.properties {
            Some(p) if self.meta.is_deployed() => format!("{kind} [:{}{}]", p.port, p.path),
            _ => kind.to_string(),
        }
    }
}

#[async_trait]
impl Reconcile for HttpHealthCheckState {
    type Definition = HttpHealthCheckDefinition;

    const KIND: ResourceKind = ResourceKind::HttpHealthCheck;

    async fn create(
        &mut self,
        defn: &HttpHealthCheckDefinition,
        ctx: &ApplyContext<'_>,
        options: ApplyOptions,
    ) -> Result<()> {
        let full_name = self.full_name();
        self.meta
            .no_project_change(Self::KIND, &defn.credentials, ctx.env, &full_name)?;

        self.meta.copy_credentials(Self::KIND, &defn.credentials, ctx.env)?;
        self.check_name = Some(defn.check_name.clone());
        let full_name = self.full_name();
        let api = self.meta.connect(ctx.connector).await?;

        if options.check {
            match api.get_health_check(&defn.check_name).await?.found()? {
                Some(check) if self.meta.is_deployed() => {
                    let live = HealthCheckProperties::from_provider(check);
                    match self.properties.as_mut() {
                        Some(recorded) => recorded.absorb(live, &full_name),
                        None => self.properties = Some(live),
                    }
                }
                Some(check) => {
                    warn_not_supposed_to_exist(&full_name, false, false);
                    confirm_destroy(ctx.prompt, &full_name, true)?;
                    deleted(&full_name, api.destroy_health_check(&check.name).await)?;
                }
                None => self.meta.warn_missing_resource(&full_name),
            }
        }

        let desired = defn.properties.to_provider(&defn.check_name);
        if !self.meta.is_deployed() {
            info!("creating {full_name}...");
            api.create_health_check(&desired)
                .await
                .map_err(|e| create_error("health check", e))?;
            self.meta.mark_up(&defn.fingerprint);
            self.properties = Some(defn.properties.clone());
            return Ok(());
        }

        let changes = self
            .properties
            .as_ref()
            .map(|recorded| recorded.diff(&defn.properties));
        if changes.as_ref().is_none_or(|c| !c.is_empty()) {
            info!(
                "updating {full_name} ({})...",
                changes.as_deref().map_or_else(|| String::from("all properties"), changed_fields)
            );
            api.update_health_check(&desired)
                .await
                .map_err(|e| update_error("health check", e))?;
            self.properties = Some(defn.properties.clone());
            self.meta.mark_up(&defn.fingerprint);
        }
        Ok(())
    }

    async fn destroy(&mut self, ctx: &ApplyContext<'_>, _wipe: bool) -> Result<bool> {
        if !self.meta.is_deployed() {
            return Ok(true);
        }
        let full_name = self.full_name();
        let Some(name) = self.check_name.clone() else {
            warn_destroy_missing(&full_name);
            return Ok(true);
        };
        let api = self.meta.connect(ctx.connector).await?;

        match api.get_health_check(&name).await?.found()? {
            None => warn_destroy_missing(&full_name),
            Some(_) => {
                if !confirm_destroy(ctx.prompt, &full_name, false)? {
                    return Ok(false);
                }
                deleted(&full_name, api.destroy_health_check(&name).await)?;
            }
        }
        self.meta.mark_missing();
        Ok(true)
    }
}
