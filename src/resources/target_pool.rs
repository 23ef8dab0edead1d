//! Target pools: groups of instances behind a forwarding rule.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{DefinitionHasher, ResourceRef, TargetPoolOptions, ensure_valid_name};
use crate::credentials::CredentialOptions;
use crate::error::Result;
use crate::provider::CloudApi;
use crate::reconciler::{ApplyContext, ApplyOptions, Reconcile};

use super::common::{
    ResourceMeta, confirm_destroy, create_error, deleted, normalize_list, reconcile_field,
    update_error, warn_destroy_missing, warn_not_supposed_to_exist,
};
use super::kind::ResourceKind;

/// Desired state of a target pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetPoolDefinition {
    /// Logical name.
    pub name: String,
    /// Provider-side pool name.
    pub pool_name: String,
    /// Region.
    pub region: String,
    /// Health check to attach.
    pub health_check: Option<ResourceRef>,
    /// Instance names, sorted and deduplicated.
    pub machines: Vec<String>,
    /// Declared credentials.
    pub credentials: CredentialOptions,
    /// Fingerprint of the options.
    pub fingerprint: String,
}

impl TargetPoolDefinition {
    /// Builds a definition from its options.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid name.
    pub fn new(name: &str, options: &TargetPoolOptions) -> Result<Self> {
        let pool_name = options.name.clone().unwrap_or_else(|| name.to_string());
        ensure_valid_name(&pool_name)?;

        Ok(Self {
            name: name.to_string(),
            pool_name,
            region: options.region.clone(),
            health_check: options.health_check.clone(),
            machines: normalize_list(&options.machines),
            credentials: options.credentials.clone(),
            fingerprint: DefinitionHasher::new().hash_options(
                ResourceKind::TargetPool.resource_type(),
                name,
                options,
            )?,
        })
    }

    /// Short description for listings.
    #[must_use]
    pub fn show_type(&self) -> String {
        format!("{} [{}]", ResourceKind::TargetPool.type_name(), self.region)
    }
}

/// Recorded state of a target pool.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetPoolState {
    /// Common state.
    pub meta: ResourceMeta,
    /// Provider-side pool name.
    #[serde(default)]
    pub pool_name: Option<String>,
    /// Region.
    #[serde(default)]
    pub region: Option<String>,
    /// Provider name of the attached health check.
    #[serde(default)]
    pub health_check: Option<String>,
    /// Member instances, sorted.
    #[serde(default)]
    pub machines: Vec<String>,
}

impl TargetPoolState {
    /// Creates the state of a pool that was never applied.
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
            "GCE target pool '{}'",
            self.pool_name.as_deref().unwrap_or(&self.meta.name)
        )
    }

    /// Short description for listings.
    #[must_use]
    pub fn show_type(&self) -> String {
        let kind = ResourceKind::TargetPool.type_name();
        match &self.region {
            Some(region) if self.meta.is_deployed() => format!("{kind} [{region}]"),
            _ => kind.to_string(),
        }
    }

    /// Detaches every live health check other than the declared one.
    ///
    /// A pool holds at most one check here; checks attached outside the
    /// deployment are warned about before they go.
    async fn check_health_checks(
        &mut self,
        api: &dyn CloudApi,
        defn: &TargetPoolDefinition,
        live: Vec<String>,
        desired: Option<&str>,
    ) -> Result<()> {
        let full_name = self.full_name();
        let (kept, extra): (Vec<String>, Vec<String>) =
            live.into_iter().partition(|check| Some(check.as_str()) == desired);

        for check in extra {
            if self.health_check.as_ref() == Some(&check) {
                info!("detaching health check '{check}' from {full_name}...");
                self.health_check = None;
            } else {
                warn!(
                    "{full_name} has health check '{check}' attached, which isn't supposed to be; \
                     detaching..."
                );
            }
            api.remove_target_pool_health_check(&defn.pool_name, &defn.region, &check)
                .await
                .map_err(|e| update_error("target pool", e))?;
        }

        let live_check = kept.into_iter().next();
        reconcile_field(&full_name, "health check", &mut self.health_check, live_check, true);
        Ok(())
    }

    async fn converge_health_check(
        &mut self,
        api: &dyn CloudApi,
        defn: &TargetPoolDefinition,
        desired: Option<String>,
    ) -> Result<()> {
        if self.health_check == desired {
            return Ok(());
        }
        let full_name = self.full_name();
        if let Some(old) = self.health_check.clone() {
            info!("detaching health check '{old}' from {full_name}...");
            api.remove_target_pool_health_check(&defn.pool_name, &defn.region, &old)
                .await
                .map_err(|e| update_error("target pool", e))?;
            self.health_check = None;
        }
        if let Some(new) = desired {
            info!("attaching health check '{new}' to {full_name}...");
            api.add_target_pool_health_check(&defn.pool_name, &defn.region, &new)
                .await
                .map_err(|e| update_error("target pool", e))?;
            self.health_check = Some(new);
        }
        Ok(())
    }

    async fn converge_machines(
        &mut self,
        api: &dyn CloudApi,
        defn: &TargetPoolDefinition,
    ) -> Result<()> {
        let full_name = self.full_name();
        let removed: Vec<String> = self
            .machines
            .iter()
            .filter(|m| !defn.machines.contains(m))
            .cloned()
            .collect();
        for machine in removed {
            info!("removing '{machine}' from {full_name}...");
            api.remove_target_pool_instance(&defn.pool_name, &defn.region, &machine)
                .await
                .map_err(|e| update_error("target pool", e))?;
            self.machines.retain(|m| *m != machine);
        }

        for machine in &defn.machines {
            if self.machines.contains(machine) {
                continue;
            }
            info!("adding '{machine}' to {full_name}...");
            api.add_target_pool_instance(&defn.pool_name, &defn.region, machine)
                .await
                .map_err(|e| update_error("target pool", e))?;
            self.machines.push(machine.clone());
            self.machines.sort();
        }
        Ok(())
    }
}

#[async_trait]
impl Reconcile for TargetPoolState {
    type Definition = TargetPoolDefinition;

    const KIND: ResourceKind = ResourceKind::TargetPool;

    async fn create(
        &mut self,
        defn: &TargetPoolDefinition,
        ctx: &ApplyContext<'_>,
        options: ApplyOptions,
    ) -> Result<()> {
        let full_name = self.full_name();
        self.meta.no_change(
            self.region.as_deref() != Some(defn.region.as_str()),
            "region",
            &full_name,
        )?;
        self.meta
            .no_project_change(Self::KIND, &defn.credentials, ctx.env, &full_name)?;

        let desired_check = defn
            .health_check
            .as_ref()
            .map(|check| ctx.siblings.resolve(ResourceKind::HttpHealthCheck, check, &full_name))
            .transpose()?;

        self.meta.copy_credentials(Self::KIND, &defn.credentials, ctx.env)?;
        self.pool_name = Some(defn.pool_name.clone());
        let full_name = self.full_name();
        let api = self.meta.connect(ctx.connector).await?;

        if options.check {
            match api.get_target_pool(&defn.pool_name, &defn.region).await?.found()? {
                Some(pool) if self.meta.is_deployed() => {
                    let live_region = Some(pool.region);
                    reconcile_field(&full_name, "region", &mut self.region, live_region, false);
                    let live_machines = normalize_list(&pool.instances);
                    reconcile_field(
                        &full_name,
                        "machines",
                        &mut self.machines,
                        live_machines,
                        true,
                    );
                    let desired = desired_check.as_deref();
                    self.check_health_checks(&*api, defn, pool.health_checks, desired).await?;
                }
                Some(pool) => {
                    warn_not_supposed_to_exist(&full_name, false, false);
                    confirm_destroy(ctx.prompt, &full_name, true)?;
                    deleted(&full_name, api.destroy_target_pool(&pool.name, &pool.region).await)?;
                }
                None => self.meta.warn_missing_resource(&full_name),
            }
        }

        if !self.meta.is_deployed() {
            info!("creating {full_name}...");
            api.create_target_pool(&defn.pool_name, &defn.region)
                .await
                .map_err(|e| create_error("target pool", e))?;
            self.meta.mark_up(&defn.fingerprint);
            self.region = Some(defn.region.clone());
            self.health_check = None;
            self.machines.clear();
        }

        self.converge_health_check(&*api, defn, desired_check).await?;
        self.converge_machines(&*api, defn).await?;
        self.meta.definition_hash = Some(defn.fingerprint.clone());
        Ok(())
    }

    async fn destroy(&mut self, ctx: &ApplyContext<'_>, _wipe: bool) -> Result<bool> {
        if !self.meta.is_deployed() {
            return Ok(true);
        }
        let full_name = self.full_name();
        let (Some(name), Some(region)) = (self.pool_name.clone(), self.region.clone()) else {
            warn_destroy_missing(&full_name);
            return Ok(true);
        };
        let api = self.meta.connect(ctx.connector).await?;

        match api.get_target_pool(&name, &region).await?.found()? {
            None => warn_destroy_missing(&full_name),
            Some(_) => {
                if !confirm_destroy(ctx.prompt, &full_name, false)? {
                    return Ok(false);
                }
                deleted(&full_name, api.destroy_target_pool(&name, &region).await)?;
            }
        }
        self.meta.mark_missing();
        Ok(true)
    }
}
