//! Static routes of a network.
//!
//! Routes cannot be modified once created. A changed definition is applied
//! by deleting and recreating the route, which requires `allow_recreate`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{
    DefinitionHasher, ResourceRef, RouteOptions, ensure_not_empty, ensure_valid_name,
};
use crate::credentials::CredentialOptions;
use crate::diff::{DiffDetail, Diffable, FieldDiff, changed_fields};
use crate::error::{GceError, ReconcileError, Result};
use crate::provider::Route;
use crate::reconciler::{ApplyContext, ApplyOptions, Reconcile};

use super::common::{
    ResourceMeta, confirm_destroy, create_error, deleted, normalize_list, reconcile_field,
    warn_destroy_missing, warn_not_supposed_to_exist,
};
use super::kind::ResourceKind;

/// Everything a route is made of, once its network is resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteProperties {
    /// Provider name of the network.
    pub network: String,
    /// Destination CIDR range.
    pub destination: String,
    /// Priority; lower wins.
    pub priority: u32,
    /// Next hop instance, gateway or IP.
    pub next_hop: Option<String>,
    /// Instance tags the route applies to.
    pub tags: Vec<String>,
    /// Free-form description.
    pub description: Option<String>,
}

impl RouteProperties {
    fn from_provider(route: Route) -> Self {
        Self {
            network: route.network,
            destination: route.destination,
            priority: route.priority,
            next_hop: route.next_hop,
            tags: normalize_list(&route.tags),
            description: route.description,
        }
    }

    fn to_provider(&self, name: &str) -> Route {
        Route {
            name: name.to_string(),
            network: self.network.clone(),
            destination: self.destination.clone(),
            priority: self.priority,
            next_hop: self.next_hop.clone(),
            tags: self.tags.clone(),
            description: self.description.clone(),
        }
    }

    fn absorb(&mut self, live: Self, resource: &str) {
        reconcile_field(resource, "network", &mut self.network, live.network, false);
        reconcile_field(resource, "destination", &mut self.destination, live.destination, false);
        reconcile_field(resource, "priority", &mut self.priority, live.priority, false);
        reconcile_field(resource, "next hop", &mut self.next_hop, live.next_hop, false);
        reconcile_field(resource, "tags", &mut self.tags, live.tags, false);
        reconcile_field(resource, "description", &mut self.description, live.description, false);
    }
}

impl Diffable for RouteProperties {
    fn diff(&self, desired: &Self) -> Vec<DiffDetail> {
        FieldDiff::new()
            .field("network", &self.network, &desired.network)
            .field("destination", &self.destination, &desired.destination)
            .field("priority", &self.priority, &desired.priority)
            .field("next hop", &self.next_hop, &desired.next_hop)
            .field("tags", &self.tags, &desired.tags)
            .field("description", &self.description, &desired.description)
            .finish()
    }
}

/// Desired state of a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDefinition {
    /// Logical name.
    pub name: String,
    /// Provider-side route name.
    pub route_name: String,
    /// Network resource or network name.
    pub network: ResourceRef,
    /// Destination CIDR range.
    pub destination: String,
    /// Priority.
    pub priority: u32,
    /// Next hop.
    pub next_hop: Option<String>,
    /// Instance tags, sorted.
    pub tags: Vec<String>,
    /// Free-form description.
    pub description: Option<String>,
    /// Declared credentials.
    pub credentials: CredentialOptions,
    /// Fingerprint of the options.
    pub fingerprint: String,
}

impl RouteDefinition {
    /// Builds a definition from its options.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid name or an empty destination.
    pub fn new(name: &str, options: &RouteOptions) -> Result<Self> {
        let route_name = options.name.clone().unwrap_or_else(|| name.to_string());
        ensure_valid_name(&route_name)?;
        ensure_not_empty(&options.destination, "destination")?;

        Ok(Self {
            name: name.to_string(),
            route_name,
            network: options.network.clone(),
            destination: options.destination.clone(),
            priority: options.priority,
            next_hop: options.next_hop.clone(),
            tags: normalize_list(&options.tags),
            description: options.description.clone(),
            credentials: options.credentials.clone(),
            fingerprint: DefinitionHasher::new().hash_options(
                ResourceKind::Route.resource_type(),
                name,
                options,
            )?,
        })
    }

    fn properties(&self, network: String) -> RouteProperties {
        RouteProperties {
            network,
            destination: self.destination.clone(),
            priority: self.priority,
            next_hop: self.next_hop.clone(),
            tags: self.tags.clone(),
            description: self.description.clone(),
        }
    }

    /// Short description for listings.
    #[must_use]
    pub fn show_type(&self) -> String {
        format!("{} [{}]", ResourceKind::Route.type_name(), self.destination)
    }
}

/// Recorded state of a route.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouteState {
    /// Common state.
    pub meta: ResourceMeta,
    /// Provider-side route name.
    #[serde(default)]
    pub route_name: Option<String>,
    /// Recorded properties.
    #[serde(default)]
    pub properties: Option<RouteProperties>,
}

impl RouteState {
    /// Creates the state of a route that was never applied.
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
            "GCE route '{}'",
            self.route_name.as_deref().unwrap_or(&self.meta.name)
        )
    }

    /// Short description for listings.
    #[must_use]
    pub fn show_type(&self) -> String {
        let kind = ResourceKind::Route.type_name();
        match &self.properties {
            Some(p) if self.meta.is_deployed() => format!("{kind} [{}]", p.destination),
            _ => kind.to_string(),
        }
    }
}

#[async_trait]
impl Reconcile for RouteState {
    type Definition = RouteDefinition;

    const KIND: ResourceKind = ResourceKind::Route;

    async fn create(
        &mut self,
        defn: &RouteDefinition,
        ctx: &ApplyContext<'_>,
        options: ApplyOptions,
    ) -> Result<()> {
        let full_name = self.full_name();
        let network = ctx
            .siblings
            .resolve(ResourceKind::Network, &defn.network, &full_name)?;
        let desired = defn.properties(network);

        let changes = match &self.properties {
            Some(recorded) if self.meta.is_deployed() => recorded.diff(&desired),
            _ => Vec::new(),
        };
        if !changes.is_empty() && !options.allow_recreate {
            return Err(GceError::Reconcile(ReconcileError::RecreateRequired {
                resource: full_name,
                property: changed_fields(&changes),
            }));
        }
        self.meta
            .no_project_change(Self::KIND, &defn.credentials, ctx.env, &full_name)?;

        self.meta.copy_credentials(Self::KIND, &defn.credentials, ctx.env)?;
        let old_name = self.route_name.replace(defn.route_name.clone());
        let full_name = self.full_name();
        let api = self.meta.connect(ctx.connector).await?;

        if options.check {
            match api.get_route(&defn.route_name).await?.found()? {
                Some(route) if self.meta.is_deployed() => {
                    let live = RouteProperties::from_provider(route);
                    match self.properties.as_mut() {
                        Some(recorded) => recorded.absorb(live, &full_name),
                        None => self.properties = Some(live),
                    }
                }
                Some(route) => {
                    warn_not_supposed_to_exist(&full_name, false, false);
                    confirm_destroy(ctx.prompt, &full_name, true)?;
                    deleted(&full_name, api.destroy_route(&route.name).await)?;
                }
                None => self.meta.warn_missing_resource(&full_name),
            }
        }

        if !changes.is_empty() && self.meta.is_deployed() {
            let old = old_name.unwrap_or_else(|| defn.route_name.clone());
            warn!("recreating GCE route '{old}' ({})...", changed_fields(&changes));
            deleted(&full_name, api.destroy_route(&old).await)?;
            self.meta.mark_missing();
        }

        if !self.meta.is_deployed() {
            info!("creating {full_name} to {}...", desired.destination);
            api.create_route(&desired.to_provider(&defn.route_name))
                .await
                .map_err(|e| create_error("route", e))?;
            self.meta.mark_up(&defn.fingerprint);
            self.properties = Some(desired);
        }
        Ok(())
    }

    async fn destroy(&mut self, ctx: &ApplyContext<'_>, _wipe: bool) -> Result<bool> {
        if !self.meta.is_deployed() {
            return Ok(true);
        }
        let full_name = self.full_name();
        let Some(name) = self.route_name.clone() else {
            warn_destroy_missing(&full_name);
            return Ok(true);
        };
        let api = self.meta.connect(ctx.connector).await?;

        match api.get_route(&name).await?.found()? {
            None => warn_destroy_missing(&full_name),
            Some(_) => {
                if !confirm_destroy(ctx.prompt, &full_name, false)? {
                    return Ok(false);
                }
                deleted(&full_name, api.destroy_route(&name).await)?;
            }
        }
        self.meta.mark_missing();
        Ok(true)
    }
}
