//! Regional forwarding rules pointing at a target pool.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{DefinitionHasher, ForwardingRuleOptions, ResourceRef, ensure_valid_name};
use crate::credentials::CredentialOptions;
use crate::error::Result;
use crate::provider::ForwardingRule;
use crate::reconciler::{ApplyContext, ApplyOptions, Reconcile};

use super::common::{
    ResourceMeta, confirm_destroy, create_error, deleted, reconcile_field, update_error,
    warn_destroy_missing, warn_not_supposed_to_exist,
};
use super::kind::ResourceKind;

/// Desired state of a forwarding rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardingRuleDefinition {
    /// Logical name.
    pub name: String,
    /// Provider-side rule name.
    pub rule_name: String,
    /// Region.
    pub region: String,
    /// Pool receiving the traffic.
    pub target_pool: ResourceRef,
    /// `TCP` or `UDP`.
    pub protocol: String,
    /// Port or range, e.g. `"80"` or `"8000-8080"`.
    pub port_range: Option<String>,
    /// Static IP resource or literal address.
    pub ip_address: Option<ResourceRef>,
    /// Free-form description.
    pub description: Option<String>,
    /// Declared credentials.
    pub credentials: CredentialOptions,
    /// Fingerprint of the options.
    pub fingerprint: String,
}

impl ForwardingRuleDefinition {
    /// Builds a definition from its options.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid name.
    pub fn new(name: &str, options: &ForwardingRuleOptions) -> Result<Self> {
        let rule_name = options.name.clone().unwrap_or_else(|| name.to_string());
        ensure_valid_name(&rule_name)?;

        Ok(Self {
            name: name.to_string(),
            rule_name,
            region: options.region.clone(),
            target_pool: options.target_pool.clone(),
            protocol: options.protocol.to_uppercase(),
            port_range: options.port_range.clone(),
            ip_address: options.ip_address.clone(),
            description: options.description.clone(),
            credentials: options.credentials.clone(),
            fingerprint: DefinitionHasher::new().hash_options(
                ResourceKind::ForwardingRule.resource_type(),
                name,
                options,
            )?,
        })
    }

    /// Short description for listings.
    #[must_use]
    pub fn show_type(&self) -> String {
        format!("{} [{}]", ResourceKind::ForwardingRule.type_name(), self.region)
    }
}

/// Recorded state of a forwarding rule.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForwardingRuleState {
    /// Common state.
    pub meta: ResourceMeta,
    /// Provider-side rule name.
    #[serde(default)]
    pub rule_name: Option<String>,
    /// Region.
    #[serde(default)]
    pub region: Option<String>,
    /// Provider name of the target pool.
    #[serde(default)]
    pub target_pool: Option<String>,
    /// Protocol.
    #[serde(default)]
    pub protocol: Option<String>,
    /// Port range.
    #[serde(default)]
    pub port_range: Option<String>,
    /// The address traffic arrives on.
    #[serde(default)]
    pub ip_address: Option<String>,
    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,
}

impl ForwardingRuleState {
    /// Creates the state of a rule that was never applied.
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
            "GCE forwarding rule '{}'",
            self.rule_name.as_deref().unwrap_or(&self.meta.name)
        )
    }

    /// Short description for listings.
    #[must_use]
    pub fn show_type(&self) -> String {
        let kind = ResourceKind::ForwardingRule.type_name();
        match (&self.region, &self.ip_address) {
            (Some(region), Some(ip)) if self.meta.is_deployed() => {
                format!("{kind} [{region}; {ip}]")
            }
            _ => kind.to_string(),
        }
    }
}

#[async_trait]
impl Reconcile for ForwardingRuleState {
    type Definition = ForwardingRuleDefinition;

    const KIND: ResourceKind = ResourceKind::ForwardingRule;

    async fn create(
        &mut self,
        defn: &ForwardingRuleDefinition,
        ctx: &ApplyContext<'_>,
        options: ApplyOptions,
    ) -> Result<()> {
        let full_name = self.full_name();
        let target_pool = ctx
            .siblings
            .resolve(ResourceKind::TargetPool, &defn.target_pool, &full_name)?;
        let requested_ip = defn
            .ip_address
            .as_ref()
            .map(|ip| ctx.siblings.resolve(ResourceKind::StaticIp, ip, &full_name))
            .transpose()?;

        self.meta.no_change(
            self.region.as_deref() != Some(defn.region.as_str()),
            "region",
            &full_name,
        )?;
        self.meta.no_change(
            self.protocol.as_deref() != Some(defn.protocol.as_str()),
            "protocol",
            &full_name,
        )?;
        self.meta
            .no_change(self.port_range != defn.port_range, "port range", &full_name)?;
        self.meta.no_change(
            requested_ip.is_some() && self.ip_address != requested_ip,
            "IP address",
            &full_name,
        )?;
        self.meta
            .no_change(self.description != defn.description, "description", &full_name)?;
        self.meta
            .no_project_change(Self::KIND, &defn.credentials, ctx.env, &full_name)?;

        self.meta.copy_credentials(Self::KIND, &defn.credentials, ctx.env)?;
        self.rule_name = Some(defn.rule_name.clone());
        let full_name = self.full_name();
        let api = self.meta.connect(ctx.connector).await?;

        if options.check {
            match api.get_forwarding_rule(&defn.rule_name, &defn.region).await?.found()? {
                Some(rule) if self.meta.is_deployed() => {
                    let name = full_name.as_str();
                    reconcile_field(name, "region", &mut self.region, Some(rule.region), false);
                    let live_protocol = Some(rule.protocol);
                    reconcile_field(name, "protocol", &mut self.protocol, live_protocol, false);
                    let live_ports = rule.port_range;
                    reconcile_field(name, "port range", &mut self.port_range, live_ports, false);
                    let live_ip = rule.address;
                    reconcile_field(name, "IP address", &mut self.ip_address, live_ip, false);
                    let live_description = rule.description;
                    reconcile_field(
                        name,
                        "description",
                        &mut self.description,
                        live_description,
                        false,
                    );
                    let live_pool = Some(rule.target_pool);
                    reconcile_field(name, "target pool", &mut self.target_pool, live_pool, true);
                }
                Some(rule) => {
                    warn_not_supposed_to_exist(&full_name, false, false);
                    confirm_destroy(ctx.prompt, &full_name, true)?;
                    let outcome = api.destroy_forwarding_rule(&rule.name, &rule.region).await;
                    deleted(&full_name, outcome)?;
                }
                None => self.meta.warn_missing_resource(&full_name),
            }
        }

        if !self.meta.is_deployed() {
            info!("creating {full_name} for target pool '{target_pool}'...");
            let request = ForwardingRule {
                name: defn.rule_name.clone(),
                region: defn.region.clone(),
                target_pool: target_pool.clone(),
                protocol: defn.protocol.clone(),
                port_range: defn.port_range.clone(),
                address: requested_ip,
                description: defn.description.clone(),
            };
            let rule = api
                .create_forwarding_rule(&request)
                .await
                .map_err(|e| create_error("forwarding rule", e))?;

            self.meta.mark_up(&defn.fingerprint);
            self.region = Some(defn.region.clone());
            self.protocol = Some(defn.protocol.clone());
            self.port_range = defn.port_range.clone();
            self.ip_address = rule.address;
            self.description = defn.description.clone();
            self.target_pool = Some(target_pool);
            return Ok(());
        }

        if self.target_pool.as_deref() != Some(target_pool.as_str()) {
            info!("pointing {full_name} at target pool '{target_pool}'...");
            api.set_forwarding_rule_target(&defn.rule_name, &defn.region, &target_pool)
                .await
                .map_err(|e| update_error("forwarding rule", e))?;
            self.target_pool = Some(target_pool);
            self.meta.mark_up(&defn.fingerprint);
        }
        Ok(())
    }

    async fn destroy(&mut self, ctx: &ApplyContext<'_>, _wipe: bool) -> Result<bool> {
        if !self.meta.is_deployed() {
            return Ok(true);
        }
        let full_name = self.full_name();
        let (Some(name), Some(region)) = (self.rule_name.clone(), self.region.clone()) else {
            warn_destroy_missing(&full_name);
            return Ok(true);
        };
        let api = self.meta.connect(ctx.connector).await?;

        match api.get_forwarding_rule(&name, &region).await?.found()? {
            None => warn_destroy_missing(&full_name),
            Some(_) => {
                if !confirm_destroy(ctx.prompt, &full_name, false)? {
                    return Ok(false);
                }
                deleted(&full_name, api.destroy_forwarding_rule(&name, &region).await)?;
            }
        }
        self.meta.mark_missing();
        Ok(true)
    }
}
