//! GCE networks and the firewall rules attached to them.
//!
//! A network owns its firewall rules: each rule `<rule>` declared under
//! `firewall` becomes a provider firewall named `<network>-<rule>`. Applying
//! a network reconciles the rule set three ways, between the definition, the
//! recorded rules and (under `check`) the live firewalls of the network.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::config::{DefinitionHasher, FirewallOptions, NetworkOptions, ensure_valid_name};
use crate::credentials::CredentialOptions;
use crate::diff::{DiffDetail, Diffable, FieldDiff, changed_fields};
use crate::error::{ConfigError, GceError, Result};
use crate::provider::{CloudApi, Firewall, FirewallAllowed};
use crate::reconciler::{ApplyContext, ApplyOptions, Reconcile};

use super::common::{
    ResourceMeta, confirm_destroy, create_error, deleted, normalize_list, reconcile_field,
    update_error, warn_destroy_missing, warn_not_supposed_to_exist,
};
use super::kind::ResourceKind;

/// Source range used when a rule names none.
pub const DEFAULT_SOURCE_RANGE: &str = "0.0.0.0/0";

/// A normalised firewall rule, as declared and as recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirewallRule {
    /// Protocol to ports; `None` opens every port of the protocol.
    pub allowed: BTreeMap<String, Option<Vec<String>>>,
    /// Source CIDR ranges.
    pub source_ranges: Vec<String>,
    /// Source instance tags.
    pub source_tags: Vec<String>,
    /// Target instance tags.
    pub target_tags: Vec<String>,
}

impl FirewallRule {
    /// Normalises declared options.
    ///
    /// # Errors
    ///
    /// Returns a validation error if no protocol is allowed. A rule without
    /// source ranges is opened to [`DEFAULT_SOURCE_RANGE`], so it always has
    /// a source.
    pub fn from_options(rule: &str, network: &str, options: &FirewallOptions) -> Result<Self> {
        let allowed: BTreeMap<String, Option<Vec<String>>> = options
            .allowed
            .iter()
            .map(|(protocol, ports)| {
                let ports = ports
                    .as_ref()
                    .map(|ports| ports.iter().map(ToString::to_string).collect());
                (protocol.clone(), ports)
            })
            .collect();
        if allowed.is_empty() {
            return Err(GceError::Config(ConfigError::validation(
                format!(
                    "Firewall rule '{rule}' in network '{network}' must provide at least one \
                     protocol/port specification"
                ),
                format!("firewall.{rule}.allowed"),
            )));
        }

        let mut source_ranges =
            normalize_list(options.source_ranges.as_deref().unwrap_or_default());
        if source_ranges.is_empty() {
            source_ranges.push(DEFAULT_SOURCE_RANGE.to_string());
        }
        Ok(Self {
            allowed,
            source_ranges,
            source_tags: normalize_list(&options.source_tags),
            target_tags: normalize_list(&options.target_tags),
        })
    }

    /// The allowed list in provider form, sorted by protocol.
    #[must_use]
    pub fn provider_allowed(&self) -> Vec<FirewallAllowed> {
        self.allowed
            .iter()
            .map(|(protocol, ports)| FirewallAllowed {
                protocol: protocol.clone(),
                ports: ports.clone().unwrap_or_default(),
            })
            .collect()
    }

    fn to_firewall(&self, name: String, network: String) -> Firewall {
        Firewall {
            name,
            network,
            allowed: self.provider_allowed(),
            source_ranges: self.source_ranges.clone(),
            source_tags: self.source_tags.clone(),
            target_tags: self.target_tags.clone(),
        }
    }
}

impl Diffable for FirewallRule {
    fn diff(&self, desired: &Self) -> Vec<DiffDetail> {
        FieldDiff::new()
            .field("allowed", &self.allowed, &desired.allowed)
            .field("source ranges", &self.source_ranges, &desired.source_ranges)
            .field("source tags", &self.source_tags, &desired.source_tags)
            .field("target tags", &self.target_tags, &desired.target_tags)
            .finish()
    }
}

fn sorted_allowed(allowed: &[FirewallAllowed]) -> Vec<FirewallAllowed> {
    let mut allowed = allowed.to_vec();
    allowed.sort();
    allowed
}

/// Desired state of a network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkDefinition {
    /// Logical name.
    pub name: String,
    /// Provider-side network name.
    pub network_name: String,
    /// Legacy network range.
    pub address_range: Option<String>,
    /// Firewall rules by rule name.
    pub firewall: BTreeMap<String, FirewallRule>,
    /// Declared credentials.
    pub credentials: CredentialOptions,
    /// Fingerprint of the options.
    pub fingerprint: String,
}

impl NetworkDefinition {
    /// Builds a definition from its options.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid name or an invalid firewall rule.
    pub fn new(name: &str, options: &NetworkOptions) -> Result<Self> {
        let network_name = options.name.clone().unwrap_or_else(|| name.to_string());
        ensure_valid_name(&network_name)?;

        let firewall = options
            .firewall
            .iter()
            .map(|(rule, fw)| {
                ensure_valid_name(&format!("{network_name}-{rule}"))?;
                Ok((rule.clone(), FirewallRule::from_options(rule, &network_name, fw)?))
            })
            .collect::<Result<_>>()?;

        Ok(Self {
            name: name.to_string(),
            network_name,
            address_range: options.address_range.clone(),
            firewall,
            credentials: options.credentials.clone(),
            fingerprint: DefinitionHasher::new().hash_options(
                ResourceKind::Network.resource_type(),
                name,
                options,
            )?,
        })
    }

    /// Short description for listings.
    #[must_use]
    pub fn show_type(&self) -> String {
        format!(
            "{} [{}]",
            ResourceKind::Network.type_name(),
            self.address_range.as_deref().unwrap_or("auto")
        )
    }
}

/// Recorded state of a network.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkState {
    /// Common state.
    pub meta: ResourceMeta,
    /// Provider-side network name.
    #[serde(default)]
    pub network_name: Option<String>,
    /// Legacy network range.
    #[serde(default)]
    pub address_range: Option<String>,
    /// Recorded firewall rules by rule name.
    #[serde(default)]
    pub firewall: BTreeMap<String, FirewallRule>,
}

impl NetworkState {
    /// Creates the state of a network that was never applied.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            meta: ResourceMeta::new(name),
            ..Self::default()
        }
    }

    fn network_name(&self) -> &str {
        self.network_name.as_deref().unwrap_or(&self.meta.name)
    }

    /// Human-readable name used in messages.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("GCE network '{}'", self.network_name())
    }

    /// Provider name of a firewall rule of this network.
    #[must_use]
    pub fn firewall_name(&self, rule: &str) -> String {
        format!("{}-{rule}", self.network_name())
    }

    fn full_firewall_name(&self, rule: &str) -> String {
        format!("GCE firewall '{}'", self.firewall_name(rule))
    }

    /// Short description for listings.
    #[must_use]
    pub fn show_type(&self) -> String {
        let kind = ResourceKind::Network.type_name();
        if self.meta.is_deployed() {
            format!("{kind} [{}]", self.address_range.as_deref().unwrap_or("auto"))
        } else {
            kind.to_string()
        }
    }

    async fn destroy_firewall(&mut self, api: &dyn CloudApi, rule: &str) -> Result<()> {
        let full_name = self.full_firewall_name(rule);
        info!("destroying {full_name}...");
        deleted(&full_name, api.destroy_firewall(&self.firewall_name(rule)).await)?;
        self.firewall.remove(rule);
        Ok(())
    }

    /// Matches live firewalls of the network against the recorded rules.
    ///
    /// Live firewalls with no recorded rule are deleted, recorded rules with
    /// no live firewall are forgotten, and recorded rules whose live
    /// counterpart drifted are rewritten so the declared pass updates them.
    async fn check_firewalls(&mut self, api: &dyn CloudApi) -> Result<()> {
        let network = self.network_name().to_string();
        let live: Vec<Firewall> = api
            .list_firewalls()
            .await?
            .into_iter()
            .filter(|fw| fw.network == network)
            .collect();

        for fw in &live {
            let rule_name = self
                .firewall
                .keys()
                .find(|rule| self.firewall_name(rule) == fw.name)
                .cloned();
            let Some(rule_name) = rule_name else {
                warn!("deleting {} which isn't supposed to exist...", fw.name);
                let outcome = api.destroy_firewall(&fw.name).await;
                deleted(&format!("GCE firewall '{}'", fw.name), outcome)?;
                continue;
            };

            let full_name = self.full_firewall_name(&rule_name);
            let Some(rule) = self.firewall.get_mut(&rule_name) else {
                continue;
            };
            let live_ranges = normalize_list(&fw.source_ranges);
            reconcile_field(
                &full_name,
                "source ranges",
                &mut rule.source_ranges,
                live_ranges,
                true,
            );
            let live_sources = normalize_list(&fw.source_tags);
            reconcile_field(&full_name, "source tags", &mut rule.source_tags, live_sources, true);
            let live_targets = normalize_list(&fw.target_tags);
            reconcile_field(&full_name, "target tags", &mut rule.target_tags, live_targets, true);

            if sorted_allowed(&fw.allowed) != rule.provider_allowed() {
                warn!("{full_name} allowed ports and protocols have changed unexpectedly");
                rule.allowed.clear();
            }
        }

        let vanished: Vec<String> = self
            .firewall
            .keys()
            .filter(|rule| {
                let name = self.firewall_name(rule);
                !live.iter().any(|fw| fw.name == name)
            })
            .cloned()
            .collect();
        for rule in vanished {
            warn!("firewall rule '{rule}' has disappeared...");
            self.firewall.remove(&rule);
        }
        Ok(())
    }

    /// Creates declared rules, updates changed ones and drops undeclared ones.
    async fn converge_firewalls(
        &mut self,
        api: &dyn CloudApi,
        defn: &NetworkDefinition,
    ) -> Result<()> {
        let network = self.network_name().to_string();

        for (rule_name, rule) in &defn.firewall {
            let firewall = rule.to_firewall(self.firewall_name(rule_name), network.clone());
            match self.firewall.get(rule_name) {
                Some(recorded) if recorded == rule => continue,
                Some(recorded) => {
                    info!(
                        "updating {} ({})...",
                        firewall.name,
                        changed_fields(&recorded.diff(rule))
                    );
                    api.update_firewall(&firewall)
                        .await
                        .map_err(|e| update_error("firewall rule", e))?;
                }
                None => {
                    info!("creating {}...", self.full_firewall_name(rule_name));
                    api.create_firewall(&firewall)
                        .await
                        .map_err(|e| create_error("firewall rule", e))?;
                }
            }
            self.firewall.insert(rule_name.clone(), rule.clone());
        }

        let undeclared: Vec<String> = self
            .firewall
            .keys()
            .filter(|rule| !defn.firewall.contains_key(*rule))
            .cloned()
            .collect();
        for rule in undeclared {
            self.destroy_firewall(api, &rule).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Reconcile for NetworkState {
    type Definition = NetworkDefinition;

    const KIND: ResourceKind = ResourceKind::Network;

    async fn create(
        &mut self,
        defn: &NetworkDefinition,
        ctx: &ApplyContext<'_>,
        options: ApplyOptions,
    ) -> Result<()> {
        let full_name = self.full_name();
        self.meta
            .no_change(self.address_range != defn.address_range, "address range", &full_name)?;
        self.meta
            .no_project_change(Self::KIND, &defn.credentials, ctx.env, &full_name)?;

        self.meta.copy_credentials(Self::KIND, &defn.credentials, ctx.env)?;
        self.network_name = Some(defn.network_name.clone());
        let full_name = self.full_name();
        let api = self.meta.connect(ctx.connector).await?;

        if options.check {
            match api.get_network(&defn.network_name).await?.found()? {
                Some(network) if self.meta.is_deployed() => {
                    let live_range = network.address_range;
                    reconcile_field(
                        &full_name,
                        "address range",
                        &mut self.address_range,
                        live_range,
                        false,
                    );
                }
                Some(network) => {
                    warn_not_supposed_to_exist(&full_name, false, false);
                    confirm_destroy(ctx.prompt, &full_name, true)?;
                    deleted(&full_name, api.destroy_network(&network.name).await)?;
                }
                None => self.meta.warn_missing_resource(&full_name),
            }
        }

        if !self.meta.is_deployed() {
            info!("creating {full_name}...");
            let network = api
                .create_network(&defn.network_name, defn.address_range.as_deref())
                .await
                .map_err(|e| create_error("network", e))?;
            self.meta.mark_up(&defn.fingerprint);
            self.address_range = network.address_range.or_else(|| defn.address_range.clone());
        }

        if options.check {
            self.check_firewalls(&*api).await?;
        }
        self.converge_firewalls(&*api, defn).await?;
        self.meta.definition_hash = Some(defn.fingerprint.clone());
        Ok(())
    }

    async fn destroy(&mut self, ctx: &ApplyContext<'_>, _wipe: bool) -> Result<bool> {
        if !self.meta.is_deployed() {
            return Ok(true);
        }
        let full_name = self.full_name();
        let network_name = self.network_name().to_string();
        let api = self.meta.connect(ctx.connector).await?;

        match api.get_network(&network_name).await?.found()? {
            None => warn_destroy_missing(&full_name),
            Some(network) => {
                if !confirm_destroy(ctx.prompt, &full_name, false)? {
                    return Ok(false);
                }
                let rules: Vec<String> = self.firewall.keys().cloned().collect();
                for rule in rules {
                    self.destroy_firewall(&*api, &rule).await?;
                }
                deleted(&full_name, api.destroy_network(&network.name).await)?;
            }
        }
        self.firewall.clear();
        self.meta.mark_missing();
        Ok(true)
    }
}
