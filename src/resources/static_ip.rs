//! Reserved regional static IP addresses.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{DefinitionHasher, StaticIpOptions, ensure_valid_name};
use crate::credentials::CredentialOptions;
use crate::error::Result;
use crate::reconciler::{ApplyContext, ApplyOptions, Reconcile};

use super::common::{
    ResourceMeta, confirm_destroy, create_error, deleted, reconcile_field, warn_destroy_missing,
    warn_not_supposed_to_exist,
};
use super::kind::ResourceKind;

/// Desired state of a static IP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticIpDefinition {
    /// Logical name.
    pub name: String,
    /// Provider-side address name.
    pub address_name: String,
    /// Region.
    pub region: String,
    /// Specific address to reserve.
    pub ip_address: Option<String>,
    /// Declared credentials.
    pub credentials: CredentialOptions,
    /// Fingerprint of the options.
    pub fingerprint: String,
}

impl StaticIpDefinition {
    /// Builds a definition from its options.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid name.
    pub fn new(name: &str, options: &StaticIpOptions) -> Result<Self> {
        let address_name = options.name.clone().unwrap_or_else(|| name.to_string());
        ensure_valid_name(&address_name)?;

        Ok(Self {
            name: name.to_string(),
            address_name,
            region: options.region.clone(),
            ip_address: options.ip_address.clone(),
            credentials: options.credentials.clone(),
            fingerprint: DefinitionHasher::new().hash_options(
                ResourceKind::StaticIp.resource_type(),
                name,
                options,
            )?,
        })
    }

    /// Short description for listings.
    #[must_use]
    pub fn show_type(&self) -> String {
        format!("{} [{}]", ResourceKind::StaticIp.type_name(), self.region)
    }
}

/// Recorded state of a static IP.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticIpState {
    /// Common state.
    pub meta: ResourceMeta,
    /// Provider-side address name.
    #[serde(default)]
    pub address_name: Option<String>,
    /// Region.
    #[serde(default)]
    pub region: Option<String>,
    /// The reserved address.
    #[serde(default)]
    pub ip_address: Option<String>,
}

impl StaticIpState {
    /// Creates the state of an address that was never applied.
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
            "GCE static IP address '{}'",
            self.address_name.as_deref().unwrap_or(&self.meta.name)
        )
    }

    /// Short description for listings.
    #[must_use]
    pub fn show_type(&self) -> String {
        let kind = ResourceKind::StaticIp.type_name();
        match (&self.region, &self.ip_address) {
            (Some(region), Some(ip)) if self.meta.is_deployed() => {
                format!("{kind} [{region}; {ip}]")
            }
            _ => kind.to_string(),
        }
    }
}

#[async_trait]
impl Reconcile for StaticIpState {
    type Definition = StaticIpDefinition;

    const KIND: ResourceKind = ResourceKind::StaticIp;

    async fn create(
        &mut self,
        defn: &StaticIpDefinition,
        ctx: &ApplyContext<'_>,
        options: ApplyOptions,
    ) -> Result<()> {
        let full_name = self.full_name();
        self.meta.no_change(
            self.region.as_deref() != Some(defn.region.as_str()),
            "region",
            &full_name,
        )?;
        self.meta.no_change(
            defn.ip_address.is_some() && self.ip_address != defn.ip_address,
            "address",
            &full_name,
        )?;
        self.meta
            .no_project_change(Self::KIND, &defn.credentials, ctx.env, &full_name)?;

        self.meta.copy_credentials(Self::KIND, &defn.credentials, ctx.env)?;
        self.address_name = Some(defn.address_name.clone());
        let full_name = self.full_name();
        let api = self.meta.connect(ctx.connector).await?;

        if options.check {
            match api.get_address(&defn.address_name, &defn.region).await?.found()? {
                Some(address) if self.meta.is_deployed() => {
                    let live_region = Some(address.region);
                    reconcile_field(&full_name, "region", &mut self.region, live_region, false);
                    let live_ip = Some(address.address);
                    reconcile_field(&full_name, "address", &mut self.ip_address, live_ip, false);
                }
                Some(address) => {
                    warn_not_supposed_to_exist(&full_name, false, true);
                    confirm_destroy(ctx.prompt, &full_name, true)?;
                    deleted(&full_name, api.destroy_address(&address.name, &address.region).await)?;
                }
                None => self.meta.warn_missing_resource(&full_name),
            }
        }

        if !self.meta.is_deployed() {
            info!("reserving {full_name} in region '{}'...", defn.region);
            let address = api
                .create_address(&defn.address_name, &defn.region, defn.ip_address.as_deref())
                .await
                .map_err(|e| create_error("address", e))?;
            info!("reserved IP address: {}", address.address);

            self.meta.mark_up(&defn.fingerprint);
            self.region = Some(defn.region.clone());
            self.ip_address = Some(address.address);
        }
        Ok(())
    }

    async fn destroy(&mut self, ctx: &ApplyContext<'_>, _wipe: bool) -> Result<bool> {
        if !self.meta.is_deployed() {
            return Ok(true);
        }
        let full_name = self.full_name();
        let (Some(name), Some(region)) = (self.address_name.clone(), self.region.clone()) else {
            warn_destroy_missing(&full_name);
            return Ok(true);
        };
        let api = self.meta.connect(ctx.connector).await?;

        match api.get_address(&name, &region).await?.found()? {
            None => warn_destroy_missing(&full_name),
            Some(_) => {
                if !confirm_destroy(ctx.prompt, &full_name, false)? {
                    return Ok(false);
                }
                deleted(&full_name, api.destroy_address(&name, &region).await)?;
            }
        }
        self.meta.mark_missing();
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::Lifecycle;
    use crate::resources::testing::{CHECK, Harness, NO_CHECK};

    fn options(ip: Option<&str>) -> StaticIpOptions {
        StaticIpOptions {
            name: None,
            region: String::from("europe-west1"),
            ip_address: ip.map(String::from),
            credentials: CredentialOptions::default(),
        }
    }

    #[tokio::test]
    async fn test_reserve_records_address() {
        let h = Harness::new();
        let defn = StaticIpDefinition::new("lb-ip", &options(None)).expect("definition");
        let mut state = StaticIpState::new("lb-ip");

        state.create(&defn, &h.ctx(), NO_CHECK).await.expect("create");
        assert_eq!(state.meta.lifecycle, Lifecycle::Up);
        assert_eq!(state.ip_address.as_deref(), Some("203.0.113.10"));
        assert_eq!(state.show_type(), "gce-static-ip [europe-west1; 203.0.113.10]");

        h.cloud.clear_calls();
        state.create(&defn, &h.ctx(), CHECK).await.expect("check");
        assert!(h.cloud.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_requested_address_is_kept() {
        let h = Harness::new();
        let defn = StaticIpDefinition::new("lb-ip", &options(Some("192.0.2.4")))
            .expect("definition");
        let mut state = StaticIpState::new("lb-ip");
        state.create(&defn, &h.ctx(), NO_CHECK).await.expect("create");
        assert_eq!(state.ip_address.as_deref(), Some("192.0.2.4"));

        let other = StaticIpDefinition::new("lb-ip", &options(Some("192.0.2.5")))
            .expect("definition");
        let err = state
            .create(&other, &h.ctx(), CHECK)
            .await
            .expect_err("immutable");
        assert!(err.to_string().contains("cannot change the address"));
    }

    #[tokio::test]
    async fn test_released_address_is_reserved_again() {
        let h = Harness::new();
        let defn = StaticIpDefinition::new("lb-ip", &options(None)).expect("definition");
        let mut state = StaticIpState::new("lb-ip");
        state.create(&defn, &h.ctx(), NO_CHECK).await.expect("create");
        h.cloud.lock().addresses.clear();

        state.create(&defn, &h.ctx(), CHECK).await.expect("recreate");
        assert_eq!(state.meta.lifecycle, Lifecycle::Up);
        assert!(h.cloud.lock().addresses.contains_key("lb-ip"));

        assert!(state.destroy(&h.ctx(), false).await.expect("destroy"));
        assert!(h.cloud.lock().addresses.is_empty());
    }
}
