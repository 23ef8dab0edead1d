//! GCE persistent disks.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{DefinitionHasher, DiskOptions, ensure_valid_name};
use crate::credentials::CredentialOptions;
use crate::error::{ProviderError, ReconcileError, Result};
use crate::provider::CreateVolumeRequest;
use crate::reconciler::{ApplyContext, ApplyOptions, Reconcile};

use super::common::{
    ResourceMeta, confirm_destroy, create_error, deleted, reconcile_field, translate,
    warn_destroy_missing, warn_not_supposed_to_exist,
};
use super::image_ref::{ImageRef, resolve_image};
use super::kind::ResourceKind;

/// Provider disk types are named `pd-<type>`.
const DISK_TYPE_PREFIX: &str = "pd-";

/// Desired state of a persistent disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskDefinition {
    /// Logical name.
    pub name: String,
    /// Provider-side disk name.
    pub disk_name: String,
    /// Zone.
    pub region: String,
    /// Size in GiB.
    pub size: Option<u64>,
    /// Snapshot to restore from.
    pub snapshot: Option<String>,
    /// Image to create from.
    pub image: ImageRef,
    /// `standard` or `ssd`.
    pub disk_type: String,
    /// Declared credentials.
    pub credentials: CredentialOptions,
    /// Fingerprint of the options.
    pub fingerprint: String,
}

impl DiskDefinition {
    /// Builds a definition from its options.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid name or an incomplete image reference.
    pub fn new(name: &str, options: &DiskOptions) -> Result<Self> {
        let disk_name = options.name.clone().unwrap_or_else(|| name.to_string());
        ensure_valid_name(&disk_name)?;

        Ok(Self {
            name: name.to_string(),
            disk_name,
            region: options.region.clone(),
            size: options.size,
            snapshot: options.snapshot.clone(),
            image: ImageRef::from_selector(&options.image)?,
            disk_type: options.disk_type.clone(),
            credentials: options.credentials.clone(),
            fingerprint: DefinitionHasher::new().hash_options(
                ResourceKind::Disk.resource_type(),
                name,
                options,
            )?,
        })
    }

    /// Short description for listings.
    #[must_use]
    pub fn show_type(&self) -> String {
        format!("{} [{}]", ResourceKind::Disk.type_name(), self.region)
    }
}

/// Recorded state of a persistent disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiskState {
    /// Common state.
    pub meta: ResourceMeta,
    /// Provider-side disk name.
    #[serde(default)]
    pub disk_name: Option<String>,
    /// Zone.
    #[serde(default)]
    pub region: Option<String>,
    /// Size in GiB.
    #[serde(default)]
    pub size: Option<u64>,
    /// `standard` or `ssd`.
    #[serde(default)]
    pub disk_type: Option<String>,
}

impl DiskState {
    /// Creates the state of a disk that was never applied.
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
            "GCE disk '{}'",
            self.disk_name.as_deref().unwrap_or(&self.meta.name)
        )
    }

    /// Short description for listings.
    #[must_use]
    pub fn show_type(&self) -> String {
        let kind = ResourceKind::Disk.type_name();
        match (&self.region, self.size) {
            (Some(region), Some(size)) if self.meta.is_deployed() => {
                format!("{kind} [{region}; {size} GiB]")
            }
            _ => kind.to_string(),
        }
    }

    fn zone(&self, defn: &DiskDefinition) -> String {
        self.region.clone().unwrap_or_else(|| defn.region.clone())
    }
}

#[async_trait]
impl Reconcile for DiskState {
    type Definition = DiskDefinition;

    const KIND: ResourceKind = ResourceKind::Disk;

    async fn create(
        &mut self,
        defn: &DiskDefinition,
        ctx: &ApplyContext<'_>,
        options: ApplyOptions,
    ) -> Result<()> {
        let full_name = self.full_name();
        self.meta
            .no_change(defn.size.is_some() && self.size != defn.size, "size", &full_name)?;
        self.meta.no_change(
            self.disk_type.as_deref() != Some(defn.disk_type.as_str()),
            "disk type",
            &full_name,
        )?;
        self.meta
            .no_project_change(Self::KIND, &defn.credentials, ctx.env, &full_name)?;
        self.meta.no_change(
            self.region.as_deref() != Some(defn.region.as_str()),
            "region",
            &full_name,
        )?;

        // A disk about to be created needs its image resource deployed.
        let image = if self.meta.is_deployed() {
            defn.image.clone()
        } else {
            defn.image.resolve_sibling(ctx.siblings, &full_name)?
        };

        self.meta.copy_credentials(Self::KIND, &defn.credentials, ctx.env)?;
        self.disk_name = Some(defn.disk_name.clone());
        let full_name = self.full_name();
        let api = self.meta.connect(ctx.connector).await?;

        if options.check {
            let live = api.get_volume(&defn.disk_name, &self.zone(defn)).await?.found()?;
            match live {
                Some(disk) if self.meta.is_deployed() => {
                    reconcile_field(&full_name, "region", &mut self.region, Some(disk.zone), false);
                    let observed_type = disk
                        .disk_type
                        .strip_prefix(DISK_TYPE_PREFIX)
                        .unwrap_or(&disk.disk_type)
                        .to_string();
                    let live_type = Some(observed_type);
                    reconcile_field(&full_name, "disk type", &mut self.disk_type, live_type, false);
                    reconcile_field(&full_name, "size", &mut self.size, Some(disk.size_gb), false);
                }
                Some(disk) => {
                    warn_not_supposed_to_exist(&full_name, true, false);
                    confirm_destroy(ctx.prompt, &full_name, true)?;
                    deleted(&full_name, api.destroy_volume(&disk.name, &disk.zone).await)?;
                }
                None => self.meta.warn_missing_resource(&full_name),
            }
        }

        if !self.meta.is_deployed() {
            let source = match (&defn.snapshot, &defn.image) {
                (Some(snapshot), _) => format!(" from snapshot '{snapshot}'"),
                (None, image) if image.is_some() => format!(" from image '{image}'"),
                _ => String::new(),
            };
            let size = defn.size.map_or_else(|| String::from("auto"), |s| s.to_string());
            info!("creating GCE disk of {size} GiB{source}...");

            let own_project = self
                .meta
                .credentials
                .as_ref()
                .map(|c| c.project.clone())
                .unwrap_or_default();
            let image = resolve_image(&*api, &image, ctx.siblings, &own_project, &full_name).await?;

            let request = CreateVolumeRequest {
                name: defn.disk_name.clone(),
                zone: defn.region.clone(),
                size_gb: defn.size,
                snapshot: defn.snapshot.clone(),
                image: image.map(|i| i.self_link),
                disk_type: format!("{DISK_TYPE_PREFIX}{}", defn.disk_type),
            };
            let volume = api.create_volume(&request).await.map_err(|e| match (e, &defn.snapshot) {
                (ProviderError::NotFound { .. }, Some(snapshot)) => {
                    ReconcileError::SnapshotNotFound {
                        snapshot: snapshot.clone(),
                    }
                    .into()
                }
                (e, _) => create_error("disk", e),
            })?;

            self.meta.mark_up(&defn.fingerprint);
            self.region = Some(defn.region.clone());
            self.size = Some(volume.size_gb);
            self.disk_type = Some(defn.disk_type.clone());
        }

        Ok(())
    }

    async fn destroy(&mut self, ctx: &ApplyContext<'_>, _wipe: bool) -> Result<bool> {
        if !self.meta.is_deployed() {
            return Ok(true);
        }
        let full_name = self.full_name();
        let (Some(name), Some(zone)) = (self.disk_name.clone(), self.region.clone()) else {
            warn_destroy_missing(&full_name);
            return Ok(true);
        };
        let api = self.meta.connect(ctx.connector).await?;

        match api
            .get_volume(&name, &zone)
            .await
            .map_err(|e| translate("looking up the disk", e))?
            .found()?
        {
            None => warn_destroy_missing(&full_name),
            Some(_) => {
                if !confirm_destroy(ctx.prompt, &full_name, false)? {
                    return Ok(false);
                }
                deleted(&full_name, api.destroy_volume(&name, &zone).await)?;
            }
        }
        self.meta.mark_missing();
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ImageSelector, ResourceRef};
    use crate::prompt::AssumeAnswer;
    use crate::provider::Volume;
    use crate::resources::Lifecycle;
    use crate::resources::testing::{CHECK, Harness, NO_CHECK};

    fn options(size: Option<u64>) -> DiskOptions {
        DiskOptions {
            name: Some(String::from("data")),
            region: String::from("europe-west1-b"),
            size,
            snapshot: None,
            image: ImageSelector::default(),
            disk_type: String::from("ssd"),
            credentials: CredentialOptions::default(),
        }
    }

    #[tokio::test]
    async fn test_create_then_idempotent() {
        let h = Harness::new();
        let defn = DiskDefinition::new("data", &options(Some(20))).expect("definition");
        let mut state = DiskState::new("data");

        state.create(&defn, &h.ctx(), NO_CHECK).await.expect("create");
        assert_eq!(state.meta.lifecycle, Lifecycle::Up);
        assert_eq!(state.size, Some(20));
        assert_eq!(h.cloud.lock().volumes["data"].disk_type, "pd-ssd");
        assert_eq!(state.show_type(), "gce-disk [europe-west1-b; 20 GiB]");

        h.cloud.clear_calls();
        state.create(&defn, &h.ctx(), CHECK).await.expect("second create");
        assert!(h.cloud.mutations().is_empty());
        assert_eq!(h.cloud.reads(), vec![String::from("get_volume data")]);

        // The connection is opened once per state object.
        assert_eq!(h.connector.connects(), 1);
    }

    #[tokio::test]
    async fn test_immutable_size_change_makes_no_calls() {
        let h = Harness::new();
        let mut state = DiskState::new("data");
        let defn = DiskDefinition::new("data", &options(Some(20))).expect("definition");
        state.create(&defn, &h.ctx(), NO_CHECK).await.expect("create");
        h.cloud.clear_calls();

        let bigger = DiskDefinition::new("data", &options(Some(50))).expect("definition");
        let err = state
            .create(&bigger, &h.ctx(), CHECK)
            .await
            .expect_err("size is immutable");
        assert_eq!(
            err.to_string(),
            "Configuration error: cannot change the size of a deployed GCE disk 'data'"
        );
        assert!(h.cloud.reads().is_empty());
        assert!(h.cloud.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_drift_is_recorded_and_missing_disk_recreated() {
        let h = Harness::new();
        let mut state = DiskState::new("data");
        let defn = DiskDefinition::new("data", &options(None)).expect("definition");
        state.create(&defn, &h.ctx(), NO_CHECK).await.expect("create");

        h.cloud.lock().volumes.get_mut("data").expect("disk").size_gb = 30;
        state.create(&defn, &h.ctx(), CHECK).await.expect("check");
        assert_eq!(state.size, Some(30));

        h.cloud.lock().volumes.clear();
        state.create(&defn, &h.ctx(), CHECK).await.expect("recreate");
        assert_eq!(state.meta.lifecycle, Lifecycle::Up);
        assert!(h.cloud.lock().volumes.contains_key("data"));
    }

    #[tokio::test]
    async fn test_unexpected_disk_requires_confirmation() {
        let mut h = Harness::new();
        h.prompt = AssumeAnswer(false);
        h.cloud.lock().volumes.insert(
            String::from("data"),
            Volume {
                name: String::from("data"),
                zone: String::from("europe-west1-b"),
                size_gb: 10,
                disk_type: String::from("pd-ssd"),
            },
        );
        let defn = DiskDefinition::new("data", &options(Some(10))).expect("definition");
        let mut state = DiskState::new("data");

        let err = state.create(&defn, &h.ctx(), CHECK).await.expect_err("declined");
        assert!(err.to_string().contains("can't proceed further"));
        assert!(h.cloud.mutations().is_empty());

        h.prompt = AssumeAnswer(true);
        state.create(&defn, &h.ctx(), CHECK).await.expect("replaced");
        assert_eq!(
            h.cloud.mutations(),
            vec![String::from("destroy_volume data"), String::from("create_volume data")]
        );
    }

    #[tokio::test]
    async fn test_create_from_missing_snapshot() {
        let h = Harness::new();
        let mut opts = options(None);
        opts.snapshot = Some(String::from("snap-1"));
        let defn = DiskDefinition::new("data", &opts).expect("definition");
        let mut state = DiskState::new("data");

        let err = state
            .create(&defn, &h.ctx(), NO_CHECK)
            .await
            .expect_err("snapshot missing");
        assert_eq!(err.to_string(), "Reconciliation error: Snapshot 'snap-1' was not found");
        assert_eq!(state.meta.lifecycle, Lifecycle::Missing);
    }

    #[tokio::test]
    async fn test_create_from_sibling_image() {
        let mut h = Harness::new();
        h.cloud.add_image("bootstrap-img", None);
        h.siblings.insert(ResourceKind::Image, "bootstrap", "bootstrap-img");

        let mut opts = options(None);
        opts.image.name = Some(ResourceRef::Resource {
            resource: String::from("bootstrap"),
        });
        let defn = DiskDefinition::new("data", &opts).expect("definition");
        let mut state = DiskState::new("data");
        state.create(&defn, &h.ctx(), NO_CHECK).await.expect("create");
        assert_eq!(state.meta.lifecycle, Lifecycle::Up);
    }

    #[tokio::test]
    async fn test_undeployed_sibling_image_fails_before_lookups() {
        let h = Harness::new();
        let mut opts = options(None);
        opts.image.name = Some(ResourceRef::Resource {
            resource: String::from("bootstrap"),
        });
        let defn = DiskDefinition::new("data", &opts).expect("definition");
        let mut state = DiskState::new("data");

        let err = state.create(&defn, &h.ctx(), CHECK).await.expect_err("unresolved");
        assert!(err.to_string().contains("gce-image 'bootstrap' referenced by GCE disk 'data'"));
        assert!(h.cloud.reads().is_empty());
        assert!(h.cloud.mutations().is_empty());
        assert_eq!(h.connector.connects(), 0);
    }

    #[tokio::test]
    async fn test_destroy() {
        let mut h = Harness::new();
        let defn = DiskDefinition::new("data", &options(Some(10))).expect("definition");
        let mut state = DiskState::new("data");
        state.create(&defn, &h.ctx(), NO_CHECK).await.expect("create");
        h.cloud.clear_calls();

        h.prompt = AssumeAnswer(false);
        assert!(!state.destroy(&h.ctx(), false).await.expect("declined"));
        assert!(h.cloud.mutations().is_empty());
        assert_eq!(state.meta.lifecycle, Lifecycle::Up);

        h.prompt = AssumeAnswer(true);
        assert!(state.destroy(&h.ctx(), false).await.expect("destroyed"));
        assert!(h.cloud.lock().volumes.is_empty());

        // Already gone: warn and succeed.
        state.meta.mark_up("x");
        assert!(state.destroy(&h.ctx(), false).await.expect("idempotent"));
    }

    #[test]
    fn test_invalid_name_rejected() {
        let mut opts = options(None);
        opts.name = Some(String::from("Data_Disk"));
        let err = DiskDefinition::new("data", &opts).expect_err("invalid");
        assert!(err.to_string().contains("must be 1-63 characters long"));
    }
}
