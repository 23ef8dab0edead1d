//! Cloud Storage buckets.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{BucketOptions, DefinitionHasher, ensure_valid_name};
use crate::credentials::CredentialOptions;
use crate::diff::{DiffDetail, Diffable, FieldDiff, changed_fields};
use crate::error::Result;
use crate::provider::{Bucket, BucketLogging, BucketWebsite, CorsRule, LifecycleRule};
use crate::reconciler::{ApplyContext, ApplyOptions, Reconcile};

use super::common::{
    ResourceMeta, confirm_destroy, create_error, deleted, reconcile_field, update_error,
    warn_destroy_missing, warn_if_changed, warn_not_supposed_to_exist,
};
use super::kind::ResourceKind;

/// The patchable properties of a bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketProperties {
    /// Default storage class.
    pub storage_class: String,
    /// Object versioning.
    pub versioning_enabled: bool,
    /// Website settings.
    pub website: BucketWebsite,
    /// Access logging settings.
    pub logging: BucketLogging,
    /// CORS entries.
    pub cors: Vec<CorsRule>,
    /// Lifecycle rules.
    pub lifecycle: Vec<LifecycleRule>,
}

impl BucketProperties {
    fn from_provider(bucket: Bucket) -> Self {
        Self {
            storage_class: bucket.storage_class,
            versioning_enabled: bucket.versioning_enabled,
            website: bucket.website,
            logging: bucket.logging,
            cors: bucket.cors,
            lifecycle: bucket.lifecycle,
        }
    }

    fn to_provider(&self, name: &str, location: &str) -> Bucket {
        Bucket {
            name: name.to_string(),
            location: location.to_string(),
            storage_class: self.storage_class.clone(),
            versioning_enabled: self.versioning_enabled,
            website: self.website.clone(),
            logging: self.logging.clone(),
            cors: self.cors.clone(),
            lifecycle: self.lifecycle.clone(),
        }
    }
}

impl Diffable for BucketProperties {
    fn diff(&self, desired: &Self) -> Vec<DiffDetail> {
        FieldDiff::new()
            .field("storage class", &self.storage_class, &desired.storage_class)
            .field("versioning", &self.versioning_enabled, &desired.versioning_enabled)
            .field("website", &self.website, &desired.website)
            .field("logging", &self.logging, &desired.logging)
            .field("cors", &self.cors, &desired.cors)
            .field("lifecycle", &self.lifecycle, &desired.lifecycle)
            .finish()
    }
}

/// Desired state of a bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketDefinition {
    /// Logical name.
    pub name: String,
    /// Provider-side bucket name.
    pub bucket_name: String,
    /// Location, e.g. `EU`.
    pub location: String,
    /// Declared properties.
    pub properties: BucketProperties,
    /// Declared credentials.
    pub credentials: CredentialOptions,
    /// Fingerprint of the options.
    pub fingerprint: String,
}

impl BucketDefinition {
    /// Builds a definition from its options.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid name.
    pub fn new(name: &str, options: &BucketOptions) -> Result<Self> {
        let bucket_name = options.name.clone().unwrap_or_else(|| name.to_string());
        ensure_valid_name(&bucket_name)?;

        Ok(Self {
            name: name.to_string(),
            bucket_name,
            location: options.location.clone(),
            properties: BucketProperties {
                storage_class: options.storage_class.clone(),
                versioning_enabled: options.versioning.enabled,
                website: options.website.clone(),
                logging: options.logging.clone(),
                cors: options.cors.clone(),
                lifecycle: options.lifecycle.clone(),
            },
            credentials: options.credentials.clone(),
            fingerprint: DefinitionHasher::new().hash_options(
                ResourceKind::Bucket.resource_type(),
                name,
                options,
            )?,
        })
    }

    /// Short description for listings.
    #[must_use]
    pub fn show_type(&self) -> String {
        format!("{} [{}]", ResourceKind::Bucket.type_name(), self.location)
    }
}

/// Recorded state of a bucket.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BucketState {
    /// Common state.
    pub meta: ResourceMeta,
    /// Provider-side bucket name.
    #[serde(default)]
    pub bucket_name: Option<String>,
    /// Location.
    #[serde(default)]
    pub location: Option<String>,
    /// Recorded properties.
    #[serde(default)]
    pub properties: Option<BucketProperties>,
}

impl BucketState {
    /// Creates the state of a bucket that was never applied.
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
            "GCS bucket '{}'",
            self.bucket_name.as_deref().unwrap_or(&self.meta.name)
        )
    }

    /// Short description for listings.
    #[must_use]
    pub fn show_type(&self) -> String {
        let kind = ResourceKind::Bucket.type_name();
        match &self.location {
            Some(location) if self.meta.is_deployed() => format!("{kind} [{location}]"),
            _ => kind.to_string(),
        }
    }
}

#[async_trait]
impl Reconcile for BucketState {
    type Definition = BucketDefinition;

    const KIND: ResourceKind = ResourceKind::Bucket;

    async fn create(
        &mut self,
        defn: &BucketDefinition,
        ctx: &ApplyContext<'_>,
        options: ApplyOptions,
    ) -> Result<()> {
        let full_name = self.full_name();
        self.meta.no_change(
            self.location.as_deref() != Some(defn.location.as_str()),
            "location",
            &full_name,
        )?;
        self.meta
            .no_project_change(Self::KIND, &defn.credentials, ctx.env, &full_name)?;

        self.meta.copy_credentials(Self::KIND, &defn.credentials, ctx.env)?;
        self.bucket_name = Some(defn.bucket_name.clone());
        let full_name = self.full_name();
        let api = self.meta.connect(ctx.connector).await?;

        if options.check {
            match api.get_bucket(&defn.bucket_name).await?.found()? {
                Some(bucket) if self.meta.is_deployed() => {
                    let live_location = Some(bucket.location.clone());
                    reconcile_field(
                        &full_name,
                        "location",
                        &mut self.location,
                        live_location,
                        false,
                    );
                    let live = BucketProperties::from_provider(bucket);
                    if let Some(recorded) = &self.properties {
                        for change in recorded.diff(&live) {
                            warn_if_changed(
                                &full_name,
                                change.field,
                                &change.old_value,
                                &change.new_value,
                                true,
                            );
                        }
                    }
                    self.properties = Some(live);
                }
                Some(bucket) => {
                    warn_not_supposed_to_exist(&full_name, true, false);
                    confirm_destroy(ctx.prompt, &full_name, true)?;
                    deleted(&full_name, api.delete_bucket(&bucket.name).await)?;
                }
                None => self.meta.warn_missing_resource(&full_name),
            }
        }

        let desired = defn.properties.to_provider(&defn.bucket_name, &defn.location);
        if !self.meta.is_deployed() {
            info!("creating {full_name} in {}...", defn.location);
            let project = self
                .meta
                .credentials
                .as_ref()
                .map(|c| c.project.clone())
                .unwrap_or_default();
            api.create_bucket(&project, &desired)
                .await
                .map_err(|e| create_error("bucket", e))?;
            self.meta.mark_up(&defn.fingerprint);
            self.location = Some(defn.location.clone());
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
            api.patch_bucket(&desired)
                .await
                .map_err(|e| update_error("bucket", e))?;
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
        let Some(name) = self.bucket_name.clone() else {
            warn_destroy_missing(&full_name);
            return Ok(true);
        };
        let api = self.meta.connect(ctx.connector).await?;

        match api.get_bucket(&name).await?.found()? {
            None => warn_destroy_missing(&full_name),
            Some(_) => {
                if !confirm_destroy(ctx.prompt, &full_name, false)? {
                    return Ok(false);
                }
                deleted(&full_name, api.delete_bucket(&name).await)?;
            }
        }
        self.meta.mark_missing();
        Ok(true)
    }
}
