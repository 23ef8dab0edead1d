//! GCE images built from a tarball in Cloud Storage.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{DefinitionHasher, ImageOptions, ensure_not_empty, ensure_valid_name};
use crate::credentials::CredentialOptions;
use crate::error::Result;
use crate::provider::CreateImageRequest;
use crate::reconciler::{ApplyContext, ApplyOptions, Reconcile};

use super::common::{
    ResourceMeta, confirm_destroy, create_error, deleted, reconcile_field, warn_destroy_missing,
    warn_not_supposed_to_exist,
};
use super::kind::ResourceKind;

/// Desired state of an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageDefinition {
    /// Logical name.
    pub name: String,
    /// Provider-side image name.
    pub image_name: String,
    /// `gs://` URI of the image tarball.
    pub source_uri: String,
    /// Free-form description.
    pub description: Option<String>,
    /// Declared credentials.
    pub credentials: CredentialOptions,
    /// Fingerprint of the options.
    pub fingerprint: String,
}

impl ImageDefinition {
    /// Builds a definition from its options.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid name or an empty source URI.
    pub fn new(name: &str, options: &ImageOptions) -> Result<Self> {
        let image_name = options.name.clone().unwrap_or_else(|| name.to_string());
        ensure_valid_name(&image_name)?;
        ensure_not_empty(&options.source_uri, "sourceUri")?;

        Ok(Self {
            name: name.to_string(),
            image_name,
            source_uri: options.source_uri.clone(),
            description: options.description.clone(),
            credentials: options.credentials.clone(),
            fingerprint: DefinitionHasher::new().hash_options(
                ResourceKind::Image.resource_type(),
                name,
                options,
            )?,
        })
    }

    /// Short description for listings.
    #[must_use]
    pub fn show_type(&self) -> String {
        ResourceKind::Image.type_name().to_string()
    }
}

/// Recorded state of an image.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageState {
    /// Common state.
    pub meta: ResourceMeta,
    /// Provider-side image name.
    #[serde(default)]
    pub image_name: Option<String>,
    /// Source tarball the image was built from.
    #[serde(default)]
    pub source_uri: Option<String>,
    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,
}

impl ImageState {
    /// Creates the state of an image that was never applied.
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
            "GCE image '{}'",
            self.image_name.as_deref().unwrap_or(&self.meta.name)
        )
    }

    /// Short description for listings.
    #[must_use]
    pub fn show_type(&self) -> String {
        ResourceKind::Image.type_name().to_string()
    }
}

#[async_trait]
impl Reconcile for ImageState {
    type Definition = ImageDefinition;

    const KIND: ResourceKind = ResourceKind::Image;

    async fn create(
        &mut self,
        defn: &ImageDefinition,
        ctx: &ApplyContext<'_>,
        options: ApplyOptions,
    ) -> Result<()> {
        let full_name = self.full_name();
        self.meta.no_change(
            self.source_uri.as_deref() != Some(defn.source_uri.as_str()),
            "source URI",
            &full_name,
        )?;
        self.meta
            .no_change(self.description != defn.description, "description", &full_name)?;
        self.meta
            .no_project_change(Self::KIND, &defn.credentials, ctx.env, &full_name)?;

        self.meta.copy_credentials(Self::KIND, &defn.credentials, ctx.env)?;
        self.image_name = Some(defn.image_name.clone());
        let full_name = self.full_name();
        let api = self.meta.connect(ctx.connector).await?;

        if options.check {
            match api.get_image(&defn.image_name, None).await?.found()? {
                Some(image) if self.meta.is_deployed() => {
                    let live_description = image.description;
                    reconcile_field(
                        &full_name,
                        "description",
                        &mut self.description,
                        live_description,
                        false,
                    );
                }
                Some(image) => {
                    warn_not_supposed_to_exist(&full_name, false, false);
                    confirm_destroy(ctx.prompt, &full_name, true)?;
                    deleted(&full_name, api.destroy_image(&image.name).await)?;
                }
                None => self.meta.warn_missing_resource(&full_name),
            }
        }

        if !self.meta.is_deployed() {
            info!("creating {full_name} from {}...", defn.source_uri);
            let request = CreateImageRequest {
                name: defn.image_name.clone(),
                source_uri: defn.source_uri.clone(),
                description: defn.description.clone(),
            };
            api.create_image(&request)
                .await
                .map_err(|e| create_error("image", e))?;

            self.meta.mark_up(&defn.fingerprint);
            self.source_uri = Some(defn.source_uri.clone());
            self.description = defn.description.clone();
        }
        Ok(())
    }

    async fn destroy(&mut self, ctx: &ApplyContext<'_>, _wipe: bool) -> Result<bool> {
        if !self.meta.is_deployed() {
            return Ok(true);
        }
        let full_name = self.full_name();
        let Some(name) = self.image_name.clone() else {
            warn_destroy_missing(&full_name);
            return Ok(true);
        };
        let api = self.meta.connect(ctx.connector).await?;

        match api.get_image(&name, None).await?.found()? {
            None => warn_destroy_missing(&full_name),
            Some(_) => {
                if !confirm_destroy(ctx.prompt, &full_name, false)? {
                    return Ok(false);
                }
                deleted(&full_name, api.destroy_image(&name).await)?;
            }
        }
        self.meta.mark_missing();
        Ok(true)
    }
}
