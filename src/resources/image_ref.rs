//! Image references and their resolution to concrete images.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{ImageSelector, ResourceRef};
use crate::error::{ConfigError, GceError, ReconcileError, Result};
use crate::provider::{CloudApi, Denial, Image, Lookup};
use crate::reconciler::Siblings;

use super::kind::ResourceKind;

/// Where a disk's image comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "camelCase")]
pub enum ImageRef {
    /// No image; the disk is blank or restored from a snapshot.
    #[default]
    None,
    /// An image resource of the same deployment, by logical name.
    Sibling {
        /// Logical name of the image resource.
        resource: String,
    },
    /// A named image, optionally in another project.
    Named {
        /// Image name, partial name or full URL.
        name: String,
        /// Owning project.
        project: Option<String>,
    },
    /// The newest image of a family, optionally in another project.
    Family {
        /// Family name.
        family: String,
        /// Owning project.
        project: Option<String>,
    },
}

impl ImageRef {
    /// Builds a reference from the declared selector.
    ///
    /// A family wins over a name when both are given.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::IncompleteImage`] if only a project is given.
    pub fn from_selector(selector: &ImageSelector) -> Result<Self> {
        let project = selector.project.clone();
        if let Some(family) = &selector.family {
            return Ok(Self::Family {
                family: family.clone(),
                project,
            });
        }
        match &selector.name {
            Some(ResourceRef::Resource { resource }) => Ok(Self::Sibling {
                resource: resource.clone(),
            }),
            Some(ResourceRef::Name(name)) => Ok(Self::Named {
                name: name.clone(),
                project,
            }),
            None => match project {
                Some(project) => Err(GceError::Config(ConfigError::IncompleteImage { project })),
                None => Ok(Self::None),
            },
        }
    }

    /// Replaces a same-deployment reference with the image's provider name.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::UnresolvedReference`] if the image resource
    /// is not deployed.
    pub fn resolve_sibling(&self, siblings: &Siblings, referrer: &str) -> Result<Self> {
        let Self::Sibling { resource } = self else {
            return Ok(self.clone());
        };
        let reference = ResourceRef::Resource {
            resource: resource.clone(),
        };
        Ok(Self::Named {
            name: siblings.resolve(ResourceKind::Image, &reference, referrer)?,
            project: None,
        })
    }

    /// Returns true if an image is referenced.
    #[must_use]
    pub const fn is_some(&self) -> bool {
        !matches!(self, Self::None)
    }
}

impl std::fmt::Display for ImageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            Self::Sibling { resource } => write!(f, "resource '{resource}'"),
            Self::Named { name, .. } => f.write_str(name),
            Self::Family { family, .. } => write!(f, "family {family}"),
        }
    }
}

/// Fully-qualified URL of an image in a project.
///
/// Images of other projects cannot be listed, only fetched by full path.
#[must_use]
pub fn image_url(project: &str, name: &str) -> String {
    format!("https://www.googleapis.com/compute/v1/projects/{project}/global/images/{name}")
}

/// Resolves an image reference to a concrete image.
///
/// `own_project` names the caller's project in error messages when the
/// reference does not name one. Returns `None` for [`ImageRef::None`].
///
/// # Errors
///
/// Not-found, forbidden and disabled-API lookups each yield their own
/// [`ReconcileError`]; a sibling that is not deployed yields
/// [`ReconcileError::UnresolvedReference`].
pub async fn resolve_image(
    api: &dyn CloudApi,
    image: &ImageRef,
    siblings: &Siblings,
    own_project: &str,
    referrer: &str,
) -> Result<Option<Image>> {
    let (subject, project, lookup, missing) = match image {
        ImageRef::None => return Ok(None),
        ImageRef::Family { family, project } => {
            debug!("Looking up newest image of family '{family}'");
            let lookup = api.get_image_from_family(family, project.as_deref()).await?;
            let missing = ReconcileError::ImageFamilyNotFound {
                family: family.clone(),
            };
            (format!("Image family '{family}'"), project.as_deref(), lookup, missing)
        }
        ImageRef::Named { name, project } => {
            let path = project
                .as_deref()
                .map_or_else(|| name.clone(), |p| image_url(p, name));
            debug!("Looking up image '{path}'");
            let lookup = api.get_image(&path, project.as_deref()).await?;
            let missing = ReconcileError::ImageNotFound { image: name.clone() };
            (format!("Image '{name}'"), project.as_deref(), lookup, missing)
        }
        ImageRef::Sibling { .. } => {
            let ImageRef::Named { name, .. } = image.resolve_sibling(siblings, referrer)? else {
                return Ok(None);
            };
            let lookup = api.get_image(&name, None).await?;
            (format!("Image '{name}'"), None, lookup, ReconcileError::ImageNotFound { image: name })
        }
    };

    let project = project.unwrap_or(own_project).to_string();
    match lookup {
        Lookup::Found(found) => Ok(Some(found)),
        Lookup::NotFound => Err(GceError::Reconcile(missing)),
        Lookup::Denied(Denial::Forbidden(_)) => {
            Err(GceError::Reconcile(ReconcileError::ImageNotPublic { subject, project }))
        }
        Lookup::Denied(Denial::AccessNotConfigured(_)) => {
            Err(GceError::Reconcile(ReconcileError::ProjectUnavailable { project }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::provider::fake::FakeCloud;

    fn selector(name: Option<&str>, family: Option<&str>, project: Option<&str>) -> ImageSelector {
        ImageSelector {
            name: name.map(|n| ResourceRef::Name(n.to_string())),
            family: family.map(String::from),
            project: project.map(String::from),
        }
    }

    #[test]
    fn test_from_selector() {
        assert_eq!(
            ImageRef::from_selector(&selector(Some("img"), Some("fam"), None)).expect("family"),
            ImageRef::Family {
                family: String::from("fam"),
                project: None
            }
        );
        assert_eq!(
            ImageRef::from_selector(&selector(None, None, None)).expect("none"),
            ImageRef::None
        );

        let err = ImageRef::from_selector(&selector(None, None, Some("other")))
            .expect_err("incomplete");
        assert_eq!(
            err.to_string(),
            "Configuration error: Specify image name or image family alongside the project 'other'.."
        );
    }

    #[tokio::test]
    async fn test_family_lookup_picks_newest() {
        let cloud = FakeCloud::new();
        cloud.add_image("debian-12-v1", Some("debian-12"));
        cloud.add_image("debian-12-v2", Some("debian-12"));

        let image = resolve_image(
            &*cloud,
            &ImageRef::Family {
                family: String::from("debian-12"),
                project: Some(String::from("debian-cloud")),
            },
            &Siblings::new(),
            "mine",
            "disk",
        )
        .await
        .expect("resolves")
        .expect("some image");
        assert_eq!(image.name, "debian-12-v2");
    }

    #[tokio::test]
    async fn test_cross_project_name_uses_full_path() {
        let cloud = FakeCloud::new();
        cloud.add_image("nixos-2405", None);

        let image = ImageRef::Named {
            name: String::from("nixos-2405"),
            project: Some(String::from("nixos-cloud")),
        };
        resolve_image(&*cloud, &image, &Siblings::new(), "mine", "disk")
            .await
            .expect("resolves");
        assert_eq!(
            cloud.reads(),
            vec![format!("get_image {}", image_url("nixos-cloud", "nixos-2405"))]
        );
    }

    #[tokio::test]
    async fn test_failure_causes_are_distinct() {
        let cloud = FakeCloud::new();
        let family = ImageRef::Family {
            family: String::from("ghost"),
            project: Some(String::from("shared")),
        };

        let missing = resolve_image(&*cloud, &family, &Siblings::new(), "mine", "disk")
            .await
            .expect_err("no such family");

        cloud.fail_next(
            "get_image_from_family",
            ProviderError::Forbidden {
                message: String::from("denied"),
            },
        );
        let forbidden = resolve_image(&*cloud, &family, &Siblings::new(), "mine", "disk")
            .await
            .expect_err("forbidden");

        cloud.fail_next(
            "get_image_from_family",
            ProviderError::AccessNotConfigured {
                message: String::from("disabled"),
            },
        );
        let disabled = resolve_image(&*cloud, &family, &Siblings::new(), "mine", "disk")
            .await
            .expect_err("api disabled");

        assert_eq!(
            missing.to_string(),
            "Reconciliation error: Image family 'ghost' was not found.."
        );
        assert_eq!(
            forbidden.to_string(),
            "Reconciliation error: Image family 'ghost' has not been made public in project 'shared'"
        );
        assert_eq!(
            disabled.to_string(),
            "Reconciliation error: Project 'shared' does not exist or the Compute Engine API is disabled"
        );
    }

    #[tokio::test]
    async fn test_sibling_reference() {
        let cloud = FakeCloud::new();
        cloud.add_image("bootstrap-img", None);
        let mut siblings = Siblings::new();
        siblings.insert(ResourceKind::Image, "bootstrap", "bootstrap-img");

        let sibling = ImageRef::Sibling {
            resource: String::from("bootstrap"),
        };
        let image = resolve_image(&*cloud, &sibling, &siblings, "mine", "disk")
            .await
            .expect("resolves")
            .expect("some image");
        assert_eq!(image.name, "bootstrap-img");

        let err = resolve_image(&*cloud, &sibling, &Siblings::new(), "mine", "GCE disk 'd'")
            .await
            .expect_err("not deployed");
        assert!(err.to_string().contains("referenced by GCE disk 'd'"));
    }
}
