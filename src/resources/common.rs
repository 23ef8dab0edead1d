//! Helpers shared by every resource kind.
//!
//! [`ResourceMeta`] is the part of a resource's state that does not depend
//! on its kind: lifecycle, resolved credentials and the memoized provider
//! connection. The free functions implement the warnings and guards each
//! reconciler uses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

use crate::credentials::{self, CredentialOptions, Credentials, EnvSnapshot};
use crate::error::{ConfigError, GceError, ProviderError, ReconcileError, Result};
use crate::prompt::Confirm;
use crate::provider::{CloudApi, Connector};

use super::kind::ResourceKind;

/// Lifecycle of a recorded resource.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
    /// Not created, or found missing during a check.
    #[default]
    Missing,
    /// Created and believed to exist.
    Up,
}

/// Kind-independent part of a resource's state.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ResourceMeta {
    /// Logical name in the deployment.
    pub name: String,
    /// Current lifecycle.
    #[serde(default)]
    pub lifecycle: Lifecycle,
    /// Credentials the resource was last applied with.
    #[serde(default)]
    pub credentials: Option<Credentials>,
    /// Fingerprint of the last applied definition.
    #[serde(default)]
    pub definition_hash: Option<String>,
    /// When the record last changed.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    connection: Option<Arc<dyn CloudApi>>,
}

impl fmt::Debug for ResourceMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceMeta")
            .field("name", &self.name)
            .field("lifecycle", &self.lifecycle)
            .field("credentials", &self.credentials)
            .field("definition_hash", &self.definition_hash)
            .field("updated_at", &self.updated_at)
            .field("connected", &self.connection.is_some())
            .finish()
    }
}

impl ResourceMeta {
    /// Creates the meta of a resource that was never applied.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Returns true if the resource is believed to exist.
    #[must_use]
    pub fn is_deployed(&self) -> bool {
        self.lifecycle == Lifecycle::Up
    }

    /// Config path of the resource, e.g. `resources.gceDisks.data`.
    #[must_use]
    pub fn credentials_prefix(&self, kind: ResourceKind) -> String {
        format!("resources.{}.{}", kind.resource_type(), self.name)
    }

    /// Fails if `changed` holds for a deployed resource.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ImmutableChange`].
    pub fn no_change(&self, changed: bool, property: &str, full_name: &str) -> Result<()> {
        if self.is_deployed() && changed {
            return Err(GceError::Config(ConfigError::ImmutableChange {
                property: property.to_string(),
                resource: full_name.to_string(),
            }));
        }
        Ok(())
    }

    /// Fails if the definition moves a deployed resource to another project.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ImmutableChange`], or a missing credential error.
    pub fn no_project_change(
        &self,
        kind: ResourceKind,
        options: &CredentialOptions,
        env: &EnvSnapshot,
        full_name: &str,
    ) -> Result<()> {
        if !self.is_deployed() {
            return Ok(());
        }
        let project = credentials::resolve_project(options, env, &self.credentials_prefix(kind))?;
        let recorded = self.credentials.as_ref().map(|c| c.project.as_str());
        self.no_change(recorded != Some(project.as_str()), "project", full_name)
    }

    /// Resolves and records the credentials of the definition.
    ///
    /// A cached connection is dropped if the credentials changed.
    ///
    /// # Errors
    ///
    /// Returns a missing credential error.
    pub fn copy_credentials(
        &mut self,
        kind: ResourceKind,
        options: &CredentialOptions,
        env: &EnvSnapshot,
    ) -> Result<()> {
        let resolved = credentials::resolve(options, env, &self.credentials_prefix(kind))?;
        if self.credentials.as_ref() != Some(&resolved) {
            self.connection = None;
        }
        self.credentials = Some(resolved);
        Ok(())
    }

    /// Returns the provider connection, opening it on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if credentials were never resolved or the connector
    /// fails.
    pub async fn connect(&mut self, connector: &dyn Connector) -> Result<Arc<dyn CloudApi>> {
        if let Some(conn) = &self.connection {
            return Ok(Arc::clone(conn));
        }
        let creds = self.credentials.as_ref().ok_or_else(|| {
            GceError::internal(format!("no credentials recorded for '{}'", self.name))
        })?;
        let conn = connector.connect(creds).await?;
        self.connection = Some(Arc::clone(&conn));
        Ok(conn)
    }

    /// Marks a deployed resource as missing so it gets recreated.
    pub fn warn_missing_resource(&mut self, full_name: &str) {
        if self.is_deployed() {
            warn!("{full_name} is supposed to exist, but is missing; recreating...");
            self.lifecycle = Lifecycle::Missing;
            self.touch();
        }
    }

    /// Marks the resource as created from the given definition fingerprint.
    pub fn mark_up(&mut self, fingerprint: &str) {
        self.lifecycle = Lifecycle::Up;
        self.definition_hash = Some(fingerprint.to_string());
        self.touch();
    }

    /// Marks the resource as gone.
    pub fn mark_missing(&mut self) {
        self.lifecycle = Lifecycle::Missing;
        self.touch();
    }

    /// Updates the modification time.
    pub fn touch(&mut self) {
        self.updated_at = Some(Utc::now());
    }
}

/// How a recorded property is shown in warnings.
pub trait PropertyValue: PartialEq {
    /// Renders the value.
    fn render(&self) -> String;
}

impl PropertyValue for String {
    fn render(&self) -> String {
        self.clone()
    }
}

impl PropertyValue for str {
    fn render(&self) -> String {
        self.to_string()
    }
}

impl PropertyValue for u64 {
    fn render(&self) -> String {
        self.to_string()
    }
}

impl PropertyValue for u32 {
    fn render(&self) -> String {
        self.to_string()
    }
}

impl PropertyValue for u16 {
    fn render(&self) -> String {
        self.to_string()
    }
}

impl PropertyValue for bool {
    fn render(&self) -> String {
        self.to_string()
    }
}

impl<T: PropertyValue> PropertyValue for Option<T> {
    fn render(&self) -> String {
        self.as_ref().map_or_else(|| String::from("None"), PropertyValue::render)
    }
}

impl<T: PropertyValue> PropertyValue for Vec<T> {
    fn render(&self) -> String {
        format!("[{}]", self.iter().map(PropertyValue::render).collect::<Vec<_>>().join(", "))
    }
}

/// Warns if a live value differs from the recorded one. Returns true if so.
pub fn warn_if_changed<T: PropertyValue + ?Sized>(
    resource: &str,
    property: &str,
    expected: &T,
    actual: &T,
    can_fix: bool,
) -> bool {
    if expected == actual {
        return false;
    }
    warn!(
        "{resource} {property} has changed to '{}'; expected it to be '{}'{}",
        actual.render(),
        expected.render(),
        if can_fix { "" } else { "; cannot fix this automatically" }
    );
    true
}

/// Overwrites a recorded value with the live one, warning on drift.
///
/// Fixable properties converge afterwards because the recorded value no
/// longer matches the definition. Unfixable ones make the next apply fail
/// its immutability guard until the definition is brought in line.
pub fn reconcile_field<T: PropertyValue>(
    resource: &str,
    property: &str,
    recorded: &mut T,
    actual: T,
    can_fix: bool,
) {
    if warn_if_changed(resource, property, recorded, &actual, can_fix) {
        *recorded = actual;
    }
}

/// Warns about a live resource the state does not know about.
pub fn warn_not_supposed_to_exist(resource: &str, valuable_data: bool, valuable_resource: bool) {
    let valuables: Vec<&str> = [(valuable_data, "data"), (valuable_resource, "resource")]
        .into_iter()
        .filter_map(|(flag, what)| flag.then_some(what))
        .collect();
    let suffix = if valuables.is_empty() {
        String::new()
    } else {
        format!(
            "; however, this also could be a resource name collision, and valuable {} could be \
             lost; before proceeding, please ensure that this isn't so",
            valuables.join(" or ")
        )
    };
    warn!(
        "{resource} exists, but isn't supposed to; probably, this is the result of a botched \
         creation attempt and can be fixed by deletion{suffix}"
    );
}

/// Asks the operator before destroying `resource`.
///
/// Returns true if the operator agreed. With `abort`, declining fails the
/// whole apply instead of returning false.
///
/// # Errors
///
/// Returns [`ReconcileError::Aborted`] if the operator declined and `abort`
/// is set.
pub fn confirm_destroy(prompt: &dyn Confirm, resource: &str, abort: bool) -> Result<bool> {
    if prompt.confirm(&format!("are you sure you want to destroy {resource}?")) {
        info!("destroying {resource}...");
        return Ok(true);
    }
    if abort {
        return Err(GceError::Reconcile(ReconcileError::Aborted {
            reason: String::from("can't proceed further"),
        }));
    }
    Ok(false)
}

/// Warns that a destroy found nothing to delete.
pub fn warn_destroy_missing(resource: &str) {
    warn!("tried to destroy {resource} which didn't exist");
}

/// Translates a failed create call.
///
/// "Already exists" asks for a `--check` run; refusals become
/// [`ReconcileError::Rejected`]; anything else is passed through.
#[must_use]
pub fn create_error(what: &str, err: ProviderError) -> GceError {
    match err {
        ProviderError::AlreadyExists { .. } => GceError::Reconcile(ReconcileError::AlreadyExists {
            what: what.to_string(),
        }),
        other => translate(&format!("creating the {what}"), other),
    }
}

/// Translates a failed update call on a resource that may be gone.
#[must_use]
pub fn update_error(what: &str, err: ProviderError) -> GceError {
    match err {
        ProviderError::NotFound { .. } => GceError::Reconcile(ReconcileError::MissingForUpdate {
            what: what.to_string(),
        }),
        other => translate(&format!("updating the {what}"), other),
    }
}

/// Maps refusals (forbidden, quota, disabled API) to a readable error.
#[must_use]
pub fn translate(action: &str, err: ProviderError) -> GceError {
    match err {
        ProviderError::Forbidden { .. }
        | ProviderError::QuotaExceeded { .. }
        | ProviderError::AccessNotConfigured { .. } => {
            GceError::Reconcile(ReconcileError::Rejected {
                action: action.to_string(),
                message: err.to_string(),
            })
        }
        other => GceError::Provider(other),
    }
}

/// Outcome of deleting a live resource during destroy.
///
/// Not-found is downgraded to a warning.
///
/// # Errors
///
/// Returns the translated provider error.
pub fn deleted(resource: &str, result: std::result::Result<(), ProviderError>) -> Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(ProviderError::NotFound { .. }) => {
            warn_destroy_missing(resource);
            Ok(())
        }
        Err(e) => Err(translate(&format!("destroying {resource}"), e)),
    }
}

/// Sorts and deduplicates a list so it compares as a set.
#[must_use]
pub fn normalize_list(items: &[String]) -> Vec<String> {
    let mut items = items.to_vec();
    items.sort();
    items.dedup();
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::ENV_PROJECT;

    mockall::mock! {
        Prompt {}
        impl Confirm for Prompt {
            fn confirm(&self, question: &str) -> bool;
        }
    }

    fn options(project: &str) -> CredentialOptions {
        CredentialOptions {
            project: Some(project.to_string()),
            service_account: Some(String::from("sa@p.iam.gserviceaccount.com")),
            access_key: Some(String::from("/keys/sa.pem")),
        }
    }

    #[test]
    fn test_no_change_only_guards_deployed() {
        let mut meta = ResourceMeta::new("data");
        assert!(meta.no_change(true, "size", "GCE disk 'data'").is_ok());

        meta.mark_up("hash");
        let err = meta.no_change(true, "size", "GCE disk 'data'").expect_err("immutable");
        assert_eq!(
            err.to_string(),
            "Configuration error: cannot change the size of a deployed GCE disk 'data'"
        );
    }

    #[test]
    fn test_no_project_change() {
        let env = EnvSnapshot::default();
        let mut meta = ResourceMeta::new("data");
        meta.copy_credentials(ResourceKind::Disk, &options("alpha"), &env)
            .expect("credentials");
        meta.mark_up("hash");

        assert!(meta
            .no_project_change(ResourceKind::Disk, &options("alpha"), &env, "d")
            .is_ok());
        assert!(meta
            .no_project_change(ResourceKind::Disk, &options("beta"), &env, "d")
            .is_err());
    }

    #[test]
    fn test_credentials_prefix_names_the_resource() {
        let mut meta = ResourceMeta::new("net");
        let env = EnvSnapshot::from_vars([(ENV_PROJECT, "p")]);
        let err = meta
            .copy_credentials(ResourceKind::Network, &CredentialOptions::default(), &env)
            .expect_err("service account missing");
        assert!(err
            .to_string()
            .contains("'resources.gceNetworks.net.serviceAccount' or $GCE_SERVICE_ACCOUNT"));
    }

    #[test]
    fn test_warn_missing_resource_flips_lifecycle() {
        let mut meta = ResourceMeta::new("data");
        meta.warn_missing_resource("GCE disk 'data'");
        assert_eq!(meta.lifecycle, Lifecycle::Missing);

        meta.mark_up("hash");
        meta.warn_missing_resource("GCE disk 'data'");
        assert_eq!(meta.lifecycle, Lifecycle::Missing);
    }

    #[test]
    fn test_reconcile_field_overwrites_on_drift() {
        let mut recorded = Some(String::from("europe-west1-b"));
        reconcile_field("d", "region", &mut recorded, Some(String::from("europe-west1-c")), false);
        assert_eq!(recorded.as_deref(), Some("europe-west1-c"));

        let mut size = 10u64;
        reconcile_field("d", "size", &mut size, 10, false);
        assert_eq!(size, 10);
    }

    #[test]
    fn test_confirm_destroy() {
        let mut yes = MockPrompt::new();
        yes.expect_confirm()
            .withf(|q| q == "are you sure you want to destroy GCE disk 'd'?")
            .times(1)
            .return_const(true);
        assert!(confirm_destroy(&yes, "GCE disk 'd'", true).expect("confirmed"));

        let mut no = MockPrompt::new();
        no.expect_confirm().times(2).return_const(false);
        assert!(!confirm_destroy(&no, "GCE disk 'd'", false).expect("declined"));
        let err = confirm_destroy(&no, "GCE disk 'd'", true).expect_err("aborts");
        assert!(err.to_string().contains("can't proceed further"));
    }

    #[test]
    fn test_error_translation() {
        let exists = create_error(
            "disk",
            ProviderError::AlreadyExists {
                resource: String::from("d"),
            },
        );
        assert_eq!(
            exists.to_string(),
            "Reconciliation error: tried creating a disk that already exists; \
             please run 'deploy --check' to fix this"
        );

        let quota = create_error(
            "disk",
            ProviderError::QuotaExceeded {
                message: String::from("DISKS_TOTAL_GB"),
            },
        );
        assert!(matches!(
            quota,
            GceError::Reconcile(ReconcileError::Rejected { .. })
        ));

        assert!(deleted("d", Err(ProviderError::NotFound { resource: String::from("d") })).is_ok());
        assert!(deleted("d", Err(ProviderError::Api {
            reason: String::from("backendError"),
            message: String::from("boom"),
        }))
        .is_err());
    }

    #[test]
    fn test_normalize_list() {
        let list = vec![String::from("b"), String::from("a"), String::from("b")];
        assert_eq!(normalize_list(&list), vec![String::from("a"), String::from("b")]);
    }
}
