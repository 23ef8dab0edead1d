//! Reconciliation contract and the per-resource apply entry points.
//!
//! The host orchestrator decides the order in which resources are applied.
//! For each resource it calls [`Reconciler::apply`] or
//! [`Reconciler::destroy`], which load the persisted state, run the
//! resource's [`Reconcile`] implementation, and save the result.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

use crate::config::ResourceRef;
use crate::credentials::EnvSnapshot;
use crate::error::{GceError, ReconcileError, Result};
use crate::prompt::Confirm;
use crate::provider::Connector;
use crate::resources::{AnyDefinition, ResourceKind, ResourceRecord};
use crate::state::{DeploymentState, StateStore};

/// Flags passed by the host to every `create` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyOptions {
    /// Compare recorded state with the live resources first.
    pub check: bool,
    /// Allow changes that reboot machines. No resource kind here needs it.
    pub allow_reboot: bool,
    /// Allow replacing resources whose definition changed without an update path.
    pub allow_recreate: bool,
}

/// Collaborators shared by every reconciliation of one apply.
#[derive(Clone, Copy)]
pub struct ApplyContext<'a> {
    /// Opens provider connections.
    pub connector: &'a dyn Connector,
    /// Asks the operator before destructive actions.
    pub prompt: &'a dyn Confirm,
    /// Credential fallbacks captured at startup.
    pub env: &'a EnvSnapshot,
    /// Provider identities of already-deployed resources.
    pub siblings: &'a Siblings,
}

impl std::fmt::Debug for ApplyContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApplyContext")
            .field("env", &self.env)
            .field("siblings", &self.siblings)
            .finish_non_exhaustive()
    }
}

/// The check, diff and converge procedure of one resource kind.
#[async_trait]
pub trait Reconcile: Send {
    /// The definition this state is reconciled against.
    type Definition: Send + Sync;

    /// The resource kind.
    const KIND: ResourceKind;

    /// Brings the live resource in line with `defn`, updating `self`.
    async fn create(
        &mut self,
        defn: &Self::Definition,
        ctx: &ApplyContext<'_>,
        options: ApplyOptions,
    ) -> Result<()>;

    /// Deletes the live resource. Returns false if the operator declined.
    async fn destroy(&mut self, ctx: &ApplyContext<'_>, wipe: bool) -> Result<bool>;

    /// Kinds that must be created before this one.
    fn create_after(&self) -> &'static [ResourceKind] {
        Self::KIND.create_after()
    }
}

/// Provider identities of the resources of one deployment.
///
/// References such as `{ resource: web-pool }` are resolved through this map:
/// images, pools, checks and networks map to their provider names, static
/// IPs to their reserved address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Siblings {
    entries: BTreeMap<(ResourceKind, String), String>,
}

impl Siblings {
    /// Creates an empty map.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Builds the map from the deployed records of a state.
    #[must_use]
    pub fn from_state(state: &DeploymentState) -> Self {
        let mut siblings = Self::new();
        for (name, record) in &state.resources {
            if let Some(value) = record.sibling_value() {
                siblings.insert(record.kind(), name, value);
            }
        }
        siblings
    }

    /// Records the provider identity of a resource.
    pub fn insert(
        &mut self,
        kind: ResourceKind,
        logical_name: impl Into<String>,
        value: impl Into<String>,
    ) {
        self.entries.insert((kind, logical_name.into()), value.into());
    }

    /// Looks up a deployed resource by kind and logical name.
    #[must_use]
    pub fn get(&self, kind: ResourceKind, logical_name: &str) -> Option<&str> {
        self.entries
            .get(&(kind, logical_name.to_string()))
            .map(String::as_str)
    }

    /// Resolves a reference to a provider identity.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::UnresolvedReference`] if the reference names
    /// a resource that is not deployed.
    pub fn resolve(
        &self,
        kind: ResourceKind,
        reference: &ResourceRef,
        referrer: &str,
    ) -> Result<String> {
        match reference {
            ResourceRef::Name(name) => Ok(name.clone()),
            ResourceRef::Resource { resource } => self
                .get(kind, resource)
                .map(String::from)
                .ok_or_else(|| {
                    GceError::Reconcile(ReconcileError::UnresolvedReference {
                        kind: kind.type_name().to_string(),
                        name: resource.clone(),
                        resource: referrer.to_string(),
                    })
                }),
        }
    }
}

/// Applies definitions to persisted state, one resource at a time.
pub struct Reconciler<'a, S: StateStore> {
    /// State store.
    state_store: &'a S,
    /// Shared collaborators, minus the sibling map which is rebuilt per call.
    connector: &'a dyn Connector,
    prompt: &'a dyn Confirm,
    env: &'a EnvSnapshot,
    /// Deployment name used for a fresh state.
    deployment: String,
}

impl<'a, S: StateStore> Reconciler<'a, S> {
    /// Creates a new reconciler.
    #[must_use]
    pub fn new(
        state_store: &'a S,
        connector: &'a dyn Connector,
        prompt: &'a dyn Confirm,
        env: &'a EnvSnapshot,
        deployment: impl Into<String>,
    ) -> Self {
        Self {
            state_store,
            connector,
            prompt,
            env,
            deployment: deployment.into(),
        }
    }

    async fn load(&self) -> Result<DeploymentState> {
        let Some(state) = self.state_store.load().await? else {
            return Ok(DeploymentState::new(&self.deployment));
        };
        state.check_version()?;
        Ok(state)
    }

    /// Applies one definition.
    ///
    /// The record is saved whether or not the apply succeeds, so that partial
    /// progress (a network created before a firewall rule failed) is kept.
    ///
    /// # Errors
    ///
    /// Returns the reconciliation error, or a state error if saving fails.
    pub async fn apply(&self, defn: &AnyDefinition, options: ApplyOptions) -> Result<()> {
        let mut state = self.load().await?;
        let siblings = Siblings::from_state(&state);
        let ctx = ApplyContext {
            connector: self.connector,
            prompt: self.prompt,
            env: self.env,
            siblings: &siblings,
        };

        let name = defn.logical_name().to_string();
        let mut record = state
            .resources
            .remove(&name)
            .unwrap_or_else(|| ResourceRecord::new(defn.kind(), &name));

        info!("Applying {} '{name}'", defn.kind().type_name());
        let outcome = record.create(defn, &ctx, options).await;
        if let Err(e) = &outcome {
            warn!("Applying '{name}' failed: {e}");
        }

        state.set_resource(name, record);
        self.state_store.save(&state).await?;
        outcome
    }

    /// Destroys one resource and forgets it if destruction went ahead.
    ///
    /// Unknown names are a no-op returning true.
    ///
    /// # Errors
    ///
    /// Returns the reconciliation error, or a state error if saving fails.
    pub async fn destroy(&self, name: &str, wipe: bool) -> Result<bool> {
        let mut state = self.load().await?;
        let Some(mut record) = state.resources.remove(name) else {
            debug!("'{name}' is not in the state; nothing to destroy");
            return Ok(true);
        };

        let siblings = Siblings::from_state(&state);
        let ctx = ApplyContext {
            connector: self.connector,
            prompt: self.prompt,
            env: self.env,
            siblings: &siblings,
        };

        let outcome = record.destroy(&ctx, wipe).await;
        if !matches!(outcome, Ok(true)) {
            state.set_resource(name.to_string(), record);
        }
        self.state_store.save(&state).await?;
        outcome
    }
}

/// Logical names of the resources that must be created before `name`.
///
/// `defns` is the whole deployment as declared, so the order is known before
/// anything has been applied. Unknown names have no dependencies.
#[must_use]
pub fn create_after(defns: &[AnyDefinition], name: &str) -> BTreeSet<String> {
    defns
        .iter()
        .find(|defn| defn.logical_name() == name)
        .map(|defn| defn.create_after(defns))
        .unwrap_or_default()
}
