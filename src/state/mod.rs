//! State management module.
//!
//! This module persists the recorded state of every resource of a
//! deployment, keyed by logical name, between applies.

mod local;
mod store;
mod types;

pub use local::LocalStateStore;
pub use store::StateStore;
pub use types::{DeploymentState, STATE_VERSION};
