// ============================================================================
// Linting - Dangerous or non-idiomatic practices are flagged
// ============================================================================

#![deny(missing_docs)]                // All public items must be documented
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention
#![warn(unused_imports)]              // Unused imports
#![warn(unused_variables)]            // Unused variables
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden

// Clippy lints (warnings only)
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # GCE Deploy
//!
//! Declarative, idempotent reconciliation recipes for Google Compute Engine
//! and Cloud Storage resources.
//!
//! ## Overview
//!
//! A host orchestrator decides which resources to apply and in which order.
//! For each one it hands this crate the declared definition and the recorded
//! state, and the matching recipe:
//!
//! - Optionally checks the live resource and reports drift
//! - Creates what is missing, updates what can be updated in place
//! - Refuses to change immutable properties of deployed resources
//! - Asks before deleting anything it did not expect to find
//!
//! ## Resource kinds
//!
//! Disks, networks with their firewall rules, images, static IP addresses,
//! forwarding rules, HTTP health checks, target pools, routes and buckets.
//!
//! ## Modules
//!
//! - [`config`]: Configuration parsing and validation
//! - [`credentials`]: Credential resolution from definitions and the environment
//! - [`provider`]: The cloud API seam
//! - [`resources`]: One reconciliation recipe per resource kind
//! - [`reconciler`]: The per-resource apply and destroy entry points
//! - [`state`]: Persisted deployment state
//!
//! ## Example
//!
//! ```yaml
//! deployment: web
//!
//! resources:
//!   gceNetworks:
//!     net:
//!       addressRange: 10.240.0.0/16
//!       firewall:
//!         allow-http:
//!           allowed:
//!             tcp: [80]
//!   gceHTTPHealthChecks:
//!     hc:
//!       path: /healthz
//!   gceTargetPools:
//!     pool:
//!       region: europe-west1
//!       healthCheck:
//!         resource: hc
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod config;
pub mod credentials;
pub mod diff;
pub mod error;
pub mod prompt;
pub mod provider;
pub mod reconciler;
pub mod resources;
pub mod state;

// ============================================================================
// Re-exports
// ============================================================================

pub use config::{ConfigParser, ConfigValidator, DefinitionHasher, DeployConfig};
pub use credentials::{Credentials, EnvSnapshot};
pub use error::{GceError, Result};
pub use prompt::{AssumeAnswer, Confirm, StdinConfirm};
pub use provider::{CloudApi, Connector};
pub use reconciler::{ApplyContext, ApplyOptions, Reconcile, Reconciler, Siblings};
pub use resources::{AnyDefinition, Lifecycle, ResourceKind, ResourceRecord};
pub use state::{DeploymentState, LocalStateStore, StateStore};
