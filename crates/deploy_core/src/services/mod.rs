//! Compose service selection.
//!
//! Decides which services a new commit touches and builds the compose
//! arguments that rebuild and recreate exactly those services. Services
//! outside the configured set (datastore, object store, the deployer itself)
//! never appear in the generated arguments.

mod compose;
mod operations;
mod types;

pub use compose::{compose_build_args, compose_up_args, ComposeTarget};
pub use operations::{affected_services, parse_service_specs, service_names, validate_services};
pub use types::ServiceSpec;
