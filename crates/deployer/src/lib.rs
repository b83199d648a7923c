//! SmartDiary auto-deploy daemon.
//!
//! Keeps the running container stack on the head of a remote branch:
//! fetch, compare against the last deployed commit, take the deploy lock,
//! rebuild and recreate the affected services, and record the new commit
//! only once the health check passes.
//!
//! Decisions live in `smartdiary_deploy_core`; this crate is the imperative
//! shell around `git`, the compose CLI, HTTP, and the filesystem.

pub mod cli;
pub mod compose;
pub mod config;
pub mod cycle;
pub mod daemon;
pub mod error;
pub mod git;
pub mod health;
pub mod lock;
pub mod logging;
pub mod output;
pub mod state;

pub use config::DeployConfig;
pub use cycle::{CycleOutcome, Deployer};
pub use error::{DeployError, DeployStage, Result};
