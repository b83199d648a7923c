//! Deployer error types.

use std::fmt;
use std::path::PathBuf;

use smartdiary_deploy_core::config::ConfigError;
use smartdiary_deploy_core::revision::RevisionError;
use thiserror::Error;

/// Result type alias for the deployer.
pub type Result<T> = std::result::Result<T, DeployError>;

/// Errors that abort a deploy attempt or prevent startup.
#[derive(Error, Debug)]
pub enum DeployError {
    #[error("git {operation} failed: {message}")]
    Git {
        operation: &'static str,
        message: String,
    },

    #[error("git {operation} timed out after {secs}s")]
    GitTimeout { operation: &'static str, secs: u64 },

    #[error("compose {operation} failed: {message}")]
    Compose {
        operation: &'static str,
        message: String,
    },

    #[error("compose {operation} timed out after {secs}s")]
    ComposeTimeout { operation: &'static str, secs: u64 },

    #[error("Container runtime not found: {0}")]
    ContainerRuntimeNotFound(String),

    #[error("Health check failed after {attempts} attempts: {last_error}")]
    Unhealthy { attempts: u32, last_error: String },

    #[error("Lock file {}: {source}", path.display())]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("State file {}: {message}", path.display())]
    State { path: PathBuf, message: String },

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid revision: {0}")]
    Revision(#[from] RevisionError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The deploy stage an error belongs to, used as a structured log field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployStage {
    Fetch,
    Lock,
    Checkout,
    Build,
    Recreate,
    Health,
    State,
}

impl DeployStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeployStage::Fetch => "fetch",
            DeployStage::Lock => "lock",
            DeployStage::Checkout => "checkout",
            DeployStage::Build => "build",
            DeployStage::Recreate => "recreate",
            DeployStage::Health => "health",
            DeployStage::State => "state",
        }
    }
}

impl fmt::Display for DeployStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error tagged with the stage of the cycle that produced it.
#[derive(Error, Debug)]
#[error("{stage} stage failed: {source}")]
pub struct StageError {
    pub stage: DeployStage,
    #[source]
    pub source: DeployError,
}

impl StageError {
    pub fn new(stage: DeployStage, source: DeployError) -> Self {
        Self { stage, source }
    }
}

/// Attaches a stage to a fallible step.
pub trait AtStage<T> {
    fn at(self, stage: DeployStage) -> std::result::Result<T, StageError>;
}

impl<T> AtStage<T> for Result<T> {
    fn at(self, stage: DeployStage) -> std::result::Result<T, StageError> {
        self.map_err(|e| StageError::new(stage, e))
    }
}
