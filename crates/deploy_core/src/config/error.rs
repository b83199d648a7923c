use thiserror::Error;

/// Errors raised while validating deploy configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("At least one service must be configured for redeploy")]
    NoServices,
    #[error("Invalid service entry: {0:?}")]
    InvalidServiceEntry(String),
    #[error("Service '{0}' is listed more than once")]
    DuplicateService(String),
    #[error("Service '{0}' is protected and cannot be redeployed")]
    ProtectedService(String),
    #[error("Repository URL is required (set DEPLOY_REPO_URL or --repo-url)")]
    MissingRepoUrl,
    #[error("Branch name cannot be empty")]
    EmptyBranch,
    #[error("Invalid branch name: {0}")]
    InvalidBranch(String),
    #[error("Invalid {field} URL: {message}")]
    InvalidUrl {
        field: &'static str,
        message: String,
    },
    #[error("Health check attempts must be at least 1")]
    ZeroHealthAttempts,
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
}
