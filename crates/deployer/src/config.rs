//! Deployer configuration.
//!
//! Every setting is a CLI flag backed by an environment variable; in the
//! container deployment only the environment is used. `DeployArgs` is the
//! raw parsed form and `DeployConfig` the validated one.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use smartdiary_deploy_core::config::{split_list, validate_branch, ConfigError};
use smartdiary_deploy_core::health::HealthPolicy;
use smartdiary_deploy_core::remote::{redact_url, validate_health_url, validate_repo_url};
use smartdiary_deploy_core::services::{parse_service_specs, validate_services, ComposeTarget, ServiceSpec};
use url::Url;

use crate::compose::ContainerRuntime;
use crate::cycle::CycleSettings;

/// File names inside the state directory.
pub const STATE_FILE: &str = "last_deployed_sha";
pub const LOCK_FILE: &str = "deploy.lock";

/// Raw deploy settings as parsed from flags and environment.
#[derive(Clone, clap::Args)]
pub struct DeployArgs {
    /// Repository to deploy from (https, ssh, or a local path)
    #[arg(long, global = true, env = "DEPLOY_REPO_URL")]
    pub repo_url: Option<String>,

    /// Branch whose head is kept deployed
    #[arg(long, global = true, default_value = "main", env = "DEPLOY_BRANCH")]
    pub branch: String,

    /// Access token for HTTPS remotes
    #[arg(long, global = true, env = "DEPLOY_GIT_TOKEN", hide_env_values = true)]
    pub git_token: Option<String>,

    /// Time between polls of the remote branch
    #[arg(long, global = true, default_value = "60s", env = "DEPLOY_POLL_INTERVAL", value_parser = humantime::parse_duration)]
    pub poll_interval: Duration,

    /// Endpoint that must answer 2xx before a deploy is recorded
    #[arg(long, global = true, default_value = "http://localhost:8000/health", env = "DEPLOY_HEALTH_URL")]
    pub health_url: String,

    /// Age after which a lock file is considered left behind by a crashed deploy
    #[arg(long, global = true, default_value = "30m", env = "DEPLOY_LOCK_TIMEOUT", value_parser = humantime::parse_duration)]
    pub lock_timeout: Duration,

    /// How long to wait for a fresh lock before skipping the poll
    #[arg(long, global = true, default_value = "30s", env = "DEPLOY_LOCK_WAIT", value_parser = humantime::parse_duration)]
    pub lock_wait: Duration,

    /// Checkout the stack is built from
    #[arg(long, global = true, default_value = "/opt/smartdiary", env = "DEPLOY_WORK_DIR")]
    pub work_dir: PathBuf,

    /// Directory holding the lock and last-deployed files
    #[arg(long, global = true, default_value = "/var/lib/smartdiary-deploy", env = "DEPLOY_STATE_DIR")]
    pub state_dir: PathBuf,

    /// Compose file, relative to the work dir
    #[arg(long, global = true, default_value = "docker-compose.prod.yml", env = "DEPLOY_COMPOSE_FILE")]
    pub compose_file: String,

    /// Compose project name
    #[arg(long, global = true, default_value = "smartdiary", env = "DEPLOY_COMPOSE_PROJECT")]
    pub compose_project: String,

    /// Services to rebuild, as name=path/|path/ entries
    #[arg(long, global = true, default_value = "backend=backend/,web=web/", env = "DEPLOY_SERVICES")]
    pub services: String,

    /// Services that must never be rebuilt or recreated
    #[arg(long, global = true, default_value = "db,minio,deployer", env = "DEPLOY_PROTECTED_SERVICES")]
    pub protected_services: String,

    /// Paths whose changes rebuild every service
    #[arg(long, global = true, default_value = "deploy/", env = "DEPLOY_GLOBAL_PATHS")]
    pub global_paths: String,

    /// Health probes before a deploy is declared failed
    #[arg(long, global = true, default_value = "10", env = "DEPLOY_HEALTH_ATTEMPTS")]
    pub health_attempts: u32,

    /// Pause between failed health probes
    #[arg(long, global = true, default_value = "5s", env = "DEPLOY_HEALTH_INTERVAL", value_parser = humantime::parse_duration)]
    pub health_interval: Duration,

    /// Per-request health probe timeout
    #[arg(long, global = true, default_value = "5s", env = "DEPLOY_HEALTH_TIMEOUT", value_parser = humantime::parse_duration)]
    pub health_timeout: Duration,

    /// Upper bound on any single git command
    #[arg(long, global = true, default_value = "2m", env = "DEPLOY_GIT_TIMEOUT", value_parser = humantime::parse_duration)]
    pub git_timeout: Duration,

    /// Container runtime
    #[arg(long, global = true, default_value = "auto", env = "DEPLOY_CONTAINER_RUNTIME")]
    pub runtime: ContainerRuntime,
}

/// Validated deploy configuration.
#[derive(Clone)]
pub struct DeployConfig {
    pub repo_url: Option<String>,
    pub branch: String,
    pub git_token: Option<String>,
    pub poll_interval: Duration,
    pub health_url: Url,
    pub health: HealthPolicy,
    pub lock_timeout: Duration,
    pub lock_wait: Duration,
    pub git_timeout: Duration,
    pub work_dir: PathBuf,
    pub state_dir: PathBuf,
    pub compose: ComposeTarget,
    pub services: Vec<ServiceSpec>,
    pub protected_services: Vec<String>,
    pub global_paths: Vec<String>,
    pub runtime: ContainerRuntime,
}

impl TryFrom<DeployArgs> for DeployConfig {
    type Error = ConfigError;

    fn try_from(args: DeployArgs) -> Result<Self, Self::Error> {
        let repo_url = args
            .repo_url
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());
        if let Some(url) = &repo_url {
            validate_repo_url(url)?;
        }

        validate_branch(&args.branch)?;

        if args.poll_interval.is_zero() {
            return Err(ConfigError::ZeroDuration("poll interval"));
        }
        if args.lock_timeout.is_zero() {
            return Err(ConfigError::ZeroDuration("lock timeout"));
        }
        if args.git_timeout.is_zero() {
            return Err(ConfigError::ZeroDuration("git timeout"));
        }

        let health_url = validate_health_url(&args.health_url)?;
        let health = HealthPolicy::new(
            args.health_attempts,
            args.health_interval,
            args.health_timeout,
        )?;

        let services = parse_service_specs(&args.services)?;
        let protected_services = split_list(&args.protected_services);
        validate_services(&services, &protected_services)?;

        let mut global_paths = split_list(&args.global_paths);
        if !global_paths.contains(&args.compose_file) {
            global_paths.push(args.compose_file.clone());
        }

        Ok(Self {
            repo_url,
            branch: args.branch.trim().to_string(),
            git_token: args.git_token.filter(|t| !t.is_empty()),
            poll_interval: args.poll_interval,
            health_url,
            health,
            lock_timeout: args.lock_timeout,
            lock_wait: args.lock_wait,
            git_timeout: args.git_timeout,
            work_dir: args.work_dir,
            state_dir: args.state_dir,
            compose: ComposeTarget {
                file: args.compose_file,
                project: args.compose_project,
            },
            services,
            protected_services,
            global_paths,
            runtime: args.runtime,
        })
    }
}

impl DeployConfig {
    /// Repository URL, required by every command that talks to the remote.
    pub fn require_repo_url(&self) -> Result<&str, ConfigError> {
        self.repo_url.as_deref().ok_or(ConfigError::MissingRepoUrl)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.state_dir.join(LOCK_FILE)
    }

    pub fn state_path(&self) -> PathBuf {
        self.state_dir.join(STATE_FILE)
    }

    pub fn cycle_settings(&self) -> CycleSettings {
        CycleSettings {
            services: self.services.clone(),
            global_paths: self.global_paths.clone(),
            health: self.health,
            lock_wait: self.lock_wait,
        }
    }
}

impl fmt::Debug for DeployConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeployConfig")
            .field("repo_url", &self.repo_url.as_deref().map(redact_url))
            .field("branch", &self.branch)
            .field("git_token", &self.git_token.as_ref().map(|_| "<redacted>"))
            .field("poll_interval", &self.poll_interval)
            .field("health_url", &redact_url(self.health_url.as_str()))
            .field("health", &self.health)
            .field("lock_timeout", &self.lock_timeout)
            .field("lock_wait", &self.lock_wait)
            .field("git_timeout", &self.git_timeout)
            .field("work_dir", &self.work_dir)
            .field("state_dir", &self.state_dir)
            .field("compose", &self.compose)
            .field("services", &self.services)
            .field("protected_services", &self.protected_services)
            .field("global_paths", &self.global_paths)
            .field("runtime", &self.runtime)
            .finish()
    }
}
