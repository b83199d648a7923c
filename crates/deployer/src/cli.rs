//! Command-line interface and command handlers.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::compose::{detect_runtime, ComposeCli};
use crate::config::{DeployArgs, DeployConfig};
use crate::cycle::Deployer;
use crate::daemon::{run_loop, shutdown_signal};
use crate::git::{GitCli, SourceControl};
use crate::health::HttpHealthProbe;
use crate::lock::DeployLock;
use crate::logging::LogArgs;
use crate::output::{aprintln, format_outcome, format_status, p_g, p_y};
use crate::state::StateStore;

/// smartdiary-deploy - keep the SmartDiary stack on the head of a branch
#[derive(Parser)]
#[command(name = "smartdiary-deploy")]
#[command(version, about, long_about = "Polls a git branch and redeploys the SmartDiary container stack.

Each poll fetches the branch, compares its head with the last deployed
commit, and on a change takes the deploy lock, rebuilds and recreates the
affected services, and records the commit once the health check passes.

Every flag can also be set through its environment variable.")]
pub struct Cli {
    #[command(flatten)]
    pub deploy: DeployArgs,

    #[command(flatten)]
    pub log: LogArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Poll and deploy until interrupted (default)
    Run,

    /// Run a single poll iteration and exit
    Once,

    /// Clone the repository and prepare the state directory
    Bootstrap {
        /// Record the current remote head as deployed without deploying it
        #[arg(long)]
        mark_deployed: bool,
    },

    /// Show the last deployed commit and the lock state
    Status,

    /// Remove the deploy lock regardless of its age
    Unlock,
}

/// Executes the parsed command line.
pub async fn run(cli: Cli) -> Result<()> {
    let config = DeployConfig::try_from(cli.deploy).context("Invalid deploy configuration")?;
    tracing::debug!(config = ?config, "Loaded configuration");

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_daemon(&config).await,
        Commands::Once => run_once(&config).await,
        Commands::Bootstrap { mark_deployed } => bootstrap(&config, mark_deployed).await,
        Commands::Status => status(&config),
        Commands::Unlock => unlock(&config),
    }
}

/// Wires the production collaborators.
pub async fn build_deployer(config: &DeployConfig) -> Result<Deployer> {
    let repo_url = config.require_repo_url()?;

    let git = GitCli::new(
        &config.work_dir,
        repo_url,
        &config.branch,
        config.git_token.as_deref(),
        config.git_timeout,
    );

    let runtime = detect_runtime(config.runtime).await?;
    let compose = ComposeCli::new(
        runtime,
        config.compose.clone(),
        &config.work_dir,
        config.lock_timeout,
    );
    let probe = HttpHealthProbe::new(config.health_url.clone(), &config.health)?;

    Ok(Deployer::new(
        Arc::new(git),
        Arc::new(compose),
        Arc::new(probe),
        DeployLock::new(config.lock_path(), config.lock_timeout),
        StateStore::new(config.state_path()),
        config.cycle_settings(),
    ))
}

async fn create_state_dir(config: &DeployConfig) -> Result<()> {
    tokio::fs::create_dir_all(&config.state_dir)
        .await
        .with_context(|| format!("Failed to create {}", config.state_dir.display()))
}

/// Creates the state directory and clones the checkout if missing.
async fn prepare(config: &DeployConfig, deployer: &Deployer) -> Result<()> {
    create_state_dir(config).await?;

    if deployer
        .git()
        .ensure_checkout()
        .await
        .context("Failed to prepare the working copy")?
    {
        tracing::info!(work_dir = %config.work_dir.display(), "Repository cloned");
    }

    Ok(())
}

async fn run_daemon(config: &DeployConfig) -> Result<()> {
    let deployer = build_deployer(config).await?;
    // Cloning is left to the poll loop, which retries it.
    create_state_dir(config).await?;

    tracing::info!(
        branch = %config.branch,
        work_dir = %config.work_dir.display(),
        services = ?config.services.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
        health_url = %config.health_url,
        health_worst_case_secs = config.health.worst_case().as_secs(),
        "Starting deployer"
    );

    run_loop(&deployer, config.poll_interval, shutdown_signal()).await;
    Ok(())
}

async fn run_once(config: &DeployConfig) -> Result<()> {
    let deployer = build_deployer(config).await?;
    prepare(config, &deployer).await?;

    let outcome = deployer.poll_once().await?;
    aprintln!("{}", format_outcome(&outcome));
    Ok(())
}

async fn bootstrap(config: &DeployConfig, mark_deployed: bool) -> Result<()> {
    let deployer = build_deployer(config).await?;
    prepare(config, &deployer).await?;

    if !mark_deployed {
        aprintln!("{}", p_g("Bootstrap complete"));
        return Ok(());
    }

    match deployer.mark_deployed().await? {
        Some(head) => {
            tracing::info!(sha = %head, "Marked remote head as deployed");
            aprintln!("{} {}", p_g("Marked as deployed:"), head);
            Ok(())
        }
        None => anyhow::bail!(
            "Deploy lock {} is busy, another deploy is in progress",
            config.lock_path().display()
        ),
    }
}

fn status(config: &DeployConfig) -> Result<()> {
    let last = StateStore::new(config.state_path()).read()?;
    let lock = DeployLock::new(config.lock_path(), config.lock_timeout).inspect()?;

    aprintln!("{}", format_status(last.as_ref(), &lock));
    Ok(())
}

fn unlock(config: &DeployConfig) -> Result<()> {
    let lock = DeployLock::new(config.lock_path(), config.lock_timeout);

    if lock.force_release()? {
        tracing::warn!(path = %lock.path().display(), "Deploy lock removed by operator");
        aprintln!("{} {}", p_g("Removed"), lock.path().display());
    } else {
        aprintln!("{}", p_y("No deploy lock present"));
    }
    Ok(())
}
