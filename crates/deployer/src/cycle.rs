//! One poll iteration: fetch → compare → lock → reset/build/recreate/health.
//!
//! Every stage error aborts the iteration without touching the
//! last-deployed record, so the next poll retries the same commit. Already
//! recreated containers are not rolled back.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use smartdiary_deploy_core::health::HealthPolicy;
use smartdiary_deploy_core::lock::LockInfo;
use smartdiary_deploy_core::revision::{plan_poll, CommitSha, PollDecision};
use smartdiary_deploy_core::services::{affected_services, service_names, ServiceSpec};

use crate::compose::Orchestrator;
use crate::error::{AtStage, DeployStage, StageError};
use crate::git::SourceControl;
use crate::health::{wait_until_healthy, HealthProbe};
use crate::lock::{DeployLock, LockGuard, LockStatus};
use crate::state::StateStore;

/// What a successful iteration did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The remote head is already deployed.
    UpToDate { sha: CommitSha },
    /// Another deploy holds a fresh lock; this poll was skipped.
    LockBusy { age: Duration },
    /// The commit is live and recorded.
    Deployed {
        sha: CommitSha,
        services: Vec<String>,
        health_attempts: u32,
    },
}

/// Settings the cycle needs beyond its collaborators.
#[derive(Debug, Clone)]
pub struct CycleSettings {
    pub services: Vec<ServiceSpec>,
    pub global_paths: Vec<String>,
    pub health: HealthPolicy,
    pub lock_wait: Duration,
}

/// Runs deploy iterations against a working copy and a container stack.
pub struct Deployer {
    git: Arc<dyn SourceControl>,
    orchestrator: Arc<dyn Orchestrator>,
    probe: Arc<dyn HealthProbe>,
    lock: DeployLock,
    state: StateStore,
    settings: CycleSettings,
}

impl Deployer {
    pub fn new(
        git: Arc<dyn SourceControl>,
        orchestrator: Arc<dyn Orchestrator>,
        probe: Arc<dyn HealthProbe>,
        lock: DeployLock,
        state: StateStore,
        settings: CycleSettings,
    ) -> Self {
        Self {
            git,
            orchestrator,
            probe,
            lock,
            state,
            settings,
        }
    }

    pub fn state(&self) -> &StateStore {
        &self.state
    }

    pub fn git(&self) -> &dyn SourceControl {
        self.git.as_ref()
    }

    /// Runs one poll iteration.
    pub async fn poll_once(&self) -> Result<CycleOutcome, StageError> {
        self.checkout().await?;
        self.git.fetch().await.at(DeployStage::Fetch)?;
        let remote = self.git.remote_head().await.at(DeployStage::Fetch)?;
        let last = self.state.read().at(DeployStage::State)?;

        let PollDecision::Deploy { from, .. } = plan_poll(&remote, last.as_ref()) else {
            tracing::debug!(sha = %remote.short(), "Already up to date");
            return Ok(CycleOutcome::UpToDate { sha: remote });
        };

        tracing::info!(
            from = from.as_ref().map(|s| s.short()).unwrap_or("none"),
            to = %remote.short(),
            "New commit detected"
        );

        let Some(guard) = self.acquire_for(&remote).await? else {
            return Ok(CycleOutcome::LockBusy {
                age: self.held_lock_age(),
            });
        };

        // The holder we waited for may have shipped this same commit.
        let result = match self.state.read().at(DeployStage::State) {
            Ok(last) => match plan_poll(&remote, last.as_ref()) {
                PollDecision::UpToDate => {
                    tracing::info!(sha = %remote.short(), "Commit was deployed while waiting for the lock");
                    Ok(CycleOutcome::UpToDate { sha: remote })
                }
                PollDecision::Deploy { from, to } => self.deploy(from.as_ref(), &to).await,
            },
            Err(e) => Err(e),
        };

        release(guard);
        result
    }

    /// Records the remote head as deployed without building anything, for a
    /// stack that is already running that commit.
    ///
    /// Returns `None` when another deploy keeps the lock past `lock_wait`.
    pub async fn mark_deployed(&self) -> Result<Option<CommitSha>, StageError> {
        self.checkout().await?;
        self.git.fetch().await.at(DeployStage::Fetch)?;
        let head = self.git.remote_head().await.at(DeployStage::Fetch)?;

        let Some(guard) = self.acquire_for(&head).await? else {
            return Ok(None);
        };

        let result = match self.git.reset_hard(&head).await.at(DeployStage::Checkout) {
            Ok(()) => self.state.write(&head).at(DeployStage::State),
            Err(e) => Err(e),
        };

        release(guard);
        result.map(|()| Some(head))
    }

    async fn checkout(&self) -> Result<(), StageError> {
        if self.git.ensure_checkout().await.at(DeployStage::Fetch)? {
            tracing::info!("Repository cloned");
        }
        Ok(())
    }

    async fn acquire_for(&self, target: &CommitSha) -> Result<Option<LockGuard>, StageError> {
        let info = LockInfo::new(std::process::id(), Utc::now(), Some(target.clone()));
        self.lock
            .acquire(&info, self.settings.lock_wait)
            .await
            .at(DeployStage::Lock)
    }

    fn held_lock_age(&self) -> Duration {
        match self.lock.inspect() {
            Ok(LockStatus::Held { age, .. }) => age,
            _ => Duration::ZERO,
        }
    }

    /// The locked part of the cycle.
    async fn deploy(
        &self,
        from: Option<&CommitSha>,
        to: &CommitSha,
    ) -> Result<CycleOutcome, StageError> {
        self.git.reset_hard(to).await.at(DeployStage::Checkout)?;

        let changed = match from {
            Some(from) => self.git.changed_paths(from, to).await,
            None => None,
        };
        let affected = affected_services(
            &self.settings.services,
            changed.as_deref(),
            &self.settings.global_paths,
        );
        let services = service_names(&affected);

        if services.is_empty() {
            tracing::info!(sha = %to.short(), "No service affected, skipping rebuild");
        } else {
            tracing::info!(sha = %to.short(), services = ?services, "Rebuilding services");
            self.orchestrator
                .build(&services)
                .await
                .at(DeployStage::Build)?;
            self.orchestrator
                .recreate(&services)
                .await
                .at(DeployStage::Recreate)?;
        }

        let health_attempts = wait_until_healthy(self.probe.as_ref(), &self.settings.health)
            .await
            .at(DeployStage::Health)?;

        self.state.write(to).at(DeployStage::State)?;

        Ok(CycleOutcome::Deployed {
            sha: to.clone(),
            services,
            health_attempts,
        })
    }
}

fn release(guard: LockGuard) {
    if let Err(e) = guard.release() {
        tracing::error!(error = %e, "Failed to release deploy lock");
    }
}
