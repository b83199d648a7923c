//! The poll loop and process signal handling.

use std::future::Future;
use std::time::Duration;

use tokio::signal;

use crate::cycle::{CycleOutcome, Deployer};
use crate::error::StageError;

/// Polls forever until `shutdown` resolves.
///
/// Deploy errors are logged and never end the loop. When `shutdown` fires
/// mid-deploy the in-flight cycle is dropped: its lock guard removes the lock
/// file, and containers that were already recreated stay as they are.
pub async fn run_loop<F>(deployer: &Deployer, interval: Duration, shutdown: F)
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    tracing::info!(interval_secs = interval.as_secs(), "Deploy loop started");

    loop {
        tokio::select! {
            result = deployer.poll_once() => log_result(&result),
            _ = &mut shutdown => {
                tracing::warn!("Shutdown requested during a deploy cycle");
                break;
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = &mut shutdown => break,
        }
    }

    tracing::info!("Deploy loop stopped");
}

/// Logs the outcome of one iteration.
pub fn log_result(result: &Result<CycleOutcome, StageError>) {
    match result {
        Ok(CycleOutcome::UpToDate { sha }) => {
            tracing::debug!(sha = %sha.short(), "No new commits");
        }
        Ok(CycleOutcome::LockBusy { age }) => {
            tracing::info!(
                lock_age_secs = age.as_secs(),
                "Another deploy holds the lock, skipping this poll"
            );
        }
        Ok(CycleOutcome::Deployed {
            sha,
            services,
            health_attempts,
        }) => {
            tracing::info!(
                sha = %sha,
                services = ?services,
                health_attempts,
                "Deploy complete"
            );
        }
        Err(e) => {
            tracing::error!(
                stage = %e.stage,
                error = %e.source,
                "Deploy attempt aborted, will retry on next poll"
            );
        }
    }
}

/// Wait for shutdown signals (Ctrl+C or SIGTERM).
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down...");
        }
    }
}
