//! Post-deploy health check.

use async_trait::async_trait;
use smartdiary_deploy_core::health::{is_healthy_status, HealthPolicy};
use thiserror::Error;
use url::Url;

use crate::error::{DeployError, Result};

/// Why a single probe did not report healthy.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProbeFailure {
    #[error("unhealthy status {0}")]
    Status(u16),
    #[error("request failed: {0}")]
    Request(String),
}

/// One health probe against the redeployed stack.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn check(&self) -> std::result::Result<(), ProbeFailure>;
}

/// `GET`s the health endpoint; any 2xx is healthy.
#[derive(Debug, Clone)]
pub struct HttpHealthProbe {
    client: reqwest::Client,
    url: Url,
}

impl HttpHealthProbe {
    pub fn new(url: Url, policy: &HealthPolicy) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(policy.timeout)
            .build()?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl HealthProbe for HttpHealthProbe {
    async fn check(&self) -> std::result::Result<(), ProbeFailure> {
        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(|e| ProbeFailure::Request(e.to_string()))?;

        let status = response.status().as_u16();
        if is_healthy_status(status) {
            Ok(())
        } else {
            Err(ProbeFailure::Status(status))
        }
    }
}

/// Probes until healthy or the policy's attempts run out.
///
/// Returns the number of attempts it took.
pub async fn wait_until_healthy(probe: &dyn HealthProbe, policy: &HealthPolicy) -> Result<u32> {
    let mut last_error = String::new();

    for attempt in 1..=policy.attempts {
        match probe.check().await {
            Ok(()) => {
                tracing::info!(attempt, "Health check passed");
                return Ok(attempt);
            }
            Err(failure) => {
                tracing::warn!(
                    attempt,
                    max_attempts = policy.attempts,
                    error = %failure,
                    "Health check failed"
                );
                last_error = failure.to_string();
            }
        }

        if attempt < policy.attempts {
            tokio::time::sleep(policy.interval).await;
        }
    }

    Err(DeployError::Unhealthy {
        attempts: policy.attempts,
        last_error,
    })
}
