// src/core/service.rs

use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::config::ScannerConfig;
use crate::core::engine::ScanEngine;
use crate::core::error::{LookupError, ValidationError};
use crate::core::models::{JobState, ScanMode, ScanReport, StatusSnapshot, Target};
use crate::core::registry::JobRegistry;

/// A scan submission as it arrives over the wire.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitRequest {
    pub target_url: String,
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default)]
    pub permission_confirmed: bool,
}

fn default_mode() -> String {
    "passive".to_string()
}

/// Acknowledgement returned for an accepted submission. The id is the only
/// handle for polling status and retrieving the report.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitReceipt {
    pub id: Uuid,
    pub status: JobState,
    pub message: String,
}

/// The submission and polling surface of the scanner.
///
/// Validation is synchronous; accepted scans run on a detached task so
/// submission returns immediately. Cloning the service shares the underlying
/// registry.
#[derive(Clone)]
pub struct ScanService {
    registry: Arc<JobRegistry>,
    config: ScannerConfig,
}

impl ScanService {
    pub fn new(config: ScannerConfig) -> Self {
        Self {
            registry: Arc::new(JobRegistry::new()),
            config,
        }
    }

    /// Validates a submission and, if accepted, registers the job and spawns
    /// the engine to drive it.
    ///
    /// Permission must be confirmed for every scan regardless of mode; the
    /// target owner's consent is not scoped to active probing only.
    pub async fn submit(&self, request: SubmitRequest) -> Result<SubmitReceipt, ValidationError> {
        if !request.permission_confirmed {
            return Err(ValidationError::PermissionNotConfirmed);
        }
        let mode = ScanMode::from_str(&request.mode)
            .map_err(|_| ValidationError::UnknownMode(request.mode.clone()))?;
        let target = Target::parse(&request.target_url)?;

        let message = format!("Scan initiated for {target}");
        let id = self.registry.create(target, mode).await;
        info!(%id, %mode, "Scan accepted.");

        let engine = ScanEngine::new(self.registry.clone(), self.config.clone());
        tokio::spawn(async move { engine.run(id).await });

        Ok(SubmitReceipt {
            id,
            status: JobState::Queued,
            message,
        })
    }

    pub async fn status(&self, id: Uuid) -> Result<StatusSnapshot, LookupError> {
        self.registry.status(id).await
    }

    pub async fn report(&self, id: Uuid) -> Result<ScanReport, LookupError> {
        self.registry.report(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn request(url: &str, mode: &str, confirmed: bool) -> SubmitRequest {
        SubmitRequest {
            target_url: url.to_string(),
            mode: mode.to_string(),
            permission_confirmed: confirmed,
        }
    }

    #[tokio::test]
    async fn unconfirmed_permission_is_rejected_before_anything_else() {
        let service = ScanService::new(ScannerConfig::default());
        let result = service.submit(request("https://example.com", "passive", false)).await;
        assert_eq!(result.unwrap_err(), ValidationError::PermissionNotConfirmed);

        // Even a malformed submission reports the permission problem first.
        let result = service.submit(request("not a url", "bogus", false)).await;
        assert_eq!(result.unwrap_err(), ValidationError::PermissionNotConfirmed);
    }

    #[tokio::test]
    async fn unknown_mode_is_rejected() {
        let service = ScanService::new(ScannerConfig::default());
        let result = service.submit(request("https://example.com", "aggressive", true)).await;
        assert_eq!(
            result.unwrap_err(),
            ValidationError::UnknownMode("aggressive".to_string())
        );
    }

    #[tokio::test]
    async fn invalid_target_is_rejected() {
        let service = ScanService::new(ScannerConfig::default());
        let result = service.submit(request("ftp://example.com", "passive", true)).await;
        assert!(matches!(result, Err(ValidationError::InvalidTarget(_))));
    }

    #[tokio::test]
    async fn rejected_submissions_leave_no_job_behind() {
        let service = ScanService::new(ScannerConfig::default());
        let _ = service.submit(request("ftp://example.com", "passive", true)).await;
        assert_eq!(
            service.status(Uuid::new_v4()).await.unwrap_err(),
            LookupError::NotFound
        );
    }

    #[tokio::test]
    async fn accepted_scan_is_pollable_until_it_finishes() {
        let config = ScannerConfig {
            request_timeout: Duration::from_millis(300),
            probe_timeout: Duration::from_millis(300),
            ..ScannerConfig::default()
        };
        let service = ScanService::new(config);
        let receipt = service
            .submit(request("https://127.0.0.1:1", "passive", true))
            .await
            .unwrap();
        assert_eq!(receipt.status, JobState::Queued);
        assert!(receipt.message.contains("https://127.0.0.1:1"));

        // Every checker fails against the dead port, so the scan completes
        // with an empty report rather than failing.
        let deadline = tokio::time::Instant::now() + Duration::from_secs(30);
        loop {
            let status = service.status(receipt.id).await.unwrap();
            if status.status.is_terminal() {
                assert_eq!(status.status, JobState::Completed);
                break;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "scan did not finish in time"
            );
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        let report = service.report(receipt.id).await.unwrap();
        assert_eq!(report.summary.total, 0);
    }

    #[tokio::test]
    async fn request_deserialization_fills_defaults() {
        let request: SubmitRequest =
            serde_json::from_str(r#"{"target_url": "https://example.com"}"#).unwrap();
        assert_eq!(request.mode, "passive");
        assert!(!request.permission_confirmed);
    }
}
