// src/recon/service.rs

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, RwLock};
use tracing::info;
use uuid::Uuid;

use crate::config::ReconConfig;
use crate::core::error::{LookupError, ValidationError};
use crate::core::models::{JobState, PhaseEvent, StatusSnapshot};
use crate::recon::analysis::Analyst;
use crate::recon::models::{ReconAnalysis, ReconReport};
use crate::recon::pipeline::ReconEngine;
use crate::recon::render::render_markdown;

/// One discovery run's lifecycle record.
#[derive(Debug, Clone)]
struct ReconJob {
    domain: String,
    state: JobState,
    progress: u8,
    current_step: String,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    report: Option<ReconReport>,
    analysis: Option<ReconAnalysis>,
}

/// Acknowledgement for an accepted discovery submission.
#[derive(Debug, Clone, Serialize)]
pub struct ReconReceipt {
    pub id: Uuid,
    pub status: JobState,
    pub message: String,
}

/// Submission and polling surface for discovery runs. Mirrors the scan
/// service's lifecycle: submit returns a job id immediately, the pipeline
/// runs on a detached task, and the report is retrievable once the job
/// completes. Discovery jobs cannot fail; degraded stages are recorded
/// inside the report instead.
#[derive(Clone)]
pub struct ReconService {
    jobs: Arc<RwLock<HashMap<Uuid, ReconJob>>>,
    config: ReconConfig,
}

impl ReconService {
    pub fn new(config: ReconConfig) -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    /// Normalizes and validates the domain, registers a job, and starts the
    /// pipeline.
    pub async fn submit(&self, raw_domain: &str) -> Result<ReconReceipt, ValidationError> {
        let domain = normalize_domain(raw_domain)?;

        let id = Uuid::new_v4();
        let job = ReconJob {
            domain: domain.clone(),
            state: JobState::Queued,
            progress: 0,
            current_step: "Initializing".to_string(),
            started_at: Utc::now(),
            finished_at: None,
            report: None,
            analysis: None,
        };
        self.jobs.write().await.insert(id, job);
        info!(%id, domain, "Discovery run accepted.");

        let jobs = self.jobs.clone();
        let engine = ReconEngine::new(self.config.clone());
        let (tx, mut rx) = mpsc::unbounded_channel::<PhaseEvent>();

        let progress_jobs = jobs.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let mut jobs = progress_jobs.write().await;
                if let Some(job) = jobs.get_mut(&id) {
                    // A buffered event must not reopen a finished job.
                    if job.state.is_terminal() {
                        continue;
                    }
                    job.state = JobState::Running;
                    job.progress = job.progress.max(event.progress);
                    job.current_step = event.label;
                }
            }
        });

        let run_domain = domain.clone();
        tokio::spawn(async move {
            let report = engine.run(&run_domain, tx).await;
            let mut jobs = jobs.write().await;
            if let Some(job) = jobs.get_mut(&id) {
                job.state = JobState::Completed;
                job.progress = 100;
                job.current_step = "Discovery completed".to_string();
                job.finished_at = Some(Utc::now());
                job.report = Some(report);
            }
        });

        Ok(ReconReceipt {
            id,
            status: JobState::Queued,
            message: format!("Reconnaissance initiated for {domain}"),
        })
    }

    pub async fn status(&self, id: Uuid) -> Result<StatusSnapshot, LookupError> {
        let jobs = self.jobs.read().await;
        let job = jobs.get(&id).ok_or(LookupError::NotFound)?;
        Ok(StatusSnapshot {
            status: job.state,
            progress: job.progress,
            current_step: job.current_step.clone(),
            started_at: job.started_at,
            finished_at: job.finished_at,
            error: None,
        })
    }

    pub async fn report(&self, id: Uuid) -> Result<ReconReport, LookupError> {
        let jobs = self.jobs.read().await;
        let job = jobs.get(&id).ok_or(LookupError::NotFound)?;
        match job.state {
            JobState::Completed => job.report.clone().ok_or(LookupError::NotFound),
            _ => Err(LookupError::NotReady),
        }
    }

    /// Narrative assessment of a completed run's report, computed once per
    /// job and cached.
    pub async fn analyze(&self, id: Uuid) -> Result<ReconAnalysis, LookupError> {
        {
            let jobs = self.jobs.read().await;
            if let Some(analysis) = jobs.get(&id).and_then(|job| job.analysis.clone()) {
                return Ok(analysis);
            }
        }

        let report = self.report(id).await?;
        let analysis = Analyst::new(self.config.clone()).analyze(&report).await;
        let mut jobs = self.jobs.write().await;
        if let Some(job) = jobs.get_mut(&id) {
            job.analysis = Some(analysis.clone());
        }
        Ok(analysis)
    }

    /// Full markdown rendering of a completed run.
    pub async fn render(&self, id: Uuid) -> Result<String, LookupError> {
        let report = self.report(id).await?;
        let analysis = self.analyze(id).await?;
        Ok(render_markdown(&report, &analysis))
    }

    /// The normalized domain a job was submitted for.
    pub async fn domain(&self, id: Uuid) -> Result<String, LookupError> {
        let jobs = self.jobs.read().await;
        jobs.get(&id)
            .map(|job| job.domain.clone())
            .ok_or(LookupError::NotFound)
    }
}

/// Reduces user input to a bare apex or subdomain name: scheme, leading
/// `www.`, path, and trailing dots are stripped.
fn normalize_domain(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::InvalidDomain("empty input".to_string()));
    }

    let stripped = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed);
    let host = stripped.split('/').next().unwrap_or(stripped);
    let host = host.strip_prefix("www.").unwrap_or(host);
    let host = host.trim_end_matches('.').to_lowercase();

    if host.is_empty() || host.contains(char::is_whitespace) || !host.contains('.') {
        return Err(ValidationError::InvalidDomain(raw.to_string()));
    }
    Ok(host)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn offline_config() -> ReconConfig {
        ReconConfig {
            subfinder_path: "vigil-no-such-binary".to_string(),
            httpx_path: "vigil-no-such-binary".to_string(),
            nmap_path: "vigil-no-such-binary".to_string(),
            gau_path: "vigil-no-such-binary".to_string(),
            tool_timeout: Duration::from_secs(2),
            port_scan_timeout: Duration::from_secs(2),
            ..ReconConfig::default()
        }
    }

    #[test]
    fn domains_are_normalized() {
        assert_eq!(
            normalize_domain("https://www.Example.com/path").unwrap(),
            "example.com"
        );
        assert_eq!(normalize_domain("api.example.com").unwrap(), "api.example.com");
        assert!(normalize_domain("").is_err());
        assert!(normalize_domain("   ").is_err());
        assert!(normalize_domain("localhost").is_err());
        assert!(normalize_domain("two words.com").is_err());
    }

    #[tokio::test]
    async fn rejected_domains_create_no_job() {
        let service = ReconService::new(offline_config());
        assert!(matches!(
            service.submit("not a domain").await,
            Err(ValidationError::InvalidDomain(_))
        ));
        assert_eq!(
            service.status(Uuid::new_v4()).await.unwrap_err(),
            LookupError::NotFound
        );
    }

    #[tokio::test]
    async fn accepted_run_completes_with_a_degraded_report() {
        let service = ReconService::new(offline_config());
        let receipt = service.submit("example.invalid").await.unwrap();
        assert_eq!(receipt.status, JobState::Queued);
        assert_eq!(
            service.domain(receipt.id).await.unwrap(),
            "example.invalid"
        );
        assert_eq!(
            service.report(receipt.id).await.unwrap_err(),
            LookupError::NotReady
        );

        let deadline = tokio::time::Instant::now() + Duration::from_secs(60);
        loop {
            let status = service.status(receipt.id).await.unwrap();
            if status.status == JobState::Completed {
                assert_eq!(status.progress, 100);
                break;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "discovery did not finish in time"
            );
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        let report = service.report(receipt.id).await.unwrap();
        assert_eq!(report.domain, "example.invalid");
        assert!(!report.errors.is_empty());

        // No API key configured, so analysis is the local fallback.
        let analysis = service.analyze(receipt.id).await.unwrap();
        assert!(!analysis.risk_level.is_empty());

        let markdown = service.render(receipt.id).await.unwrap();
        assert!(markdown.starts_with("# Reconnaissance Report: example.invalid"));
    }
}
