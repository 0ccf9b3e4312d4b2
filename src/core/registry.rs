// src/core/registry.rs

use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::error::LookupError;
use crate::core::models::{
    JobState, PhaseEvent, ScanJob, ScanMode, ScanReport, StatusSnapshot, Target,
};

/// In-memory store of scan jobs, keyed by an unguessable UUID that doubles as
/// the bearer credential for result retrieval.
///
/// Each job has exactly one writer (the engine driving it) and any number of
/// concurrent status pollers; the interior lock serializes writes while reads
/// take the shared side. Jobs are never evicted within the process lifetime.
pub struct JobRegistry {
    jobs: RwLock<HashMap<Uuid, ScanJob>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a new job in the `Queued` state and returns its identifier.
    pub async fn create(&self, target: Target, mode: ScanMode) -> Uuid {
        let id = Uuid::new_v4();
        let job = ScanJob {
            id,
            target,
            mode,
            state: JobState::Queued,
            progress: 0,
            current_step: "Initializing".to_string(),
            started_at: Utc::now(),
            finished_at: None,
            error: None,
            report: None,
        };
        self.jobs.write().await.insert(id, job);
        info!(%id, "Scan job registered.");
        id
    }

    /// Current status of a job, or `NotFound` for unknown identifiers.
    pub async fn status(&self, id: Uuid) -> Result<StatusSnapshot, LookupError> {
        let jobs = self.jobs.read().await;
        let job = jobs.get(&id).ok_or(LookupError::NotFound)?;
        Ok(StatusSnapshot {
            status: job.state,
            progress: job.progress,
            current_step: job.current_step.clone(),
            started_at: job.started_at,
            finished_at: job.finished_at,
            error: job.error.clone(),
        })
    }

    /// The final report for a completed job.
    ///
    /// Returns `NotReady` while the job is queued or running. Failed jobs
    /// answer `NotFound`: they hold no report and never expose partial data.
    pub async fn report(&self, id: Uuid) -> Result<ScanReport, LookupError> {
        let jobs = self.jobs.read().await;
        let job = jobs.get(&id).ok_or(LookupError::NotFound)?;
        match job.state {
            JobState::Completed => job.report.clone().ok_or(LookupError::NotFound),
            JobState::Queued | JobState::Running => Err(LookupError::NotReady),
            JobState::Failed => Err(LookupError::NotFound),
        }
    }

    /// Target and mode for the engine about to drive this job.
    pub(crate) async fn job_parameters(&self, id: Uuid) -> Result<(Target, ScanMode), LookupError> {
        let jobs = self.jobs.read().await;
        let job = jobs.get(&id).ok_or(LookupError::NotFound)?;
        Ok((job.target.clone(), job.mode))
    }

    /// Moves a queued job into `Running`. A job already past `Queued` is left
    /// untouched.
    pub(crate) async fn mark_running(&self, id: Uuid) -> Result<(), LookupError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&id).ok_or(LookupError::NotFound)?;
        if job.state == JobState::Queued {
            job.state = JobState::Running;
            debug!(%id, "Job transitioned to running.");
        }
        Ok(())
    }

    /// Records the phase event a poller should see next. Progress is clamped
    /// so repeated polls never observe it decreasing.
    pub(crate) async fn advance(&self, id: Uuid, event: PhaseEvent) -> Result<(), LookupError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&id).ok_or(LookupError::NotFound)?;
        if job.state.is_terminal() {
            warn!(%id, "Ignoring phase event for terminal job.");
            return Ok(());
        }
        job.progress = job.progress.max(event.progress);
        job.current_step = event.label;
        Ok(())
    }

    /// Finalizes a job with its report. No-op if the job is already terminal.
    pub(crate) async fn complete(&self, id: Uuid, report: ScanReport) -> Result<(), LookupError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&id).ok_or(LookupError::NotFound)?;
        if job.state.is_terminal() {
            return Ok(());
        }
        job.state = JobState::Completed;
        job.progress = 100;
        job.current_step = "Scan completed".to_string();
        job.finished_at = Some(Utc::now());
        job.report = Some(report);
        info!(%id, "Scan job completed.");
        Ok(())
    }

    /// Marks a job failed with the captured error message. Failed jobs keep
    /// no report.
    pub(crate) async fn fail(&self, id: Uuid, message: String) {
        let mut jobs = self.jobs.write().await;
        if let Some(job) = jobs.get_mut(&id) {
            if job.state.is_terminal() {
                return;
            }
            job.state = JobState::Failed;
            job.error = Some(message);
            job.finished_at = Some(Utc::now());
            warn!(%id, error = job.error.as_deref().unwrap_or(""), "Scan job failed.");
        }
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::{Finding, ScanSummary, Severity};

    fn target() -> Target {
        Target::parse("https://example.com").unwrap()
    }

    fn report_with(findings: Vec<Finding>) -> ScanReport {
        ScanReport {
            target: "https://example.com".to_string(),
            mode: ScanMode::Passive,
            timestamp: Utc::now(),
            summary: ScanSummary::from_findings(&findings),
            findings,
        }
    }

    #[tokio::test]
    async fn create_yields_unique_resolvable_ids() {
        let registry = JobRegistry::new();
        let a = registry.create(target(), ScanMode::Passive).await;
        let b = registry.create(target(), ScanMode::Active).await;
        assert_ne!(a, b);

        let status = registry.status(a).await.unwrap();
        assert_eq!(status.status, JobState::Queued);
        assert_eq!(status.progress, 0);
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let registry = JobRegistry::new();
        assert_eq!(
            registry.status(Uuid::new_v4()).await.unwrap_err(),
            LookupError::NotFound
        );
        assert_eq!(
            registry.report(Uuid::new_v4()).await.unwrap_err(),
            LookupError::NotFound
        );
    }

    #[tokio::test]
    async fn progress_never_decreases() {
        let registry = JobRegistry::new();
        let id = registry.create(target(), ScanMode::Passive).await;
        registry.mark_running(id).await.unwrap();

        registry
            .advance(id, PhaseEvent::new(40, "Checking cookie security"))
            .await
            .unwrap();
        registry
            .advance(id, PhaseEvent::new(20, "Analyzing HTTP headers"))
            .await
            .unwrap();

        let status = registry.status(id).await.unwrap();
        assert_eq!(status.progress, 40);
        assert_eq!(status.current_step, "Analyzing HTTP headers");
    }

    #[tokio::test]
    async fn report_is_not_ready_until_completed() {
        let registry = JobRegistry::new();
        let id = registry.create(target(), ScanMode::Passive).await;
        assert_eq!(registry.report(id).await.unwrap_err(), LookupError::NotReady);

        registry.mark_running(id).await.unwrap();
        assert_eq!(registry.report(id).await.unwrap_err(), LookupError::NotReady);

        let findings = vec![Finding::new(
            "Missing X-Frame-Options header",
            Severity::High,
            "",
            "A05:2021 - Security Misconfiguration",
            "All pages",
            "",
        )];
        registry.complete(id, report_with(findings)).await.unwrap();

        let status = registry.status(id).await.unwrap();
        assert_eq!(status.status, JobState::Completed);
        assert_eq!(status.progress, 100);
        let report = registry.report(id).await.unwrap();
        assert_eq!(report.summary.total, 1);
    }

    #[tokio::test]
    async fn failed_jobs_record_the_error_and_hide_reports() {
        let registry = JobRegistry::new();
        let id = registry.create(target(), ScanMode::Passive).await;
        registry.mark_running(id).await.unwrap();
        registry
            .advance(id, PhaseEvent::new(30, "Testing TLS/SSL configuration"))
            .await
            .unwrap();

        registry.fail(id, "registry write failure".to_string()).await;

        let status = registry.status(id).await.unwrap();
        assert_eq!(status.status, JobState::Failed);
        assert!(!status.error.as_deref().unwrap_or("").is_empty());
        assert_eq!(registry.report(id).await.unwrap_err(), LookupError::NotFound);
    }

    #[tokio::test]
    async fn terminal_states_are_frozen() {
        let registry = JobRegistry::new();
        let id = registry.create(target(), ScanMode::Passive).await;
        registry.fail(id, "boom".to_string()).await;

        registry.complete(id, report_with(Vec::new())).await.unwrap();
        registry.advance(id, PhaseEvent::new(99, "late")).await.unwrap();

        let status = registry.status(id).await.unwrap();
        assert_eq!(status.status, JobState::Failed);
        assert_ne!(status.current_step, "late");
    }
}
