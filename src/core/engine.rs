// src/core/engine.rs

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info};
use uuid::Uuid;

use crate::config::ScannerConfig;
use crate::core::checks::{
    Checker, CookieChecker, CorsChecker, EndpointScanner, HeaderChecker, RedirectChecker,
    SqliScanner, TechFingerprint, TlsChecker, TraversalScanner, XssScanner,
};
use crate::core::error::LookupError;
use crate::core::models::{PhaseEvent, ScanMode, ScanReport, ScanSummary};
use crate::core::registry::JobRegistry;
use crate::core::scorer::RiskScorer;

/// One checker with the progress marker published before it runs.
pub struct Phase {
    pub label: &'static str,
    pub progress: u8,
    pub checker: Box<dyn Checker>,
}

/// The ordered phases of a scan, split into the passive set every scan runs
/// and the active set gated on `ScanMode::Active`.
pub struct PhasePlan {
    pub passive: Vec<Phase>,
    pub active: Vec<Phase>,
}

impl PhasePlan {
    /// The full production plan: six passive phases, four active ones.
    pub fn standard(config: &ScannerConfig) -> Self {
        Self {
            passive: vec![
                Phase {
                    label: "Analyzing HTTP headers",
                    progress: 20,
                    checker: Box::new(HeaderChecker::new(config)),
                },
                Phase {
                    label: "Testing TLS/SSL configuration",
                    progress: 30,
                    checker: Box::new(TlsChecker::new(config)),
                },
                Phase {
                    label: "Checking cookie security",
                    progress: 40,
                    checker: Box::new(CookieChecker::new(config)),
                },
                Phase {
                    label: "Testing CORS configuration",
                    progress: 50,
                    checker: Box::new(CorsChecker::new(config)),
                },
                Phase {
                    label: "Fingerprinting technologies",
                    progress: 60,
                    checker: Box::new(TechFingerprint::new(config)),
                },
                Phase {
                    label: "Scanning for exposed endpoints",
                    progress: 70,
                    checker: Box::new(EndpointScanner::new(config)),
                },
            ],
            active: vec![
                Phase {
                    label: "Testing SQL injection points",
                    progress: 75,
                    checker: Box::new(SqliScanner::new(config)),
                },
                Phase {
                    label: "Checking XSS vulnerabilities",
                    progress: 80,
                    checker: Box::new(XssScanner::new(config)),
                },
                Phase {
                    label: "Testing for open redirects",
                    progress: 85,
                    checker: Box::new(RedirectChecker::new(config)),
                },
                Phase {
                    label: "Testing path traversal",
                    progress: 90,
                    checker: Box::new(TraversalScanner::new(config)),
                },
            ],
        }
    }
}

/// Drives one registered job through its phases, publishing progress to the
/// registry as it goes and finalizing the job with a report or a failure.
pub struct ScanEngine {
    registry: Arc<JobRegistry>,
    config: ScannerConfig,
}

impl ScanEngine {
    pub fn new(registry: Arc<JobRegistry>, config: ScannerConfig) -> Self {
        Self { registry, config }
    }

    /// Runs the standard phase plan against the job's target. Any registry
    /// failure along the way marks the job failed instead of propagating.
    pub async fn run(&self, id: Uuid) {
        let plan = PhasePlan::standard(&self.config);
        self.run_plan(id, plan).await;
    }

    /// The phases run on their own task so that a panic inside a checker
    /// unwinds only that task and still lands the job in `Failed`.
    pub async fn run_plan(&self, id: Uuid, plan: PhasePlan) {
        let engine = Self::new(self.registry.clone(), self.config.clone());
        match tokio::spawn(async move { engine.drive(id, plan).await }).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!(%id, error = %e, "Scan aborted.");
                self.registry.fail(id, e.to_string()).await;
            }
            Err(e) => {
                error!(%id, error = %e, "Scan task panicked.");
                self.registry
                    .fail(id, format!("scan task panicked: {e}"))
                    .await;
            }
        }
    }

    async fn drive(&self, id: Uuid, plan: PhasePlan) -> Result<(), LookupError> {
        let (target, mode) = self.registry.job_parameters(id).await?;
        self.registry.mark_running(id).await?;
        self.registry
            .advance(id, PhaseEvent::new(10, "Initializing scanner modules"))
            .await?;
        info!(%id, %target, %mode, "Scan started.");

        let mut findings = Vec::new();
        for phase in &plan.passive {
            self.registry
                .advance(id, PhaseEvent::new(phase.progress, phase.label))
                .await?;
            findings.extend(phase.checker.check(&target).await);
        }

        if mode == ScanMode::Active {
            for phase in &plan.active {
                self.registry
                    .advance(id, PhaseEvent::new(phase.progress, phase.label))
                    .await?;
                findings.extend(phase.checker.check(&target).await);
            }
        }

        self.registry
            .advance(id, PhaseEvent::new(95, "Calculating risk scores"))
            .await?;
        let scorer = RiskScorer::new();
        for finding in &mut findings {
            finding.score = Some(scorer.score(finding));
        }

        let report = ScanReport {
            target: target.to_string(),
            mode,
            timestamp: Utc::now(),
            summary: ScanSummary::from_findings(&findings),
            findings,
        };
        info!(%id, total = report.summary.total, "Scan finished, publishing report.");
        self.registry.complete(id, report).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::{Finding, JobState, Severity, Target};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Test double that reports fixed findings and counts invocations.
    struct StaticChecker {
        findings: Vec<Finding>,
        hits: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Checker for StaticChecker {
        fn name(&self) -> &'static str {
            "static"
        }

        async fn check(&self, _target: &Target) -> Vec<Finding> {
            self.hits.fetch_add(1, Ordering::SeqCst);
            self.findings.clone()
        }
    }

    fn phase(progress: u8, findings: Vec<Finding>, hits: Arc<AtomicUsize>) -> Phase {
        Phase {
            label: "test phase",
            progress,
            checker: Box::new(StaticChecker { findings, hits }),
        }
    }

    fn sample_finding() -> Finding {
        Finding::new(
            "Missing HSTS header",
            Severity::Medium,
            "",
            "A05:2021 - Security Misconfiguration",
            "All pages",
            "",
        )
    }

    #[tokio::test]
    async fn passive_scan_never_runs_active_phases() {
        let registry = Arc::new(JobRegistry::new());
        let engine = ScanEngine::new(registry.clone(), ScannerConfig::default());

        let passive_hits = Arc::new(AtomicUsize::new(0));
        let active_hits = Arc::new(AtomicUsize::new(0));
        let plan = PhasePlan {
            passive: vec![phase(20, vec![sample_finding()], passive_hits.clone())],
            active: vec![phase(75, vec![sample_finding()], active_hits.clone())],
        };

        let target = Target::parse("https://example.com").unwrap();
        let id = registry.create(target, ScanMode::Passive).await;
        engine.run_plan(id, plan).await;

        assert_eq!(passive_hits.load(Ordering::SeqCst), 1);
        assert_eq!(active_hits.load(Ordering::SeqCst), 0);

        let report = registry.report(id).await.unwrap();
        assert_eq!(report.summary.total, 1);
        assert_eq!(report.mode, ScanMode::Passive);
    }

    #[tokio::test]
    async fn active_scan_runs_both_phase_sets_and_scores_findings() {
        let registry = Arc::new(JobRegistry::new());
        let engine = ScanEngine::new(registry.clone(), ScannerConfig::default());

        let passive_hits = Arc::new(AtomicUsize::new(0));
        let active_hits = Arc::new(AtomicUsize::new(0));
        let sqli = Finding::new(
            "SQL Injection Vulnerability",
            Severity::Critical,
            "",
            "A03:2021 - Injection",
            "id parameter",
            "",
        );
        let plan = PhasePlan {
            passive: vec![phase(20, vec![sample_finding()], passive_hits.clone())],
            active: vec![phase(75, vec![sqli], active_hits.clone())],
        };

        let target = Target::parse("https://example.com").unwrap();
        let id = registry.create(target, ScanMode::Active).await;
        engine.run_plan(id, plan).await;

        assert_eq!(passive_hits.load(Ordering::SeqCst), 1);
        assert_eq!(active_hits.load(Ordering::SeqCst), 1);

        let report = registry.report(id).await.unwrap();
        assert_eq!(report.summary.total, 2);
        assert_eq!(report.summary.critical, 1);
        assert!(report.findings.iter().all(|f| f.score.is_some()));
        let sqli_score = report
            .findings
            .iter()
            .find(|f| f.title == "SQL Injection Vulnerability")
            .and_then(|f| f.score)
            .unwrap();
        assert_eq!(sqli_score, 9.8);
    }

    #[tokio::test]
    async fn completed_job_reads_one_hundred_percent() {
        let registry = Arc::new(JobRegistry::new());
        let engine = ScanEngine::new(registry.clone(), ScannerConfig::default());
        let plan = PhasePlan {
            passive: vec![phase(20, Vec::new(), Arc::new(AtomicUsize::new(0)))],
            active: Vec::new(),
        };

        let target = Target::parse("https://example.com").unwrap();
        let id = registry.create(target, ScanMode::Passive).await;
        engine.run_plan(id, plan).await;

        let status = registry.status(id).await.unwrap();
        assert_eq!(status.status, JobState::Completed);
        assert_eq!(status.progress, 100);
        assert_eq!(status.current_step, "Scan completed");
        assert!(status.finished_at.is_some());
    }

    /// Test double for a checker that violates its contract by panicking.
    struct PanickingChecker;

    #[async_trait]
    impl Checker for PanickingChecker {
        fn name(&self) -> &'static str {
            "panicking"
        }

        async fn check(&self, _target: &Target) -> Vec<Finding> {
            panic!("checker blew up");
        }
    }

    #[tokio::test]
    async fn panicking_phase_fails_the_job_and_skips_later_phases() {
        let registry = Arc::new(JobRegistry::new());
        let engine = ScanEngine::new(registry.clone(), ScannerConfig::default());

        let later_hits = Arc::new(AtomicUsize::new(0));
        let plan = PhasePlan {
            passive: vec![
                phase(20, vec![sample_finding()], Arc::new(AtomicUsize::new(0))),
                Phase {
                    label: "test phase",
                    progress: 30,
                    checker: Box::new(PanickingChecker),
                },
                phase(40, vec![sample_finding()], later_hits.clone()),
            ],
            active: Vec::new(),
        };

        let target = Target::parse("https://example.com").unwrap();
        let id = registry.create(target, ScanMode::Passive).await;
        engine.run_plan(id, plan).await;

        let status = registry.status(id).await.unwrap();
        assert_eq!(status.status, JobState::Failed);
        assert!(!status.error.as_deref().unwrap_or("").is_empty());
        assert_eq!(later_hits.load(Ordering::SeqCst), 0);

        // Failed jobs never expose partial data.
        assert_eq!(registry.report(id).await.unwrap_err(), LookupError::NotFound);
    }

    #[tokio::test]
    async fn unknown_job_is_a_no_op() {
        let registry = Arc::new(JobRegistry::new());
        let engine = ScanEngine::new(registry.clone(), ScannerConfig::default());
        engine.run(Uuid::new_v4()).await;
        assert_eq!(
            registry.status(Uuid::new_v4()).await.unwrap_err(),
            LookupError::NotFound
        );
    }
}
