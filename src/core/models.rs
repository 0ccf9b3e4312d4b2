// src/core/models.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use url::Url;
use uuid::Uuid;

use crate::core::error::ValidationError;

/// How intrusive a scan is allowed to be. Passive checks are read-only;
/// active mode additionally runs the payload-injecting probes and requires
/// explicit permission at submission time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    Passive,
    Active,
}

/// Severity bucket attached to every finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

/// One security observation produced by a checker.
///
/// Findings are immutable after construction except for `score`, which the
/// risk scorer attaches once all phases have run. Checkers may emit
/// overlapping findings about the same surface; nothing deduplicates them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub title: String,
    pub severity: Severity,
    pub description: String,
    /// Classification tag (OWASP Top 10 category).
    pub category: String,
    /// The probed surface, e.g. a parameter name or endpoint path.
    pub affected: String,
    pub mitigation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl Finding {
    pub fn new(
        title: impl Into<String>,
        severity: Severity,
        description: impl Into<String>,
        category: impl Into<String>,
        affected: impl Into<String>,
        mitigation: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            severity,
            description: description.into(),
            category: category.into(),
            affected: affected.into(),
            mitigation: mitigation.into(),
            score: None,
        }
    }
}

/// A validated scan target. Construction enforces the invariants (http or
/// https scheme, non-empty host); the wrapped URL is immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Target {
    url: Url,
}

impl Target {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let url = Url::parse(raw).map_err(|e| ValidationError::InvalidTarget(e.to_string()))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ValidationError::InvalidTarget(format!(
                "unsupported scheme '{}'",
                url.scheme()
            )));
        }
        if url.host_str().map_or(true, str::is_empty) {
            return Err(ValidationError::InvalidTarget("missing host".to_string()));
        }
        Ok(Self { url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    pub fn port(&self) -> u16 {
        self.url.port_or_known_default().unwrap_or(443)
    }

    pub fn is_https(&self) -> bool {
        self.url.scheme() == "https"
    }

    /// `scheme://host[:port]` without path or query.
    pub fn base(&self) -> String {
        self.url.origin().ascii_serialization()
    }

    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.url.fmt(f)
    }
}

/// Progress marker forwarded to the registry before each phase runs.
/// `progress` is monotonically non-decreasing over the life of one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseEvent {
    pub progress: u8,
    pub label: String,
}

impl PhaseEvent {
    pub fn new(progress: u8, label: impl Into<String>) -> Self {
        Self {
            progress,
            label: label.into(),
        }
    }
}

/// Lifecycle state of a job: `Queued → Running → {Completed | Failed}`,
/// with no transitions out of a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

/// One scan's full lifecycle record, owned by the registry.
#[derive(Debug, Clone)]
pub struct ScanJob {
    pub id: Uuid,
    pub target: Target,
    pub mode: ScanMode,
    pub state: JobState,
    pub progress: u8,
    pub current_step: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub report: Option<ScanReport>,
}

/// The registry's answer to a status poll.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub status: JobState,
    pub progress: u8,
    pub current_step: String,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Per-severity counts for a finished scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub total: usize,
}

impl ScanSummary {
    pub fn from_findings(findings: &[Finding]) -> Self {
        let count = |s: Severity| findings.iter().filter(|f| f.severity == s).count();
        Self {
            critical: count(Severity::Critical),
            high: count(Severity::High),
            medium: count(Severity::Medium),
            low: count(Severity::Low),
            total: findings.len(),
        }
    }
}

/// The final, immutable scan artifact. Findings keep discovery order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub target: String,
    pub mode: ScanMode,
    pub timestamp: DateTime<Utc>,
    pub summary: ScanSummary,
    pub findings: Vec<Finding>,
}
