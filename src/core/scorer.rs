// src/core/scorer.rs

//! Pure finding-to-score mapping used for triage ordering.

use crate::core::models::{Finding, Severity};

/// Fixed scores for named vulnerability classes, matched case-insensitively
/// against finding titles.
const VULN_SCORES: &[(&str, f64)] = &[
    ("SQL Injection", 9.8),
    ("Reflected XSS", 7.1),
    ("Stored XSS", 8.8),
    ("Path Traversal", 9.1),
    ("Open Redirect", 4.7),
    ("Missing X-Frame-Options", 6.5),
    ("Missing CSP", 5.9),
    ("Insecure Cookie", 6.1),
    ("CORS Misconfiguration", 4.3),
    ("Weak TLS", 5.3),
    ("No HTTPS", 9.8),
    ("Server Version Disclosure", 3.1),
    ("Exposed API Documentation", 5.3),
    ("Sensitive File Exposure", 9.8),
    ("Admin Interface Accessible", 7.5),
    ("Missing HSTS", 5.4),
    ("Missing X-Content-Type-Options", 4.8),
    ("Missing Referrer-Policy", 3.7),
    ("Technology Fingerprinting", 2.6),
    ("API Endpoints Discovered", 3.2),
];

/// Assigns a numeric risk score to findings.
///
/// The lookup is total and deterministic: a title containing a known
/// vulnerability class name gets that class's fixed score, anything else
/// falls back to the midpoint of its severity bucket's numeric range.
#[derive(Debug, Clone, Copy, Default)]
pub struct RiskScorer;

impl RiskScorer {
    pub fn new() -> Self {
        Self
    }

    /// Score one finding. Never fails.
    pub fn score(&self, finding: &Finding) -> f64 {
        let title = finding.title.to_lowercase();
        for (name, score) in VULN_SCORES {
            if title.contains(&name.to_lowercase()) {
                return *score;
            }
        }

        let (min, max) = Self::severity_range(finding.severity);
        ((min + max) / 2.0 * 10.0).round() / 10.0
    }

    /// Numeric range bound to a severity bucket.
    fn severity_range(severity: Severity) -> (f64, f64) {
        match severity {
            Severity::Critical => (9.0, 10.0),
            Severity::High => (7.0, 8.9),
            Severity::Medium => (4.0, 6.9),
            Severity::Low => (0.1, 3.9),
        }
    }

    /// Risk banding for a score, used in rendered reports.
    pub fn risk_level(score: f64) -> &'static str {
        if score >= 9.0 {
            "Critical"
        } else if score >= 7.0 {
            "High"
        } else if score >= 4.0 {
            "Medium"
        } else {
            "Low"
        }
    }
}
