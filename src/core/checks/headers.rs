// src/core/checks/headers.rs

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::ScannerConfig;
use crate::core::checks::{probe_client, Checker};
use crate::core::models::{Finding, Severity, Target};

const CATEGORY: &str = "A05:2021 - Security Misconfiguration";

/// Security headers every response is expected to carry, paired with the
/// finding title used when one is absent.
const SECURITY_HEADERS: &[(&str, &str)] = &[
    ("x-frame-options", "Missing X-Frame-Options header"),
    ("x-content-type-options", "Missing X-Content-Type-Options header"),
    ("strict-transport-security", "Missing HSTS header"),
    ("content-security-policy", "Missing Content Security Policy"),
    ("x-xss-protection", "Missing X-XSS-Protection header"),
    ("referrer-policy", "Missing Referrer-Policy header"),
    ("permissions-policy", "Missing Permissions-Policy header"),
];

/// Headers whose absence removes a structural protection (framing and content
/// type sniffing) rather than an advisory one.
const LOAD_BEARING: &[&str] = &["x-frame-options", "content-security-policy"];

/// Flags missing security headers and version-revealing server banners from a
/// single fetch of the target.
pub struct HeaderChecker {
    user_agent: String,
    timeout: Duration,
}

impl HeaderChecker {
    pub fn new(config: &ScannerConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            timeout: config.request_timeout,
        }
    }

    async fn probe(&self, target: &Target) -> Result<Vec<Finding>, reqwest::Error> {
        let client = probe_client(&self.user_agent, self.timeout, true)?;
        let response = client.get(target.url().clone()).send().await?;
        debug!(status = %response.status(), "Received response for header check.");
        let headers = response.headers();

        let mut findings = Vec::new();
        for (header, title) in SECURITY_HEADERS {
            if !headers.contains_key(*header) {
                let severity = if LOAD_BEARING.contains(header) {
                    Severity::High
                } else {
                    Severity::Medium
                };
                findings.push(Finding::new(
                    *title,
                    severity,
                    format!(
                        "The {header} header is not set, which may expose the application to security risks."
                    ),
                    CATEGORY,
                    "All pages",
                    format!("Add \"{header}\" header with appropriate value."),
                ));
            }
        }

        if let Some(server) = headers.get("server").and_then(|v| v.to_str().ok()) {
            if server.chars().any(|c| c.is_ascii_digit()) {
                findings.push(Finding::new(
                    "Server Version Disclosure",
                    Severity::Low,
                    format!("Server header reveals version information: {server}"),
                    CATEGORY,
                    "HTTP response headers",
                    "Disable server version disclosure in web server configuration.",
                ));
            }
        }

        Ok(findings)
    }
}

#[async_trait]
impl Checker for HeaderChecker {
    fn name(&self) -> &'static str {
        "headers"
    }

    async fn check(&self, target: &Target) -> Vec<Finding> {
        info!(target = %target, "Starting security header check.");
        match self.probe(target).await {
            Ok(findings) => {
                info!(findings = findings.len(), "Header check finished.");
                findings
            }
            Err(e) => {
                warn!(checker = self.name(), error = %e, "Probe failed, reporting no findings.");
                Vec::new()
            }
        }
    }
}
