// src/core/checks/endpoints.rs

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::ScannerConfig;
use crate::core::checks::{probe_client, Checker};
use crate::core::models::{Finding, Severity, Target};

const CATEGORY: &str = "A01:2021 - Broken Access Control";

/// Well-known paths probed relative to the target's base URL.
const COMMON_ENDPOINTS: &[&str] = &[
    "/api",
    "/api/v1",
    "/api/v2",
    "/admin",
    "/administrator",
    "/login",
    "/wp-admin",
    "/wp-login.php",
    "/phpmyadmin",
    "/.env",
    "/.git/config",
    "/config.php",
    "/backup",
    "/swagger",
    "/swagger-ui.html",
    "/api-docs",
    "/api/swagger.json",
    "/graphql",
    "/robots.txt",
    "/sitemap.xml",
    "/server-status",
    "/debug",
    "/test",
    "/console",
];

/// Paths that leak secrets or repository internals when served.
const SENSITIVE_FILES: &[&str] = &["/.env", "/.git/config", "/config.php"];

/// Administrative surfaces that should not answer unauthenticated requests.
const ADMIN_PATHS: &[&str] = &[
    "/admin",
    "/administrator",
    "/wp-admin",
    "/wp-login.php",
    "/phpmyadmin",
    "/console",
];

/// Interactive API documentation endpoints.
const API_DOC_PATHS: &[&str] = &[
    "/swagger",
    "/swagger-ui.html",
    "/api-docs",
    "/api/swagger.json",
];

/// Probes a list of well-known paths on the target and classifies what
/// responds. Redirects are not followed so that a 301 to a login page is not
/// mistaken for an accessible resource.
pub struct EndpointScanner {
    user_agent: String,
    timeout: Duration,
}

impl EndpointScanner {
    pub fn new(config: &ScannerConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            timeout: config.probe_timeout,
        }
    }

    async fn probe(&self, target: &Target) -> Result<Vec<Finding>, reqwest::Error> {
        let client = probe_client(&self.user_agent, self.timeout, false)?;
        let base = target.base();

        let mut findings = Vec::new();
        let mut accessible = Vec::new();

        for path in COMMON_ENDPOINTS {
            let url = format!("{base}{path}");
            let response = match client.get(&url).send().await {
                Ok(r) => r,
                Err(e) => {
                    debug!(path, error = %e, "Endpoint probe failed.");
                    continue;
                }
            };

            if response.status() != reqwest::StatusCode::OK {
                continue;
            }
            debug!(path, "Endpoint responded 200.");
            accessible.push(*path);

            if SENSITIVE_FILES.contains(path) {
                findings.push(Finding::new(
                    "Sensitive File Exposure",
                    Severity::Critical,
                    format!("Sensitive file is publicly accessible: {path}"),
                    CATEGORY,
                    path.to_string(),
                    "Block access to sensitive files at the web server level.",
                ));
            } else if ADMIN_PATHS.contains(path) {
                findings.push(Finding::new(
                    "Admin Interface Accessible",
                    Severity::High,
                    format!("Administrative interface found at: {path}"),
                    CATEGORY,
                    path.to_string(),
                    "Restrict admin interfaces by IP allowlist or VPN. Enforce MFA.",
                ));
            } else if API_DOC_PATHS.contains(path) {
                findings.push(Finding::new(
                    "Exposed API Documentation",
                    Severity::Medium,
                    format!("API documentation is publicly accessible at: {path}"),
                    CATEGORY,
                    path.to_string(),
                    "Disable interactive API documentation in production.",
                ));
            }
        }

        // The informational listing only appears when nothing above fired,
        // so reachable-but-benign paths do not get double reported.
        if findings.is_empty() && !accessible.is_empty() {
            findings.push(Finding::new(
                "API Endpoints Discovered",
                Severity::Low,
                format!("Discovered endpoints: {}", accessible.join(", ")),
                CATEGORY,
                "URL structure",
                "Review whether each discovered endpoint needs to be public.",
            ));
        }

        Ok(findings)
    }
}

#[async_trait]
impl Checker for EndpointScanner {
    fn name(&self) -> &'static str {
        "endpoints"
    }

    async fn check(&self, target: &Target) -> Vec<Finding> {
        info!(target = %target, "Starting endpoint discovery.");
        match self.probe(target).await {
            Ok(findings) => {
                info!(findings = findings.len(), "Endpoint discovery finished.");
                findings
            }
            Err(e) => {
                warn!(checker = self.name(), error = %e, "Probe failed, reporting no findings.");
                Vec::new()
            }
        }
    }
}
