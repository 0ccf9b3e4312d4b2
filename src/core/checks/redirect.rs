// src/core/checks/redirect.rs

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::ScannerConfig;
use crate::core::checks::{probe_client, with_single_param, Checker};
use crate::core::models::{Finding, Severity, Target};

const CATEGORY: &str = "A01:2021 - Broken Access Control";

/// Parameter names commonly wired to post-action redirects.
const REDIRECT_PARAMS: &[&str] = &["url", "redirect", "next", "return", "returnUrl", "goto", "target"];

/// Destinations a safe implementation must refuse to bounce to.
const PAYLOADS: &[&str] = &[
    "https://evil.com",
    "//evil.com",
    "https://evil.com/phish",
    "http://evil.com",
    "/\\evil.com",
    "javascript:alert(document.domain)",
    "data:text/html,<script>alert(1)</script>",
];

/// Feeds attacker-controlled destinations through redirect-style parameters
/// and flags responses that bounce off-site. Redirects are never followed so
/// the raw Location header is observable. Stops at the first confirmed bounce.
pub struct RedirectChecker {
    user_agent: String,
    timeout: Duration,
}

impl RedirectChecker {
    pub fn new(config: &ScannerConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            timeout: config.probe_timeout,
        }
    }

    async fn probe(&self, target: &Target) -> Result<Vec<Finding>, reqwest::Error> {
        let client = probe_client(&self.user_agent, self.timeout, false)?;

        for param in REDIRECT_PARAMS {
            for payload in PAYLOADS {
                let probe_url = with_single_param(target, param, payload);
                let response = match client.get(probe_url).send().await {
                    Ok(r) => r,
                    Err(e) => {
                        debug!(param, error = %e, "Redirect probe request failed.");
                        continue;
                    }
                };

                if !response.status().is_redirection() {
                    continue;
                }
                let location = response
                    .headers()
                    .get("location")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("");

                if location.contains("evil.com") || location.starts_with("//") {
                    return Ok(vec![Finding::new(
                        "Open Redirect Vulnerability",
                        Severity::Medium,
                        format!(
                            "Parameter \"{param}\" redirects to an external destination: {location}"
                        ),
                        CATEGORY,
                        format!("{param} parameter"),
                        "Validate redirect destinations against an allowlist of internal paths.",
                    )]);
                }
            }
        }
        Ok(Vec::new())
    }
}

#[async_trait]
impl Checker for RedirectChecker {
    fn name(&self) -> &'static str {
        "redirect"
    }

    async fn check(&self, target: &Target) -> Vec<Finding> {
        info!(target = %target, "Starting open redirect probes.");
        match self.probe(target).await {
            Ok(findings) => {
                info!(findings = findings.len(), "Open redirect probes finished.");
                findings
            }
            Err(e) => {
                warn!(checker = self.name(), error = %e, "Probe failed, reporting no findings.");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker() -> RedirectChecker {
        RedirectChecker::new(&ScannerConfig {
            probe_timeout: Duration::from_secs(2),
            ..ScannerConfig::default()
        })
    }

    #[tokio::test]
    async fn external_bounce_is_one_medium_finding() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", mockito::Matcher::Any)
            .with_status(302)
            .with_header("location", "https://evil.com")
            .create_async()
            .await;

        let target = Target::parse(&server.url()).unwrap();
        let findings = checker().check(&target).await;

        assert_eq!(findings.len(), 1);
        let finding = &findings[0];
        assert_eq!(finding.title, "Open Redirect Vulnerability");
        assert_eq!(finding.severity, Severity::Medium);
        assert_eq!(finding.affected, "url parameter");
    }

    #[tokio::test]
    async fn internal_redirects_are_not_flagged() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", mockito::Matcher::Any)
            .with_status(302)
            .with_header("location", "/login")
            .expect_at_least(1)
            .create_async()
            .await;

        let target = Target::parse(&server.url()).unwrap();
        assert!(checker().check(&target).await.is_empty());
    }

    #[tokio::test]
    async fn non_redirecting_target_is_clean() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", mockito::Matcher::Any)
            .with_status(200)
            .expect_at_least(1)
            .create_async()
            .await;

        let target = Target::parse(&server.url()).unwrap();
        assert!(checker().check(&target).await.is_empty());
    }
}
