// src/core/checks/cors.rs

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::ScannerConfig;
use crate::core::checks::{probe_client, Checker};
use crate::core::models::{Finding, Severity, Target};

const CATEGORY: &str = "A05:2021 - Security Misconfiguration";

/// Origin values designed to trigger distinct misconfigurations: a wildcard
/// response, a null-origin allowance, and reflection of an attacker domain.
const TEST_ORIGINS: &[&str] = &["https://evil.com", "null", "https://attacker.target.com"];

/// Re-fetches the target under several Origin headers and flags permissive
/// CORS behavior. Each probe origin is evaluated independently, so the same
/// misconfiguration may be reported once per origin.
pub struct CorsChecker {
    user_agent: String,
    timeout: Duration,
}

impl CorsChecker {
    pub fn new(config: &ScannerConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            timeout: config.request_timeout,
        }
    }

    async fn probe(&self, target: &Target) -> Result<Vec<Finding>, reqwest::Error> {
        let client = probe_client(&self.user_agent, self.timeout, true)?;
        let mut findings = Vec::new();

        for origin in TEST_ORIGINS {
            let response = match client
                .get(target.url().clone())
                .header("Origin", *origin)
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    debug!(origin, error = %e, "CORS probe request failed.");
                    continue;
                }
            };

            let allow_origin = response
                .headers()
                .get("access-control-allow-origin")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_string();
            let allow_credentials = response
                .headers()
                .get("access-control-allow-credentials")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_string();

            if allow_origin == "*" {
                findings.push(Finding::new(
                    "CORS wildcard origin",
                    Severity::Medium,
                    "Server allows any origin (*)",
                    CATEGORY,
                    "CORS policy",
                    "Restrict Access-Control-Allow-Origin to an explicit allowlist.",
                ));
            }

            if allow_origin == *origin {
                let severity = if allow_credentials == "true" {
                    Severity::High
                } else {
                    Severity::Medium
                };
                findings.push(Finding::new(
                    "Reflected CORS origin",
                    severity,
                    format!(
                        "Origin \"{origin}\" is reflected in the Access-Control-Allow-Origin header (credentials: {})",
                        if allow_credentials.is_empty() { "not allowed" } else { &allow_credentials }
                    ),
                    CATEGORY,
                    "CORS policy",
                    "Validate Origin values against an allowlist instead of echoing them back.",
                ));
            }

            if allow_origin == "null" {
                findings.push(Finding::new(
                    "Null origin allowed",
                    Severity::Medium,
                    "Server allows Origin: null",
                    CATEGORY,
                    "CORS policy",
                    "Reject the null origin; sandboxed documents should not gain cross-origin access.",
                ));
            }
        }

        Ok(findings)
    }
}

#[async_trait]
impl Checker for CorsChecker {
    fn name(&self) -> &'static str {
        "cors"
    }

    async fn check(&self, target: &Target) -> Vec<Finding> {
        info!(target = %target, "Starting CORS check.");
        match self.probe(target).await {
            Ok(findings) => {
                info!(findings = findings.len(), "CORS check finished.");
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

    #[tokio::test]
    async fn wildcard_origin_is_reported_per_probe() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/")
            .with_status(200)
            .with_header("access-control-allow-origin", "*")
            .expect(3)
            .create_async()
            .await;

        let checker = CorsChecker::new(&ScannerConfig::default());
        let target = Target::parse(&server.url()).unwrap();
        let findings = checker.check(&target).await;

        // One probe per test origin, each observing the wildcard.
        assert_eq!(findings.len(), 3);
        assert!(findings.iter().all(|f| f.title == "CORS wildcard origin"));
    }

    #[tokio::test]
    async fn reflected_origin_with_credentials_is_high_severity() {
        let mut server = mockito::Server::new_async().await;
        // Mocks are matched in definition order, so the specific one goes first.
        let _mock = server
            .mock("GET", "/")
            .match_header("origin", "https://evil.com")
            .with_status(200)
            .with_header("access-control-allow-origin", "https://evil.com")
            .with_header("access-control-allow-credentials", "true")
            .create_async()
            .await;
        let _others = server.mock("GET", "/").with_status(200).create_async().await;

        let checker = CorsChecker::new(&ScannerConfig::default());
        let target = Target::parse(&server.url()).unwrap();
        let findings = checker.check(&target).await;

        let reflected: Vec<_> = findings
            .iter()
            .filter(|f| f.title == "Reflected CORS origin")
            .collect();
        assert_eq!(reflected.len(), 1);
        assert_eq!(reflected[0].severity, Severity::High);
    }

    #[tokio::test]
    async fn strict_cors_policy_is_clean() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/")
            .with_status(200)
            .with_header("access-control-allow-origin", "https://app.example.com")
            .create_async()
            .await;

        let checker = CorsChecker::new(&ScannerConfig::default());
        let target = Target::parse(&server.url()).unwrap();
        assert!(checker.check(&target).await.is_empty());
    }
}
