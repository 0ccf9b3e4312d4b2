// src/core/checks/xss.rs

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::ScannerConfig;
use crate::core::checks::{probe_client, with_param_value, Checker};
use crate::core::models::{Finding, Severity, Target};

const CATEGORY: &str = "A03:2021 - Injection";

/// Markers that only survive into the response body when the application
/// echoes input without encoding.
const PAYLOADS: &[&str] = &[
    "<script>alert('XSS')</script>",
    "<img src=x onerror=alert('XSS')>",
    "<svg onload=alert('XSS')>",
    "javascript:alert('XSS')",
    "'\"><script>alert(String.fromCharCode(88,83,83))</script>",
    "<body onload=alert('XSS')>",
];

/// Injects script payloads into each query parameter and reports a reflected
/// XSS when a payload comes back verbatim. Stops at the first reflection.
pub struct XssScanner {
    user_agent: String,
    timeout: Duration,
}

impl XssScanner {
    pub fn new(config: &ScannerConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            timeout: config.probe_timeout,
        }
    }

    async fn probe(&self, target: &Target) -> Result<Vec<Finding>, reqwest::Error> {
        let params = target.query_pairs();
        if params.is_empty() {
            debug!("Target has no query parameters, nothing to inject.");
            return Ok(Vec::new());
        }

        let client = probe_client(&self.user_agent, self.timeout, true)?;
        for (param, _) in &params {
            for payload in PAYLOADS {
                let probe_url = with_param_value(target, param, payload);
                let response = match client.get(probe_url).send().await {
                    Ok(r) => r,
                    Err(e) => {
                        debug!(param, error = %e, "XSS probe request failed.");
                        continue;
                    }
                };
                let body = response.text().await.unwrap_or_default();

                if body.contains(payload) {
                    return Ok(vec![Finding::new(
                        "Reflected XSS Vulnerability",
                        Severity::High,
                        format!(
                            "Parameter \"{param}\" reflects unencoded input back into the page"
                        ),
                        CATEGORY,
                        format!("{param} parameter"),
                        "HTML-encode all user input on output. Deploy a Content Security Policy.",
                    )]);
                }
            }
        }
        Ok(Vec::new())
    }
}

#[async_trait]
impl Checker for XssScanner {
    fn name(&self) -> &'static str {
        "xss"
    }

    async fn check(&self, target: &Target) -> Vec<Finding> {
        info!(target = %target, "Starting XSS probes.");
        match self.probe(target).await {
            Ok(findings) => {
                info!(findings = findings.len(), "XSS probes finished.");
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

    fn scanner() -> XssScanner {
        XssScanner::new(&ScannerConfig {
            probe_timeout: Duration::from_secs(2),
            ..ScannerConfig::default()
        })
    }

    #[tokio::test]
    async fn verbatim_reflection_is_one_high_finding() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", mockito::Matcher::Any)
            .with_status(200)
            .with_body(format!("<html>You searched for: {}</html>", PAYLOADS[0]))
            .create_async()
            .await;

        let target = Target::parse(&format!("{}/search?q=hello", server.url())).unwrap();
        let findings = scanner().check(&target).await;

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].title, "Reflected XSS Vulnerability");
        assert_eq!(findings[0].severity, Severity::High);
        assert_eq!(findings[0].affected, "q parameter");
    }

    #[tokio::test]
    async fn encoded_reflection_is_not_flagged() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", mockito::Matcher::Any)
            .with_status(200)
            .with_body("<html>You searched for: &lt;script&gt;alert('XSS')&lt;/script&gt;</html>")
            .create_async()
            .await;

        let target = Target::parse(&format!("{}/search?q=hello", server.url())).unwrap();
        assert!(scanner().check(&target).await.is_empty());
    }

    #[tokio::test]
    async fn target_without_parameters_is_skipped() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", mockito::Matcher::Any)
            .with_status(200)
            .expect(0)
            .create_async()
            .await;

        let target = Target::parse(&server.url()).unwrap();
        assert!(scanner().check(&target).await.is_empty());
        mock.assert_async().await;
    }
}
