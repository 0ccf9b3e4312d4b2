// src/core/checks/traversal.rs

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::ScannerConfig;
use crate::core::checks::{probe_client, with_param_value, with_single_param, Checker};
use crate::core::models::{Finding, Severity, Target};

const CATEGORY: &str = "A01:2021 - Broken Access Control";

/// Parameter names that conventionally take a file or path argument, probed
/// in addition to whatever parameters the target URL already carries.
const FILE_PARAMS: &[&str] = &["file", "path", "page", "document", "folder"];

const PAYLOADS: &[&str] = &[
    "../../../etc/passwd",
    "....//....//....//etc/passwd",
    "..%2F..%2F..%2Fetc%2Fpasswd",
    "..\\..\\..\\windows\\win.ini",
    "%2e%2e%2f%2e%2e%2f%2e%2e%2fetc%2fpasswd",
    "/etc/passwd",
    "C:\\windows\\win.ini",
];

/// File content markers: UNIX signatures are matched against the lowercased
/// body, Windows ones as written.
const UNIX_INDICATORS: &[&str] = &["root:x:", "daemon:", "/bin/bash", "/bin/sh"];
const WINDOWS_INDICATORS: &[&str] = &["[extensions]", "[fonts]", "for 16-bit app support"];

/// Feeds directory traversal sequences through file-style parameters and
/// looks for system file contents in the response. Existing query parameters
/// are probed first, then the conventional file parameter names. Stops at the
/// first disclosure.
pub struct TraversalScanner {
    user_agent: String,
    timeout: Duration,
}

impl TraversalScanner {
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
            if let Some(finding) = self
                .try_param(&client, target, param, |t, p, payload| {
                    with_param_value(t, p, payload)
                })
                .await
            {
                return Ok(vec![finding]);
            }
        }
        for param in FILE_PARAMS {
            if params.iter().any(|(name, _)| name == param) {
                continue;
            }
            if let Some(finding) = self
                .try_param(&client, target, param, |t, p, payload| {
                    with_single_param(t, p, payload)
                })
                .await
            {
                return Ok(vec![finding]);
            }
        }
        Ok(Vec::new())
    }

    async fn try_param(
        &self,
        client: &reqwest::Client,
        target: &Target,
        param: &str,
        build: impl Fn(&Target, &str, &str) -> url::Url,
    ) -> Option<Finding> {
        for payload in PAYLOADS {
            let probe_url = build(target, param, payload);
            let response = match client.get(probe_url).send().await {
                Ok(r) => r,
                Err(e) => {
                    debug!(param, error = %e, "Traversal probe request failed.");
                    continue;
                }
            };
            let body = response.text().await.unwrap_or_default();
            let lowered = body.to_lowercase();

            let hit = UNIX_INDICATORS.iter().any(|m| lowered.contains(m))
                || WINDOWS_INDICATORS.iter().any(|m| body.contains(m));
            if hit {
                return Some(Finding::new(
                    "Path Traversal Vulnerability",
                    Severity::Critical,
                    format!(
                        "Parameter \"{param}\" discloses system file contents (payload: {payload})"
                    ),
                    CATEGORY,
                    format!("{param} parameter"),
                    "Canonicalize file paths and reject any path escaping the content root.",
                ));
            }
        }
        None
    }
}

#[async_trait]
impl Checker for TraversalScanner {
    fn name(&self) -> &'static str {
        "traversal"
    }

    async fn check(&self, target: &Target) -> Vec<Finding> {
        info!(target = %target, "Starting path traversal probes.");
        match self.probe(target).await {
            Ok(findings) => {
                info!(findings = findings.len(), "Path traversal probes finished.");
                findings
            }
            Err(e) => {
                warn!(checker = self.name(), error = %e, "Probe failed, reporting no findings.");
                Vec::new()
            }
        }
    }
}
