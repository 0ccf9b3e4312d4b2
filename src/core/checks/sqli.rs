// src/core/checks/sqli.rs

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::ScannerConfig;
use crate::core::checks::{probe_client, with_param_value, Checker};
use crate::core::models::{Finding, Severity, Target};

const CATEGORY: &str = "A03:2021 - Injection";

/// Error-based injection payloads tried per parameter.
const PAYLOADS: &[&str] = &[
    "'",
    "' OR '1'='1",
    "' OR '1'='1' --",
    "\" OR \"1\"=\"1",
    "1' AND '1'='2",
    "'; DROP TABLE users; --",
    "1 UNION SELECT NULL--",
];

/// Database error fragments matched against the lowercased response body.
const ERROR_PATTERNS: &[&str] = &[
    "sql syntax",
    "mysql_fetch",
    "ora-01756",
    "sqlite3.operationalerror",
    "postgresql error",
    "warning: mysql",
    "unclosed quotation mark",
    "quoted string not properly terminated",
];

/// Injects SQL payloads into each query parameter and watches for database
/// error signatures in the response. Stops at the first confirmed hit; one
/// vulnerable parameter is enough to establish the finding.
pub struct SqliScanner {
    user_agent: String,
    timeout: Duration,
}

impl SqliScanner {
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
                        debug!(param, error = %e, "Injection probe request failed.");
                        continue;
                    }
                };
                let body = response.text().await.unwrap_or_default().to_lowercase();

                if ERROR_PATTERNS.iter().any(|p| body.contains(p)) {
                    return Ok(vec![Finding::new(
                        "SQL Injection Vulnerability",
                        Severity::Critical,
                        format!(
                            "Parameter \"{param}\" appears vulnerable to SQL injection (payload: {payload})"
                        ),
                        CATEGORY,
                        format!("{param} parameter"),
                        "Use parameterized queries. Never concatenate user input into SQL.",
                    )]);
                }
            }
        }
        Ok(Vec::new())
    }
}

#[async_trait]
impl Checker for SqliScanner {
    fn name(&self) -> &'static str {
        "sqli"
    }

    async fn check(&self, target: &Target) -> Vec<Finding> {
        info!(target = %target, "Starting SQL injection probes.");
        match self.probe(target).await {
            Ok(findings) => {
                info!(findings = findings.len(), "SQL injection probes finished.");
                findings
            }
            Err(e) => {
                warn!(checker = self.name(), error = %e, "Probe failed, reporting no findings.");
                Vec::new()
            }
        }
    }
}
