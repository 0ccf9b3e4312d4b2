// src/recon/analysis.rs

//! Narrative assessment of a discovery report.

use serde_json::json;
use tracing::{debug, info, warn};

use crate::config::ReconConfig;
use crate::recon::models::{ReconAnalysis, ReconReport};

const SYSTEM_PROMPT: &str = "You are a penetration tester summarizing reconnaissance results. \
Respond with a single JSON object containing exactly these keys: \
attack_surface_summary (string), possible_vulnerabilities (array of strings), \
interesting_endpoints (array of strings), security_recommendations (array of strings), \
risk_level (one of LOW, MEDIUM, HIGH, CRITICAL), detailed_analysis (string). \
No prose outside the JSON object.";

/// Produces an analysis for a report, remotely when an API key is configured
/// and via the local heuristic otherwise. A remote failure of any kind falls
/// back to the heuristic; analysis never fails.
pub struct Analyst {
    config: ReconConfig,
}

impl Analyst {
    pub fn new(config: ReconConfig) -> Self {
        Self { config }
    }

    pub async fn analyze(&self, report: &ReconReport) -> ReconAnalysis {
        if self.config.ai_api_key.is_some() {
            match self.analyze_remote(report).await {
                Ok(analysis) => {
                    info!(domain = %report.domain, "Remote analysis succeeded.");
                    return analysis;
                }
                Err(e) => {
                    warn!(error = %e, "Remote analysis failed, using local assessment.");
                }
            }
        } else {
            debug!("No analysis API key configured, using local assessment.");
        }
        fallback_analysis(report)
    }

    async fn analyze_remote(&self, report: &ReconReport) -> Result<ReconAnalysis, String> {
        let key = self
            .config
            .ai_api_key
            .as_deref()
            .ok_or("no API key configured")?;
        let report_json =
            serde_json::to_string_pretty(report).map_err(|e| format!("serialize report: {e}"))?;

        let client = reqwest::Client::builder()
            .timeout(self.config.ai_timeout)
            .build()
            .map_err(|e| format!("build client: {e}"))?;
        let body = json!({
            "model": self.config.ai_model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": format!("Analyze this reconnaissance report:\n{report_json}")},
            ],
            "temperature": 0.2,
            "max_tokens": 4000,
        });

        let response = client
            .post(&self.config.ai_api_url)
            .bearer_auth(key)
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;
        if !response.status().is_success() {
            return Err(format!("service answered {}", response.status()));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| format!("malformed response: {e}"))?;
        let content = payload["choices"][0]["message"]["content"]
            .as_str()
            .ok_or("response carries no content")?;

        serde_json::from_str(strip_code_fences(content))
            .map_err(|e| format!("content is not the expected JSON shape: {e}"))
    }
}

/// Models wrap JSON answers in markdown fences often enough to be worth
/// tolerating.
fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    trimmed.strip_suffix("```").unwrap_or(trimmed).trim()
}

/// Deterministic assessment derived from the report's shape alone. The risk
/// factors mirror what a reviewer would weigh first: breadth of the subdomain
/// estate, number of live hosts, and any host with a wide-open port profile.
pub fn fallback_analysis(report: &ReconReport) -> ReconAnalysis {
    let mut risk_factors = 0u8;
    if report.subdomains.len() > 20 {
        risk_factors += 1;
    }
    if report.live_hosts.len() > 10 {
        risk_factors += 1;
    }
    if report.open_ports.values().any(|ports| ports.len() > 5) {
        risk_factors += 2;
    }
    let risk_level = match risk_factors {
        0..=1 => "LOW",
        2 => "MEDIUM",
        3 => "HIGH",
        _ => "CRITICAL",
    };

    let mut possible_vulnerabilities = Vec::new();
    for (host, ports) in &report.open_ports {
        for port in ports {
            let note = match port {
                21 => Some("FTP exposed"),
                22 => Some("SSH exposed"),
                23 => Some("Telnet exposed"),
                25 => Some("SMTP exposed"),
                3306 => Some("MySQL exposed"),
                5432 => Some("PostgreSQL exposed"),
                6379 => Some("Redis exposed"),
                _ => None,
            };
            if let Some(note) = note {
                possible_vulnerabilities.push(format!("{note} on {host}:{port}"));
            }
        }
    }

    let interesting_endpoints: Vec<String> = report
        .endpoints
        .iter()
        .filter(|e| {
            let lowered = e.to_lowercase();
            ["admin", "login", "api", "config", "backup", "upload"]
                .iter()
                .any(|k| lowered.contains(k))
        })
        .take(10)
        .cloned()
        .collect();

    ReconAnalysis {
        attack_surface_summary: format!(
            "{} exposes {} subdomains, {} live hosts, and {} open ports.",
            report.domain,
            report.subdomains.len(),
            report.live_hosts.len(),
            report.open_port_count()
        ),
        possible_vulnerabilities,
        interesting_endpoints,
        security_recommendations: vec![
            "Close or firewall ports that do not serve a public purpose.".to_string(),
            "Decommission unused subdomains to shrink the attack surface.".to_string(),
            "Require authentication on administrative and API endpoints.".to_string(),
            "Keep detected server software patched and hide version banners.".to_string(),
        ],
        risk_level: risk_level.to_string(),
        detailed_analysis: format!(
            "Local assessment of {}: {} subdomains were enumerated and {} answered HTTP probes. \
             Port scanning recorded {} open ports. Risk rated {} from {} weighted factors.",
            report.domain,
            report.subdomains.len(),
            report.live_hosts.len(),
            report.open_port_count(),
            risk_level,
            risk_factors
        ),
    }
}
