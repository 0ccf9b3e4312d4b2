// src/recon/models.rs

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Everything one discovery run learned about a domain.
///
/// Maps are ordered so rendered reports are stable across runs. `errors`
/// records stage-level degradations; a populated report with a non-empty
/// error list means fallbacks were used, not that the run failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconReport {
    pub domain: String,
    pub timestamp: DateTime<Utc>,
    pub subdomains: Vec<String>,
    pub live_hosts: Vec<String>,
    /// Open TCP ports per live host.
    pub open_ports: BTreeMap<String, Vec<u16>>,
    /// Detected technologies per live host.
    pub technologies: BTreeMap<String, Vec<String>>,
    pub endpoints: Vec<String>,
    pub directories: Vec<String>,
    pub duration_secs: u64,
    pub errors: Vec<String>,
}

impl ReconReport {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            timestamp: Utc::now(),
            subdomains: Vec::new(),
            live_hosts: Vec::new(),
            open_ports: BTreeMap::new(),
            technologies: BTreeMap::new(),
            endpoints: Vec::new(),
            directories: Vec::new(),
            duration_secs: 0,
            errors: Vec::new(),
        }
    }

    /// Total open ports across all hosts.
    pub fn open_port_count(&self) -> usize {
        self.open_ports.values().map(Vec::len).sum()
    }
}

/// Narrative assessment of a discovery report, either produced by the remote
/// analysis service or synthesized locally from the report's shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconAnalysis {
    pub attack_surface_summary: String,
    pub possible_vulnerabilities: Vec<String>,
    pub interesting_endpoints: Vec<String>,
    pub security_recommendations: Vec<String>,
    /// One of LOW, MEDIUM, HIGH, CRITICAL.
    pub risk_level: String,
    pub detailed_analysis: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_port_count_sums_across_hosts() {
        let mut report = ReconReport::new("example.com");
        report
            .open_ports
            .insert("a.example.com".to_string(), vec![80, 443]);
        report
            .open_ports
            .insert("b.example.com".to_string(), vec![22]);
        assert_eq!(report.open_port_count(), 3);
    }

    #[test]
    fn analysis_deserializes_from_service_payload() {
        let payload = r#"{
            "attack_surface_summary": "Small footprint",
            "possible_vulnerabilities": ["Exposed SSH"],
            "interesting_endpoints": ["/admin"],
            "security_recommendations": ["Restrict SSH"],
            "risk_level": "MEDIUM",
            "detailed_analysis": "One host, three ports."
        }"#;
        let analysis: ReconAnalysis = serde_json::from_str(payload).unwrap();
        assert_eq!(analysis.risk_level, "MEDIUM");
        assert_eq!(analysis.possible_vulnerabilities.len(), 1);
    }
}
