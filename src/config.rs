// src/config.rs

//! Environment-driven configuration for the scanner and the recon pipeline.
//!
//! Every knob has a sensible default; `VIGIL_*` variables override them. The
//! engine and checkers receive these values at construction time and treat
//! them as opaque, so swapping a config source never touches callers.

use std::str::FromStr;
use std::time::Duration;

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Settings shared by the vulnerability checkers.
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// User agent sent on every probe request.
    pub user_agent: String,
    /// Timeout for single-fetch checks (headers, cookies, fingerprinting).
    pub request_timeout: Duration,
    /// Tighter timeout for payload probes, which issue many requests.
    pub probe_timeout: Duration,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("Vigil/", env!("CARGO_PKG_VERSION")).to_string(),
            request_timeout: Duration::from_secs(10),
            probe_timeout: Duration::from_secs(5),
        }
    }
}

impl ScannerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            user_agent: env_string("VIGIL_USER_AGENT", &defaults.user_agent),
            request_timeout: Duration::from_secs(env_parse("VIGIL_REQUEST_TIMEOUT", 10)),
            probe_timeout: Duration::from_secs(env_parse("VIGIL_PROBE_TIMEOUT", 5)),
        }
    }
}

/// Settings for the discovery pipeline: external tool paths, timeouts, and
/// the optional narrative-analysis API credentials.
#[derive(Debug, Clone)]
pub struct ReconConfig {
    pub subfinder_path: String,
    pub httpx_path: String,
    pub nmap_path: String,
    pub gau_path: String,
    /// Default timeout for external tool invocations.
    pub tool_timeout: Duration,
    /// Dedicated timeout for the per-host port scan.
    pub port_scan_timeout: Duration,
    pub nmap_top_ports: u16,
    /// Upper bound on hosts handed to the port scanner.
    pub nmap_max_hosts: usize,
    /// API key for the narrative analysis service; `None` forces the local
    /// fallback assessment.
    pub ai_api_key: Option<String>,
    pub ai_api_url: String,
    pub ai_model: String,
    pub ai_timeout: Duration,
}

impl Default for ReconConfig {
    fn default() -> Self {
        Self {
            subfinder_path: "subfinder".to_string(),
            httpx_path: "httpx".to_string(),
            nmap_path: "nmap".to_string(),
            gau_path: "gau".to_string(),
            tool_timeout: Duration::from_secs(300),
            port_scan_timeout: Duration::from_secs(180),
            nmap_top_ports: 1000,
            nmap_max_hosts: 10,
            ai_api_key: None,
            ai_api_url: "https://api.perplexity.ai/chat/completions".to_string(),
            ai_model: "sonar-pro".to_string(),
            ai_timeout: Duration::from_secs(60),
        }
    }
}

impl ReconConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            subfinder_path: env_string("VIGIL_SUBFINDER_PATH", &defaults.subfinder_path),
            httpx_path: env_string("VIGIL_HTTPX_PATH", &defaults.httpx_path),
            nmap_path: env_string("VIGIL_NMAP_PATH", &defaults.nmap_path),
            gau_path: env_string("VIGIL_GAU_PATH", &defaults.gau_path),
            tool_timeout: Duration::from_secs(env_parse("VIGIL_TOOL_TIMEOUT", 300)),
            port_scan_timeout: Duration::from_secs(env_parse("VIGIL_PORT_SCAN_TIMEOUT", 180)),
            nmap_top_ports: env_parse("VIGIL_NMAP_TOP_PORTS", 1000),
            nmap_max_hosts: env_parse("VIGIL_NMAP_MAX_HOSTS", 10),
            ai_api_key: std::env::var("VIGIL_AI_API_KEY").ok(),
            ai_api_url: env_string("VIGIL_AI_API_URL", &defaults.ai_api_url),
            ai_model: env_string("VIGIL_AI_MODEL", &defaults.ai_model),
            ai_timeout: Duration::from_secs(env_parse("VIGIL_AI_TIMEOUT", 60)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = ScannerConfig::default();
        assert!(config.probe_timeout <= config.request_timeout);
        assert!(config.user_agent.starts_with("Vigil/"));
    }

    #[test]
    fn recon_defaults_have_no_api_key() {
        let config = ReconConfig::default();
        assert!(config.ai_api_key.is_none());
        assert_eq!(config.nmap_max_hosts, 10);
    }
}
