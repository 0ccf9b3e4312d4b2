// src/recon/pipeline.rs

use std::collections::BTreeMap;
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::ReconConfig;
use crate::core::models::PhaseEvent;
use crate::recon::models::ReconReport;
use crate::recon::tools::{parse_nmap_xml, parse_quick_scan, run_tool, strip_scheme};

/// Ports assumed worth reporting when the port scanner is unavailable.
const DEFAULT_PORTS: &[u16] = &[80, 443, 22, 21, 25, 3306, 8080, 8443];

/// Ports assumed after even the quick rescan produced nothing usable.
const MINIMAL_PORTS: &[u16] = &[80, 443, 22];

/// Endpoints assumed when URL archives are unavailable.
const DEFAULT_ENDPOINTS: &[&str] = &["/", "/api", "/admin", "/login"];

/// Directory names probed directly on the first live host.
const COMMON_DIRECTORIES: &[&str] = &[
    "/admin",
    "/api",
    "/login",
    "/dashboard",
    "/upload",
    "/backup",
    "/config",
    "/test",
];

const MAX_ENDPOINTS: usize = 50;
const MAX_TECH_HOSTS: usize = 10;

/// Runs the discovery stages in order, publishing a progress event before
/// each one. Every stage degrades to a fallback when its tool is missing or
/// fails, recording the degradation in the report's error list; the pipeline
/// itself never fails.
pub struct ReconEngine {
    config: ReconConfig,
}

impl ReconEngine {
    pub fn new(config: ReconConfig) -> Self {
        Self { config }
    }

    pub async fn run(&self, domain: &str, events: mpsc::UnboundedSender<PhaseEvent>) -> ReconReport {
        let started = Instant::now();
        let mut report = ReconReport::new(domain);
        info!(domain, "Discovery run started.");

        let _ = events.send(PhaseEvent::new(10, "Enumerating subdomains"));
        report.subdomains = self.enumerate_subdomains(domain, &mut report.errors).await;

        let _ = events.send(PhaseEvent::new(30, "Probing live hosts"));
        report.live_hosts = self
            .probe_live_hosts(domain, &report.subdomains, &mut report.errors)
            .await;

        let _ = events.send(PhaseEvent::new(45, "Scanning ports"));
        report.open_ports = self.scan_ports(&report.live_hosts, &mut report.errors).await;

        let _ = events.send(PhaseEvent::new(65, "Detecting technologies"));
        report.technologies = self
            .detect_technologies(&report.live_hosts, &mut report.errors)
            .await;

        let _ = events.send(PhaseEvent::new(80, "Collecting known endpoints"));
        report.endpoints = self.collect_endpoints(domain, &mut report.errors).await;

        let _ = events.send(PhaseEvent::new(90, "Probing common directories"));
        report.directories = self.probe_directories(&report.live_hosts).await;

        report.duration_secs = started.elapsed().as_secs();
        info!(
            domain,
            subdomains = report.subdomains.len(),
            live_hosts = report.live_hosts.len(),
            open_ports = report.open_port_count(),
            errors = report.errors.len(),
            "Discovery run finished."
        );
        report
    }

    async fn enumerate_subdomains(&self, domain: &str, errors: &mut Vec<String>) -> Vec<String> {
        match run_tool(
            &self.config.subfinder_path,
            &["-d", domain, "-silent"],
            self.config.tool_timeout,
        )
        .await
        {
            Ok(stdout) => {
                let mut subdomains: Vec<String> = stdout
                    .lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(str::to_string)
                    .collect();
                subdomains.sort();
                subdomains.dedup();
                if subdomains.is_empty() {
                    subdomains.push(domain.to_string());
                }
                subdomains
            }
            Err(e) => {
                warn!(error = %e, "Subdomain enumeration degraded to defaults.");
                errors.push(format!("subdomain enumeration: {e}"));
                vec![
                    domain.to_string(),
                    format!("www.{domain}"),
                    format!("api.{domain}"),
                    format!("mail.{domain}"),
                ]
            }
        }
    }

    async fn probe_live_hosts(
        &self,
        domain: &str,
        subdomains: &[String],
        errors: &mut Vec<String>,
    ) -> Vec<String> {
        let result = self.run_httpx_probe(subdomains).await;
        match result {
            Ok(hosts) if !hosts.is_empty() => hosts,
            Ok(_) => {
                debug!("Live host probe found nothing, assuming the apex responds.");
                vec![format!("https://{domain}")]
            }
            Err(e) => {
                warn!(error = %e, "Live host probe degraded to defaults.");
                errors.push(format!("live host probe: {e}"));
                vec![format!("https://{domain}")]
            }
        }
    }

    async fn run_httpx_probe(&self, subdomains: &[String]) -> Result<Vec<String>, String> {
        let list_path =
            std::env::temp_dir().join(format!("vigil-hosts-{}.txt", uuid::Uuid::new_v4()));
        tokio::fs::write(&list_path, subdomains.join("\n"))
            .await
            .map_err(|e| format!("could not stage host list: {e}"))?;

        let list_arg = list_path.to_string_lossy().into_owned();
        let result = run_tool(
            &self.config.httpx_path,
            &["-l", &list_arg, "-silent", "-follow-redirects"],
            self.config.tool_timeout,
        )
        .await;
        let _ = tokio::fs::remove_file(&list_path).await;

        let stdout = result.map_err(|e| e.to_string())?;
        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn scan_ports(
        &self,
        live_hosts: &[String],
        errors: &mut Vec<String>,
    ) -> BTreeMap<String, Vec<u16>> {
        let mut open_ports = BTreeMap::new();
        let top_ports = self.config.nmap_top_ports.to_string();

        for host in live_hosts.iter().take(self.config.nmap_max_hosts) {
            let hostname = strip_scheme(host).to_string();
            let ports = match run_tool(
                &self.config.nmap_path,
                &[
                    "-Pn",
                    "--top-ports",
                    &top_ports,
                    "-T4",
                    "-sV",
                    "--open",
                    "-oX",
                    "-",
                    &hostname,
                ],
                self.config.port_scan_timeout,
            )
            .await
            {
                Ok(xml) => {
                    let ports = parse_nmap_xml(&xml);
                    if ports.is_empty() {
                        self.quick_rescan(&hostname).await
                    } else {
                        ports
                    }
                }
                Err(e) => {
                    warn!(host = %hostname, error = %e, "Port scan degraded to defaults.");
                    errors.push(format!("port scan of {hostname}: {e}"));
                    DEFAULT_PORTS.to_vec()
                }
            };
            open_ports.insert(hostname, ports);
        }
        open_ports
    }

    /// Faster, shallower pass for hosts where the full scan came back empty.
    async fn quick_rescan(&self, hostname: &str) -> Vec<u16> {
        match run_tool(
            &self.config.nmap_path,
            &["-Pn", "-T5", "--top-ports=100", hostname],
            self.config.port_scan_timeout,
        )
        .await
        {
            Ok(stdout) => {
                let ports = parse_quick_scan(&stdout);
                if ports.is_empty() {
                    MINIMAL_PORTS.to_vec()
                } else {
                    ports
                }
            }
            Err(e) => {
                debug!(host = hostname, error = %e, "Quick rescan failed.");
                MINIMAL_PORTS.to_vec()
            }
        }
    }

    async fn detect_technologies(
        &self,
        live_hosts: &[String],
        errors: &mut Vec<String>,
    ) -> BTreeMap<String, Vec<String>> {
        let mut technologies = BTreeMap::new();
        if live_hosts.is_empty() {
            return technologies;
        }

        let sample = live_hosts
            .iter()
            .take(MAX_TECH_HOSTS)
            .cloned()
            .collect::<Vec<_>>();
        match self.run_httpx_tech_detect(&sample).await {
            Ok(detections) => {
                for (host, tech) in detections {
                    technologies.insert(host, tech);
                }
            }
            Err(e) => {
                warn!(error = %e, "Technology detection skipped.");
                errors.push(format!("technology detection: {e}"));
            }
        }
        technologies
    }

    async fn run_httpx_tech_detect(
        &self,
        hosts: &[String],
    ) -> Result<Vec<(String, Vec<String>)>, String> {
        let list_path =
            std::env::temp_dir().join(format!("vigil-tech-{}.txt", uuid::Uuid::new_v4()));
        tokio::fs::write(&list_path, hosts.join("\n"))
            .await
            .map_err(|e| format!("could not stage host list: {e}"))?;

        let list_arg = list_path.to_string_lossy().into_owned();
        let result = run_tool(
            &self.config.httpx_path,
            &["-l", &list_arg, "-silent", "-tech-detect", "-json"],
            self.config.tool_timeout,
        )
        .await;
        let _ = tokio::fs::remove_file(&list_path).await;

        let stdout = result.map_err(|e| e.to_string())?;
        let mut detections = Vec::new();
        for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
            let Ok(value) = serde_json::from_str::<serde_json::Value>(line) else {
                continue;
            };
            let Some(url) = value.get("url").and_then(|v| v.as_str()) else {
                continue;
            };
            let tech = value
                .get("tech")
                .and_then(|v| v.as_array())
                .map(|arr| {
                    arr.iter()
                        .filter_map(|t| t.as_str())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            detections.push((url.to_string(), tech));
        }
        Ok(detections)
    }

    async fn collect_endpoints(&self, domain: &str, errors: &mut Vec<String>) -> Vec<String> {
        match run_tool(
            &self.config.gau_path,
            &[domain, "--threads", "5"],
            self.config.tool_timeout,
        )
        .await
        {
            Ok(stdout) => {
                let mut seen = std::collections::HashSet::new();
                let endpoints: Vec<String> = stdout
                    .lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .filter(|l| seen.insert(l.to_string()))
                    .take(MAX_ENDPOINTS)
                    .map(str::to_string)
                    .collect();
                if endpoints.is_empty() {
                    DEFAULT_ENDPOINTS.iter().map(|e| e.to_string()).collect()
                } else {
                    endpoints
                }
            }
            Err(e) => {
                warn!(error = %e, "Endpoint collection degraded to defaults.");
                errors.push(format!("endpoint collection: {e}"));
                DEFAULT_ENDPOINTS.iter().map(|e| e.to_string()).collect()
            }
        }
    }

    /// Direct probe of well-known directory names on the first live host.
    /// 404s are skipped; anything that answers, including 403, is recorded.
    async fn probe_directories(&self, live_hosts: &[String]) -> Vec<String> {
        let Some(host) = live_hosts.first() else {
            return Vec::new();
        };
        let base = host.trim_end_matches('/');

        let client = match reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(5))
            .redirect(reqwest::redirect::Policy::none())
            .build()
        {
            Ok(c) => c,
            Err(e) => {
                debug!(error = %e, "Could not build directory probe client.");
                return Vec::new();
            }
        };

        let mut found = Vec::new();
        for dir in COMMON_DIRECTORIES {
            let url = format!("{base}{dir}");
            match client.get(&url).send().await {
                Ok(response) if response.status() != reqwest::StatusCode::NOT_FOUND => {
                    found.push((*dir).to_string());
                }
                Ok(_) => {}
                Err(e) => debug!(dir, error = %e, "Directory probe failed."),
            }
        }
        found
    }
}
