// src/recon/render.rs

//! Markdown rendering of a discovery report and its analysis.

use std::fmt::Write;

use crate::recon::models::{ReconAnalysis, ReconReport};

/// Renders a report and its analysis as a markdown document.
pub fn render_markdown(report: &ReconReport, analysis: &ReconAnalysis) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "# Reconnaissance Report: {}", report.domain);
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Generated {} | Duration {}s | Risk level **{}**",
        report.timestamp.format("%Y-%m-%d %H:%M UTC"),
        report.duration_secs,
        analysis.risk_level
    );
    let _ = writeln!(out);

    let _ = writeln!(out, "## Summary");
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", analysis.attack_surface_summary);
    let _ = writeln!(out);
    let _ = writeln!(out, "| Metric | Count |");
    let _ = writeln!(out, "|---|---|");
    let _ = writeln!(out, "| Subdomains | {} |", report.subdomains.len());
    let _ = writeln!(out, "| Live hosts | {} |", report.live_hosts.len());
    let _ = writeln!(out, "| Open ports | {} |", report.open_port_count());
    let _ = writeln!(out, "| Known endpoints | {} |", report.endpoints.len());
    let _ = writeln!(out);

    let _ = writeln!(out, "## Subdomains");
    let _ = writeln!(out);
    for subdomain in &report.subdomains {
        let _ = writeln!(out, "- {subdomain}");
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "## Live Hosts");
    let _ = writeln!(out);
    for host in &report.live_hosts {
        let _ = writeln!(out, "- {host}");
    }
    let _ = writeln!(out);

    if !report.open_ports.is_empty() {
        let _ = writeln!(out, "## Open Ports");
        let _ = writeln!(out);
        for (host, ports) in &report.open_ports {
            let listed = ports
                .iter()
                .map(u16::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            let _ = writeln!(out, "- **{host}**: {listed}");
        }
        let _ = writeln!(out);
    }

    if !report.technologies.is_empty() {
        let _ = writeln!(out, "## Technologies");
        let _ = writeln!(out);
        for (host, tech) in &report.technologies {
            let listed = if tech.is_empty() {
                "none detected".to_string()
            } else {
                tech.join(", ")
            };
            let _ = writeln!(out, "- **{host}**: {listed}");
        }
        let _ = writeln!(out);
    }

    if !report.endpoints.is_empty() {
        let _ = writeln!(out, "## Known Endpoints");
        let _ = writeln!(out);
        for endpoint in &report.endpoints {
            let _ = writeln!(out, "- `{endpoint}`");
        }
        let _ = writeln!(out);
    }

    if !report.directories.is_empty() {
        let _ = writeln!(out, "## Reachable Directories");
        let _ = writeln!(out);
        for dir in &report.directories {
            let _ = writeln!(out, "- `{dir}`");
        }
        let _ = writeln!(out);
    }

    let _ = writeln!(out, "## Assessment");
    let _ = writeln!(out);
    if !analysis.possible_vulnerabilities.is_empty() {
        let _ = writeln!(out, "### Possible Vulnerabilities");
        let _ = writeln!(out);
        for item in &analysis.possible_vulnerabilities {
            let _ = writeln!(out, "- {item}");
        }
        let _ = writeln!(out);
    }
    if !analysis.interesting_endpoints.is_empty() {
        let _ = writeln!(out, "### Interesting Endpoints");
        let _ = writeln!(out);
        for item in &analysis.interesting_endpoints {
            let _ = writeln!(out, "- `{item}`");
        }
        let _ = writeln!(out);
    }
    if !analysis.security_recommendations.is_empty() {
        let _ = writeln!(out, "### Recommendations");
        let _ = writeln!(out);
        for item in &analysis.security_recommendations {
            let _ = writeln!(out, "- {item}");
        }
        let _ = writeln!(out);
    }
    let _ = writeln!(out, "{}", analysis.detailed_analysis);

    if !report.errors.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "## Degraded Stages");
        let _ = writeln!(out);
        for error in &report.errors {
            let _ = writeln!(out, "- {error}");
        }
    }

    out
}
