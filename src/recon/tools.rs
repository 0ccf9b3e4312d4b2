// src/recon/tools.rs

//! Thin wrapper around the external discovery binaries.

use std::process::Stdio;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("{0} is not installed or not on PATH")]
    NotInstalled(String),

    #[error("{0} timed out after {1:?}")]
    TimedOut(String, Duration),

    #[error("{tool} failed: {source}")]
    Io {
        tool: String,
        #[source]
        source: std::io::Error,
    },
}

/// Runs an external tool and captures stdout as UTF-8, lossy. A missing
/// binary is reported as `NotInstalled` so callers can fall back instead of
/// surfacing a raw spawn error. Non-zero exit codes are not errors; tools
/// like nmap exit non-zero on partially unreachable targets while still
/// producing usable output.
pub(crate) async fn run_tool(
    program: &str,
    args: &[&str],
    timeout: Duration,
) -> Result<String, ToolError> {
    debug!(program, ?args, "Invoking external tool.");
    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ToolError::NotInstalled(program.to_string())
            } else {
                ToolError::Io {
                    tool: program.to_string(),
                    source: e,
                }
            }
        })?;

    let output = tokio::time::timeout(timeout, child.wait_with_output())
        .await
        .map_err(|_| ToolError::TimedOut(program.to_string(), timeout))?
        .map_err(|e| ToolError::Io {
            tool: program.to_string(),
            source: e,
        })?;

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

static NMAP_OPEN_PORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<port protocol="(?:tcp|udp)" portid="(\d+)">\s*<state state="open""#).unwrap()
});

/// Extracts open port numbers from nmap XML output (`-oX -`).
pub(crate) fn parse_nmap_xml(xml: &str) -> Vec<u16> {
    let mut ports: Vec<u16> = NMAP_OPEN_PORT
        .captures_iter(xml)
        .filter_map(|caps| caps[1].parse().ok())
        .collect();
    ports.sort_unstable();
    ports.dedup();
    ports
}

/// Extracts open ports from nmap's plain "greppable-ish" stdout, used by the
/// quick rescan which runs without XML output.
pub(crate) fn parse_quick_scan(stdout: &str) -> Vec<u16> {
    let mut ports: Vec<u16> = stdout
        .lines()
        .filter(|line| line.contains("open"))
        .filter_map(|line| line.split('/').next())
        .filter_map(|head| head.trim().parse().ok())
        .collect();
    ports.sort_unstable();
    ports.dedup();
    ports
}

/// Reduces a URL or host string to a bare hostname for port scanning.
pub(crate) fn strip_scheme(host: &str) -> &str {
    let host = host
        .strip_prefix("https://")
        .or_else(|| host.strip_prefix("http://"))
        .unwrap_or(host);
    host.split('/').next().unwrap_or(host)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nmap_xml_open_ports_are_extracted() {
        let xml = r#"
            <port protocol="tcp" portid="22"><state state="open" reason="syn-ack"/></port>
            <port protocol="tcp" portid="80"><state state="open" reason="syn-ack"/></port>
            <port protocol="tcp" portid="25"><state state="filtered" reason="no-response"/></port>
        "#;
        assert_eq!(parse_nmap_xml(xml), vec![22, 80]);
    }

    #[test]
    fn quick_scan_lines_are_parsed() {
        let stdout = "PORT    STATE  SERVICE\n80/tcp  open   http\n443/tcp open   https\n8080/tcp closed http-proxy\n";
        assert_eq!(parse_quick_scan(stdout), vec![80, 443]);
    }

    #[test]
    fn scheme_and_path_are_stripped() {
        assert_eq!(strip_scheme("https://api.example.com/v1"), "api.example.com");
        assert_eq!(strip_scheme("http://example.com"), "example.com");
        assert_eq!(strip_scheme("example.com"), "example.com");
    }

    #[tokio::test]
    async fn missing_binary_is_not_installed() {
        let err = run_tool("vigil-no-such-binary", &[], Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NotInstalled(_)));
    }

    #[tokio::test]
    async fn timeout_is_reported() {
        let err = run_tool("sleep", &["5"], Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::TimedOut(_, _)));
    }
}
