// src/core/checks/tls.rs

use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use native_tls::{Protocol, TlsConnector};
use tokio::task::spawn_blocking;
use tracing::{debug, error, info};
use x509_parser::prelude::*;

use crate::config::ScannerConfig;
use crate::core::checks::Checker;
use crate::core::models::{Finding, Severity, Target};

const CATEGORY: &str = "A02:2021 - Cryptographic Failures";

/// Deprecated protocol versions probed with a pinned handshake window.
const DEPRECATED_PROTOCOLS: &[(Protocol, &str)] = &[
    (Protocol::Tlsv10, "TLSv1.0"),
    (Protocol::Tlsv11, "TLSv1.1"),
];

/// Inspects the target's transport security: plain-HTTP targets get a single
/// critical finding, HTTPS targets are probed for deprecated protocol support
/// and certificate validity.
pub struct TlsChecker {
    timeout: Duration,
}

impl TlsChecker {
    pub fn new(config: &ScannerConfig) -> Self {
        Self {
            timeout: config.request_timeout,
        }
    }
}

#[async_trait]
impl Checker for TlsChecker {
    fn name(&self) -> &'static str {
        "tls"
    }

    async fn check(&self, target: &Target) -> Vec<Finding> {
        info!(target = %target, "Starting TLS check.");

        if !target.is_https() {
            return vec![Finding::new(
                "No HTTPS Enabled",
                Severity::Critical,
                "The website does not use HTTPS encryption.",
                CATEGORY,
                "Entire site",
                "Enable HTTPS with a valid SSL/TLS certificate.",
            )];
        }

        let host = target.host().to_string();
        let port = target.port();
        let timeout = self.timeout;

        debug!("Spawning blocking task for TLS probes.");
        spawn_blocking(move || probe_tls(&host, port, timeout))
            .await
            .unwrap_or_else(|e| {
                error!(panic = %e, "Blocking TLS probe task panicked.");
                Vec::new()
            })
    }
}

fn probe_tls(host: &str, port: u16, timeout: Duration) -> Vec<Finding> {
    let mut findings = Vec::new();

    for (protocol, label) in DEPRECATED_PROTOCOLS {
        if handshake_pinned(host, port, *protocol, timeout).is_ok() {
            debug!(protocol = label, "Deprecated protocol handshake succeeded.");
            findings.push(Finding::new(
                "Weak TLS Configuration",
                Severity::Medium,
                format!("Server supports deprecated protocol: {label}"),
                CATEGORY,
                "HTTPS endpoint",
                "Disable TLS 1.0 and 1.1. Only support TLS 1.2 and TLS 1.3.",
            ));
        }
    }

    match inspect_certificate(host, port, timeout) {
        Ok(Some(validity)) => findings.extend(evaluate_validity(&validity)),
        Ok(None) => debug!("Handshake succeeded but the server sent no certificate."),
        Err(e) => debug!(error = %e, "Certificate inspection failed, skipping."),
    }

    info!(findings = findings.len(), "TLS check finished.");
    findings
}

/// Attempts a handshake restricted to exactly one protocol version.
/// Certificate validation is disabled so that protocol support is measured
/// independently of certificate problems.
fn handshake_pinned(
    host: &str,
    port: u16,
    protocol: Protocol,
    timeout: Duration,
) -> Result<(), String> {
    let connector = TlsConnector::builder()
        .min_protocol_version(Some(protocol))
        .max_protocol_version(Some(protocol))
        .danger_accept_invalid_certs(true)
        .danger_accept_invalid_hostnames(true)
        .build()
        .map_err(|e| format!("TlsConnector Error: {e}"))?;

    let stream = connect_with_timeout(host, port, timeout)?;
    connector
        .connect(host, stream)
        .map_err(|e| format!("Handshake Error: {e}"))?;
    Ok(())
}

struct CertValidity {
    currently_valid: bool,
    days_until_expiry: i64,
    not_after: DateTime<Utc>,
}

/// Judges the parsed validity window. Expired certificates are high severity;
/// a certificate inside its last 30 days is flagged low.
fn evaluate_validity(validity: &CertValidity) -> Option<Finding> {
    if !validity.currently_valid {
        return Some(Finding::new(
            "Expired TLS Certificate",
            Severity::High,
            format!(
                "The certificate is outside its validity window (expires {}).",
                validity.not_after.format("%Y-%m-%d")
            ),
            CATEGORY,
            "HTTPS endpoint",
            "Renew the TLS certificate and automate rotation before expiry.",
        ));
    }
    if (0..=30).contains(&validity.days_until_expiry) {
        return Some(Finding::new(
            "TLS Certificate Expiring Soon",
            Severity::Low,
            format!(
                "The certificate expires in {} days.",
                validity.days_until_expiry
            ),
            CATEGORY,
            "HTTPS endpoint",
            "Renew the TLS certificate before it lapses.",
        ));
    }
    None
}

fn inspect_certificate(
    host: &str,
    port: u16,
    timeout: Duration,
) -> Result<Option<CertValidity>, String> {
    // Verification stays off so the chain of an expired or mis-issued
    // certificate is still retrievable; validity is judged from the parsed
    // dates, not from the handshake outcome.
    let connector = TlsConnector::builder()
        .danger_accept_invalid_certs(true)
        .danger_accept_invalid_hostnames(true)
        .build()
        .map_err(|e| format!("TlsConnector Error: {e}"))?;
    let stream = connect_with_timeout(host, port, timeout)?;
    let stream = connector
        .connect(host, stream)
        .map_err(|e| format!("TLS Handshake Error: {e}"))?;

    let cert = match stream.peer_certificate() {
        Ok(Some(c)) => c,
        Ok(None) => return Ok(None),
        Err(e) => return Err(format!("Could not get peer certificate: {e}")),
    };

    let cert_der = cert
        .to_der()
        .map_err(|e| format!("Could not convert certificate to DER: {e}"))?;
    let (_, x509) =
        parse_x509_certificate(&cert_der).map_err(|e| format!("X.509 Parse Error: {e}"))?;

    let validity = x509.validity();
    let not_before = asn1_time_to_chrono_utc(&validity.not_before);
    let not_after = asn1_time_to_chrono_utc(&validity.not_after);
    let now = Utc::now();

    Ok(Some(CertValidity {
        currently_valid: now > not_before && now < not_after,
        days_until_expiry: not_after.signed_duration_since(now).num_days(),
        not_after,
    }))
}

fn connect_with_timeout(host: &str, port: u16, timeout: Duration) -> Result<TcpStream, String> {
    let addr = (host, port)
        .to_socket_addrs()
        .map_err(|e| format!("DNS Error: {e}"))?
        .next()
        .ok_or_else(|| format!("no address for {host}"))?;
    let stream =
        TcpStream::connect_timeout(&addr, timeout).map_err(|e| format!("TCP Error: {e}"))?;
    stream
        .set_read_timeout(Some(timeout))
        .and_then(|_| stream.set_write_timeout(Some(timeout)))
        .map_err(|e| format!("Socket Error: {e}"))?;
    Ok(stream)
}

fn asn1_time_to_chrono_utc(time: &ASN1Time) -> DateTime<Utc> {
    DateTime::from_timestamp(time.timestamp(), 0).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn plain_http_target_is_a_single_critical_finding() {
        let checker = TlsChecker::new(&ScannerConfig::default());
        let target = Target::parse("http://example.com").unwrap();
        let findings = checker.check(&target).await;

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].title, "No HTTPS Enabled");
        assert_eq!(findings[0].severity, Severity::Critical);
    }

    fn validity(currently_valid: bool, days_until_expiry: i64) -> CertValidity {
        CertValidity {
            currently_valid,
            days_until_expiry,
            not_after: Utc::now() + chrono::Duration::days(days_until_expiry),
        }
    }

    #[test]
    fn expired_certificate_is_a_high_finding() {
        let finding = evaluate_validity(&validity(false, -12)).unwrap();
        assert_eq!(finding.title, "Expired TLS Certificate");
        assert_eq!(finding.severity, Severity::High);
    }

    #[test]
    fn certificate_in_its_last_month_is_flagged() {
        let finding = evaluate_validity(&validity(true, 10)).unwrap();
        assert_eq!(finding.title, "TLS Certificate Expiring Soon");
        assert_eq!(finding.severity, Severity::Low);
        assert!(finding.description.contains("10 days"));
    }

    #[test]
    fn healthy_certificate_is_clean() {
        assert!(evaluate_validity(&validity(true, 200)).is_none());
    }

    #[tokio::test]
    async fn unreachable_https_target_yields_no_findings() {
        let checker = TlsChecker::new(&ScannerConfig {
            request_timeout: Duration::from_millis(300),
            ..ScannerConfig::default()
        });
        let target = Target::parse("https://127.0.0.1:1").unwrap();
        assert!(checker.check(&target).await.is_empty());
    }
}
