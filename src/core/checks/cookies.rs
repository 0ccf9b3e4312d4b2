// src/core/checks/cookies.rs

use async_trait::async_trait;
use reqwest::header::SET_COOKIE;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::ScannerConfig;
use crate::core::checks::{probe_client, Checker};
use crate::core::models::{Finding, Severity, Target};

const CATEGORY: &str = "A05:2021 - Security Misconfiguration";

/// Checks every cookie the target sets for the Secure, HttpOnly, and SameSite
/// attributes, emitting one finding per cookie with anything missing.
pub struct CookieChecker {
    user_agent: String,
    timeout: Duration,
}

struct CookieFlags {
    name: String,
    secure: bool,
    http_only: bool,
    same_site: bool,
}

impl CookieChecker {
    pub fn new(config: &ScannerConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            timeout: config.request_timeout,
        }
    }

    async fn probe(&self, target: &Target) -> Result<Vec<Finding>, reqwest::Error> {
        let client = probe_client(&self.user_agent, self.timeout, true)?;
        let response = client.get(target.url().clone()).send().await?;

        let mut findings = Vec::new();
        for value in response.headers().get_all(SET_COOKIE) {
            let Ok(raw) = value.to_str() else { continue };
            let Some(cookie) = parse_set_cookie(raw) else {
                continue;
            };

            let mut issues = Vec::new();
            if !cookie.secure {
                issues.push("Secure flag missing");
            }
            if !cookie.http_only {
                issues.push("HttpOnly flag missing");
            }
            if !cookie.same_site {
                issues.push("SameSite attribute missing");
            }

            if !issues.is_empty() {
                findings.push(Finding::new(
                    "Insecure Cookie Configuration",
                    Severity::High,
                    format!(
                        "Cookie \"{}\" has security issues: {}",
                        cookie.name,
                        issues.join(", ")
                    ),
                    CATEGORY,
                    format!("{} cookie", cookie.name),
                    "Set Secure, HttpOnly, and SameSite=Strict flags on all cookies.",
                ));
            }
        }
        Ok(findings)
    }
}

#[async_trait]
impl Checker for CookieChecker {
    fn name(&self) -> &'static str {
        "cookies"
    }

    async fn check(&self, target: &Target) -> Vec<Finding> {
        info!(target = %target, "Starting cookie check.");
        match self.probe(target).await {
            Ok(findings) => {
                info!(findings = findings.len(), "Cookie check finished.");
                findings
            }
            Err(e) => {
                warn!(checker = self.name(), error = %e, "Probe failed, reporting no findings.");
                Vec::new()
            }
        }
    }
}

/// Minimal Set-Cookie parser: name plus the three attributes the check cares
/// about, matched case-insensitively.
fn parse_set_cookie(raw: &str) -> Option<CookieFlags> {
    let mut parts = raw.split(';');
    let pair = parts.next()?;
    let name = pair.split('=').next().unwrap_or("").trim();
    if name.is_empty() {
        return None;
    }

    let mut flags = CookieFlags {
        name: name.to_string(),
        secure: false,
        http_only: false,
        same_site: false,
    };
    for attribute in parts {
        let key = attribute
            .split('=')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();
        match key.as_str() {
            "secure" => flags.secure = true,
            "httponly" => flags.http_only = true,
            "samesite" => flags.same_site = true,
            _ => {}
        }
    }
    Some(flags)
}
