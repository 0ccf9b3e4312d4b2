// src/core/checks/fingerprint.rs

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::ScannerConfig;
use crate::core::checks::{probe_client, Checker};
use crate::core::models::{Finding, Severity, Target};

const CATEGORY: &str = "A05:2021 - Security Misconfiguration";

/// The places a signature can be looked for.
enum Check<'a> {
    /// Pattern in a specific HTTP header.
    Header(&'a str, &'a Lazy<Regex>),
    /// Pattern in a meta tag's content attribute.
    MetaTag(&'a str, &'a Lazy<Regex>),
    /// Pattern anywhere in the HTML body.
    Body(&'a Lazy<Regex>),
    /// Pattern in a `<script src>` attribute.
    ScriptSrc(&'a Lazy<Regex>),
    /// Pattern in the Set-Cookie headers.
    Cookie(&'a Lazy<Regex>),
}

struct FingerprintRule<'a> {
    tech_name: &'a str,
    category: &'a str,
    check: Check<'a>,
}

static RE_WORDPRESS: Lazy<Regex> = Lazy::new(|| Regex::new(r"WordPress ([\d\.]+)").unwrap());
static RE_WP_EMBED: Lazy<Regex> = Lazy::new(|| Regex::new(r"/wp-content/|/wp-includes/").unwrap());
static RE_JOOMLA: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)joomla").unwrap());
static RE_DRUPAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)drupal|sites/default/files").unwrap());
static RE_DJANGO_CSRF: Lazy<Regex> = Lazy::new(|| Regex::new(r"csrftoken").unwrap());
static RE_LARAVEL: Lazy<Regex> = Lazy::new(|| Regex::new(r"laravel_session").unwrap());
static RE_ASPNET: Lazy<Regex> = Lazy::new(|| Regex::new(r"([\d\.]+)").unwrap());
static RE_PHP: Lazy<Regex> = Lazy::new(|| Regex::new(r"PHP/([\d\.]+)").unwrap());
static RE_JQUERY: Lazy<Regex> = Lazy::new(|| Regex::new(r"jquery[/-]([\d\.]+)").unwrap());
static RE_JQUERY_BODY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)jquery").unwrap());
static RE_REACT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"react-dom|data-reactroot|react\.development").unwrap());
static RE_ANGULAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)ng-version|angular").unwrap());
static RE_VUE: Lazy<Regex> = Lazy::new(|| Regex::new(r"data-v-app|__VUE_").unwrap());
static RE_CLOUDFLARE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)cloudflare").unwrap());
static RE_AKAMAI: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)akamai").unwrap());

/// Signature table for CMSes, frameworks, client libraries, and CDNs.
static RULES: &[FingerprintRule] = &[
    FingerprintRule { tech_name: "WordPress", category: "CMS", check: Check::MetaTag("generator", &RE_WORDPRESS) },
    FingerprintRule { tech_name: "WordPress", category: "CMS", check: Check::Body(&RE_WP_EMBED) },
    FingerprintRule { tech_name: "Joomla", category: "CMS", check: Check::Body(&RE_JOOMLA) },
    FingerprintRule { tech_name: "Drupal", category: "CMS", check: Check::Body(&RE_DRUPAL) },
    FingerprintRule { tech_name: "Django", category: "Framework", check: Check::Cookie(&RE_DJANGO_CSRF) },
    FingerprintRule { tech_name: "Laravel", category: "Framework", check: Check::Cookie(&RE_LARAVEL) },
    FingerprintRule { tech_name: "ASP.NET", category: "Framework", check: Check::Header("x-aspnet-version", &RE_ASPNET) },
    FingerprintRule { tech_name: "PHP", category: "Language", check: Check::Header("x-powered-by", &RE_PHP) },
    FingerprintRule { tech_name: "jQuery", category: "Library", check: Check::ScriptSrc(&RE_JQUERY) },
    FingerprintRule { tech_name: "jQuery", category: "Library", check: Check::Body(&RE_JQUERY_BODY) },
    FingerprintRule { tech_name: "React", category: "Library", check: Check::Body(&RE_REACT) },
    FingerprintRule { tech_name: "Angular", category: "Library", check: Check::Body(&RE_ANGULAR) },
    FingerprintRule { tech_name: "Vue.js", category: "Library", check: Check::Body(&RE_VUE) },
    FingerprintRule { tech_name: "Cloudflare", category: "CDN", check: Check::Header("server", &RE_CLOUDFLARE) },
    FingerprintRule { tech_name: "Akamai", category: "CDN", check: Check::Header("server", &RE_AKAMAI) },
];

/// Identifies the technologies behind the target from one fetch and reports
/// everything detected as a single informational finding. Nothing detected
/// means no finding.
pub struct TechFingerprint {
    user_agent: String,
    timeout: Duration,
}

impl TechFingerprint {
    pub fn new(config: &ScannerConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            timeout: config.request_timeout,
        }
    }

    async fn probe(&self, target: &Target) -> Result<Vec<Finding>, reqwest::Error> {
        let client = probe_client(&self.user_agent, self.timeout, true)?;
        let response = client.get(target.url().clone()).send().await?;

        let headers = response.headers().clone();
        let cookies = headers
            .get_all("set-cookie")
            .into_iter()
            .filter_map(|v| v.to_str().ok())
            .collect::<Vec<_>>()
            .join("; ");
        let body = response.text().await?;
        let document = Html::parse_document(&body);

        let mut detected: Vec<String> = Vec::new();
        if let Some(server) = headers.get("server").and_then(|v| v.to_str().ok()) {
            detected.push(format!("Server: {server}"));
        }
        if let Some(powered) = headers.get("x-powered-by").and_then(|v| v.to_str().ok()) {
            detected.push(format!("Powered by: {powered}"));
        }

        // tech name -> formatted entry; BTreeMap keeps the listing stable.
        let mut matched: BTreeMap<&str, String> = BTreeMap::new();
        debug!(rules = RULES.len(), "Applying fingerprint rules.");
        for rule in RULES {
            let version = match &rule.check {
                Check::Header(name, re) => {
                    capture_version(headers.get(*name).and_then(|v| v.to_str().ok()), re)
                }
                Check::MetaTag(name, re) => check_meta_tag(&document, name, re),
                Check::Body(re) => capture_version(Some(&body), re),
                Check::ScriptSrc(re) => check_script_src(&document, re),
                Check::Cookie(re) => capture_version(Some(&cookies), re),
            };

            if let Some(version) = version {
                let entry = match &version {
                    Some(v) => format!("{}: {} {}", rule.category, rule.tech_name, v),
                    None => format!("{}: {}", rule.category, rule.tech_name),
                };
                // Versioned rules precede bare ones for the same technology,
                // so keeping the first match keeps the version.
                matched.entry(rule.tech_name).or_insert(entry);
            }
        }
        detected.extend(matched.into_values());

        if detected.is_empty() {
            return Ok(Vec::new());
        }

        Ok(vec![Finding::new(
            "Technology Fingerprinting",
            Severity::Low,
            format!("Detected technologies:\n{}", detected.join("\n")),
            CATEGORY,
            "Server configuration",
            "Remove version information from headers. Minimize technology disclosure.",
        )])
    }
}

#[async_trait]
impl Checker for TechFingerprint {
    fn name(&self) -> &'static str {
        "fingerprint"
    }

    async fn check(&self, target: &Target) -> Vec<Finding> {
        info!(target = %target, "Starting technology fingerprint.");
        match self.probe(target).await {
            Ok(findings) => {
                info!(findings = findings.len(), "Fingerprint finished.");
                findings
            }
            Err(e) => {
                warn!(checker = self.name(), error = %e, "Probe failed, reporting no findings.");
                Vec::new()
            }
        }
    }
}

/// Applies a regex to optional text. `Some(Some(v))` when a version group was
/// captured, `Some(None)` on a bare match, `None` when the pattern missed.
fn capture_version(text: Option<&str>, re: &Regex) -> Option<Option<String>> {
    text.and_then(|text| {
        re.captures(text).map(|caps| {
            caps.get(1)
                .map(|m| m.as_str().to_string())
                .filter(|s| !s.is_empty())
        })
    })
}

fn check_meta_tag(doc: &Html, name: &str, re: &Regex) -> Option<Option<String>> {
    let selector_str = format!("meta[name='{name}']");
    if let Ok(selector) = Selector::parse(&selector_str) {
        let content = doc
            .select(&selector)
            .next()
            .and_then(|el| el.value().attr("content"));
        return capture_version(content, re);
    }
    None
}

fn check_script_src(doc: &Html, re: &Regex) -> Option<Option<String>> {
    if let Ok(selector) = Selector::parse("script[src]") {
        for el in doc.select(&selector) {
            if let Some(src) = el.value().attr("src") {
                if let Some(version) = capture_version(Some(src), re) {
                    return Some(version);
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn detected_stack_is_one_informational_finding() {
        let body = r#"<html><head>
            <meta name="generator" content="WordPress 6.4.2">
            <script src="/assets/jquery-3.6.0.min.js"></script>
            </head><body><a href="/wp-content/themes/x">theme</a></body></html>"#;

        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/")
            .with_status(200)
            .with_header("server", "nginx/1.18.0")
            .with_header("content-type", "text/html")
            .with_body(body)
            .create_async()
            .await;

        let checker = TechFingerprint::new(&ScannerConfig::default());
        let target = Target::parse(&server.url()).unwrap();
        let findings = checker.check(&target).await;

        assert_eq!(findings.len(), 1);
        let finding = &findings[0];
        assert_eq!(finding.severity, Severity::Low);
        assert!(finding.description.contains("Server: nginx/1.18.0"));
        assert!(finding.description.contains("CMS: WordPress 6.4.2"));
        assert!(finding.description.contains("Library: jQuery 3.6.0"));
    }

    #[tokio::test]
    async fn nothing_detected_means_no_finding() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/")
            .with_status(200)
            .with_body("<html><body>plain</body></html>")
            .create_async()
            .await;

        let checker = TechFingerprint::new(&ScannerConfig::default());
        let target = Target::parse(&server.url()).unwrap();
        assert!(checker.check(&target).await.is_empty());
    }
}
