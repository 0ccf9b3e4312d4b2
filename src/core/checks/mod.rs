// src/core/checks/mod.rs

//! The checker contract and the individual probe implementations.
//!
//! Each checker encapsulates one probing strategy and owns its static probe
//! configuration (header lists, payload corpora, timeouts). A checker that
//! cannot complete its probe logs the failure and reports no findings; it
//! never aborts the scan it runs inside.

pub mod cookies;
pub mod cors;
pub mod endpoints;
pub mod fingerprint;
pub mod headers;
pub mod redirect;
pub mod sqli;
pub mod tls;
pub mod traversal;
pub mod xss;

use std::time::Duration;

use async_trait::async_trait;

use crate::core::models::{Finding, Target};

pub use self::cookies::CookieChecker;
pub use self::cors::CorsChecker;
pub use self::endpoints::EndpointScanner;
pub use self::fingerprint::TechFingerprint;
pub use self::headers::HeaderChecker;
pub use self::redirect::RedirectChecker;
pub use self::sqli::SqliScanner;
pub use self::tls::TlsChecker;
pub use self::traversal::TraversalScanner;
pub use self::xss::XssScanner;

/// One independent probing strategy against a target.
///
/// Implementations are stateless across invocations and must absorb their own
/// transport, timeout, and parse failures: `check` returns an empty vector in
/// that case rather than propagating the error.
#[async_trait]
pub trait Checker: Send + Sync {
    /// Short name used in diagnostics.
    fn name(&self) -> &'static str;

    /// Probes the target and returns zero or more findings.
    async fn check(&self, target: &Target) -> Vec<Finding>;
}

/// Builds the per-invocation HTTP client the checkers use. Redirect-sensitive
/// probes pass `follow_redirects = false` to observe raw 3xx responses.
pub(crate) fn probe_client(
    user_agent: &str,
    timeout: Duration,
    follow_redirects: bool,
) -> Result<reqwest::Client, reqwest::Error> {
    let mut builder = reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(timeout);
    if !follow_redirects {
        builder = builder.redirect(reqwest::redirect::Policy::none());
    }
    builder.build()
}

/// Clones the target URL with one query parameter's value replaced, keeping
/// the remaining parameters at their original values.
pub(crate) fn with_param_value(target: &Target, name: &str, payload: &str) -> url::Url {
    let mut probe = target.url().clone();
    let pairs = target.query_pairs();
    {
        let mut editor = probe.query_pairs_mut();
        editor.clear();
        for (key, value) in &pairs {
            if key == name {
                editor.append_pair(key, payload);
            } else {
                editor.append_pair(key, value);
            }
        }
    }
    probe
}

/// Clones the target URL with the query replaced by a single parameter.
pub(crate) fn with_single_param(target: &Target, name: &str, payload: &str) -> url::Url {
    let mut probe = target.url().clone();
    probe.query_pairs_mut().clear().append_pair(name, payload);
    probe
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn param_substitution_preserves_siblings() {
        let target = Target::parse("https://example.com/search?id=1&lang=en").unwrap();
        let probe = with_param_value(&target, "id", "' OR '1'='1");
        let pairs: Vec<(String, String)> = probe
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0], ("id".to_string(), "' OR '1'='1".to_string()));
        assert_eq!(pairs[1], ("lang".to_string(), "en".to_string()));
    }

    #[test]
    fn single_param_replaces_the_query() {
        let target = Target::parse("https://example.com/view?page=home&x=1").unwrap();
        let probe = with_single_param(&target, "file", "../../etc/passwd");
        assert_eq!(probe.query_pairs().count(), 1);
        assert_eq!(probe.path(), "/view");
    }
}
