// src/core/error.rs

use thiserror::Error;

/// Rejections raised synchronously at submission time. A scan job is never
/// created when one of these fires.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid target url: {0}")]
    InvalidTarget(String),

    #[error("unknown scan mode '{0}', expected 'passive' or 'active'")]
    UnknownMode(String),

    #[error("permission confirmation is required before scanning")]
    PermissionNotConfirmed,

    #[error("invalid domain: {0}")]
    InvalidDomain(String),
}

/// Failures on the read path. `NotFound` covers unknown identifiers and
/// failed jobs, which never expose partial data; `NotReady` signals a job
/// that exists but has not finished producing the requested artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("scan not found")]
    NotFound,

    #[error("scan still in progress")]
    NotReady,
}
