// src/core/mod.rs

/// Data structures shared across the engine: targets, findings, jobs,
/// reports, and the progress events forwarded to the registry.
pub mod models;

/// The crate's error taxonomy for submission validation and job lookups.
pub mod error;

/// In-memory store of scan jobs keyed by opaque identifier.
pub mod registry;

/// Pure finding-to-score mapping.
pub mod scorer;

/// The checker contract and the individual probe implementations.
pub mod checks;

/// Phase plan and scan orchestration.
pub mod engine;

/// The narrow operations a transport layer calls: submit, status, report.
pub mod service;
