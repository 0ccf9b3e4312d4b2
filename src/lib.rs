// src/lib.rs

//! Vigil is a permission-gated web reconnaissance toolkit. It runs an ordered
//! set of posture and vulnerability checks against a target URL, scores the
//! findings, and exposes long-running scans through an opaque job identifier
//! that a caller polls for progress and results.
//!
//! The crate splits into two halves:
//! - [`core`]: the scan engine, checker contract, job registry, and risk
//!   scoring for vulnerability scans.
//! - [`recon`]: the staged discovery pipeline (subdomains, live hosts, ports,
//!   technologies, endpoints, directories) with per-stage tool fallbacks.

pub mod config;
pub mod core;
pub mod logging;
pub mod recon;

pub use crate::core::service::ScanService;
pub use crate::recon::service::ReconService;
