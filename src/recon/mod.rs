// src/recon/mod.rs

//! Attack surface discovery built on external tooling.
//!
//! The pipeline shells out to subfinder, httpx, nmap, and gau, degrading to
//! built-in fallbacks when a tool is missing or times out, so a run always
//! produces a report. A discovery run is tracked as a job exactly like a
//! vulnerability scan: submit, poll, retrieve.

pub mod analysis;
pub mod models;
pub mod pipeline;
pub mod render;
pub mod service;
mod tools;
