//! Library surface for the `safedata-assess` binary.
//!
//! The config loader and the assessment service live here so the integration
//! tests can drive a full run without spawning the binary. The CLI in
//! `main.rs` only parses flags, installs logging and prints the report.

pub mod config;
pub mod service;
