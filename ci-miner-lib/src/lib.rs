#![doc(hidden)]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Core library for ci-miner
//!
//! This library mines the commit history of a repository over a trailing window,
//! correlates every commit with the CI runs the hosting provider recorded for it,
//! and writes a self-contained JSON analytics report.
//!
//! # Module Organization
//!
//! - [`ci`]: Rate-limited run fetching, coverage-driven pagination, and per-commit run summaries
//! - [`mining`]: Two-pass commit traversal and per-author/per-repository aggregation
//! - [`jobs`]: Out-of-band job execution with streamed progress and publication
//! - [`pipeline`]: The end-to-end analysis unit a job executes
//! - [`commands`]: Command-line interface

pub type Result<T, E = ohno::AppError> = core::result::Result<T, E>;

pub mod ci;
pub mod commands;
pub mod config;
pub mod jobs;
pub mod mining;
pub mod pipeline;
pub mod progress;
pub mod repo_spec;

pub use crate::commands::{Host, run};
pub use crate::config::Config;
pub use crate::progress::Progress;
pub use crate::repo_spec::RepoSpec;
