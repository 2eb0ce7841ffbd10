//! CI run collection for a mining window
//!
//! This module talks to the CI provider and turns its paginated workflow-run
//! listing into a per-commit index.
//!
//! # Implementation Model
//!
//! - [`Client`] issues GET requests, retrying 5xx responses with linear backoff and
//!   sleeping through exhausted rate-limit quotas without spending retries.
//! - [`Scanner`] walks pages of runs for one event category until every target
//!   commit is covered, the runs predate the window's cutoff, or a page cap is hit.
//! - [`summarize_runs`] collapses the run list into one [`RunSummary`] per SHA.
//! - [`Provider`] runs one scan per event category, unions the results, and
//!   produces the [`CiIndex`] consumed by the commit aggregator.

mod client;
mod outcome;
mod provider;
mod scanner;
mod summarizer;
mod workflow_run;

pub(crate) const LOG_TARGET: &str = "        ci";

pub use client::{Client, FetchPolicy, RateLimitInfo};
pub use outcome::{EventCategory, OutcomeCategory, OutcomeTally};
pub use provider::{CiIndex, Provider, ScanStats};
pub use scanner::{PAGE_SIZE, PageProgress, ScanOutcome, ScanRequest, Scanner, StopReason};
pub use summarizer::{LatestRun, RunSummary, summarize_runs};
pub use workflow_run::{HeadRepository, RunsPage, WorkflowRun};

#[cfg(test)]
pub(crate) use workflow_run::test_run;
