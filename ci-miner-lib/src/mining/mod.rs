//! Commit mining over a trailing window
//!
//! # Implementation Model
//!
//! - [`get_repo`] produces an up-to-date local clone of the repository.
//! - [`CommitLog`] streams the log of that clone; every traversal is an independent
//!   `git log` invocation, so the two passes never buffer the full history.
//! - [`Aggregator`] runs pass 1 to find the window's commits and cutoff, asks the
//!   [`Provider`](crate::ci::Provider) for the CI index, then runs pass 2 and folds
//!   everything into a [`Report`].

mod aggregator;
mod author_bucket;
mod calendar;
mod commit_log;
mod git;
mod report;

pub(crate) const LOG_TARGET: &str = "    mining";

pub use aggregator::{Aggregator, MiningRequest};
pub use calendar::{average_streak, longest_streak};
pub use commit_log::{CommitLog, CommitWalker, Identity, RawCommit};
pub use git::get_repo;
pub use report::{AuthorReport, CommitRecord, MiningParams, RepoSummary, Report, WeekdayTally, WeeklyOutcomes};
