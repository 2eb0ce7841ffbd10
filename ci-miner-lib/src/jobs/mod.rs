//! Out-of-band execution of analysis jobs
//!
//! A job runs the analysis pipeline on its own task while a caller observes it through a
//! progress stream: every line the pipeline emits, then one terminal [`Completion`].
//!
//! # Implementation Model
//!
//! - [`JobCoordinator::start`] records the job in a [`JobStore`], spawns the pipeline,
//!   and returns the [`JobId`] immediately.
//! - Progress lines travel through an unbounded channel, so the pipeline is never held
//!   back by a slow or absent reader.
//! - [`JobCoordinator::stream_progress`] waits on the channel with a bounded timeout and
//!   consults the job's state whenever the wait expires or the channel closes.
//! - On success the report is handed to a [`Publisher`]; its outcome is folded into the
//!   job's terminal state.

mod coordinator;
mod job;
mod publisher;
mod store;

pub(crate) const LOG_TARGET: &str = "      jobs";

pub use coordinator::JobCoordinator;
pub use job::{Completion, JobId, JobRecord, JobState, ProgressEvent};
pub use publisher::{ConfiguredPublisher, LocalPublisher, Publisher, STORAGE_KEY_ENV, StorageBucketPublisher};
pub use store::{JobStore, MemoryJobStore};
