//! Command-line interface for ci-miner
//!
//! # Commands
//!
//! - **analyze**: Run a full analysis of a hosted repository as a job, streaming its
//!   progress to the terminal and publishing the report when it completes
//! - **mine**: Mine an existing local clone and write the report to a file
//! - **init**: Generate a default configuration file
//!
//! The `run` function parses command-line arguments using clap and routes to the
//! matching handler. The `common` module resolves configuration, logging, and the
//! work directory for the commands that mine.

mod analyze;
mod common;
mod host;
mod init;
mod mine;
mod progress_reporter;
mod run;

pub use analyze::{AnalyzeArgs, analyze_repository};
pub use common::{ColorMode, CommonArgs, LogLevel};
pub use host::Host;
pub use init::{InitArgs, init_config};
pub use mine::{MineArgs, mine_repository};
pub use progress_reporter::ProgressReporter;
pub use run::run;
