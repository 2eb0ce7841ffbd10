//! Setup shared by the commands that mine repositories.

use super::ProgressReporter;
use crate::{Config, Result};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, ValueEnum};
use core::time::Duration;
use directories::BaseDirs;
use ohno::IntoAppError;
use std::io::IsTerminal;
use std::path::PathBuf;

/// Color mode configuration for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Always use colors
    Always,

    /// Never use colors
    Never,

    /// Use colors if the output is a terminal, otherwise don't use colors
    Auto,
}

impl ColorMode {
    #[must_use]
    pub fn enabled_for(self, stream: &impl IsTerminal) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Auto => stream.is_terminal(),
        }
    }
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// No logging output
    None,

    /// Only error messages
    Error,

    /// Warning and error messages
    Warn,

    /// Info, warning, and error messages
    Info,

    /// Debug, info, warning, and error messages
    Debug,

    /// Trace, debug, info, warning, and error messages
    Trace,
}

/// Arguments shared by `analyze` and `mine`
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// GitHub personal access token
    #[arg(long, value_name = "TOKEN", env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// Path to configuration file (default is `ci-miner.toml` in the current directory)
    #[arg(long, short = 'c', value_name = "PATH")]
    pub config: Option<Utf8PathBuf>,

    /// Number of trailing days of history to mine, overriding the configuration
    #[arg(long, value_name = "DAYS")]
    pub window_days: Option<u32>,

    /// Maximum pages of CI runs to fetch per event category, overriding the configuration
    #[arg(long, value_name = "PAGES")]
    pub page_cap: Option<u32>,

    /// Directory holding clones, reports, and locally published files
    #[arg(long, value_name = "PATH")]
    pub work_dir: Option<Utf8PathBuf>,

    /// Control when to use colored output
    #[arg(long, value_name = "WHEN", default_value = "auto")]
    pub color: ColorMode,

    /// Set the logging level for diagnostic output
    #[arg(long, value_name = "LEVEL", default_value = "none", global = true)]
    pub log_level: LogLevel,
}

/// Everything a mining command needs once arguments are resolved.
#[derive(Debug)]
pub struct Session {
    pub config: Config,
    pub token: Option<String>,
    pub work_dir: PathBuf,
    pub progress: ProgressReporter,
    pub use_colors: bool,
}

impl Session {
    /// Initialize logging, load configuration, and resolve the work directory
    pub fn new(args: &CommonArgs) -> Result<Self> {
        init_logging(args.log_level);

        let mut config = Config::load(Utf8Path::new("."), args.config.as_ref())?;
        if let Some(days) = args.window_days {
            config.window_days = days;
        }
        if let Some(pages) = args.page_cap {
            config.page_cap = pages;
        }
        config.validate()?;

        let work_dir = if let Some(path) = &args.work_dir {
            path.as_std_path().to_path_buf()
        } else {
            BaseDirs::new()
                .into_app_err("could not determine cache directory")?
                .cache_dir()
                .join("ci-miner")
        };

        // With logging enabled the spinner would fight with log lines
        let delay = if args.log_level == LogLevel::None {
            Duration::from_millis(300)
        } else {
            Duration::from_hours(365 * 24)
        };

        let progress_colors = args.color.enabled_for(&std::io::stderr());

        Ok(Self {
            config,
            token: args.github_token.clone(),
            work_dir,
            progress: ProgressReporter::new(delay, progress_colors),
            use_colors: args.color.enabled_for(&std::io::stdout()),
        })
    }
}

/// Initialize logger based on log level
pub fn init_logging(log_level: LogLevel) {
    let level = match log_level {
        LogLevel::None => return,
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    };

    let env = env_logger::Env::default().filter_or("RUST_LOG", level);

    // try_init: a second command in the same process keeps the first logger
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(matches!(log_level, LogLevel::Debug | LogLevel::Trace))
        .try_init();
}
