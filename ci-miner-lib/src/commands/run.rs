//! Command dispatch logic for ci-miner

use super::{AnalyzeArgs, InitArgs, MineArgs, analyze_repository, init_config, mine_repository};
use crate::{Host, Result};
use clap::builder::Styles;
use clap::builder::styling::{AnsiColor, Effects};
use clap::{Parser, Subcommand};

const CLAP_STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

#[derive(Parser, Debug)]
#[command(name = "ci-miner", version, author, long_about = None)]
#[command(about = "Mine commit history and correlate it with CI outcomes")]
#[command(styles = CLAP_STYLES)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Clone, mine, and publish a report for a hosted repository
    Analyze(Box<AnalyzeArgs>),
    /// Mine an existing local clone and write the report to a file
    Mine(Box<MineArgs>),
    /// Generate a default configuration file
    Init(InitArgs),
}

/// Dispatch command-line arguments to the appropriate handler
///
/// # Errors
///
/// Returns an error if the executed command fails
pub async fn run<I, T, H>(host: &mut H, args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
    H: Host,
{
    match Cli::parse_from(args).command {
        Command::Analyze(args) => analyze_repository(host, &args).await,
        Command::Mine(args) => mine_repository(host, &args).await,
        Command::Init(args) => init_config(host, &args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::LogLevel;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_mine_with_overrides() {
        let cli = Cli::parse_from([
            "ci-miner",
            "mine",
            "./repo",
            "--repo-url",
            "https://github.com/o/r",
            "--window-days",
            "30",
            "--log-level",
            "debug",
        ]);

        let Command::Mine(args) = cli.command else {
            panic!("expected the mine command");
        };
        assert_eq!(args.path.as_str(), "./repo");
        assert_eq!(args.common.window_days, Some(30));
        assert_eq!(args.common.log_level, LogLevel::Debug);
        assert!(args.output.is_none());
    }

    #[test]
    fn test_parse_analyze_defaults() {
        let cli = Cli::parse_from(["ci-miner", "analyze", "https://github.com/o/r"]);
        let Command::Analyze(args) = cli.command else {
            panic!("expected the analyze command");
        };
        assert_eq!(args.identity, "anonymous");
        assert!(!args.json);
    }

    #[test]
    fn test_parse_init_output_flag() {
        let cli = Cli::parse_from(["ci-miner", "init", "-o", "custom.toml", "--force"]);
        let Command::Init(args) = cli.command else {
            panic!("expected the init command");
        };
        assert_eq!(args.output.as_deref().map(camino::Utf8Path::as_str), Some("custom.toml"));
        assert!(args.force);

        // The path is a named option, not a positional
        let _ = Cli::try_parse_from(["ci-miner", "init", "custom.toml"]).unwrap_err();
    }
}
