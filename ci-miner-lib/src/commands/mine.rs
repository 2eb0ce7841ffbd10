use super::Host;
use super::common::{CommonArgs, Session};
use crate::mining::{Aggregator, MiningRequest};
use crate::pipeline::write_report;
use crate::{Progress, RepoSpec, Result};
use camino::Utf8PathBuf;
use clap::Parser;
use std::io::Write;

#[derive(Parser, Debug)]
pub struct MineArgs {
    /// Path to an existing local clone
    #[arg(value_name = "PATH")]
    pub path: Utf8PathBuf,

    /// URL of the repository on its hosting service, used to query CI runs
    #[arg(long, value_name = "URL")]
    pub repo_url: String,

    /// Where to write the report (default is under the work directory)
    #[arg(long, short = 'o', value_name = "PATH")]
    pub output: Option<Utf8PathBuf>,

    #[command(flatten)]
    pub common: CommonArgs,
}

pub async fn mine_repository<H: Host>(host: &mut H, args: &MineArgs) -> Result<()> {
    let repo = RepoSpec::parse_str(&args.repo_url)?;
    let session = Session::new(&args.common)?;

    let aggregator = Aggregator::from_config(&session.config, session.token.as_deref())?;
    let request = MiningRequest {
        repo: &repo,
        repo_path: args.path.as_std_path(),
    };

    let report = aggregator.aggregate(request, &session.progress).await;
    session.progress.done();
    let report = report?;

    let output = args
        .output
        .as_ref()
        .map_or_else(|| repo.report_path(&session.work_dir), |p| p.as_std_path().to_path_buf());
    write_report(&report, &output)?;

    let _ = writeln!(
        host.output(),
        "Mined {} commit(s) by {} author(s) from '{}'; report written to {}",
        report.repo_summary.total_commits,
        report.repo_summary.distinct_authors,
        args.path,
        output.display()
    );

    Ok(())
}
