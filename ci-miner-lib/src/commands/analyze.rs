use super::Host;
use super::common::{CommonArgs, Session};
use crate::jobs::{Completion, ConfiguredPublisher, JobCoordinator, MemoryJobStore, ProgressEvent};
use crate::pipeline::MiningPipeline;
use crate::{Progress, RepoSpec, Result};
use clap::Parser;
use futures_util::StreamExt;
use ohno::{AppError, IntoAppError};
use owo_colors::OwoColorize;
use std::io::Write;
use std::pin::pin;

#[derive(Parser, Debug)]
pub struct AnalyzeArgs {
    /// URL of the repository to analyze
    #[arg(value_name = "URL")]
    pub url: String,

    /// Identity the published report is filed under
    #[arg(long, value_name = "NAME", default_value = "anonymous")]
    pub identity: String,

    /// Print the completion event as JSON
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub common: CommonArgs,
}

pub async fn analyze_repository<H: Host>(host: &mut H, args: &AnalyzeArgs) -> Result<()> {
    let repo = RepoSpec::parse_str(&args.url)?;
    let session = Session::new(&args.common)?;

    let publisher = ConfiguredPublisher::from_config(session.config.storage.as_ref(), &session.work_dir)?;
    let pipeline = MiningPipeline::new(session.config.clone(), session.token.clone(), session.work_dir.clone());
    let coordinator = JobCoordinator::new(pipeline, MemoryJobStore::new(), publisher, session.config.progress_wait());

    session.progress.set_phase("Analyzing");
    let id = coordinator.start(repo, &args.identity).await?;

    let mut completion = None;
    let mut events = pin!(coordinator.stream_progress(id));
    while let Some(event) = events.next().await {
        match event {
            ProgressEvent::Line(line) => session.progress.println(&line),
            ProgressEvent::Done(done) => completion = Some(done),
        }
    }
    session.progress.done();

    let _ = coordinator.forget(id).await?;

    let completion = completion.into_app_err("progress stream ended without a completion event")?;
    print_completion(host, &completion, args.json, session.use_colors)?;

    if completion.success {
        Ok(())
    } else {
        host.exit(1);
        Err(AppError::new("analysis did not complete successfully"))
    }
}

fn print_completion<H: Host>(host: &mut H, completion: &Completion, json: bool, use_colors: bool) -> Result<()> {
    if json {
        let text = serde_json::to_string(completion).into_app_err("could not serialize completion event")?;
        let _ = writeln!(host.output(), "{text}");
        return Ok(());
    }

    let (mark, verdict) = if completion.success { ("✓", "Analysis complete") } else { ("✗", "Analysis failed") };
    let headline = format!("{mark} {verdict}");
    let headline = match (use_colors, completion.success) {
        (false, _) => headline,
        (true, true) => headline.green().bold().to_string(),
        (true, false) => headline.red().bold().to_string(),
    };
    let _ = writeln!(host.output(), "{headline}");

    if let Some(location) = &completion.result_location {
        let _ = writeln!(host.output(), "  Report: {location}");
    }
    if let Some(path) = &completion.report_path {
        let _ = writeln!(host.output(), "  Local copy: {}", path.display());
    }

    Ok(())
}
