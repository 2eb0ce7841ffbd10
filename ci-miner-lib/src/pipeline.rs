//! The unit of work a job executes: acquire the repository, mine it, write the report.

use crate::mining::{Aggregator, MiningRequest, Report, get_repo};
use crate::{Config, Progress, RepoSpec, Result};
use ohno::IntoAppError;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const LOG_TARGET: &str = "  pipeline";

/// Produces a report file for a repository and returns its path.
pub trait Pipeline: Send + Sync + 'static {
    fn run(&self, repo: &RepoSpec, progress: Arc<dyn Progress>) -> impl Future<Output = Result<PathBuf>> + Send;
}

/// Clone or update the repository under the work directory, then mine it.
#[derive(Debug, Clone)]
pub struct MiningPipeline {
    config: Config,
    token: Option<String>,
    work_dir: PathBuf,
}

impl MiningPipeline {
    #[must_use]
    pub const fn new(config: Config, token: Option<String>, work_dir: PathBuf) -> Self {
        Self { config, token, work_dir }
    }
}

impl Pipeline for MiningPipeline {
    async fn run(&self, repo: &RepoSpec, progress: Arc<dyn Progress>) -> Result<PathBuf> {
        let clone_dir = repo.clone_dir(&self.work_dir);

        progress.set_phase("Cloning");
        progress.println(&format!("Preparing local copy of {}", repo.url()));
        get_repo(&clone_dir, repo.url(), self.config.include_all_branches).await?;

        let aggregator = Aggregator::from_config(&self.config, self.token.as_deref())?;
        let request = MiningRequest {
            repo,
            repo_path: &clone_dir,
        };
        let report = aggregator.aggregate(request, progress.as_ref()).await?;

        let report_path = repo.report_path(&self.work_dir);
        write_report(&report, &report_path)?;
        progress.println(&format!("Wrote report to {}", report_path.display()));

        Ok(report_path)
    }
}

/// Serialize `report` as pretty JSON to `path`, creating parent directories.
pub fn write_report(report: &Report, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).into_app_err_with(|| format!("could not create directory '{}'", parent.display()))?;
    }

    let json = serde_json::to_vec_pretty(report).into_app_err("could not serialize report")?;
    std::fs::write(path, json).into_app_err_with(|| format!("could not write report to '{}'", path.display()))?;

    log::debug!(target: LOG_TARGET, "Wrote report for '{}' to '{}'", report.repo_name, path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ci::EventCategory;
    use crate::mining::MiningParams;

    #[test]
    fn test_write_report_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b/report.json");
        let params = MiningParams {
            window_days: 7,
            source: "git-log",
            in_main_branch_only: true,
            event_categories: vec![EventCategory::Push],
            branch: None,
            page_cap: 1,
        };

        write_report(&Report::empty("o/r".into(), dir.path().to_path_buf(), params), &path).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(value["repo_name"], "o/r");
    }
}
