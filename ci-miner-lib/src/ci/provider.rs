use super::client::Client;
use super::outcome::EventCategory;
use super::scanner::{PageProgress, ScanRequest, Scanner, StopReason};
use super::summarizer::{RunSummary, summarize_runs};
use super::workflow_run::WorkflowRun;
use super::LOG_TARGET;
use crate::{Config, Progress, RepoSpec, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Outcome of one per-event scan, kept for the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    pub event: EventCategory,
    pub pages: u32,
    pub runs: usize,
    pub covered: usize,
    pub stop_reason: StopReason,
}

/// Union of all scans, summarized per commit.
#[derive(Debug, Clone, Default)]
pub struct CiIndex {
    pub summaries: HashMap<String, RunSummary>,
    pub runs: Vec<WorkflowRun>,
    pub covered: HashSet<String>,
    pub scans: Vec<ScanStats>,
}

impl CiIndex {
    #[must_use]
    pub fn summary_for(&self, sha: &str) -> Option<&RunSummary> {
        self.summaries.get(sha)
    }
}

/// Builds the CI index for a mining window, one scan per event category.
#[derive(Debug, Clone)]
pub struct Provider {
    scanner: Scanner,
    events: Vec<EventCategory>,
    branch: Option<String>,
    page_cap: u32,
}

impl Provider {
    #[must_use]
    pub const fn new(client: Client, events: Vec<EventCategory>, branch: Option<String>, page_cap: u32) -> Self {
        Self {
            scanner: Scanner::new(client),
            events,
            branch,
            page_cap,
        }
    }

    pub fn from_config(config: &Config, token: Option<&str>) -> Result<Self> {
        let client = Client::new(token, config.api_base_url.as_str(), config.fetch.policy())?;
        Ok(Self::new(client, config.event_categories.clone(), config.branch.clone(), config.page_cap))
    }

    #[must_use]
    pub fn events(&self) -> &[EventCategory] {
        &self.events
    }

    #[must_use]
    pub fn branch(&self) -> Option<&str> {
        self.branch.as_deref()
    }

    #[must_use]
    pub const fn page_cap(&self) -> u32 {
        self.page_cap
    }

    /// Scan every configured event category and union the results.
    ///
    /// The same commit may surface under several categories, and the provider lists
    /// each category as a separate stream, so every category is scanned in turn.
    pub async fn build_index(
        &self,
        repo: &RepoSpec,
        cutoff: DateTime<Utc>,
        targets: &HashSet<String>,
        progress: &dyn Progress,
    ) -> Result<CiIndex> {
        let mut index = CiIndex::default();
        let mut seen_ids = HashSet::new();

        for &event in &self.events {
            progress.println(&format!("Fetching {event} workflow runs for {} (cutoff {})", repo.full_name(), cutoff.to_rfc3339()));

            let request = ScanRequest {
                repo,
                event,
                branch: self.branch.as_deref(),
                cutoff,
                targets,
                page_cap: self.page_cap,
            };

            let target_count = targets.len();
            let mut on_page = |p: PageProgress| {
                progress.println(&format!(
                    "  [{event}] page {}: {} runs (total {}, covered {}/{target_count})",
                    p.page, p.page_runs, p.total_runs, p.covered
                ));
            };

            let outcome = self.scanner.scan(&request, &mut on_page).await?;

            match outcome.stop_reason {
                StopReason::FullCoverage => progress.println(&format!("  Covered all target commits using {} page(s).", outcome.pages)),
                StopReason::PastCutoff => progress.println(&format!("  Encountered runs older than cutoff on page {}. Stopping.", outcome.pages)),
                StopReason::PageCap => progress.println(&format!("  Reached the page cap of {}. Stopping.", self.page_cap)),
                StopReason::EmptyPage => {}
            }

            index.scans.push(ScanStats {
                event,
                pages: outcome.pages,
                runs: outcome.runs.len(),
                covered: outcome.covered.len(),
                stop_reason: outcome.stop_reason,
            });

            index.covered.extend(outcome.covered);
            index.runs.extend(outcome.runs.into_iter().filter(|r| seen_ids.insert(r.id)));
        }

        index.summaries = summarize_runs(&index.runs);

        log::info!(
            target: LOG_TARGET,
            "Indexed {} runs over {} commits for '{repo}' ({}/{} target commits covered)",
            index.runs.len(),
            index.summaries.len(),
            index.covered.len(),
            targets.len()
        );

        Ok(index)
    }
}
