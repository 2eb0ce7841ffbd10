//! Coverage-driven pagination over the workflow-run listing.

use super::LOG_TARGET;
use super::client::Client;
use super::outcome::EventCategory;
use super::workflow_run::{RunsPage, WorkflowRun};
use crate::{RepoSpec, Result};
use chrono::{DateTime, Utc};
use ohno::{EnrichableExt, IntoAppError};
use serde::Serialize;
use std::collections::HashSet;

/// Runs requested per page.
pub const PAGE_SIZE: u32 = 100;

/// One scan over one event category.
#[derive(Debug, Clone)]
pub struct ScanRequest<'a> {
    pub repo: &'a RepoSpec,
    pub event: EventCategory,
    pub branch: Option<&'a str>,
    pub cutoff: DateTime<Utc>,
    pub targets: &'a HashSet<String>,
    pub page_cap: u32,
}

/// Reported after every fetched page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageProgress {
    pub page: u32,
    pub page_runs: usize,
    pub total_runs: usize,
    pub covered: usize,
}

/// Why a scan stopped paginating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The provider returned an empty page.
    EmptyPage,
    /// Every target SHA has at least one run.
    FullCoverage,
    /// The page reached runs older than the cutoff.
    PastCutoff,
    /// The page cap was reached.
    PageCap,
}

#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub runs: Vec<WorkflowRun>,
    pub covered: HashSet<String>,
    pub pages: u32,
    pub stop_reason: StopReason,
}

/// Drives [`Client`] across pages of runs until coverage, cutoff, or the page cap.
#[derive(Debug, Clone)]
pub struct Scanner {
    client: Client,
}

impl Scanner {
    #[must_use]
    pub const fn new(client: Client) -> Self {
        Self { client }
    }

    /// Scan one event category.
    ///
    /// Runs from other repositories (forked pull requests) are discarded. A SHA is
    /// only ever marked covered when it belongs to `request.targets`.
    pub async fn scan(&self, request: &ScanRequest<'_>, on_page: &mut (dyn FnMut(PageProgress) + Send)) -> Result<ScanOutcome> {
        let url = format!(
            "{}/repos/{}/{}/actions/runs",
            self.client.base_url(),
            request.repo.owner(),
            request.repo.repo()
        );

        let mut runs = Vec::new();
        let mut covered = HashSet::new();
        let mut page = 1u32;

        let stop_reason = loop {
            let mut query = vec![
                ("per_page", PAGE_SIZE.to_string()),
                ("page", page.to_string()),
                ("event", request.event.to_string()),
            ];
            if let Some(branch) = request.branch {
                query.push(("branch", branch.to_string()));
            }

            let resp = self
                .client
                .get(&url, &query)
                .await
                .map_err(|e| e.enrich_with(|| format!("fetching page {page} of {} runs for '{}'", request.event, request.repo)))?;
            let body: RunsPage = resp
                .json()
                .await
                .into_app_err_with(|| format!("decoding page {page} of {} runs for '{}'", request.event, request.repo))?;

            if body.workflow_runs.is_empty() {
                on_page(PageProgress {
                    page,
                    page_runs: 0,
                    total_runs: runs.len(),
                    covered: covered.len(),
                });
                break StopReason::EmptyPage;
            }

            let page_runs = body.workflow_runs.len();
            let mut oldest: Option<DateTime<Utc>> = None;

            for run in body.workflow_runs {
                if let Some(head_repo) = run.head_repository_name()
                    && !request.repo.is_same_repository(head_repo)
                {
                    continue;
                }

                if let Some(sha) = run.head_sha.as_deref()
                    && request.targets.contains(sha)
                    && !covered.contains(sha)
                {
                    let _ = covered.insert(sha.to_string());
                }

                if let Some(ts) = run.timestamp() {
                    oldest = Some(oldest.map_or(ts, |o| o.min(ts)));
                }

                runs.push(run);
            }

            on_page(PageProgress {
                page,
                page_runs,
                total_runs: runs.len(),
                covered: covered.len(),
            });

            if covered.len() == request.targets.len() {
                break StopReason::FullCoverage;
            }

            if oldest.is_some_and(|o| o < request.cutoff) {
                break StopReason::PastCutoff;
            }

            if page >= request.page_cap {
                log::debug!(target: LOG_TARGET, "Reached page cap ({}) for {} runs of '{}'", request.page_cap, request.event, request.repo);
                break StopReason::PageCap;
            }

            page += 1;
        };

        log::debug!(
            target: LOG_TARGET,
            "Scan of {} runs for '{}' stopped after {page} page(s): {stop_reason:?}",
            request.event,
            request.repo
        );

        Ok(ScanOutcome {
            runs,
            covered,
            pages: page,
            stop_reason,
        })
    }
}
