use super::LOG_TARGET;
use super::author_bucket::AuthorBucket;
use super::calendar::{date_key, hour_of, week_bucket, weekday_name};
use super::commit_log::{CommitLog, Identity, RawCommit};
use super::report::{AuthorReport, CommitRecord, MiningParams, REPORT_SOURCE, RepoSummary, Report, WeeklyOutcomes};
use crate::ci::{CiIndex, OutcomeCategory, Provider, RunSummary};
use crate::{Config, Progress, RepoSpec, Result};
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, TimeDelta, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::Path;

/// What to mine: the repository identity for CI queries and its local clone.
#[derive(Debug, Clone, Copy)]
pub struct MiningRequest<'a> {
    pub repo: &'a RepoSpec,
    pub repo_path: &'a Path,
}

/// Two-pass commit aggregation joined with the CI index.
#[derive(Debug, Clone)]
pub struct Aggregator {
    provider: Provider,
    window_days: u32,
    all_branches: bool,
}

impl Aggregator {
    #[must_use]
    pub const fn new(provider: Provider, window_days: u32, all_branches: bool) -> Self {
        Self {
            provider,
            window_days,
            all_branches,
        }
    }

    pub fn from_config(config: &Config, token: Option<&str>) -> Result<Self> {
        let provider = Provider::from_config(config, token)?;
        Ok(Self::new(provider, config.window_days, config.include_all_branches))
    }

    fn params(&self) -> MiningParams {
        MiningParams {
            window_days: self.window_days,
            source: REPORT_SOURCE,
            in_main_branch_only: !self.all_branches,
            event_categories: self.provider.events().to_vec(),
            branch: self.provider.branch().map(str::to_string),
            page_cap: self.provider.page_cap(),
        }
    }

    /// Mine the trailing window ending now.
    pub async fn aggregate(&self, request: MiningRequest<'_>, progress: &dyn Progress) -> Result<Report> {
        self.aggregate_at(request, Utc::now(), progress).await
    }

    /// Mine the trailing window ending at `now`.
    pub async fn aggregate_at(&self, request: MiningRequest<'_>, now: DateTime<Utc>, progress: &dyn Progress) -> Result<Report> {
        let since = now - TimeDelta::days(i64::from(self.window_days));
        let log = CommitLog::new(request.repo_path, self.all_branches);
        let repo_name = request.repo.full_name();

        progress.set_phase("Scanning");
        progress.println(&format!("Pass 1: listing commits since {}", since.to_rfc3339()));
        let bounds = first_pass(&log, since).await?;

        let Some((earliest, latest)) = bounds.earliest.zip(bounds.latest) else {
            progress.println(&format!("No commits in the last {} day(s)", self.window_days));
            log::info!(target: LOG_TARGET, "Mining window for '{repo_name}' is empty");
            return Ok(Report::empty(repo_name, request.repo_path.to_path_buf(), self.params()));
        };

        progress.println(&format!(
            "Found {} commit(s) between {} and {}",
            bounds.shas.len(),
            earliest.to_rfc3339(),
            latest.to_rfc3339()
        ));

        let cutoff = earliest.with_timezone(&Utc);

        progress.set_phase("Fetching");
        let index = self.provider.build_index(request.repo, cutoff, &bounds.shas, progress).await?;
        let main_branch = log.main_branch_commits(since).await?;

        progress.set_phase("Aggregating");
        progress.println("Pass 2: aggregating commits");
        let mut folder = Folder::new(&index, main_branch);
        let mut walker = log.walk(since)?;
        while let Some(commit) = walker.next_commit().await? {
            folder.add(commit);
        }

        let (authors, totals) = folder.finish();
        let repo_summary = summarize_repo(&authors, &totals, &index, cutoff, earliest, latest);

        log::info!(
            target: LOG_TARGET,
            "Mined {} commit(s) by {} author(s) for '{repo_name}'",
            repo_summary.total_commits,
            repo_summary.distinct_authors
        );
        progress.println(&format!(
            "Aggregated {} commit(s) by {} author(s), CI coverage {:.1}%",
            repo_summary.total_commits,
            repo_summary.distinct_authors,
            repo_summary.ci_coverage_ratio * 100.0
        ));

        Ok(Report {
            repo_name,
            project_path: request.repo_path.to_path_buf(),
            mined_at: Utc::now(),
            mining_params: self.params(),
            ci_scans: index.scans,
            authors,
            repo_summary,
        })
    }
}

#[derive(Debug, Default)]
struct WindowBounds {
    shas: HashSet<String>,
    earliest: Option<DateTime<FixedOffset>>,
    latest: Option<DateTime<FixedOffset>>,
}

async fn first_pass(log: &CommitLog, since: DateTime<Utc>) -> Result<WindowBounds> {
    let mut bounds = WindowBounds::default();
    let mut walker = log.walk(since)?;

    while let Some(commit) = walker.next_commit().await? {
        let ts = commit.author_date;
        if bounds.earliest.is_none_or(|e| ts < e) {
            bounds.earliest = Some(ts);
        }
        if bounds.latest.is_none_or(|l| ts > l) {
            bounds.latest = Some(ts);
        }
        let _ = bounds.shas.insert(commit.hash);
    }

    log::debug!(target: LOG_TARGET, "Pass 1 found {} commit(s)", bounds.shas.len());
    Ok(bounds)
}

/// Pass 2 state: the author buckets in first-seen order.
struct Folder<'a> {
    index: &'a CiIndex,
    main_branch: Option<HashSet<String>>,
    buckets: Vec<AuthorBucket>,
    by_identity: HashMap<Identity, usize>,
    seen: HashSet<String>,
    failure_days: HashSet<NaiveDate>,
    commits_on_failure_days: u64,
}

impl<'a> Folder<'a> {
    fn new(index: &'a CiIndex, main_branch: Option<HashSet<String>>) -> Self {
        let failure_days = index
            .runs
            .iter()
            .filter(|r| r.conclusion.as_deref().and_then(OutcomeCategory::parse) == Some(OutcomeCategory::Failure))
            .filter_map(|r| r.timestamp())
            .map(|ts| ts.date_naive())
            .collect();

        Self {
            index,
            main_branch,
            buckets: Vec::new(),
            by_identity: HashMap::new(),
            seen: HashSet::new(),
            failure_days,
            commits_on_failure_days: 0,
        }
    }

    fn add(&mut self, commit: RawCommit) {
        if !self.seen.insert(commit.hash.clone()) {
            log::debug!(target: LOG_TARGET, "Commit {} listed twice, ignoring the repeat", commit.hash);
            return;
        }

        if self.failure_days.contains(&commit.author_date.with_timezone(&Utc).date_naive()) {
            self.commits_on_failure_days += 1;
        }

        let ci = self
            .index
            .summary_for(&commit.hash)
            .cloned()
            .unwrap_or_else(RunSummary::no_runs);
        let in_main_branch = self.main_branch.as_ref().is_none_or(|m| m.contains(&commit.hash));

        let ts = commit.author_date;
        let weekday = ts.weekday();
        let date = ts.date_naive();
        let is_merge = commit.is_merge();

        let record = CommitRecord {
            author_hour: hour_of(&ts),
            author_weekday: weekday_name(weekday),
            week: week_bucket(&ts),
            date: date_key(date),
            in_main_branch,
            is_merge,
            hash: commit.hash,
            msg: commit.message,
            author: commit.author.clone(),
            committer: commit.committer,
            author_date: ts,
            committer_date: commit.committer_date,
            insertions: commit.insertions,
            deletions: commit.deletions,
            files_changed: commit.files_changed,
            ci,
        };

        let slot = match self.by_identity.get(&commit.author) {
            Some(&slot) => slot,
            None => {
                self.buckets.push(AuthorBucket::new(commit.author.clone()));
                let _ = self.by_identity.insert(commit.author, self.buckets.len() - 1);
                self.buckets.len() - 1
            }
        };

        if let Some(bucket) = self.buckets.get_mut(slot) {
            bucket.add(record, weekday, date);
        }
    }

    fn finish(self) -> (Vec<AuthorReport>, FoldTotals) {
        let mut active_dates = BTreeSet::new();
        for bucket in &self.buckets {
            log::debug!(target: LOG_TARGET, "Finalizing author {} <{}>", bucket.identity().name, bucket.identity().email);
            active_dates.extend(bucket.active_dates().iter().copied());
        }

        let totals = FoldTotals {
            active_dates,
            commits_on_failure_days: self.commits_on_failure_days,
        };

        (self.buckets.into_iter().map(AuthorBucket::finalize).collect(), totals)
    }
}

struct FoldTotals {
    active_dates: BTreeSet<NaiveDate>,
    commits_on_failure_days: u64,
}

#[expect(clippy::cast_precision_loss, reason = "commit counts are far below 2^52")]
fn summarize_repo(
    authors: &[AuthorReport],
    totals: &FoldTotals,
    index: &CiIndex,
    cutoff: DateTime<Utc>,
    earliest: DateTime<FixedOffset>,
    latest: DateTime<FixedOffset>,
) -> RepoSummary {
    let mut summary = RepoSummary {
        min_author_date: Some(earliest),
        max_author_date: Some(latest),
        commits_on_failure_days: totals.commits_on_failure_days,
        distinct_authors: authors.len() as u64,
        scanned_runs: index.runs.len() as u64,
        ..RepoSummary::default()
    };

    for author in authors {
        summary.total_commits += author.commit_count;
        summary.total_insertions += author.total_insertions;
        summary.total_deletions += author.total_deletions;
        summary.total_files_changed += author.total_files_changed;
        summary.total_ci_runs += author.ci_runs;
        summary.covered_commits += author.commits_with_ci;
        summary.pull_request_count += author.pull_request_count;
        summary.ci_outcomes.add(&author.ci_outcomes);
        summary.weekday_commits.merge(&author.weekday_frequency);
        summary.weekday_insertions.merge(&author.weekday_insertions);
        summary.weekday_deletions.merge(&author.weekday_deletions);
    }

    summary.weekly_ci_outcomes = weekly_outcomes(index, cutoff);

    if !totals.active_dates.is_empty() {
        summary.average_commits_per_active_day = summary.total_commits as f64 / totals.active_dates.len() as f64;
    }

    if summary.total_commits > 0 {
        summary.ci_coverage_ratio = summary.covered_commits as f64 / summary.total_commits as f64;
    }

    summary
}

/// Success and failure counts per UTC ISO week for runs inside the window.
fn weekly_outcomes(index: &CiIndex, cutoff: DateTime<Utc>) -> BTreeMap<String, WeeklyOutcomes> {
    let mut weeks: BTreeMap<String, WeeklyOutcomes> = BTreeMap::new();

    for run in &index.runs {
        let Some(ts) = run.timestamp() else {
            continue;
        };
        if ts < cutoff {
            continue;
        }

        match run.conclusion.as_deref().and_then(OutcomeCategory::parse) {
            Some(OutcomeCategory::Success) => weeks.entry(week_bucket(&ts)).or_default().success += 1,
            Some(OutcomeCategory::Failure) => weeks.entry(week_bucket(&ts)).or_default().failure += 1,
            _ => {}
        }
    }

    weeks
}
