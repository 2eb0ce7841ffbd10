use super::calendar::{WEEKDAYS, weekday_name};
use super::commit_log::Identity;
use crate::ci::{EventCategory, OutcomeTally, RunSummary, ScanStats};
use chrono::{DateTime, FixedOffset, Utc, Weekday};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::path::PathBuf;

pub const REPORT_SOURCE: &str = "git-log";

/// The complete output of one mining run.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub repo_name: String,
    pub project_path: PathBuf,
    pub mined_at: DateTime<Utc>,
    pub mining_params: MiningParams,
    pub ci_scans: Vec<ScanStats>,
    pub authors: Vec<AuthorReport>,
    pub repo_summary: RepoSummary,
}

impl Report {
    /// A valid report for a window without commits.
    #[must_use]
    pub fn empty(repo_name: String, project_path: PathBuf, mining_params: MiningParams) -> Self {
        Self {
            repo_name,
            project_path,
            mined_at: Utc::now(),
            mining_params,
            ci_scans: Vec::new(),
            authors: Vec::new(),
            repo_summary: RepoSummary::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MiningParams {
    pub window_days: u32,
    pub source: &'static str,
    pub in_main_branch_only: bool,
    pub event_categories: Vec<EventCategory>,
    pub branch: Option<String>,
    pub page_cap: u32,
}

/// One commit inside the window, with its derived features and CI summary.
#[derive(Debug, Clone, Serialize)]
pub struct CommitRecord {
    pub hash: String,
    pub msg: String,
    pub author: Identity,
    pub committer: Identity,
    pub author_date: DateTime<FixedOffset>,
    pub committer_date: Option<DateTime<FixedOffset>>,
    pub in_main_branch: bool,
    pub is_merge: bool,
    pub insertions: u64,
    pub deletions: u64,
    pub files_changed: u64,
    pub author_hour: u32,
    pub author_weekday: &'static str,
    pub week: String,
    pub date: String,
    pub ci: RunSummary,
}

/// A counter per weekday, serialized as a Monday..Sunday map.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WeekdayTally([u64; 7]);

impl WeekdayTally {
    pub fn add(&mut self, day: Weekday, amount: u64) {
        self.0[day.num_days_from_monday() as usize] += amount;
    }

    #[must_use]
    pub fn get(&self, day: Weekday) -> u64 {
        self.0[day.num_days_from_monday() as usize]
    }

    pub fn merge(&mut self, other: &Self) {
        for (mine, theirs) in self.0.iter_mut().zip(other.0) {
            *mine += theirs;
        }
    }
}

impl Serialize for WeekdayTally {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(WEEKDAYS.len()))?;
        for day in WEEKDAYS {
            map.serialize_entry(weekday_name(day), &self.get(day))?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthorReport {
    pub name: String,
    pub email: String,
    pub commit_count: u64,
    pub total_insertions: u64,
    pub total_deletions: u64,
    pub total_files_changed: u64,
    pub weekly_frequency: BTreeMap<String, u64>,
    pub weekday_frequency: WeekdayTally,
    pub daily_frequency: BTreeMap<String, u64>,
    pub hourly_frequency: [u64; 24],
    pub weekday_insertions: WeekdayTally,
    pub weekday_deletions: WeekdayTally,
    pub active_days: u64,
    pub average_streak_days: f64,
    pub longest_streak_days: u32,
    pub ci_runs: u64,
    pub commits_with_ci: u64,
    pub ci_outcomes: OutcomeTally,
    pub pull_request_heads: Vec<String>,
    pub pull_request_count: u64,
    pub commits: Vec<CommitRecord>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WeeklyOutcomes {
    pub success: u64,
    pub failure: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RepoSummary {
    pub total_commits: u64,
    pub total_insertions: u64,
    pub total_deletions: u64,
    pub total_files_changed: u64,
    pub min_author_date: Option<DateTime<FixedOffset>>,
    pub max_author_date: Option<DateTime<FixedOffset>>,
    pub total_ci_runs: u64,
    pub ci_outcomes: OutcomeTally,
    pub weekday_commits: WeekdayTally,
    pub weekday_insertions: WeekdayTally,
    pub weekday_deletions: WeekdayTally,
    pub weekly_ci_outcomes: BTreeMap<String, WeeklyOutcomes>,
    pub average_commits_per_active_day: f64,
    pub commits_on_failure_days: u64,
    pub distinct_authors: u64,
    pub pull_request_count: u64,
    pub scanned_runs: u64,
    pub covered_commits: u64,
    pub ci_coverage_ratio: f64,
}
