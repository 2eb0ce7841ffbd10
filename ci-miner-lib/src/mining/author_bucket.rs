use super::calendar::{average_streak, longest_streak};
use super::commit_log::Identity;
use super::report::{AuthorReport, CommitRecord, WeekdayTally};
use crate::ci::OutcomeTally;
use chrono::{NaiveDate, Weekday};
use std::collections::{BTreeMap, BTreeSet};

const PULL_REQUEST_EVENT: &str = "pull_request";

/// Running aggregates for one (name, email) pair during pass 2.
#[derive(Debug)]
pub struct AuthorBucket {
    identity: Identity,
    commits: Vec<CommitRecord>,
    insertions: u64,
    deletions: u64,
    files_changed: u64,
    weekly: BTreeMap<String, u64>,
    weekday: WeekdayTally,
    daily: BTreeMap<String, u64>,
    hourly: [u64; 24],
    weekday_insertions: WeekdayTally,
    weekday_deletions: WeekdayTally,
    active_dates: BTreeSet<NaiveDate>,
    outcomes: OutcomeTally,
    ci_runs: u64,
    commits_with_ci: u64,
    pr_heads: BTreeSet<String>,
}

impl AuthorBucket {
    #[must_use]
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            commits: Vec::new(),
            insertions: 0,
            deletions: 0,
            files_changed: 0,
            weekly: BTreeMap::new(),
            weekday: WeekdayTally::default(),
            daily: BTreeMap::new(),
            hourly: [0; 24],
            weekday_insertions: WeekdayTally::default(),
            weekday_deletions: WeekdayTally::default(),
            active_dates: BTreeSet::new(),
            outcomes: OutcomeTally::default(),
            ci_runs: 0,
            commits_with_ci: 0,
            pr_heads: BTreeSet::new(),
        }
    }

    /// Fold one commit into the bucket. `weekday` and `date` are in the author's local time.
    pub fn add(&mut self, record: CommitRecord, weekday: Weekday, date: NaiveDate) {
        *self.weekly.entry(record.week.clone()).or_default() += 1;
        *self.daily.entry(record.date.clone()).or_default() += 1;
        self.weekday.add(weekday, 1);
        if let Some(slot) = self.hourly.get_mut(record.author_hour as usize) {
            *slot += 1;
        }

        self.insertions += record.insertions;
        self.deletions += record.deletions;
        self.files_changed += record.files_changed;
        self.weekday_insertions.add(weekday, record.insertions);
        self.weekday_deletions.add(weekday, record.deletions);
        let _ = self.active_dates.insert(date);

        if record.ci.has_actions_runs {
            self.outcomes.add(&record.ci.conclusions_tally);
            self.ci_runs += record.ci.runs_count;
            self.commits_with_ci += 1;

            if record.ci.latest_event_is(PULL_REQUEST_EVENT) {
                let _ = self.pr_heads.insert(record.hash.clone());
            }
        }

        self.commits.push(record);
    }

    #[must_use]
    pub const fn identity(&self) -> &Identity {
        &self.identity
    }

    #[must_use]
    pub const fn active_dates(&self) -> &BTreeSet<NaiveDate> {
        &self.active_dates
    }

    /// Compute the derived fields and produce the report entry.
    #[must_use]
    pub fn finalize(self) -> AuthorReport {
        AuthorReport {
            commit_count: self.commits.len() as u64,
            total_insertions: self.insertions,
            total_deletions: self.deletions,
            total_files_changed: self.files_changed,
            weekly_frequency: self.weekly,
            weekday_frequency: self.weekday,
            daily_frequency: self.daily,
            hourly_frequency: self.hourly,
            weekday_insertions: self.weekday_insertions,
            weekday_deletions: self.weekday_deletions,
            active_days: self.active_dates.len() as u64,
            average_streak_days: average_streak(&self.active_dates),
            longest_streak_days: longest_streak(&self.active_dates),
            ci_runs: self.ci_runs,
            commits_with_ci: self.commits_with_ci,
            ci_outcomes: self.outcomes,
            pull_request_count: self.pr_heads.len() as u64,
            pull_request_heads: self.pr_heads.into_iter().collect(),
            name: self.identity.name,
            email: self.identity.email,
            commits: self.commits,
        }
    }
}
