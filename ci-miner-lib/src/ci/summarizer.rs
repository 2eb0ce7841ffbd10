use super::outcome::OutcomeTally;
use super::workflow_run::WorkflowRun;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The projected fields of the most recent run for a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestRun {
    pub id: u64,
    pub name: Option<String>,
    pub event: Option<String>,
    pub status: Option<String>,
    pub conclusion: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub html_url: Option<String>,
    pub head_branch: Option<String>,
    pub workflow_id: Option<u64>,
}

impl From<&WorkflowRun> for LatestRun {
    fn from(run: &WorkflowRun) -> Self {
        Self {
            id: run.id,
            name: run.name.clone(),
            event: run.event.clone(),
            status: run.status.clone(),
            conclusion: run.conclusion.clone(),
            created_at: run.created_at.clone(),
            updated_at: run.updated_at.clone(),
            html_url: run.html_url.clone(),
            head_branch: run.head_branch.clone(),
            workflow_id: run.workflow_id,
        }
    }
}

/// Everything known about the CI runs of one commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub has_actions_runs: bool,
    pub runs_count: u64,
    pub conclusions_tally: OutcomeTally,
    pub latest_run: Option<LatestRun>,
}

impl RunSummary {
    /// The explicit marker attached to commits without any observed run.
    #[must_use]
    pub fn no_runs() -> Self {
        Self {
            has_actions_runs: false,
            runs_count: 0,
            conclusions_tally: OutcomeTally::default(),
            latest_run: None,
        }
    }

    /// Whether the most recent run was triggered by `event`.
    #[must_use]
    pub fn latest_event_is(&self, event: &str) -> bool {
        self.latest_run.as_ref().and_then(|r| r.event.as_deref()) == Some(event)
    }
}

/// Per-SHA summary under construction, carrying the latest run's parsed timestamp.
struct Accumulator<'a> {
    runs_count: u64,
    tally: OutcomeTally,
    latest: Option<&'a WorkflowRun>,
}

impl<'a> Accumulator<'a> {
    fn offer(&mut self, run: &'a WorkflowRun) {
        self.runs_count += 1;
        let _ = self.tally.record(run.conclusion.as_deref());

        let replace = match self.latest {
            None => true,
            Some(current) => match (current.timestamp(), run.timestamp()) {
                (_, None) => false,
                (None, Some(_)) => true,
                (Some(old), Some(new)) => new > old,
            },
        };

        if replace {
            self.latest = Some(run);
        }
    }
}

/// Collapse a run list into one summary per head SHA.
///
/// Runs without a SHA are skipped. The latest run is the one with the most recent
/// timestamp; on ties the earliest-seen run stays, and a run without a usable
/// timestamp never displaces an established latest run.
#[must_use]
pub fn summarize_runs(runs: &[WorkflowRun]) -> HashMap<String, RunSummary> {
    let mut by_sha: HashMap<&str, Accumulator<'_>> = HashMap::new();

    for run in runs {
        let Some(sha) = run.head_sha.as_deref() else {
            continue;
        };

        by_sha
            .entry(sha)
            .or_insert_with(|| Accumulator {
                runs_count: 0,
                tally: OutcomeTally::default(),
                latest: None,
            })
            .offer(run);
    }

    by_sha
        .into_iter()
        .map(|(sha, acc)| {
            (
                sha.to_string(),
                RunSummary {
                    has_actions_runs: true,
                    runs_count: acc.runs_count,
                    conclusions_tally: acc.tally,
                    latest_run: acc.latest.map(LatestRun::from),
                },
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ci::workflow_run::test_run;

    #[test]
    fn test_counts_runs_per_sha() {
        let runs = vec![
            test_run(1, "a", "push", "success", "2024-01-01T00:00:00Z"),
            test_run(2, "a", "push", "failure", "2024-01-02T00:00:00Z"),
            test_run(3, "b", "push", "success", "2024-01-01T00:00:00Z"),
            test_run(4, "a", "pull_request", "weird", "2024-01-03T00:00:00Z"),
        ];

        let summaries = summarize_runs(&runs);
        assert_eq!(summaries.len(), 2);

        let a = &summaries["a"];
        assert!(a.has_actions_runs);
        assert_eq!(a.runs_count, 3);
        assert_eq!(a.conclusions_tally.success, 1);
        assert_eq!(a.conclusions_tally.failure, 1);
        assert_eq!(a.conclusions_tally.total(), 2);
        assert_eq!(a.latest_run.as_ref().unwrap().id, 4);
        assert!(a.latest_event_is("pull_request"));

        assert_eq!(summaries["b"].runs_count, 1);
    }

    #[test]
    fn test_skips_runs_without_sha() {
        let mut run = test_run(1, "a", "push", "success", "2024-01-01T00:00:00Z");
        run.head_sha = None;
        assert!(summarize_runs(&[run]).is_empty());
    }

    #[test]
    fn test_latest_is_most_recent_regardless_of_order() {
        let runs = vec![
            test_run(1, "a", "push", "success", "2024-01-05T00:00:00Z"),
            test_run(2, "a", "push", "failure", "2024-01-01T00:00:00Z"),
            test_run(3, "a", "push", "failure", "2024-01-03T00:00:00Z"),
        ];

        let summaries = summarize_runs(&runs);
        assert_eq!(summaries["a"].latest_run.as_ref().unwrap().id, 1);
    }

    #[test]
    fn test_ties_keep_earliest_seen() {
        let runs = vec![
            test_run(1, "a", "push", "success", "2024-01-05T00:00:00Z"),
            test_run(2, "a", "pull_request", "failure", "2024-01-05T00:00:00Z"),
        ];

        let summaries = summarize_runs(&runs);
        assert_eq!(summaries["a"].latest_run.as_ref().unwrap().id, 1);
    }

    #[test]
    fn test_missing_timestamp_never_displaces() {
        let mut undated = test_run(2, "a", "push", "failure", "x");
        undated.created_at = None;
        undated.updated_at = None;

        let runs = vec![test_run(1, "a", "push", "success", "2024-01-05T00:00:00Z"), undated.clone()];
        let summaries = summarize_runs(&runs);
        assert_eq!(summaries["a"].latest_run.as_ref().unwrap().id, 1);
        assert_eq!(summaries["a"].runs_count, 2);

        // An undated first run is replaced by the first dated one
        let runs = vec![undated, test_run(3, "a", "push", "success", "2024-01-05T00:00:00Z")];
        let summaries = summarize_runs(&runs);
        assert_eq!(summaries["a"].latest_run.as_ref().unwrap().id, 3);
    }

    #[test]
    fn test_latest_timestamp_dominates_all_runs() {
        let stamps = ["2024-03-01T00:00:00Z", "2024-01-01T00:00:00Z", "2024-05-01T12:00:00Z", "2024-05-01T11:59:59Z"];
        let runs: Vec<_> = stamps
            .iter()
            .zip(1..)
            .map(|(ts, id)| test_run(id, "a", "push", "success", ts))
            .collect();

        let summaries = summarize_runs(&runs);
        let latest = summaries["a"].latest_run.as_ref().unwrap();
        let latest_ts = runs.iter().find(|r| r.id == latest.id).unwrap().timestamp().unwrap();
        assert!(runs.iter().all(|r| r.timestamp().unwrap() <= latest_ts));
    }

    #[test]
    fn test_no_runs_marker() {
        let marker = RunSummary::no_runs();
        assert!(!marker.has_actions_runs);
        assert_eq!(marker.runs_count, 0);
        assert!(marker.latest_run.is_none());
        assert!(!marker.latest_event_is("pull_request"));
    }
}
