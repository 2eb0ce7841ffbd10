//! Workflow run records as returned by the provider's run-listing endpoint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One page of the run listing.
#[derive(Debug, Deserialize)]
pub struct RunsPage {
    #[serde(default)]
    pub total_count: Option<u64>,
    #[serde(default)]
    pub workflow_runs: Vec<WorkflowRun>,
}

/// Read-only view of a workflow run with only the fields we need.
///
/// Timestamps are kept as provider text and parsed on access so that a malformed
/// value only removes the run from timestamp-dependent logic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub head_sha: Option<String>,
    #[serde(default)]
    pub head_repository: Option<HeadRepository>,
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub conclusion: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub head_branch: Option<String>,
    #[serde(default)]
    pub workflow_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadRepository {
    #[serde(default)]
    pub full_name: Option<String>,
}

impl WorkflowRun {
    #[must_use]
    pub fn head_repository_name(&self) -> Option<&str> {
        self.head_repository.as_ref()?.full_name.as_deref()
    }

    #[must_use]
    pub fn created(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(self.created_at.as_deref())
    }

    #[must_use]
    pub fn updated(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(self.updated_at.as_deref())
    }

    /// When the run last changed: `updated_at`, falling back to `created_at`.
    #[must_use]
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.updated().or_else(|| self.created())
    }

    #[must_use]
    pub fn is_event(&self, event: &str) -> bool {
        self.event.as_deref() == Some(event)
    }
}

fn parse_timestamp(text: Option<&str>) -> Option<DateTime<Utc>> {
    let text = text?;
    match DateTime::parse_from_rfc3339(text) {
        Ok(ts) => Some(ts.with_timezone(&Utc)),
        Err(e) => {
            log::debug!(target: super::LOG_TARGET, "ignoring malformed run timestamp '{text}': {e}");
            None
        }
    }
}

#[cfg(test)]
pub(crate) fn test_run(id: u64, sha: &str, event: &str, conclusion: &str, updated_at: &str) -> WorkflowRun {
    WorkflowRun {
        id,
        name: Some("CI".to_string()),
        head_sha: Some(sha.to_string()),
        head_repository: Some(HeadRepository {
            full_name: Some("owner/repo".to_string()),
        }),
        event: Some(event.to_string()),
        status: Some("completed".to_string()),
        conclusion: Some(conclusion.to_string()),
        created_at: Some(updated_at.to_string()),
        updated_at: Some(updated_at.to_string()),
        html_url: Some(format!("https://github.com/owner/repo/actions/runs/{id}")),
        head_branch: Some("main".to_string()),
        workflow_id: Some(7),
    }
}
