use crate::Result;
use chrono::{DateTime, Utc};
use core::fmt::{Display, Formatter};
use core::str::FromStr;
use ohno::{IntoAppError, bail};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use strum::Display as StrumDisplay;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for JobId {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl FromStr for JobId {
    type Err = ohno::AppError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s).map(Self).into_app_err_with(|| format!("invalid job id '{s}'"))
    }
}

/// Lifecycle of a job. `Succeeded` and `Failed` are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, StrumDisplay)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobState {
    Created,
    Running,
    Succeeded,
    Failed,
}

impl JobState {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    #[must_use]
    pub const fn can_become(self, next: Self) -> bool {
        match self {
            Self::Created => matches!(next, Self::Running | Self::Failed),
            Self::Running => next.is_terminal(),
            Self::Succeeded | Self::Failed => false,
        }
    }
}

/// The persistent part of a job, as held by a [`JobStore`](super::JobStore).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub repo: String,
    pub identity: String,
    pub state: JobState,
    pub result_location: Option<String>,
    pub report_path: Option<PathBuf>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    #[must_use]
    pub fn new(id: JobId, repo: impl Into<String>, identity: impl Into<String>) -> Self {
        Self {
            id,
            repo: repo.into(),
            identity: identity.into(),
            state: JobState::Created,
            result_location: None,
            report_path: None,
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Move to `next`, refusing to leave a terminal state.
    pub fn transition(&mut self, next: JobState) -> Result<()> {
        if !self.state.can_become(next) {
            bail!("job {} cannot move from {} to {next}", self.id, self.state);
        }

        self.state = next;
        if next.is_terminal() {
            self.finished_at = Some(Utc::now());
        }

        Ok(())
    }

    #[must_use]
    pub fn completion(&self) -> Completion {
        Completion {
            success: self.state == JobState::Succeeded,
            result_location: self.result_location.clone(),
            report_path: self.report_path.clone(),
        }
    }
}

/// The terminal event of a progress stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Completion {
    pub success: bool,
    pub result_location: Option<String>,
    pub report_path: Option<PathBuf>,
}

/// One item of a progress stream: a line of text, or the terminal completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProgressEvent {
    Line(String),
    Done(Completion),
}

impl ProgressEvent {
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Done(_))
    }
}
