use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Conclusion of a finished workflow run.
///
/// The set is fixed; conclusions outside it are ignored by every tally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum OutcomeCategory {
    Success,
    Failure,
    Cancelled,
    TimedOut,
    Skipped,
    Neutral,
    ActionRequired,
}

impl OutcomeCategory {
    pub const ALL: [Self; 7] = [
        Self::Success,
        Self::Failure,
        Self::Cancelled,
        Self::TimedOut,
        Self::Skipped,
        Self::Neutral,
        Self::ActionRequired,
    ];

    /// Classify a provider conclusion string, returning `None` for anything unrecognized.
    #[must_use]
    pub fn parse(conclusion: &str) -> Option<Self> {
        conclusion.parse().ok()
    }
}

/// The trigger under which the provider lists a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Push,
    PullRequest,
    PullRequestTarget,
    MergeGroup,
    Schedule,
    WorkflowDispatch,
}

/// Run counts per [`OutcomeCategory`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeTally {
    pub success: u64,
    pub failure: u64,
    pub cancelled: u64,
    pub timed_out: u64,
    pub skipped: u64,
    pub neutral: u64,
    pub action_required: u64,
}

impl OutcomeTally {
    const fn slot(&mut self, category: OutcomeCategory) -> &mut u64 {
        match category {
            OutcomeCategory::Success => &mut self.success,
            OutcomeCategory::Failure => &mut self.failure,
            OutcomeCategory::Cancelled => &mut self.cancelled,
            OutcomeCategory::TimedOut => &mut self.timed_out,
            OutcomeCategory::Skipped => &mut self.skipped,
            OutcomeCategory::Neutral => &mut self.neutral,
            OutcomeCategory::ActionRequired => &mut self.action_required,
        }
    }

    #[must_use]
    pub const fn get(&self, category: OutcomeCategory) -> u64 {
        match category {
            OutcomeCategory::Success => self.success,
            OutcomeCategory::Failure => self.failure,
            OutcomeCategory::Cancelled => self.cancelled,
            OutcomeCategory::TimedOut => self.timed_out,
            OutcomeCategory::Skipped => self.skipped,
            OutcomeCategory::Neutral => self.neutral,
            OutcomeCategory::ActionRequired => self.action_required,
        }
    }

    pub const fn increment(&mut self, category: OutcomeCategory) {
        *self.slot(category) += 1;
    }

    /// Count a raw conclusion string; unrecognized conclusions are dropped.
    pub fn record(&mut self, conclusion: Option<&str>) -> Option<OutcomeCategory> {
        let category = conclusion.and_then(OutcomeCategory::parse)?;
        self.increment(category);
        Some(category)
    }

    pub fn add(&mut self, other: &Self) {
        for category in OutcomeCategory::ALL {
            *self.slot(category) += other.get(category);
        }
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        OutcomeCategory::ALL.iter().map(|c| self.get(*c)).sum()
    }
}
