use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Read-only view of the manager for debug/inspection consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleStatus {
    pub enabled: bool,
    pub user_active: bool,
    /// `false` once the host window has stayed unfocused past the grace period.
    pub has_focus: bool,
    pub last_activity: DateTime<Utc>,
    pub time_since_last_activity_ms: u64,
    pub inactive_threshold_ms: u64,
    pub refresh_interval_ms: u64,
}

/// How a single cleanup step ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "lowercase")]
pub enum StepOutcome {
    Completed(String),
    /// The collaborator behind the step does not exist (yet). Counts as success.
    Skipped(String),
    Failed(String),
}

impl StepOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, StepOutcome::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepReport {
    pub step: String,
    pub outcome: StepOutcome,
}

/// Result of one cleanup pass, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub preserved_room: Option<String>,
    pub restored: bool,
    pub steps: Vec<StepReport>,
}

impl CleanupReport {
    pub fn failed_steps(&self) -> impl Iterator<Item = &StepReport> {
        self.steps.iter().filter(|s| s.outcome.is_failure())
    }

    pub fn outcome_of(&self, step: &str) -> Option<&StepOutcome> {
        self.steps.iter().find(|s| s.step == step).map(|s| &s.outcome)
    }
}
