use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Epoch milliseconds at creation, bumped past the newest existing id on collision.
pub type TaskId = i64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Completed,
    Error,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Pending => f.pad("pending"),
            TaskStatus::Completed => f.pad("completed"),
            TaskStatus::Error => f.pad("error"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledTask {
    pub id: TaskId,
    pub description: String,
    pub fire_at: DateTime<Utc>,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Callback failure text, set together with `TaskStatus::Error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScheduledTask {
    pub fn new(id: TaskId, description: &str, fire_at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Self {
            id,
            description: description.to_string(),
            fire_at: fire_at.trunc_subsecs(0),
            status: TaskStatus::Pending,
            created_at: Some(now.trunc_subsecs(0)),
            finished_at: None,
            error: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == TaskStatus::Pending
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.is_pending() && self.fire_at <= now
    }

    /// Terminal transition. Returns false, leaving the task untouched, when it
    /// already left `pending`.
    pub fn finish(&mut self, outcome: std::result::Result<(), String>, now: DateTime<Utc>) -> bool {
        if !self.is_pending() {
            return false;
        }
        match outcome {
            Ok(()) => self.status = TaskStatus::Completed,
            Err(e) => {
                self.status = TaskStatus::Error;
                self.error = Some(e);
            }
        }
        self.finished_at = Some(now.trunc_subsecs(0));
        true
    }
}

/// Next id: creation time in ms, strictly above every id already in `tasks`.
pub fn next_task_id(tasks: &[ScheduledTask], now: DateTime<Utc>) -> TaskId {
    let now_ms = now.timestamp_millis();
    match tasks.iter().map(|t| t.id).max() {
        Some(last) if last >= now_ms => last + 1,
        _ => now_ms,
    }
}
