//! Task record schema
//!
//! Task files live at `~/.claude/tasks/{team}/{task_id}.json`. The id comes
//! from the file name and the team from the parent directory segment — the
//! path is authoritative, so in-file `id`/`team` keys are stripped from the
//! payload rather than allowed to shadow the derived values.

use super::Document;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One task, freshly rebuilt from its backing file on every observed change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    /// Task id (the file stem)
    pub id: String,

    /// Owning team (the parent directory segment)
    pub team: String,

    /// When the core last observed a change to the backing file
    pub last_synchronized_at: DateTime<Utc>,

    /// Remaining task fields, passed through untouched
    #[serde(flatten)]
    pub payload: Document,
}

impl TaskRecord {
    /// Build a record from a parsed task document.
    pub fn from_document(
        id: impl Into<String>,
        team: impl Into<String>,
        mut payload: Document,
        observed_at: DateTime<Utc>,
    ) -> Self {
        // Path-derived identity wins over file content.
        payload.remove("id");
        payload.remove("team");
        Self {
            id: id.into(),
            team: team.into(),
            last_synchronized_at: observed_at,
            payload,
        }
    }
}
