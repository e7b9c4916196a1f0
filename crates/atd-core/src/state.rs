//! In-memory state store mirroring the watched directory trees
//!
//! Single-writer, many-reader: only the daemon's router task mutates the
//! store, and every query accessor returns an independent deep copy, so no
//! caller can corrupt live state. The store is passed into the service
//! explicitly (no process-wide singleton) so tests can run any number of
//! independent instances.

use crate::schema::{Document, InboxEntry, TaskRecord, TeamSnapshot};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Mutable per-team state.
#[derive(Debug, Clone, Default)]
pub struct TeamState {
    /// Config document; `None` until the config file is first seen
    pub config: Option<Document>,
    /// Inbox entries, kept sorted by timestamp ascending
    pub inbox: Vec<InboxEntry>,
}

/// The in-memory model: team name → team state, task id → task record.
#[derive(Debug, Default)]
pub struct StateStore {
    teams: HashMap<String, TeamState>,
    tasks: HashMap<String, TaskRecord>,
}

/// Shared handle to a [`StateStore`], locked briefly per operation.
pub type SharedStateStore = Arc<Mutex<StateStore>>;

/// Create a new empty shared state store.
pub fn new_shared_store() -> SharedStateStore {
    Arc::new(Mutex::new(StateStore::default()))
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Mutations (called only by the change handlers) ───────────────────────

    /// Replace a team's config wholesale, creating the team on first sight.
    pub fn upsert_config(&mut self, team: &str, config: Document) {
        self.teams.entry(team.to_string()).or_default().config = Some(config);
    }

    /// Delete a team entirely, inbox included.
    ///
    /// Returns `true` when the team existed.
    pub fn remove_team(&mut self, team: &str) -> bool {
        self.teams.remove(team).is_some()
    }

    /// Replace every inbox entry originating from `source` with `entries`,
    /// then re-sort the inbox by timestamp ascending.
    ///
    /// The origin file is the unit of consistency: entries from other files
    /// are untouched, and replaying identical content is a no-op in effect.
    pub fn replace_inbox_entries(
        &mut self,
        team: &str,
        source: &Path,
        entries: Vec<InboxEntry>,
    ) {
        let state = self.teams.entry(team.to_string()).or_default();
        state.inbox.retain(|entry| entry.source_file != source);
        state.inbox.extend(entries);
        // Stable sort: entries with equal timestamps keep their file order.
        state.inbox.sort_by_key(|entry| entry.sort_key());
    }

    /// Remove every inbox entry originating from `source`.
    ///
    /// Returns the removed entries (empty when the team is unknown).
    pub fn remove_inbox_entries(&mut self, team: &str, source: &Path) -> Vec<InboxEntry> {
        let Some(state) = self.teams.get_mut(team) else {
            return Vec::new();
        };
        let (removed, kept) = std::mem::take(&mut state.inbox)
            .into_iter()
            .partition(|entry| entry.source_file == source);
        state.inbox = kept;
        removed
    }

    /// Insert or replace a task record.
    pub fn upsert_task(&mut self, record: TaskRecord) {
        self.tasks.insert(record.id.clone(), record);
    }

    /// Delete a task by id, returning the last known record if it existed.
    pub fn remove_task(&mut self, id: &str) -> Option<TaskRecord> {
        self.tasks.remove(id)
    }

    // ── Query facade ─────────────────────────────────────────────────────────

    /// All teams as independent snapshots.
    pub fn list_teams(&self) -> Vec<TeamSnapshot> {
        self.teams
            .iter()
            .map(|(name, state)| snapshot_of(name, state))
            .collect()
    }

    /// One team as an independent snapshot.
    pub fn get_team(&self, name: &str) -> Option<TeamSnapshot> {
        self.teams.get(name).map(|state| snapshot_of(name, state))
    }

    /// All tasks as independent copies.
    pub fn list_tasks(&self) -> Vec<TaskRecord> {
        self.tasks.values().cloned().collect()
    }

    /// Tasks belonging to one team.
    pub fn list_tasks_by_team(&self, team: &str) -> Vec<TaskRecord> {
        self.tasks
            .values()
            .filter(|record| record.team == team)
            .cloned()
            .collect()
    }

    pub fn count_teams(&self) -> usize {
        self.teams.len()
    }

    pub fn count_tasks(&self) -> usize {
        self.tasks.len()
    }
}

fn snapshot_of(name: &str, state: &TeamState) -> TeamSnapshot {
    TeamSnapshot {
        name: name.to_string(),
        config: state.config.clone(),
        inbox: state.inbox.clone(),
    }
}
