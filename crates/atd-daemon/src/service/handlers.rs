//! Per-domain change handlers
//!
//! Each handler re-reads the changed file from scratch and mutates the
//! shared state store, returning what the router should feed into the
//! debounced broadcasts. Any I/O or parse failure is logged and the event
//! dropped without touching prior state — stale-but-consistent beats
//! updated-but-corrupt — and failures never spill past the one entity
//! being handled.

use atd_core::config::TimingConfig;
use atd_core::io::{read_document, read_json};
use atd_core::{InboxEntry, SharedStateStore, TaskRecord};
use chrono::Utc;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

use super::broadcast::ChangeKind;
use super::watcher::{FsEvent, FsEventKind};

/// First path segment below `root`: the team name for config, inbox, and
/// task paths alike.
pub fn team_from_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    rel.components()
        .next()
        .and_then(|c| c.as_os_str().to_str())
        .map(|s| s.to_string())
}

fn file_stem(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.to_string())
}

/// Wait until two successive metadata probes agree, so a file still being
/// written is not read mid-flight. Gives up after the configured probe cap
/// and lets the read proceed; a file that vanished surfaces as an I/O
/// error for the caller to log and drop.
async fn wait_for_settle(path: &Path, timing: &TimingConfig) -> std::io::Result<()> {
    let probe = |p: &Path| -> std::io::Result<(u64, Option<std::time::SystemTime>)> {
        let meta = std::fs::metadata(p)?;
        Ok((meta.len(), meta.modified().ok()))
    };

    let interval = Duration::from_millis(timing.stability_ms);
    let mut prev = probe(path)?;
    for _ in 0..timing.stability_max_checks {
        tokio::time::sleep(interval).await;
        let current = probe(path)?;
        if current == prev {
            return Ok(());
        }
        prev = current;
    }
    debug!("File {} did not settle; reading anyway", path.display());
    Ok(())
}

/// Handle a team config event.
///
/// Add/modify replaces the team's config wholesale (last-write-wins, no
/// field-level merge); remove deletes the team entirely, accumulated inbox
/// included. Returns `true` when the teams broadcast should be scheduled.
pub async fn handle_team_config(
    store: &SharedStateStore,
    teams_root: &Path,
    event: &FsEvent,
    timing: &TimingConfig,
) -> bool {
    let Some(team) = team_from_path(teams_root, &event.path) else {
        warn!("Ignoring config event outside teams root: {}", event.path.display());
        return false;
    };

    match event.kind {
        FsEventKind::Added | FsEventKind::Modified => {
            if let Err(e) = wait_for_settle(&event.path, timing).await {
                warn!("Dropping config event for {}: {e}", event.path.display());
                return false;
            }
            match read_document(&event.path) {
                Ok(config) => {
                    store.lock().unwrap().upsert_config(&team, config);
                    debug!("Team config updated: {team}");
                    true
                }
                Err(e) => {
                    warn!("Dropping config event: {e}");
                    false
                }
            }
        }
        FsEventKind::Removed => {
            store.lock().unwrap().remove_team(&team);
            debug!("Team removed: {team}");
            true
        }
    }
}

/// What an inbox event should feed into the broadcasts.
#[derive(Debug, Default)]
pub struct InboxOutcome {
    /// One trigger per affected entry, in file order
    pub triggers: Vec<(String, InboxEntry, ChangeKind)>,
    /// Whether the teams broadcast should also be scheduled
    pub teams_dirty: bool,
}

/// Handle an inbox file event.
///
/// The file is the unit of consistency: add/modify replaces every entry
/// from this origin file with the freshly parsed content (single objects
/// normalize to a one-element list), and remove deletes every entry whose
/// origin is the vanished file. The inbox re-sorts by timestamp ascending
/// after every update.
pub async fn handle_inbox(
    store: &SharedStateStore,
    teams_root: &Path,
    event: &FsEvent,
    timing: &TimingConfig,
) -> InboxOutcome {
    let Some(team) = team_from_path(teams_root, &event.path) else {
        warn!("Ignoring inbox event outside teams root: {}", event.path.display());
        return InboxOutcome::default();
    };

    match event.kind {
        FsEventKind::Added | FsEventKind::Modified => {
            if let Err(e) = wait_for_settle(&event.path, timing).await {
                warn!("Dropping inbox event for {}: {e}", event.path.display());
                return InboxOutcome::default();
            }
            let raw = match read_json(&event.path) {
                Ok(serde_json::Value::Array(items)) => items,
                Ok(single) => vec![single],
                Err(e) => {
                    warn!("Dropping inbox event: {e}");
                    return InboxOutcome::default();
                }
            };

            let mut entries = Vec::with_capacity(raw.len());
            for (index, item) in raw.into_iter().enumerate() {
                match InboxEntry::from_value(item, &event.path, index) {
                    Some(entry) => entries.push(entry),
                    None => warn!(
                        "Skipping non-object message {index} in {}",
                        event.path.display()
                    ),
                }
            }

            store
                .lock()
                .unwrap()
                .replace_inbox_entries(&team, &event.path, entries.clone());
            debug!("Inbox updated: {team} ({} entries from file)", entries.len());

            InboxOutcome {
                triggers: entries
                    .into_iter()
                    .map(|entry| (team.clone(), entry, ChangeKind::Add))
                    .collect(),
                teams_dirty: true,
            }
        }
        FsEventKind::Removed => {
            let removed = store
                .lock()
                .unwrap()
                .remove_inbox_entries(&team, &event.path);
            debug!("Inbox file removed: {team} (-{} entries)", removed.len());

            InboxOutcome {
                triggers: removed
                    .into_iter()
                    .map(|entry| (team.clone(), entry, ChangeKind::Remove))
                    .collect(),
                teams_dirty: false,
            }
        }
    }
}

/// Handle a task file event.
///
/// Add/modify rebuilds the record from scratch with the team taken from
/// the path (never from file content) and a fresh `lastSynchronizedAt`.
/// Remove deletes by id and reports the last known record, or nothing when
/// the task was never seen.
pub async fn handle_task(
    store: &SharedStateStore,
    tasks_root: &Path,
    event: &FsEvent,
    timing: &TimingConfig,
) -> Option<(TaskRecord, ChangeKind)> {
    let id = file_stem(&event.path)?;
    let Some(team) = team_from_path(tasks_root, &event.path) else {
        warn!("Ignoring task event outside tasks root: {}", event.path.display());
        return None;
    };

    match event.kind {
        FsEventKind::Added | FsEventKind::Modified => {
            if let Err(e) = wait_for_settle(&event.path, timing).await {
                warn!("Dropping task event for {}: {e}", event.path.display());
                return None;
            }
            match read_document(&event.path) {
                Ok(payload) => {
                    let record = TaskRecord::from_document(id, team, payload, Utc::now());
                    store.lock().unwrap().upsert_task(record.clone());
                    debug!("Task updated: {}", record.id);
                    let kind = match event.kind {
                        FsEventKind::Added => ChangeKind::Add,
                        _ => ChangeKind::Change,
                    };
                    Some((record, kind))
                }
                Err(e) => {
                    warn!("Dropping task event: {e}");
                    None
                }
            }
        }
        FsEventKind::Removed => {
            let removed = store.lock().unwrap().remove_task(&id);
            if removed.is_some() {
                debug!("Task removed: {id}");
            }
            removed.map(|record| (record, ChangeKind::Remove))
        }
    }
}
