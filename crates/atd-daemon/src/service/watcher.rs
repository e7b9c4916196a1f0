//! File system watchers for the team config, inbox, and task subtrees

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobMatcher};
use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc::channel;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Which watched subtree an event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    /// `<teams_root>/<team>/config.json`
    TeamConfig,
    /// `<teams_root>/<team>/inboxes/<member>.json`
    Inbox,
    /// `<tasks_root>/<team>/<task_id>.json`
    Task,
}

impl Domain {
    /// Glob pattern applied to paths relative to the subtree root.
    pub fn pattern(&self) -> &'static str {
        match self {
            Domain::TeamConfig => "*/config.json",
            Domain::Inbox => "*/inboxes/*.json",
            Domain::Task => "*/*.json",
        }
    }
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Domain::TeamConfig => write!(f, "team-config"),
            Domain::Inbox => write!(f, "inbox"),
            Domain::Task => write!(f, "task"),
        }
    }
}

/// Normalized event kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsEventKind {
    /// New file (or pre-existing file found by the initial scan)
    Added,
    /// Existing file changed
    Modified,
    /// File deleted
    Removed,
}

/// Normalized file system event delivered to the router.
#[derive(Debug, Clone)]
pub struct FsEvent {
    pub domain: Domain,
    pub path: PathBuf,
    pub kind: FsEventKind,
}

/// One watcher instance over one subtree.
///
/// Construction creates the underlying OS watcher (so a creation failure
/// surfaces to the service's `start()`); [`DirWatcher::run`] then waits for
/// the root to exist, attaches, performs the initial scan, and forwards
/// normalized events until cancelled.
pub struct DirWatcher {
    domain: Domain,
    root: PathBuf,
    matcher: GlobMatcher,
    watcher: RecommendedWatcher,
    raw_rx: std::sync::mpsc::Receiver<Event>,
}

impl DirWatcher {
    /// Create the OS watcher for `domain` rooted at `root`.
    ///
    /// # Errors
    ///
    /// Fails when the glob pattern cannot compile or the platform watcher
    /// cannot be created.
    pub fn new(domain: Domain, root: PathBuf) -> Result<Self> {
        let matcher = GlobBuilder::new(domain.pattern())
            .literal_separator(true)
            .build()
            .with_context(|| format!("Failed to compile glob for {domain} watcher"))?
            .compile_matcher();

        let (tx, raw_rx) = channel();
        let watcher: RecommendedWatcher =
            notify::recommended_watcher(move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if let Err(e) = tx.send(event) {
                        error!("Failed to forward file system event: {e}");
                    }
                }
                Err(e) => {
                    error!("File system watcher error: {e}");
                }
            })
            .with_context(|| format!("Failed to create {domain} watcher"))?;

        Ok(Self {
            domain,
            root,
            matcher,
            watcher,
            raw_rx,
        })
    }

    /// Watch the subtree, forwarding [`FsEvent`]s on `event_tx` until
    /// `cancel` fires.
    ///
    /// A root directory that does not exist yet is polled until it appears;
    /// pre-existing files are then reported as `Added` before live events
    /// flow.
    pub async fn run(
        mut self,
        event_tx: mpsc::Sender<FsEvent>,
        cancel: CancellationToken,
    ) -> Result<()> {
        // Tolerate a not-yet-existing root: the external coordination
        // process creates these directories lazily.
        if !self.root.exists() {
            warn!(
                "{} root {} does not exist yet; waiting for it to appear",
                self.domain,
                self.root.display()
            );
        }
        while !self.root.exists() {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("{} watcher cancelled before root appeared", self.domain);
                    return Ok(());
                }
                _ = tokio::time::sleep(Duration::from_millis(500)) => {}
            }
        }

        self.watcher
            .watch(&self.root, RecursiveMode::Recursive)
            .with_context(|| format!("Failed to watch {}", self.root.display()))?;
        info!("{} watcher attached to {}", self.domain, self.root.display());

        // Initial scan: the model must be warm before the first broadcast,
        // so pre-existing files are reported as added. Duplicates with live
        // events are harmless because the handlers re-read idempotently.
        for path in scan_existing(&self.root, &self.matcher) {
            let event = FsEvent {
                domain: self.domain,
                path,
                kind: FsEventKind::Added,
            };
            if event_tx.send(event).await.is_err() {
                return Ok(());
            }
        }

        // Bridge notify's synchronous channel onto the async event channel.
        let domain = self.domain;
        let root = self.root.clone();
        let matcher = self.matcher.clone();
        let raw_rx = self.raw_rx;
        let watcher = self.watcher;
        tokio::task::spawn_blocking(move || {
            // Keep the OS watcher alive for the lifetime of the loop.
            let _watcher = watcher;
            loop {
                if cancel.is_cancelled() {
                    info!("{domain} watcher cancelled");
                    break;
                }

                match raw_rx.recv_timeout(Duration::from_millis(100)) {
                    Ok(event) => {
                        debug!("{domain} raw event: {event:?}");
                        for fs_event in normalize_event(domain, &root, &matcher, event) {
                            if let Err(e) = event_tx.blocking_send(fs_event) {
                                error!("Failed to deliver {domain} event: {e}");
                            }
                        }
                    }
                    Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {
                        // Timeout - check cancellation and continue
                        continue;
                    }
                    Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                        warn!("{domain} watcher channel disconnected");
                        break;
                    }
                }
            }
        })
        .await
        .context("Watcher task panicked")?;

        Ok(())
    }
}

/// Normalize a notify [`Event`] into zero or more [`FsEvent`]s.
///
/// Paths outside the subtree pattern are dropped. Rename events resolve to
/// `Modified` or `Removed` depending on whether the path still exists, so
/// atomic rename-into-place writes and rename-away deletions both land on
/// the right handler.
pub fn normalize_event(
    domain: Domain,
    root: &Path,
    matcher: &GlobMatcher,
    event: Event,
) -> Vec<FsEvent> {
    let mut events = Vec::new();

    for path in event.paths {
        let Ok(rel) = path.strip_prefix(root) else {
            continue;
        };
        if !matcher.is_match(rel) {
            continue;
        }

        let kind = match &event.kind {
            EventKind::Create(_) => FsEventKind::Added,
            EventKind::Modify(ModifyKind::Name(_)) => {
                if path.exists() {
                    FsEventKind::Modified
                } else {
                    FsEventKind::Removed
                }
            }
            EventKind::Modify(_) => FsEventKind::Modified,
            EventKind::Remove(_) => FsEventKind::Removed,
            _ => continue,
        };

        events.push(FsEvent { domain, path, kind });
    }

    events
}

/// Walk `root` collecting every existing file the matcher accepts.
fn scan_existing(root: &Path, matcher: &GlobMatcher) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Initial scan cannot read {}: {e}", dir.display());
                continue;
            }
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if let Ok(rel) = path.strip_prefix(root)
                && matcher.is_match(rel)
            {
                found.push(path);
            }
        }
    }

    found.sort();
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, RemoveKind, RenameMode};

    fn matcher_for(domain: Domain) -> GlobMatcher {
        GlobBuilder::new(domain.pattern())
            .literal_separator(true)
            .build()
            .unwrap()
            .compile_matcher()
    }

    #[test]
    fn test_normalize_config_create() {
        let root = PathBuf::from("/tmp/teams");
        let path = root.join("my-team/config.json");

        let event = Event {
            kind: EventKind::Create(CreateKind::File),
            paths: vec![path.clone()],
            attrs: Default::default(),
        };

        let events = normalize_event(Domain::TeamConfig, &root, &matcher_for(Domain::TeamConfig), event);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].path, path);
        assert_eq!(events[0].kind, FsEventKind::Added);
    }

    #[test]
    fn test_normalize_inbox_modify() {
        let root = PathBuf::from("/tmp/teams");
        let path = root.join("team-2/inboxes/agent-x.json");

        let event = Event {
            kind: EventKind::Modify(ModifyKind::Data(DataChange::Any)),
            paths: vec![path],
            attrs: Default::default(),
        };

        let events = normalize_event(Domain::Inbox, &root, &matcher_for(Domain::Inbox), event);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, FsEventKind::Modified);
    }

    #[test]
    fn test_normalize_task_remove() {
        let root = PathBuf::from("/tmp/tasks");
        let path = root.join("team-3/7.json");

        let event = Event {
            kind: EventKind::Remove(RemoveKind::File),
            paths: vec![path],
            attrs: Default::default(),
        };

        let events = normalize_event(Domain::Task, &root, &matcher_for(Domain::Task), event);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, FsEventKind::Removed);
    }

    #[test]
    fn test_rename_of_vanished_path_is_removed() {
        let root = PathBuf::from("/tmp/teams");
        // Path does not exist on disk, so a rename event resolves to Removed.
        let path = root.join("my-team/inboxes/agent-1.json");

        let event = Event {
            kind: EventKind::Modify(ModifyKind::Name(RenameMode::From)),
            paths: vec![path],
            attrs: Default::default(),
        };

        let events = normalize_event(Domain::Inbox, &root, &matcher_for(Domain::Inbox), event);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, FsEventKind::Removed);
    }

    #[test]
    fn test_config_matcher_rejects_inbox_files() {
        let root = PathBuf::from("/tmp/teams");
        let path = root.join("my-team/inboxes/agent-1.json");

        let event = Event {
            kind: EventKind::Create(CreateKind::File),
            paths: vec![path],
            attrs: Default::default(),
        };

        let events = normalize_event(Domain::TeamConfig, &root, &matcher_for(Domain::TeamConfig), event);
        assert!(events.is_empty());
    }

    #[test]
    fn test_inbox_matcher_rejects_config_and_non_json() {
        let root = PathBuf::from("/tmp/teams");
        let matcher = matcher_for(Domain::Inbox);

        for path in [
            root.join("my-team/config.json"),
            root.join("my-team/inboxes/notes.txt"),
            root.join("my-team/inboxes/deep/nested.json"),
        ] {
            let event = Event {
                kind: EventKind::Create(CreateKind::File),
                paths: vec![path],
                attrs: Default::default(),
            };
            assert!(normalize_event(Domain::Inbox, &root, &matcher, event).is_empty());
        }
    }

    #[test]
    fn test_paths_outside_root_dropped() {
        let root = PathBuf::from("/tmp/teams");
        let event = Event {
            kind: EventKind::Create(CreateKind::File),
            paths: vec![PathBuf::from("/elsewhere/team/config.json")],
            attrs: Default::default(),
        };
        let events =
            normalize_event(Domain::TeamConfig, &root, &matcher_for(Domain::TeamConfig), event);
        assert!(events.is_empty());
    }

    #[test]
    fn test_normalize_multiple_paths() {
        let root = PathBuf::from("/tmp/teams");
        let event = Event {
            kind: EventKind::Create(CreateKind::File),
            paths: vec![
                root.join("team-1/inboxes/agent-a.json"),
                root.join("team-1/inboxes/agent-b.json"),
            ],
            attrs: Default::default(),
        };

        let events = normalize_event(Domain::Inbox, &root, &matcher_for(Domain::Inbox), event);
        assert_eq!(events.len(), 2);
        assert!(events[0].path.ends_with("agent-a.json"));
        assert!(events[1].path.ends_with("agent-b.json"));
    }

    #[test]
    fn test_scan_existing_matches_only_pattern() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("alpha/inboxes")).unwrap();
        std::fs::write(root.join("alpha/config.json"), "{}").unwrap();
        std::fs::write(root.join("alpha/inboxes/bob.json"), "[]").unwrap();
        std::fs::write(root.join("stray.json"), "{}").unwrap();

        let configs = scan_existing(root, &matcher_for(Domain::TeamConfig));
        assert_eq!(configs, vec![root.join("alpha/config.json")]);

        let inboxes = scan_existing(root, &matcher_for(Domain::Inbox));
        assert_eq!(inboxes, vec![root.join("alpha/inboxes/bob.json")]);
    }
}
