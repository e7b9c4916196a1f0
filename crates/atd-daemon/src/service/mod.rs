//! The watch service: watchers → router → state store → broadcasts
//!
//! A single router task is the only writer to the state store. Watchers
//! forward normalized events over one mpsc channel; the router drains it
//! sequentially, so the handler for one event runs to completion before
//! the next event is processed and per-path ordering follows channel
//! order. Queries lock briefly and return deep copies.

pub mod broadcast;
pub mod debounce;
pub mod handlers;
pub mod watcher;

pub use broadcast::{BroadcastGateway, ChangeKind, StateEvent};
pub use debounce::Debouncer;
pub use watcher::{DirWatcher, Domain, FsEvent, FsEventKind};

use anyhow::Result;
use atd_core::config::{TimingConfig, WatchConfig};
use atd_core::{InboxEntry, SharedStateStore, TaskRecord, TeamSnapshot};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Everything a newly connected observer needs: a complete baseline plus a
/// live event feed. The baseline is fetched after subscribing, so an event
/// racing the snapshot is re-delivered rather than lost (handlers are
/// idempotent, so applying it twice is harmless).
pub struct Subscription {
    /// Full team list at subscription time
    pub teams: Vec<TeamSnapshot>,
    /// Full task list at subscription time
    pub tasks: Vec<TaskRecord>,
    /// Incremental events from here on
    pub events: tokio::sync::broadcast::Receiver<StateEvent>,
}

/// Watches the team and task trees and keeps `store` synchronized.
///
/// The store is passed in rather than owned globally, so tests can run any
/// number of independent service instances side by side.
pub struct WatchService {
    store: SharedStateStore,
    gateway: BroadcastGateway,
    config: WatchConfig,
    teams_root: PathBuf,
    tasks_root: PathBuf,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl WatchService {
    pub fn new(store: SharedStateStore, claude_root: &Path, config: WatchConfig) -> Self {
        let teams_root = config.roots.teams_root(claude_root);
        let tasks_root = config.roots.tasks_root(claude_root);
        let gateway = BroadcastGateway::new(config.broadcast.capacity);
        Self {
            store,
            gateway,
            config,
            teams_root,
            tasks_root,
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
        }
    }

    /// Begin watching and run the initial scans.
    ///
    /// # Errors
    ///
    /// Fails only when no watcher at all could be created; a subset of
    /// failed watchers is logged and tolerated.
    pub async fn start(&mut self) -> Result<()> {
        info!("Starting file watchers...");

        let targets = [
            (Domain::TeamConfig, self.teams_root.clone()),
            (Domain::Inbox, self.teams_root.clone()),
            (Domain::Task, self.tasks_root.clone()),
        ];

        let mut watchers = Vec::new();
        for (domain, root) in targets {
            match DirWatcher::new(domain, root) {
                Ok(watcher) => watchers.push(watcher),
                Err(e) => error!("Could not create {domain} watcher: {e:#}"),
            }
        }
        if watchers.is_empty() {
            anyhow::bail!("No file watcher could be created");
        }

        let (event_tx, event_rx) = mpsc::channel::<FsEvent>(1024);

        for watcher in watchers {
            let tx = event_tx.clone();
            let cancel = self.cancel.clone();
            self.tasks.push(tokio::spawn(async move {
                if let Err(e) = watcher.run(tx, cancel).await {
                    error!("Watcher failed: {e:#}");
                }
            }));
        }

        let router = Router {
            store: self.store.clone(),
            gateway: self.gateway.clone(),
            timing: self.config.timing.clone(),
            teams_root: self.teams_root.clone(),
            tasks_root: self.tasks_root.clone(),
        };
        let cancel = self.cancel.clone();
        self.tasks
            .push(tokio::spawn(async move { router.run(event_rx, cancel).await }));

        info!("All file watchers initialized");
        Ok(())
    }

    /// Stop watching: closes all watchers and discards pending debounce
    /// timers. Undelivered coalesced broadcasts are dropped; the state
    /// store itself is not reset.
    pub async fn stop(&mut self) -> Result<()> {
        info!("Stopping file watchers...");
        self.cancel.cancel();

        for task in self.tasks.drain(..) {
            if let Err(e) = tokio::time::timeout(Duration::from_secs(5), task).await {
                error!("Service task did not stop in time: {e}");
            }
        }

        info!("File watchers stopped");
        Ok(())
    }

    /// Connect a new observer: baseline snapshot plus live event feed.
    pub fn subscribe(&self) -> Subscription {
        let events = self.gateway.subscribe();
        let store = self.store.lock().unwrap();
        Subscription {
            teams: store.list_teams(),
            tasks: store.list_tasks(),
            events,
        }
    }

    pub fn store(&self) -> SharedStateStore {
        self.store.clone()
    }

    // ── Query facade ─────────────────────────────────────────────────────────

    pub fn list_teams(&self) -> Vec<TeamSnapshot> {
        self.store.lock().unwrap().list_teams()
    }

    pub fn get_team(&self, name: &str) -> Option<TeamSnapshot> {
        self.store.lock().unwrap().get_team(name)
    }

    pub fn list_tasks(&self) -> Vec<TaskRecord> {
        self.store.lock().unwrap().list_tasks()
    }

    pub fn list_tasks_by_team(&self, team: &str) -> Vec<TaskRecord> {
        self.store.lock().unwrap().list_tasks_by_team(team)
    }

    pub fn count_teams(&self) -> usize {
        self.store.lock().unwrap().count_teams()
    }

    pub fn count_tasks(&self) -> usize {
        self.store.lock().unwrap().count_tasks()
    }
}

/// The single-writer stage between the watchers and the broadcasts.
struct Router {
    store: SharedStateStore,
    gateway: BroadcastGateway,
    timing: TimingConfig,
    teams_root: PathBuf,
    tasks_root: PathBuf,
}

impl Router {
    async fn run(self, mut event_rx: mpsc::Receiver<FsEvent>, cancel: CancellationToken) {
        let quiet = Duration::from_millis(self.timing.debounce_ms);

        // One debounce timer per broadcast category, not per entity key.
        // The teams action re-fetches the whole list at fire time, so it is
        // never lossy under coalescing; the inbox and task actions forward
        // only the triggering call's payload, so a burst within one quiet
        // window delivers the last update only.
        let teams_store = self.store.clone();
        let teams_gateway = self.gateway.clone();
        let mut teams_debounce = Debouncer::new(quiet, move |()| {
            let snapshot = teams_store.lock().unwrap().list_teams();
            teams_gateway.publish(StateEvent::TeamsSnapshot(snapshot));
        });

        let inbox_gateway = self.gateway.clone();
        let mut inbox_debounce = Debouncer::new(
            quiet,
            move |(team, message, event_kind): (String, InboxEntry, ChangeKind)| {
                inbox_gateway.publish(StateEvent::TeamMessage {
                    team,
                    message,
                    event_kind,
                });
            },
        );

        let task_gateway = self.gateway.clone();
        let mut task_debounce =
            Debouncer::new(quiet, move |(task, event_kind): (TaskRecord, ChangeKind)| {
                task_gateway.publish(StateEvent::TaskChanged { task, event_kind });
            });

        info!("Router running. Waiting for file system events...");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    teams_debounce.cancel();
                    inbox_debounce.cancel();
                    task_debounce.cancel();
                    info!("Router cancelled; pending broadcasts discarded");
                    break;
                }
                maybe_event = event_rx.recv() => {
                    let Some(event) = maybe_event else {
                        warn!("Watcher channel closed; router exiting");
                        break;
                    };
                    match event.domain {
                        Domain::TeamConfig => {
                            if handlers::handle_team_config(
                                &self.store,
                                &self.teams_root,
                                &event,
                                &self.timing,
                            )
                            .await
                            {
                                teams_debounce.call(());
                            }
                        }
                        Domain::Inbox => {
                            let outcome = handlers::handle_inbox(
                                &self.store,
                                &self.teams_root,
                                &event,
                                &self.timing,
                            )
                            .await;
                            for trigger in outcome.triggers {
                                inbox_debounce.call(trigger);
                            }
                            if outcome.teams_dirty {
                                teams_debounce.call(());
                            }
                        }
                        Domain::Task => {
                            if let Some(trigger) = handlers::handle_task(
                                &self.store,
                                &self.tasks_root,
                                &event,
                                &self.timing,
                            )
                            .await
                            {
                                task_debounce.call(trigger);
                            }
                        }
                    }
                }
            }
        }
    }
}
