//! Broadcast gateway: publishes state store mutations to observers
//!
//! Events serialize as `{"event": "...", "data": ...}` JSON so the wire
//! contract is stable for any observer transport layered on top.

use atd_core::{InboxEntry, TaskRecord, TeamSnapshot};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

/// What happened to the entity a delta event carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Add,
    Change,
    Remove,
}

/// One broadcast event.
///
/// `TeamsSnapshot` always carries the entire current team list, so it stays
/// complete no matter how many triggers coalesced into it. The delta
/// variants carry only the triggering change and are last-writer-wins under
/// a burst.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum StateEvent {
    TeamsSnapshot(Vec<TeamSnapshot>),
    #[serde(rename_all = "camelCase")]
    TeamMessage {
        team: String,
        message: InboxEntry,
        event_kind: ChangeKind,
    },
    #[serde(rename_all = "camelCase")]
    TaskChanged {
        task: TaskRecord,
        event_kind: ChangeKind,
    },
}

/// Fan-out channel from the router to every connected observer.
///
/// Cloning the gateway clones the sender side only; observers subscribe for
/// a receiver. A publish with no observers is a no-op, and an observer that
/// lags past the channel capacity misses intermediate events — acceptable
/// for the same reason the delta debouncers are allowed to coalesce.
#[derive(Clone)]
pub struct BroadcastGateway {
    tx: broadcast::Sender<StateEvent>,
}

impl BroadcastGateway {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event to all current observers.
    pub fn publish(&self, event: StateEvent) {
        // send() errors only when no receiver exists; nothing to do then.
        match self.tx.send(event) {
            Ok(n) => debug!("Broadcast delivered to {n} observer(s)"),
            Err(_) => debug!("Broadcast dropped: no observers connected"),
        }
    }

    /// Register a new observer.
    pub fn subscribe(&self) -> broadcast::Receiver<StateEvent> {
        self.tx.subscribe()
    }

    /// Number of currently connected observers.
    pub fn observer_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::path::Path;

    fn sample_entry() -> InboxEntry {
        InboxEntry::from_value(
            serde_json::json!({"from": "carol", "text": "hi"}),
            Path::new("/t/alpha/inboxes/bob.json"),
            0,
        )
        .unwrap()
    }

    #[test]
    fn test_teams_snapshot_wire_format() {
        let event = StateEvent::TeamsSnapshot(vec![TeamSnapshot {
            name: "alpha".to_string(),
            config: None,
            inbox: vec![],
        }]);
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&event).unwrap()).unwrap();
        assert_eq!(json["event"], "teams-snapshot");
        assert_eq!(json["data"][0]["name"], "alpha");
    }

    #[test]
    fn test_team_message_wire_format() {
        let event = StateEvent::TeamMessage {
            team: "alpha".to_string(),
            message: sample_entry(),
            event_kind: ChangeKind::Add,
        };
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&event).unwrap()).unwrap();
        assert_eq!(json["event"], "team-message");
        assert_eq!(json["data"]["team"], "alpha");
        assert_eq!(json["data"]["eventKind"], "add");
        assert_eq!(json["data"]["message"]["id"], "bob_0");
        assert_eq!(json["data"]["message"]["from"], "carol");
    }

    #[test]
    fn test_task_changed_wire_format() {
        let event = StateEvent::TaskChanged {
            task: TaskRecord::from_document(
                "7",
                "alpha",
                serde_json::from_str(r#"{"subject": "Fix CI"}"#).unwrap(),
                Utc::now(),
            ),
            event_kind: ChangeKind::Remove,
        };
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&event).unwrap()).unwrap();
        assert_eq!(json["event"], "task-changed");
        assert_eq!(json["data"]["eventKind"], "remove");
        assert_eq!(json["data"]["task"]["id"], "7");
    }

    #[tokio::test]
    async fn test_publish_reaches_all_observers() {
        let gateway = BroadcastGateway::new(16);
        let mut rx1 = gateway.subscribe();
        let mut rx2 = gateway.subscribe();
        assert_eq!(gateway.observer_count(), 2);

        gateway.publish(StateEvent::TeamsSnapshot(vec![]));

        assert_eq!(rx1.recv().await.unwrap(), StateEvent::TeamsSnapshot(vec![]));
        assert_eq!(rx2.recv().await.unwrap(), StateEvent::TeamsSnapshot(vec![]));
    }

    #[test]
    fn test_publish_without_observers_is_noop() {
        let gateway = BroadcastGateway::new(16);
        // Must not panic or error.
        gateway.publish(StateEvent::TeamsSnapshot(vec![]));
        assert_eq!(gateway.observer_count(), 0);
    }
}
