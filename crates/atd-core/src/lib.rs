//! Core types and state model for agent-team-deck (atd)
//!
//! This crate mirrors the on-disk state written by a Claude agent team
//! coordination process — team configs at `~/.claude/teams/{team}/config.json`,
//! inbox files at `~/.claude/teams/{team}/inboxes/{member}.json`, and task
//! files at `~/.claude/tasks/{team}/{task_id}.json` — into an in-memory
//! [`state::StateStore`].
//!
//! All schema types are designed to:
//! - Preserve unknown fields so arbitrary payloads pass through untouched
//! - Expose typed accessors only for the fields the core inspects
//! - Support round-trip serialization without data loss
//!
//! The watcher/broadcast layer that keeps the store synchronized lives in
//! the `agent-team-deck-daemon` crate.

pub mod config;
pub mod home;
pub mod io;
pub mod logging;
pub mod schema;
pub mod state;

pub use schema::{Document, InboxEntry, TaskRecord, TeamSnapshot};
pub use state::{SharedStateStore, StateStore, TeamState, new_shared_store};
