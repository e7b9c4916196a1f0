//! Watch daemon for agent-team-deck
//!
//! Watches the team, inbox, and task directory trees, keeps the shared
//! [`atd_core::StateStore`] synchronized with every filesystem mutation,
//! and broadcasts debounced change events to subscribed observers.

pub mod service;

pub use service::{Subscription, WatchService};
