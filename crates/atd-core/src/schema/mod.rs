//! Schema types for the mirrored on-disk state
//!
//! Payloads are duck-typed JSON: the core inspects a handful of fields
//! (sender, timestamp, team) through typed accessors and carries everything
//! else through opaquely as a [`Document`].

pub mod message;
pub mod task;
pub mod team;

pub use message::InboxEntry;
pub use task::TaskRecord;
pub use team::TeamSnapshot;

/// Generic structured document: a string-keyed map of JSON values.
///
/// `serde_json` is built with `preserve_order`, so a document round-trips
/// in the order its source file declared.
pub type Document = serde_json::Map<String, serde_json::Value>;
