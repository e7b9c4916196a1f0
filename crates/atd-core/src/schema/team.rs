//! Team snapshot: the owned query/broadcast view of one team

use super::{Document, InboxEntry};
use serde::{Deserialize, Serialize};

/// A team as returned by the query facade and the teams broadcast.
///
/// Always a deep copy of store state; mutating a snapshot never affects
/// the store or any other snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamSnapshot {
    /// Team name (the directory name under the teams root)
    pub name: String,

    /// The team's config document; `None` until a config file is first seen
    pub config: Option<Document>,

    /// Inbox, ordered by timestamp ascending
    pub inbox: Vec<InboxEntry>,
}
