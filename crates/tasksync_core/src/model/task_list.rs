//! Remote task list (calendar) model.
//!
//! # Invariants
//! - `id` is immutable once assigned.
//! - `last_sync` is `0` for a list that has never been synchronised.

use serde::{Deserialize, Serialize};

/// Local surrogate id of a list row.
pub type ListId = i64;

/// Local mirror of one remote list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskList {
    pub id: ListId,
    pub account_key: String,
    /// Stable identifier assigned by the remote source.
    pub remote_id: String,
    pub title: String,
    /// Epoch ms of the last completed sync; `0` = never.
    pub last_sync: i64,
}

/// One entry of an authoritative remote snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteList {
    pub remote_id: String,
    pub title: String,
}

impl RemoteList {
    pub fn new(remote_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            remote_id: remote_id.into(),
            title: title.into(),
        }
    }
}
