//! Remote list source contract.
//!
//! Transport is out of scope here; a source is an opaque producer of the
//! complete current list snapshot for one account.

use crate::model::account::Account;
use crate::model::task_list::RemoteList;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Failure reported by a remote source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteError {
    pub provider_id: String,
    /// Stable machine-readable code, e.g. `unauthorized`, `timeout`.
    pub code: String,
    pub message: String,
    pub retryable: bool,
}

impl RemoteError {
    pub fn new(
        provider_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
        retryable: bool,
    ) -> Self {
        Self {
            provider_id: provider_id.into(),
            code: code.into(),
            message: message.into(),
            retryable,
        }
    }
}

impl Display for RemoteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}:{}] {}", self.provider_id, self.code, self.message)
    }
}

impl Error for RemoteError {}

/// Producer of authoritative list snapshots.
pub trait RemoteListSource: Send + Sync {
    /// Matches `AccountKind::as_str()` of the accounts this source serves.
    fn provider_id(&self) -> &str;

    /// Returns every list the remote side currently holds for `account`.
    ///
    /// Implementations must follow pagination to the end; a partial listing
    /// would make reconciliation delete the lists on missing pages.
    fn fetch_lists(&self, account: &Account) -> Result<Vec<RemoteList>, RemoteError>;
}
