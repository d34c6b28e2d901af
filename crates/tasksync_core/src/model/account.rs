//! Synchronised account model.

use serde::{Deserialize, Serialize};

/// Stable key of the synthetic account that owns lists with no remote side.
pub const LOCAL_ACCOUNT_KEY: &str = "local";

/// Which kind of source owns an account's lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    /// Synthetic local-only account; its soft-deleted tasks may be purged.
    Local,
    GoogleTasks,
    Caldav,
}

impl AccountKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::GoogleTasks => "google_tasks",
            Self::Caldav => "caldav",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "local" => Some(Self::Local),
            "google_tasks" => Some(Self::GoogleTasks),
            "caldav" => Some(Self::Caldav),
            _ => None,
        }
    }
}

/// A remote synchronised source, or the local-only account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub key: String,
    pub display_name: String,
    pub kind: AccountKind,
}

impl Account {
    pub fn new(key: impl Into<String>, display_name: impl Into<String>, kind: AccountKind) -> Self {
        Self {
            key: key.into(),
            display_name: display_name.into(),
            kind,
        }
    }

    /// Returns the seeded local-only account.
    pub fn local() -> Self {
        Self::new(LOCAL_ACCOUNT_KEY, "Local", AccountKind::Local)
    }

    pub fn is_local(&self) -> bool {
        self.kind == AccountKind::Local || self.key == LOCAL_ACCOUNT_KEY
    }
}
