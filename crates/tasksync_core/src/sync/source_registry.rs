//! In-process registry of remote list sources.

use crate::model::account::Account;
use crate::sync::remote::RemoteListSource;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Source registration/lookup errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceRegistryError {
    InvalidProviderId(String),
    DuplicateProviderId(String),
    ProviderNotFound(String),
}

impl Display for SourceRegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidProviderId(value) => write!(f, "provider id is invalid: {value}"),
            Self::DuplicateProviderId(value) => {
                write!(f, "provider id already registered: {value}")
            }
            Self::ProviderNotFound(value) => write!(f, "no source registered for provider: {value}"),
        }
    }
}

impl Error for SourceRegistryError {}

/// Remote sources keyed by provider id.
#[derive(Default, Clone)]
pub struct SourceRegistry {
    sources: BTreeMap<String, Arc<dyn RemoteListSource>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one source under its trimmed provider id.
    pub fn register(
        &mut self,
        source: Arc<dyn RemoteListSource>,
    ) -> Result<(), SourceRegistryError> {
        let provider_id = source.provider_id().trim().to_string();
        if !is_valid_provider_id(&provider_id) {
            return Err(SourceRegistryError::InvalidProviderId(provider_id));
        }
        if self.sources.contains_key(provider_id.as_str()) {
            return Err(SourceRegistryError::DuplicateProviderId(provider_id));
        }

        self.sources.insert(provider_id, source);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Returns sorted provider ids.
    pub fn provider_ids(&self) -> Vec<String> {
        self.sources.keys().cloned().collect()
    }

    pub fn get(&self, provider_id: &str) -> Option<Arc<dyn RemoteListSource>> {
        self.sources.get(provider_id.trim()).cloned()
    }

    /// Resolves the source serving `account`'s provider kind.
    pub fn source_for(
        &self,
        account: &Account,
    ) -> Result<Arc<dyn RemoteListSource>, SourceRegistryError> {
        let provider_id = account.kind.as_str();
        self.get(provider_id)
            .ok_or_else(|| SourceRegistryError::ProviderNotFound(provider_id.to_string()))
    }
}

fn is_valid_provider_id(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}
