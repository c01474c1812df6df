//! Secure store provider contract.
//!
//! The backend never touches container storage directly.  Everything it
//! needs from the platform's protected store goes through
//! [`SecureStoreProvider`]:
//! - container lifecycle (`status`, `create`, `lock`, `unlock`)
//! - attribute-based entry CRUD (`query`, `add`, `update`, `delete`)
//!
//! `memory` holds an in-process implementation of the full contract.

pub mod memory;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

pub use memory::MemoryProvider;

/// Failures reported by a provider.  Closed set so callers can match on
/// the kind instead of comparing messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("no such keychain: {0}")]
    NoSuchContainer(String),

    #[error("the specified item could not be found")]
    ItemNotFound,

    #[error("the specified item already exists")]
    Duplicate,

    #[error("keychain {0} is locked")]
    Locked(String),

    #[error("the passphrase for {0} is incorrect")]
    BadPassphrase(String),

    #[error("{0}")]
    Other(String),
}

/// Result of probing a container path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerStatus {
    Exists,
    Absent,
}

/// Reference to an opened container.  Carries no state between calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreHandle {
    path: String,
}

impl StoreHandle {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Replication eligibility written on an entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Synchronizable {
    /// Attribute left unset; the provider's default applies.
    #[default]
    Default,
    Yes,
    No,
}

/// When an entry may be read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Accessibility {
    #[default]
    Default,
    WhenUnlocked,
}

/// Per-entry access-control record.
///
/// `trusted_applications: None` leaves the platform's default trust in
/// place (the creating application is not prompted).  `Some(vec![])`
/// pre-authorizes nobody, so every read prompts the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessControl {
    pub label: String,
    pub trusted_applications: Option<Vec<String>>,
}

/// An entry as written to a container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Entry {
    /// Container path, `None` for the provider's default container.
    pub container: Option<String>,
    pub service: String,
    pub account: String,
    pub label: String,
    pub description: String,
    pub data: Vec<u8>,
    pub access: Option<AccessControl>,
    pub synchronizable: Synchronizable,
    pub accessibility: Accessibility,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MatchLimit {
    #[default]
    One,
    All,
}

/// Attribute query over a single container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pub container: Option<String>,
    pub service: String,
    pub account: Option<String>,
    pub label: Option<String>,
    pub limit: MatchLimit,
    pub return_data: bool,
}

impl Query {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            ..Self::default()
        }
    }

    pub fn in_container(mut self, container: Option<&str>) -> Self {
        self.container = container.map(str::to_string);
        self
    }

    pub fn account(mut self, account: impl Into<String>) -> Self {
        self.account = Some(account.into());
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn match_all(mut self) -> Self {
        self.limit = MatchLimit::All;
        self
    }

    pub fn with_data(mut self) -> Self {
        self.return_data = true;
        self
    }
}

/// One query result.  `data` is only filled when the query asked for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub account: String,
    pub label: String,
    pub description: String,
    pub data: Option<Vec<u8>>,
    pub modified_at: DateTime<Utc>,
}

/// Platform protected-storage operations consumed by the backend.
pub trait SecureStoreProvider: Send + Sync {
    /// Probe a container.  `Err` means the state could not be determined.
    fn status(&self, path: &str) -> Result<ContainerStatus, StoreError>;

    /// Find entries.  An empty match may be reported either as an empty
    /// vector or as `StoreError::ItemNotFound`.
    fn query(&self, query: &Query) -> Result<Vec<Record>, StoreError>;

    /// Create a container protected by `passphrase`.
    fn create(&self, path: &str, passphrase: &str) -> Result<StoreHandle, StoreError>;

    /// Create a container, letting the provider prompt for the passphrase.
    fn create_interactive(&self, path: &str) -> Result<StoreHandle, StoreError>;

    /// Insert a new entry.  Fails with `StoreError::Duplicate` when the
    /// (container, service, account) triple is taken.
    fn add(&self, entry: &Entry) -> Result<(), StoreError>;

    /// Overwrite the entry matched by `query` with the attributes of
    /// `changes`.  `changes.access == None` leaves the access record alone.
    fn update(&self, query: &Query, changes: &Entry) -> Result<(), StoreError>;

    fn delete(&self, query: &Query) -> Result<(), StoreError>;

    fn lock(&self, path: &str) -> Result<(), StoreError>;

    fn unlock(&self, path: &str, passphrase: &str) -> Result<(), StoreError>;
}

impl<T: SecureStoreProvider + ?Sized> SecureStoreProvider for Arc<T> {
    fn status(&self, path: &str) -> Result<ContainerStatus, StoreError> {
        (**self).status(path)
    }

    fn query(&self, query: &Query) -> Result<Vec<Record>, StoreError> {
        (**self).query(query)
    }

    fn create(&self, path: &str, passphrase: &str) -> Result<StoreHandle, StoreError> {
        (**self).create(path, passphrase)
    }

    fn create_interactive(&self, path: &str) -> Result<StoreHandle, StoreError> {
        (**self).create_interactive(path)
    }

    fn add(&self, entry: &Entry) -> Result<(), StoreError> {
        (**self).add(entry)
    }

    fn update(&self, query: &Query, changes: &Entry) -> Result<(), StoreError> {
        (**self).update(query, changes)
    }

    fn delete(&self, query: &Query) -> Result<(), StoreError> {
        (**self).delete(query)
    }

    fn lock(&self, path: &str) -> Result<(), StoreError> {
        (**self).lock(path)
    }

    fn unlock(&self, path: &str, passphrase: &str) -> Result<(), StoreError> {
        (**self).unlock(path, passphrase)
    }
}
