//! Item and Metadata types exchanged with backend callers.
//!
//! An `Item` is what callers store: a key, the secret bytes, and the
//! label/description shown by the platform's keychain UI.  The two
//! `not_*` flags let a single item opt out of the backend-wide
//! synchronization and trust settings.

use chrono::{DateTime, Utc};

/// A credential stored under `(service, key)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Item {
    /// The account name inside the service (e.g. "db").
    pub key: String,

    /// Secret payload, persisted opaquely.
    pub data: Vec<u8>,

    pub label: String,

    pub description: String,

    /// Keep this item local even when the backend synchronizes.
    pub not_synchronizable: bool,

    /// Require a prompt for this item even when the backend trusts the
    /// calling application.
    pub not_trusted: bool,
}

impl Item {
    pub fn new(key: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            data: data.into(),
            ..Self::default()
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Read-only view of an item without its payload.
///
/// `item.data` is always empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub item: Item,
    pub modified_at: DateTime<Utc>,
}
