//! Keychain backend.
//!
//! This module provides:
//! - `Item` and `Metadata` types (`item`)
//! - Access policy encoding for new entries (`policy`)
//! - The biometric gate for named keychains (`gate`)
//! - Create-or-open for named keychains (`opener`)
//! - `KeychainBackend`, which implements the `Keyring` operations on top
//!   of a `SecureStoreProvider`
//!
//! A backend is not internally synchronized.  `set` takes `&mut self`;
//! share one across threads behind a `Mutex`.

pub mod gate;
pub mod item;
mod opener;
pub mod policy;

use tracing::debug;

use crate::auth::{BiometricAuthenticator, SecretReader, TerminalReader};
use crate::config::BackendConfig;
use crate::errors::{KeyguardError, Result};
use crate::provider::{
    ContainerStatus, Entry, Query, Record, SecureStoreProvider, StoreError, StoreHandle,
};

pub use gate::{BiometricGate, GateState};
pub use item::{Item, Metadata};
pub use policy::AccessPolicy;

/// Credential store operations.
pub trait Keyring {
    /// Fetch an item, payload included.
    fn get(&self, key: &str) -> Result<Item>;

    /// Fetch an item's attributes and modification time, never its payload.
    fn get_metadata(&self, key: &str) -> Result<Metadata>;

    /// Create the item, or update it in place if the key already exists.
    fn set(&mut self, item: &Item) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;

    /// Keys of every item in this backend's service, in provider order.
    fn keys(&self) -> Result<Vec<String>>;
}

/// Keyring backed by a platform keychain.
pub struct KeychainBackend<P, A, R = TerminalReader> {
    config: BackendConfig,
    keychain: Option<String>,
    provider: P,
    authenticator: A,
    reader: R,
    gate: BiometricGate,
}

impl<P, A> KeychainBackend<P, A, TerminalReader>
where
    P: SecureStoreProvider,
    A: BiometricAuthenticator,
{
    /// Build a backend that reads setup passphrases from the terminal.
    pub fn new(config: BackendConfig, provider: P, authenticator: A) -> Self {
        let keychain = config.keychain_path();
        Self {
            config,
            keychain,
            provider,
            authenticator,
            reader: TerminalReader,
            gate: BiometricGate::new(),
        }
    }
}

impl<P, A, R> KeychainBackend<P, A, R>
where
    P: SecureStoreProvider,
    A: BiometricAuthenticator,
    R: SecretReader,
{
    /// Replace the masked reader used by biometric setup.
    pub fn with_reader<R2: SecretReader>(self, reader: R2) -> KeychainBackend<P, A, R2> {
        KeychainBackend {
            config: self.config,
            keychain: self.keychain,
            provider: self.provider,
            authenticator: self.authenticator,
            reader,
            gate: self.gate,
        }
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Path of the named keychain, `None` when using the default one.
    pub fn keychain_path(&self) -> Option<&str> {
        self.keychain.as_deref()
    }

    pub fn gate_state(&self) -> GateState {
        self.gate.state()
    }

    pub fn has_cached_passphrase(&self) -> bool {
        self.gate.has_cached_passphrase()
    }

    fn service(&self) -> &str {
        &self.config.service_name
    }

    fn item_query(&self, key: &str) -> Query {
        Query::new(self.service())
            .in_container(self.keychain.as_deref())
            .account(key)
    }

    /// Single-record lookup shared by `get` and `get_metadata`.
    fn fetch(&self, query: &Query, key: &str) -> Result<Record> {
        debug!(
            service = self.service(),
            account = key,
            keychain = ?self.keychain,
            "Querying keychain"
        );

        let records = match self.provider.query(query) {
            Ok(records) => records,
            Err(StoreError::ItemNotFound | StoreError::NoSuchContainer(_)) => Vec::new(),
            Err(e) => {
                debug!(error = %e, "Keychain query failed");
                return Err(KeyguardError::provider(
                    format!("querying service={:?}, account={key:?}", self.service()),
                    e,
                ));
            }
        };

        records.into_iter().next().ok_or_else(|| {
            debug!("No results found");
            KeyguardError::NotFound(key.to_string())
        })
    }

    /// `status` of the named keychain, if one is configured.
    fn keychain_status(&self) -> Result<Option<ContainerStatus>> {
        match &self.keychain {
            None => Ok(None),
            Some(path) => self.provider.status(path).map(Some).map_err(|e| {
                KeyguardError::provider(format!("checking status of {path}"), e)
            }),
        }
    }

    /// Resolve a duplicate on create by updating the existing entry.  The
    /// access record is left out so the update does not prompt.
    fn update_existing(&self, mut entry: Entry) -> Result<()> {
        debug!(account = %entry.account, "Item already exists, updating");

        let query = Query::new(self.service())
            .in_container(entry.container.as_deref())
            .account(entry.account.clone());

        let found = match self.provider.query(&query) {
            Ok(records) => records.len(),
            Err(StoreError::ItemNotFound) => 0,
            Err(e) => return Err(KeyguardError::provider("Failed to query keychain", e)),
        };
        match found {
            0 => return Err(KeyguardError::Consistency("no results".into())),
            1 => {}
            n => {
                return Err(KeyguardError::Consistency(format!(
                    "expected one item for account {:?}, found {n}",
                    entry.account
                )))
            }
        }

        entry.access = None;
        self.provider
            .update(&query, &entry)
            .map_err(|e| KeyguardError::provider("Failed to update item in keychain", e))
    }
}

impl<P, A, R> Keyring for KeychainBackend<P, A, R>
where
    P: SecureStoreProvider,
    A: BiometricAuthenticator,
    R: SecretReader,
{
    fn get(&self, key: &str) -> Result<Item> {
        let record = self.fetch(&self.item_query(key).with_data(), key)?;
        debug!(label = %record.label, "Found item");

        Ok(Item {
            key: key.to_string(),
            data: record.data.unwrap_or_default(),
            label: record.label,
            description: record.description,
            ..Item::default()
        })
    }

    fn get_metadata(&self, key: &str) -> Result<Metadata> {
        let record = self.fetch(&self.item_query(key), key)?;
        debug!(label = %record.label, "Found metadata");

        Ok(Metadata {
            item: Item {
                key: key.to_string(),
                label: record.label,
                description: record.description,
                ..Item::default()
            },
            modified_at: record.modified_at,
        })
    }

    fn set(&mut self, item: &Item) -> Result<()> {
        let handle: Option<StoreHandle> = match self.keychain.clone() {
            Some(path) => Some(self.create_or_open(&path)?),
            None => None,
        };

        let policy = AccessPolicy::resolve(&self.config, item);
        let entry = Entry {
            container: handle.map(|h| h.path().to_string()),
            service: self.service().to_string(),
            account: item.key.clone(),
            label: item.label.clone(),
            description: item.description.clone(),
            data: item.data.clone(),
            access: Some(policy.access_control(&item.label)),
            synchronizable: policy.synchronizable_attr(),
            accessibility: policy.accessibility_attr(),
        };

        debug!(
            service = self.service(),
            label = %item.label,
            account = %item.key,
            trusted = policy.trusted,
            keychain = ?self.keychain,
            "Adding item to keychain"
        );

        match self.provider.add(&entry) {
            Ok(()) => Ok(()),
            Err(StoreError::Duplicate) => self.update_existing(entry),
            Err(e) => Err(KeyguardError::provider(
                format!(
                    "adding service={:?}, account={:?}",
                    self.service(),
                    item.key
                ),
                e,
            )),
        }
    }

    fn remove(&self, key: &str) -> Result<()> {
        if self.keychain_status()? == Some(ContainerStatus::Absent) {
            return Err(KeyguardError::NotFound(key.to_string()));
        }

        debug!(
            service = self.service(),
            account = key,
            keychain = ?self.keychain,
            "Removing keychain item"
        );
        match self.provider.delete(&self.item_query(key)) {
            Ok(()) => Ok(()),
            Err(StoreError::ItemNotFound) => Err(KeyguardError::NotFound(key.to_string())),
            Err(e) => Err(KeyguardError::provider(
                format!("removing service={:?}, account={key:?}", self.service()),
                e,
            )),
        }
    }

    fn keys(&self) -> Result<Vec<String>> {
        if self.keychain_status()? == Some(ContainerStatus::Absent) {
            return Ok(Vec::new());
        }

        debug!(service = self.service(), keychain = ?self.keychain, "Querying keychain");
        let query = Query::new(self.service())
            .in_container(self.keychain.as_deref())
            .match_all();

        let records = match self.provider.query(&query) {
            Ok(records) => records,
            Err(StoreError::ItemNotFound) => Vec::new(),
            Err(e) => {
                return Err(KeyguardError::provider(
                    format!("listing service={:?}", self.service()),
                    e,
                ))
            }
        };

        debug!(found = records.len(), "Found results");
        Ok(records.into_iter().map(|r| r.account).collect())
    }
}
