//! In-process secure store.
//!
//! `MemoryProvider` keeps every container in a mutex-guarded map.  It
//! models the parts of a platform keychain the backend relies on:
//! - a default container that is always unlocked
//! - named containers with a passphrase and a lock flag
//! - duplicate detection on `add`
//! - access records that are only replaced when an update carries one
//!
//! It also counts lock/unlock calls and access-record writes so tests can
//! assert how the backend drove it.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use zeroize::Zeroizing;

use super::{
    ContainerStatus, Entry, MatchLimit, Query, Record, SecureStoreProvider, StoreError,
    StoreHandle,
};

#[derive(Debug, Clone)]
struct StoredEntry {
    entry: Entry,
    modified_at: DateTime<Utc>,
}

impl StoredEntry {
    fn matches(&self, query: &Query) -> bool {
        self.entry.service == query.service
            && query.account.as_ref().map_or(true, |a| *a == self.entry.account)
            && query.label.as_ref().map_or(true, |l| *l == self.entry.label)
    }

    fn to_record(&self, with_data: bool) -> Record {
        Record {
            account: self.entry.account.clone(),
            label: self.entry.label.clone(),
            description: self.entry.description.clone(),
            data: with_data.then(|| self.entry.data.clone()),
            modified_at: self.modified_at,
        }
    }
}

struct Container {
    passphrase: Zeroizing<String>,
    locked: bool,
    entries: Vec<StoredEntry>,
}

#[derive(Default)]
struct State {
    default_entries: Vec<StoredEntry>,
    containers: BTreeMap<String, Container>,
    interactive_passphrase: Option<Zeroizing<String>>,
    status_error: Option<StoreError>,
    access_writes: usize,
    lock_calls: Vec<String>,
    unlock_calls: Vec<String>,
    interactive_creates: usize,
}

impl State {
    /// Entries of the container a query or entry points at.  Named
    /// containers must exist and be unlocked.
    fn entries_mut(&mut self, container: Option<&str>) -> Result<&mut Vec<StoredEntry>, StoreError> {
        match container {
            None => Ok(&mut self.default_entries),
            Some(path) => {
                let c = self
                    .containers
                    .get_mut(path)
                    .ok_or_else(|| StoreError::NoSuchContainer(path.to_string()))?;
                if c.locked {
                    return Err(StoreError::Locked(path.to_string()));
                }
                Ok(&mut c.entries)
            }
        }
    }

    fn container_mut(&mut self, path: &str) -> Result<&mut Container, StoreError> {
        self.containers
            .get_mut(path)
            .ok_or_else(|| StoreError::NoSuchContainer(path.to_string()))
    }

    fn insert_container(&mut self, path: &str, passphrase: &str) -> Result<StoreHandle, StoreError> {
        if self.containers.contains_key(path) {
            return Err(StoreError::Duplicate);
        }
        self.containers.insert(
            path.to_string(),
            Container {
                passphrase: Zeroizing::new(passphrase.to_string()),
                locked: false,
                entries: Vec::new(),
            },
        );
        Ok(StoreHandle::new(path))
    }
}

/// Thread-safe in-memory implementation of [`SecureStoreProvider`].
#[derive(Default)]
pub struct MemoryProvider {
    state: Mutex<State>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-create an unlocked container.
    pub fn with_container(self, path: &str, passphrase: &str) -> Self {
        // Duplicate paths keep the first container.
        let _ = self.state().insert_container(path, passphrase);
        self
    }

    /// Passphrase "typed" whenever the provider has to prompt during
    /// interactive creation.  Without one, interactive creation is
    /// reported as cancelled.
    pub fn with_interactive_passphrase(self, passphrase: &str) -> Self {
        self.state().interactive_passphrase = Some(Zeroizing::new(passphrase.to_string()));
        self
    }

    /// Make every `status` call fail with `error`.
    pub fn with_status_error(self, error: StoreError) -> Self {
        self.state().status_error = Some(error);
        self
    }

    /// Number of `add`/`update` calls that wrote an access-control record.
    pub fn access_writes(&self) -> usize {
        self.state().access_writes
    }

    /// Paths passed to `lock`, in call order.
    pub fn lock_calls(&self) -> Vec<String> {
        self.state().lock_calls.clone()
    }

    /// Paths passed to `unlock`, in call order.
    pub fn unlock_calls(&self) -> Vec<String> {
        self.state().unlock_calls.clone()
    }

    pub fn interactive_creates(&self) -> usize {
        self.state().interactive_creates
    }

    pub fn contains_container(&self, path: &str) -> bool {
        self.state().containers.contains_key(path)
    }

    pub fn is_locked(&self, path: &str) -> Option<bool> {
        self.state().containers.get(path).map(|c| c.locked)
    }

    /// The passphrase a container was created with.
    pub fn passphrase_of(&self, path: &str) -> Option<String> {
        self.state()
            .containers
            .get(path)
            .map(|c| c.passphrase.as_str().to_string())
    }

    /// Snapshot of the entries in a container (`None` = default), ignoring
    /// the lock flag.
    pub fn entries(&self, container: Option<&str>) -> Vec<Entry> {
        let state = self.state();
        let stored = match container {
            None => Some(&state.default_entries),
            Some(path) => state.containers.get(path).map(|c| &c.entries),
        };
        stored
            .map(|entries| entries.iter().map(|s| s.entry.clone()).collect())
            .unwrap_or_default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SecureStoreProvider for MemoryProvider {
    fn status(&self, path: &str) -> Result<ContainerStatus, StoreError> {
        let state = self.state();
        if let Some(err) = &state.status_error {
            return Err(err.clone());
        }
        if state.containers.contains_key(path) {
            Ok(ContainerStatus::Exists)
        } else {
            Ok(ContainerStatus::Absent)
        }
    }

    fn query(&self, query: &Query) -> Result<Vec<Record>, StoreError> {
        let mut state = self.state();
        let entries = state.entries_mut(query.container.as_deref())?;

        let matched = entries.iter().filter(|e| e.matches(query));
        let records: Vec<Record> = match query.limit {
            MatchLimit::One => matched.take(1).map(|e| e.to_record(query.return_data)).collect(),
            MatchLimit::All => matched.map(|e| e.to_record(query.return_data)).collect(),
        };

        if records.is_empty() {
            return Err(StoreError::ItemNotFound);
        }
        Ok(records)
    }

    fn create(&self, path: &str, passphrase: &str) -> Result<StoreHandle, StoreError> {
        self.state().insert_container(path, passphrase)
    }

    fn create_interactive(&self, path: &str) -> Result<StoreHandle, StoreError> {
        let mut state = self.state();
        let passphrase = state
            .interactive_passphrase
            .clone()
            .ok_or_else(|| StoreError::Other("user canceled the operation".into()))?;
        state.interactive_creates += 1;
        state.insert_container(path, &passphrase)
    }

    fn add(&self, entry: &Entry) -> Result<(), StoreError> {
        let mut state = self.state();
        let entries = state.entries_mut(entry.container.as_deref())?;

        if entries
            .iter()
            .any(|e| e.entry.service == entry.service && e.entry.account == entry.account)
        {
            return Err(StoreError::Duplicate);
        }

        entries.push(StoredEntry {
            entry: entry.clone(),
            modified_at: Utc::now(),
        });

        if entry.access.is_some() {
            state.access_writes += 1;
        }
        Ok(())
    }

    fn update(&self, query: &Query, changes: &Entry) -> Result<(), StoreError> {
        let mut state = self.state();
        let entries = state.entries_mut(query.container.as_deref())?;

        let stored = entries
            .iter_mut()
            .find(|e| e.matches(query))
            .ok_or(StoreError::ItemNotFound)?;

        stored.entry.label = changes.label.clone();
        stored.entry.description = changes.description.clone();
        stored.entry.data = changes.data.clone();
        stored.entry.synchronizable = changes.synchronizable;
        stored.entry.accessibility = changes.accessibility;
        stored.modified_at = Utc::now();

        if let Some(access) = &changes.access {
            stored.entry.access = Some(access.clone());
            state.access_writes += 1;
        }
        Ok(())
    }

    fn delete(&self, query: &Query) -> Result<(), StoreError> {
        let mut state = self.state();
        let entries = state.entries_mut(query.container.as_deref())?;

        let before = entries.len();
        entries.retain(|e| !e.matches(query));
        if entries.len() == before {
            return Err(StoreError::ItemNotFound);
        }
        Ok(())
    }

    fn lock(&self, path: &str) -> Result<(), StoreError> {
        let mut state = self.state();
        state.lock_calls.push(path.to_string());
        state.container_mut(path)?.locked = true;
        Ok(())
    }

    fn unlock(&self, path: &str, passphrase: &str) -> Result<(), StoreError> {
        let mut state = self.state();
        state.unlock_calls.push(path.to_string());
        let container = state.container_mut(path)?;
        if container.passphrase.as_str() != passphrase {
            return Err(StoreError::BadPassphrase(path.to_string()));
        }
        container.locked = false;
        Ok(())
    }
}
