//! Biometric gate for named keychains.
//!
//! The first write to an existing keychain asks the authenticator once.
//! After a successful challenge the keychain's passphrase is recovered
//! from a reserved entry in the default keychain and used to unlock it.
//! When no such entry exists yet, the user types the passphrase once and
//! it is stored there for the next run.
//!
//! The gate never resets: once `Authenticated`, later calls on the same
//! backend go straight to the handle.

use tracing::{debug, info, warn};
use zeroize::{Zeroize, Zeroizing};

use crate::auth::{BiometricAuthenticator, SecretReader};
use crate::errors::{KeyguardError, Result};
use crate::output;
use crate::provider::{
    Accessibility, Entry, Query, Record, SecureStoreProvider, StoreError, StoreHandle,
    Synchronizable,
};

/// Service of the reserved entry holding biometric-protected passphrases.
pub const BIOMETRICS_SERVICE: &str = "keyguard.biometrics";

/// Account of the reserved entry.
pub const BIOMETRICS_ACCOUNT: &str = "passphrase";

/// Label of the reserved entry for the keychain at `path`.
pub fn biometrics_label(path: &str) -> String {
    format!("Passphrase for {path}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Unauthenticated,
    /// A challenge is in flight.
    Authenticating,
    Authenticated,
}

/// Per-backend authentication state.
pub struct BiometricGate {
    state: GateState,
    passphrase: Option<Zeroizing<String>>,
}

impl Default for BiometricGate {
    fn default() -> Self {
        Self::new()
    }
}

impl BiometricGate {
    pub fn new() -> Self {
        Self {
            state: GateState::Unauthenticated,
            passphrase: None,
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    /// Whether a keychain passphrase has been recovered and cached.
    pub fn has_cached_passphrase(&self) -> bool {
        self.passphrase.is_some()
    }

    /// Return a handle to the keychain at `path`, authenticating and
    /// unlocking it first if this is the first call on this gate.
    pub fn open(
        &mut self,
        path: &str,
        provider: &dyn SecureStoreProvider,
        authenticator: &dyn BiometricAuthenticator,
        reader: &dyn SecretReader,
    ) -> Result<StoreHandle> {
        if self.state != GateState::Authenticated {
            self.challenge(path, authenticator)?;

            info!(keychain = path, "Looking up passphrase stored in default keychain");
            match self.stored_passphrase(path, provider)? {
                Some(passphrase) => {
                    info!(keychain = path, "Found stored passphrase, unlocking keychain");
                    provider
                        .unlock(path, &passphrase)
                        .map_err(|e| KeyguardError::provider(format!("unlocking {path}"), e))?;
                    self.passphrase = Some(passphrase);
                }
                None => self.setup(path, provider, reader)?,
            }
        }

        Ok(StoreHandle::new(path))
    }

    fn challenge(&mut self, path: &str, authenticator: &dyn BiometricAuthenticator) -> Result<()> {
        info!(keychain = path, "Checking biometrics");
        self.state = GateState::Authenticating;

        match authenticator.authenticate(&format!("unlock {path}")) {
            Ok(true) => {
                self.state = GateState::Authenticated;
                Ok(())
            }
            outcome => {
                if let Err(e) = outcome {
                    debug!(error = %e, "Biometric authenticator returned an error");
                }
                self.state = GateState::Unauthenticated;
                Err(KeyguardError::AuthenticationFailed(path.to_string()))
            }
        }
    }

    /// The passphrase stored for `path`, if exactly one entry holds it.
    fn stored_passphrase(
        &self,
        path: &str,
        provider: &dyn SecureStoreProvider,
    ) -> Result<Option<Zeroizing<String>>> {
        let query = Query::new(BIOMETRICS_SERVICE)
            .account(BIOMETRICS_ACCOUNT)
            .label(biometrics_label(path))
            .with_data();

        let records = match provider.query(&query) {
            Ok(records) => records,
            Err(StoreError::ItemNotFound) => Vec::new(),
            Err(e) => {
                return Err(KeyguardError::provider(
                    format!("looking up stored passphrase for {path}"),
                    e,
                ))
            }
        };

        match records.as_slice() {
            [record] => passphrase_from(record).map(Some),
            _ => {
                debug!(keychain = path, found = records.len(), "No single stored passphrase");
                Ok(None)
            }
        }
    }

    /// Ask for the keychain passphrase, verify it by unlocking, and store it
    /// in the reserved entry.
    fn setup(
        &mut self,
        path: &str,
        provider: &dyn SecureStoreProvider,
        reader: &dyn SecretReader,
    ) -> Result<()> {
        output::info(
            "To use biometrics for authentication, your keychain password needs to be stored in your default keychain.",
        );
        output::tip("You will be prompted for your password.");

        let passphrase = reader.read_secret(&format!("Password for {path:?}"))?;

        // An already-unlocked keychain would accept any password.
        info!(keychain = path, "Locking keychain");
        if let Err(e) = provider.lock(path) {
            warn!(keychain = path, error = %e, "Failed to lock keychain");
        }

        info!(keychain = path, "Unlocking keychain");
        provider
            .unlock(path, &passphrase)
            .map_err(|e| KeyguardError::provider(format!("unlocking {path}"), e))?;

        let mut entry = Entry {
            container: None,
            service: BIOMETRICS_SERVICE.to_string(),
            account: BIOMETRICS_ACCOUNT.to_string(),
            label: biometrics_label(path),
            data: passphrase.as_bytes().to_vec(),
            synchronizable: Synchronizable::No,
            accessibility: Accessibility::WhenUnlocked,
            ..Entry::default()
        };
        self.passphrase = Some(passphrase);

        info!(
            service = BIOMETRICS_SERVICE,
            account = BIOMETRICS_ACCOUNT,
            "Storing keychain passphrase in default keychain"
        );
        let added = provider.add(&entry);
        entry.data.zeroize();

        added.map_err(|e| {
            KeyguardError::provider(format!("storing biometric passphrase for {path}"), e)
        })
    }
}

fn passphrase_from(record: &Record) -> Result<Zeroizing<String>> {
    let bytes = record.data.clone().unwrap_or_default();
    String::from_utf8(bytes).map(Zeroizing::new).map_err(|e| {
        let mut bad_bytes = e.into_bytes();
        bad_bytes.zeroize();
        KeyguardError::Consistency("stored passphrase is not valid UTF-8".into())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MemoryProvider;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed {
        answer: bool,
        calls: AtomicUsize,
    }

    impl Fixed {
        fn new(answer: bool) -> Self {
            Self {
                answer,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl BiometricAuthenticator for Fixed {
        fn authenticate(&self, prompt: &str) -> Result<bool> {
            assert_eq!(prompt, "unlock work.keychain");
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.answer)
        }
    }

    struct Typed(&'static str);

    impl SecretReader for Typed {
        fn read_secret(&self, _prompt: &str) -> Result<Zeroizing<String>> {
            Ok(Zeroizing::new(self.0.to_string()))
        }
    }

    struct NoTerminal;

    impl SecretReader for NoTerminal {
        fn read_secret(&self, _prompt: &str) -> Result<Zeroizing<String>> {
            panic!("terminal must not be read");
        }
    }

    const PATH: &str = "work.keychain";

    #[test]
    fn declined_challenge_stays_unauthenticated() {
        let provider = MemoryProvider::new().with_container(PATH, "pw");
        let auth = Fixed::new(false);
        let mut gate = BiometricGate::new();

        let result = gate.open(PATH, &provider, &auth, &NoTerminal);
        assert!(matches!(result, Err(KeyguardError::AuthenticationFailed(_))));
        assert_eq!(gate.state(), GateState::Unauthenticated);
        assert!(!gate.has_cached_passphrase());
    }

    #[test]
    fn authenticator_error_is_authentication_failure() {
        struct Broken;
        impl BiometricAuthenticator for Broken {
            fn authenticate(&self, _prompt: &str) -> Result<bool> {
                Err(KeyguardError::Prompt("sensor unavailable".into()))
            }
        }

        let provider = MemoryProvider::new().with_container(PATH, "pw");
        let mut gate = BiometricGate::new();
        let result = gate.open(PATH, &provider, &Broken, &NoTerminal);
        assert!(matches!(result, Err(KeyguardError::AuthenticationFailed(_))));
        assert_eq!(gate.state(), GateState::Unauthenticated);
    }

    #[test]
    fn setup_locks_unlocks_and_stores_passphrase() {
        let provider = MemoryProvider::new().with_container(PATH, "secret2");
        let auth = Fixed::new(true);
        let mut gate = BiometricGate::new();

        let handle = gate.open(PATH, &provider, &auth, &Typed("secret2")).unwrap();
        assert_eq!(handle.path(), PATH);
        assert_eq!(gate.state(), GateState::Authenticated);
        assert!(gate.has_cached_passphrase());
        assert_eq!(provider.lock_calls(), vec![PATH.to_string()]);
        assert_eq!(provider.unlock_calls(), vec![PATH.to_string()]);
        assert_eq!(provider.is_locked(PATH), Some(false));

        let stored = provider.entries(None);
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].service, BIOMETRICS_SERVICE);
        assert_eq!(stored[0].account, BIOMETRICS_ACCOUNT);
        assert_eq!(stored[0].label, "Passphrase for work.keychain");
        assert_eq!(stored[0].data, b"secret2");
        assert_eq!(stored[0].synchronizable, Synchronizable::No);
        assert_eq!(stored[0].accessibility, Accessibility::WhenUnlocked);
    }

    #[test]
    fn setup_with_wrong_passphrase_fails_but_stays_authenticated() {
        let provider = MemoryProvider::new().with_container(PATH, "right");
        let auth = Fixed::new(true);
        let mut gate = BiometricGate::new();

        let result = gate.open(PATH, &provider, &auth, &Typed("wrong"));
        assert!(matches!(
            result,
            Err(KeyguardError::Provider {
                source: StoreError::BadPassphrase(_),
                ..
            })
        ));
        assert_eq!(gate.state(), GateState::Authenticated);
        assert!(provider.entries(None).is_empty());
    }

    #[test]
    fn stored_passphrase_unlocks_without_terminal() {
        let provider = MemoryProvider::new().with_container(PATH, "stored");
        provider
            .add(&Entry {
                service: BIOMETRICS_SERVICE.into(),
                account: BIOMETRICS_ACCOUNT.into(),
                label: biometrics_label(PATH),
                data: b"stored".to_vec(),
                ..Entry::default()
            })
            .unwrap();
        provider.lock(PATH).unwrap();

        let auth = Fixed::new(true);
        let mut gate = BiometricGate::new();
        gate.open(PATH, &provider, &auth, &NoTerminal).unwrap();

        assert_eq!(provider.is_locked(PATH), Some(false));
        assert!(gate.has_cached_passphrase());
        // Only the lock issued by this test.
        assert_eq!(provider.lock_calls().len(), 1);
    }

    #[test]
    fn second_open_skips_challenge() {
        let provider = MemoryProvider::new().with_container(PATH, "pw");
        let auth = Fixed::new(true);
        let mut gate = BiometricGate::new();

        gate.open(PATH, &provider, &auth, &Typed("pw")).unwrap();
        gate.open(PATH, &provider, &auth, &NoTerminal).unwrap();
        gate.open(PATH, &provider, &auth, &NoTerminal).unwrap();

        assert_eq!(auth.calls.load(Ordering::SeqCst), 1);
        assert_eq!(provider.unlock_calls().len(), 1);
    }
}
