//! Create-or-open for named keychains.
//!
//! A write needs a usable keychain.  If the keychain exists it is opened
//! through the biometric gate; if the provider says it does not, it is
//! created.  The two branches are never both tried on one call.

use tracing::{debug, info};

use crate::auth::{BiometricAuthenticator, SecretReader};
use crate::errors::{KeyguardError, Result};
use crate::provider::{ContainerStatus, SecureStoreProvider, StoreHandle};

use super::KeychainBackend;

/// Prompt handed to the configured passphrase supplier.
const NEW_KEYCHAIN_PROMPT: &str = "Enter passphrase for keychain";

impl<P, A, R> KeychainBackend<P, A, R>
where
    P: SecureStoreProvider,
    A: BiometricAuthenticator,
    R: SecretReader,
{
    pub(super) fn create_or_open(&mut self, path: &str) -> Result<StoreHandle> {
        debug!(keychain = path, "Checking keychain status");
        let status = self
            .provider
            .status(path)
            .map_err(|e| KeyguardError::provider(format!("checking status of {path}"), e))?;

        if status == ContainerStatus::Exists {
            info!(keychain = path, "Opening keychain with biometrics");
            return self
                .gate
                .open(path, &self.provider, &self.authenticator, &self.reader);
        }

        match &self.config.password_supplier {
            None => {
                debug!(keychain = path, "Creating keychain with prompt");
                self.provider
                    .create_interactive(path)
                    .map_err(|e| KeyguardError::provider(format!("creating {path}"), e))
            }
            Some(supplier) => {
                let passphrase = supplier(NEW_KEYCHAIN_PROMPT)?;
                debug!(keychain = path, "Creating keychain with provided password");
                self.provider
                    .create(path, &passphrase)
                    .map_err(|e| KeyguardError::provider(format!("creating {path}"), e))
            }
        }
    }
}
