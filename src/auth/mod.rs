//! Collaborators that talk to the user.
//!
//! - `BiometricAuthenticator` — one yes/no biometric challenge
//! - `SecretReader` — masked terminal input used by biometric setup
//! - `PasswordFn` — passphrase supplier for newly created keychains
//!
//! The terminal implementations go through `dialoguer`, so input is
//! never echoed.

use std::sync::Arc;

use zeroize::Zeroizing;

use crate::errors::{KeyguardError, Result};

/// Passphrase supplier: receives a prompt, returns the passphrase.
pub type PasswordFn = Arc<dyn Fn(&str) -> Result<Zeroizing<String>> + Send + Sync>;

/// Platform biometric check (e.g. a fingerprint sensor).
///
/// `Ok(false)` is a declined challenge; timeouts are the implementation's
/// business and surface as either `Ok(false)` or an error.
pub trait BiometricAuthenticator: Send + Sync {
    fn authenticate(&self, prompt: &str) -> Result<bool>;
}

impl<T: BiometricAuthenticator + ?Sized> BiometricAuthenticator for Arc<T> {
    fn authenticate(&self, prompt: &str) -> Result<bool> {
        (**self).authenticate(prompt)
    }
}

/// Reads a secret line without echoing it.
pub trait SecretReader: Send + Sync {
    fn read_secret(&self, prompt: &str) -> Result<Zeroizing<String>>;
}

impl<T: SecretReader + ?Sized> SecretReader for Arc<T> {
    fn read_secret(&self, prompt: &str) -> Result<Zeroizing<String>> {
        (**self).read_secret(prompt)
    }
}

/// Masked terminal input.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalReader;

impl SecretReader for TerminalReader {
    fn read_secret(&self, prompt: &str) -> Result<Zeroizing<String>> {
        read_password(prompt)
    }
}

/// A `PasswordFn` that asks on the terminal.
pub fn terminal_password_prompt() -> PasswordFn {
    Arc::new(read_password)
}

fn read_password(prompt: &str) -> Result<Zeroizing<String>> {
    let pw = dialoguer::Password::new()
        .with_prompt(prompt)
        .interact()
        .map_err(|e| KeyguardError::Prompt(format!("password prompt: {e}")))?;
    Ok(Zeroizing::new(pw))
}
