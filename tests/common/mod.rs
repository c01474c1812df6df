//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use keyguard::auth::{BiometricAuthenticator, PasswordFn, SecretReader};
use keyguard::provider::MemoryProvider;
use keyguard::{BackendConfig, KeychainBackend, KeyguardError, Result};
use zeroize::Zeroizing;

pub const KEYCHAIN: &str = "work";
pub const KEYCHAIN_PATH: &str = "work.keychain";

/// Authenticator that answers from a script and counts challenges.
/// Once the script runs out it keeps giving the last answer.
pub struct ScriptedAuthenticator {
    answers: Mutex<Vec<bool>>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedAuthenticator {
    pub fn approving() -> Arc<Self> {
        Self::answering(&[true])
    }

    pub fn declining() -> Arc<Self> {
        Self::answering(&[false])
    }

    pub fn answering(answers: &[bool]) -> Arc<Self> {
        Arc::new(Self {
            answers: Mutex::new(answers.iter().rev().copied().collect()),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl BiometricAuthenticator for ScriptedAuthenticator {
    fn authenticate(&self, prompt: &str) -> Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        let mut answers = self.answers.lock().unwrap();
        if answers.len() > 1 {
            Ok(answers.pop().unwrap())
        } else {
            Ok(answers.last().copied().unwrap_or(false))
        }
    }
}

/// Masked reader that "types" a fixed passphrase.
pub struct ScriptedReader {
    passphrase: Option<&'static str>,
    reads: AtomicUsize,
}

impl ScriptedReader {
    pub fn typing(passphrase: &'static str) -> Arc<Self> {
        Arc::new(Self {
            passphrase: Some(passphrase),
            reads: AtomicUsize::new(0),
        })
    }

    /// Reader that fails every read, for flows that must not prompt.
    pub fn silent() -> Arc<Self> {
        Arc::new(Self {
            passphrase: None,
            reads: AtomicUsize::new(0),
        })
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl SecretReader for ScriptedReader {
    fn read_secret(&self, _prompt: &str) -> Result<Zeroizing<String>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.passphrase
            .map(|p| Zeroizing::new(p.to_string()))
            .ok_or_else(|| KeyguardError::Prompt("no terminal".into()))
    }
}

/// Passphrase supplier returning `passphrase` and counting calls.
pub fn supplier(passphrase: &'static str, calls: Arc<AtomicUsize>) -> PasswordFn {
    Arc::new(move |_prompt: &str| -> Result<Zeroizing<String>> {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(Zeroizing::new(passphrase.to_string()))
    })
}

pub type TestBackend =
    KeychainBackend<Arc<MemoryProvider>, Arc<ScriptedAuthenticator>, Arc<ScriptedReader>>;

pub fn backend(
    config: BackendConfig,
    provider: &Arc<MemoryProvider>,
    authenticator: &Arc<ScriptedAuthenticator>,
    reader: &Arc<ScriptedReader>,
) -> TestBackend {
    KeychainBackend::new(config, Arc::clone(provider), Arc::clone(authenticator))
        .with_reader(Arc::clone(reader))
}
