//! Backend configuration.
//!
//! `BackendConfig` is what a backend is built from.  `Settings` is the
//! on-disk `keyguard.toml` form of the same knobs.

pub mod settings;

use std::fmt;

use crate::auth::PasswordFn;

pub use settings::Settings;

/// Suffix the platform expects on keychain container files.
const KEYCHAIN_SUFFIX: &str = ".keychain";

/// Immutable configuration of one backend instance.
#[derive(Clone)]
pub struct BackendConfig {
    /// Service attribute shared by every item this backend writes.
    pub service_name: String,

    /// Named container to use instead of the provider's default one.
    pub keychain_name: Option<String>,

    /// Supplies the passphrase for a newly created container.  When unset,
    /// the provider prompts for it itself.
    pub password_supplier: Option<PasswordFn>,

    pub accessible_when_unlocked: bool,

    pub trust_application: bool,

    pub synchronizable: bool,
}

impl BackendConfig {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            keychain_name: None,
            password_supplier: None,
            accessible_when_unlocked: false,
            trust_application: false,
            synchronizable: false,
        }
    }

    pub fn with_keychain(mut self, name: impl Into<String>) -> Self {
        self.keychain_name = Some(name.into());
        self
    }

    pub fn with_password_supplier(mut self, supplier: PasswordFn) -> Self {
        self.password_supplier = Some(supplier);
        self
    }

    pub fn with_accessible_when_unlocked(mut self, enabled: bool) -> Self {
        self.accessible_when_unlocked = enabled;
        self
    }

    pub fn with_trust_application(mut self, enabled: bool) -> Self {
        self.trust_application = enabled;
        self
    }

    pub fn with_synchronizable(mut self, enabled: bool) -> Self {
        self.synchronizable = enabled;
        self
    }

    /// Container path, e.g. `work.keychain`.  `None` means the provider's
    /// default container.
    pub fn keychain_path(&self) -> Option<String> {
        self.keychain_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .map(|name| format!("{name}{KEYCHAIN_SUFFIX}"))
    }
}

impl fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendConfig")
            .field("service_name", &self.service_name)
            .field("keychain_name", &self.keychain_name)
            .field("password_supplier", &self.password_supplier.is_some())
            .field("accessible_when_unlocked", &self.accessible_when_unlocked)
            .field("trust_application", &self.trust_application)
            .field("synchronizable", &self.synchronizable)
            .finish()
    }
}
