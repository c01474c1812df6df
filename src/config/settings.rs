use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{KeyguardError, Result};

use super::BackendConfig;

/// Backend settings, loaded from `keyguard.toml`.
///
/// Every field has a default so a backend can be built without any
/// config file at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Service attribute written on every item (default: "keyguard").
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Named keychain to use; omit for the default keychain.
    #[serde(default)]
    pub keychain_name: Option<String>,

    /// Items may only be read while the device is unlocked.
    #[serde(default)]
    pub accessible_when_unlocked: bool,

    /// Let this application read its items without a prompt.
    #[serde(default)]
    pub trust_application: bool,

    /// Allow items to replicate outside the local keychain.
    #[serde(default)]
    pub synchronizable: bool,

    /// Ask on the terminal for a new keychain's passphrase instead of
    /// leaving the prompt to the provider.
    #[serde(default)]
    pub prompt_for_passphrase: bool,
}

// ── Serde default helpers ────────────────────────────────────────────

fn default_service_name() -> String {
    "keyguard".to_string()
}

// ── Implementation ───────────────────────────────────────────────────

impl Default for Settings {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            keychain_name: None,
            accessible_when_unlocked: false,
            trust_application: false,
            synchronizable: false,
            prompt_for_passphrase: false,
        }
    }
}

impl Settings {
    /// Name of the config file we look for.
    const FILE_NAME: &'static str = "keyguard.toml";

    /// Load settings from `<dir>/keyguard.toml`.
    ///
    /// If the file does not exist, defaults are returned.
    /// If the file exists but cannot be parsed, an error is returned.
    pub fn load(dir: &Path) -> Result<Self> {
        let config_path = dir.join(Self::FILE_NAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path)?;

        let settings: Settings = toml::from_str(&contents).map_err(|e| {
            KeyguardError::Config(format!("Failed to parse {}: {e}", config_path.display()))
        })?;

        if settings.service_name.is_empty() {
            return Err(KeyguardError::Config(format!(
                "{}: service_name cannot be empty",
                config_path.display()
            )));
        }

        Ok(settings)
    }

    /// Build the backend configuration these settings describe.
    pub fn into_config(self) -> BackendConfig {
        let mut config = BackendConfig::new(self.service_name)
            .with_accessible_when_unlocked(self.accessible_when_unlocked)
            .with_trust_application(self.trust_application)
            .with_synchronizable(self.synchronizable);

        if let Some(name) = self.keychain_name {
            config = config.with_keychain(name);
        }
        if self.prompt_for_passphrase {
            config = config.with_password_supplier(crate::auth::terminal_password_prompt());
        }
        config
    }
}

// ── Tests ────────────────────────────────────────────────────────────
