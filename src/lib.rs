pub mod auth;
pub mod backend;
pub mod config;
pub mod errors;
pub mod output;
pub mod provider;

pub use backend::{Item, KeychainBackend, Keyring, Metadata};
pub use config::{BackendConfig, Settings};
pub use errors::{KeyguardError, Result};
