//! Access policy encoding.
//!
//! Folds the backend configuration and an item's override flags into the
//! attributes written on a new entry.

use crate::config::BackendConfig;
use crate::provider::{AccessControl, Accessibility, Synchronizable};

use super::item::Item;

/// Effective access settings for one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessPolicy {
    pub synchronizable: bool,
    pub accessible_when_unlocked: bool,
    pub trusted: bool,
}

impl AccessPolicy {
    /// Combine backend-wide settings with the item's opt-outs.  Items can
    /// only narrow synchronization and trust; accessibility is backend-wide.
    pub fn resolve(config: &BackendConfig, item: &Item) -> Self {
        Self {
            synchronizable: config.synchronizable && !item.not_synchronizable,
            accessible_when_unlocked: config.accessible_when_unlocked,
            trusted: config.trust_application && !item.not_trusted,
        }
    }

    /// Only an effective "yes" is written; otherwise the provider default stays.
    pub fn synchronizable_attr(&self) -> Synchronizable {
        if self.synchronizable {
            Synchronizable::Yes
        } else {
            Synchronizable::Default
        }
    }

    pub fn accessibility_attr(&self) -> Accessibility {
        if self.accessible_when_unlocked {
            Accessibility::WhenUnlocked
        } else {
            Accessibility::Default
        }
    }

    /// Access record attached when the entry is created.
    ///
    /// Trusted: no application list, so the platform's default trust
    /// applies to the creating application.  Untrusted: an explicitly
    /// empty list, so every read prompts.
    pub fn access_control(&self, label: &str) -> AccessControl {
        AccessControl {
            label: label.to_string(),
            trusted_applications: if self.trusted { None } else { Some(Vec::new()) },
        }
    }
}
