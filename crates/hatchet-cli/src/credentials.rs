//! Hatchet passwords in the OS keychain.
//!
//! Entries are keyed by username and by the auth endpoint, so a password
//! saved against a staging server never gets sent to production.

use anyhow::{Context, Result};
use hatchet_core::config::AUTH_BASE_URL;
use keyring::Entry;

use crate::config::Config;

/// Keychain service name for the production endpoint
const SERVICE_NAME: &str = "hatchet";

/// Keychain entry for one user against one auth endpoint.
pub struct CredentialStore {
    entry: Entry,
}

impl CredentialStore {
    pub fn open(config: &Config, username: &str) -> Result<Self> {
        let service = keychain_service(&config.service().auth_base_url);
        let entry = Entry::new(&service, username)
            .with_context(|| format!("Failed to open keychain entry for {}", username))?;
        Ok(Self { entry })
    }

    /// Store the password, replacing any previous one
    pub fn store(&self, password: &str) -> Result<()> {
        self.entry
            .set_password(password)
            .context("Failed to store password in keychain")
    }

    /// Saved password, or `None` when nothing is stored for this user.
    /// Keychain failures other than a missing entry are errors.
    pub fn password(&self) -> Result<Option<String>> {
        match self.entry.get_password() {
            Ok(password) => Ok(Some(password)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to read password from keychain"),
        }
    }

    /// Returns false if there was nothing to delete
    pub fn delete(&self) -> Result<bool> {
        match self.entry.delete_credential() {
            Ok(()) => Ok(true),
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(e) => Err(e).context("Failed to delete password from keychain"),
        }
    }
}

fn keychain_service(auth_base_url: &str) -> String {
    let base = auth_base_url.trim_end_matches('/');
    if base == AUTH_BASE_URL.trim_end_matches('/') {
        SERVICE_NAME.to_string()
    } else {
        format!("{}@{}", SERVICE_NAME, base)
    }
}
