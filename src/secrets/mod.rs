//! Credentials kept in the OS keychain.
//!
//! Each project gets its own keychain service (`minly-<project>`) holding
//! the storage access key, the storage secret key and the shortener
//! signature. Nothing secret is ever written to the config file.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use thiserror::Error;

/// Names of the stored credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecretKey {
    StorageAccessKey,
    StorageSecretKey,
    ShortenerSignature,
}

impl SecretKey {
    pub const ALL: [SecretKey; 3] = [
        SecretKey::StorageAccessKey,
        SecretKey::StorageSecretKey,
        SecretKey::ShortenerSignature,
    ];

    /// Keychain account name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SecretKey::StorageAccessKey => "storage_access_key",
            SecretKey::StorageSecretKey => "storage_secret_key",
            SecretKey::ShortenerSignature => "shortener_signature",
        }
    }

    /// Prompt label.
    pub fn label(&self) -> &'static str {
        match self {
            SecretKey::StorageAccessKey => "Storage access key",
            SecretKey::StorageSecretKey => "Storage secret key",
            SecretKey::ShortenerSignature => "YOURLS signature token",
        }
    }
}

impl fmt::Display for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("secret '{0}' is not set; run `minly new` to configure the project")]
    Missing(SecretKey),

    #[error("secret '{0}' cannot be empty")]
    Empty(SecretKey),

    #[error("keychain access for '{key}' failed")]
    Keyring {
        key: SecretKey,
        #[source]
        source: keyring::Error,
    },
}

/// Backend-independent secret storage.
pub trait SecretStore: Send + Sync {
    fn get(&self, key: SecretKey) -> Result<Option<String>, SecretError>;

    fn set(&self, key: SecretKey, value: &str) -> Result<(), SecretError>;

    /// Returns `false` if nothing was stored under `key`.
    fn delete(&self, key: SecretKey) -> Result<bool, SecretError>;

    fn require(&self, key: SecretKey) -> Result<String, SecretError> {
        self.get(key)?.ok_or(SecretError::Missing(key))
    }

    /// Remove every known secret, returning how many existed.
    fn delete_all(&self) -> Result<usize, SecretError> {
        let mut removed = 0;
        for key in SecretKey::ALL {
            if self.delete(key)? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// OS keychain backend.
#[derive(Debug, Clone)]
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub fn for_project(project: &str) -> Self {
        Self {
            service: format!("{}-{project}", crate::constants::APP_NAME),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    fn entry(&self, key: SecretKey) -> Result<keyring::Entry, SecretError> {
        keyring::Entry::new(&self.service, key.as_str())
            .map_err(|source| SecretError::Keyring { key, source })
    }
}

impl SecretStore for KeyringStore {
    fn get(&self, key: SecretKey) -> Result<Option<String>, SecretError> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(source) => Err(SecretError::Keyring { key, source }),
        }
    }

    fn set(&self, key: SecretKey, value: &str) -> Result<(), SecretError> {
        if value.is_empty() {
            return Err(SecretError::Empty(key));
        }
        self.entry(key)?
            .set_password(value)
            .map_err(|source| SecretError::Keyring { key, source })
    }

    fn delete(&self, key: SecretKey) -> Result<bool, SecretError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) => Ok(true),
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(source) => Err(SecretError::Keyring { key, source }),
        }
    }
}

/// In-memory backend for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<SecretKey, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(values: impl IntoIterator<Item = (SecretKey, impl Into<String>)>) -> Self {
        Self {
            values: Mutex::new(values.into_iter().map(|(k, v)| (k, v.into())).collect()),
        }
    }

    fn values(&self) -> std::sync::MutexGuard<'_, HashMap<SecretKey, String>> {
        self.values.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SecretStore for MemoryStore {
    fn get(&self, key: SecretKey) -> Result<Option<String>, SecretError> {
        Ok(self.values().get(&key).cloned())
    }

    fn set(&self, key: SecretKey, value: &str) -> Result<(), SecretError> {
        if value.is_empty() {
            return Err(SecretError::Empty(key));
        }
        self.values().insert(key, value.to_string());
        Ok(())
    }

    fn delete(&self, key: SecretKey) -> Result<bool, SecretError> {
        Ok(self.values().remove(&key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyring_service_is_per_project() {
        assert_eq!(KeyringStore::for_project("holiday").service(), "minly-holiday");
    }

    #[test]
    fn memory_store_get_set_delete() {
        let store = MemoryStore::new();
        assert_eq!(store.get(SecretKey::StorageAccessKey).unwrap(), None);

        store.set(SecretKey::StorageAccessKey, "AKIA").unwrap();
        assert_eq!(store.require(SecretKey::StorageAccessKey).unwrap(), "AKIA");

        assert!(store.delete(SecretKey::StorageAccessKey).unwrap());
        assert!(!store.delete(SecretKey::StorageAccessKey).unwrap());
    }

    #[test]
    fn require_reports_missing_key() {
        let err = MemoryStore::new()
            .require(SecretKey::ShortenerSignature)
            .unwrap_err();
        assert!(matches!(err, SecretError::Missing(SecretKey::ShortenerSignature)));
        assert!(err.to_string().contains("shortener_signature"));
    }

    #[test]
    fn empty_values_are_rejected() {
        let err = MemoryStore::new().set(SecretKey::StorageSecretKey, "").unwrap_err();
        assert!(matches!(err, SecretError::Empty(_)));
    }

    #[test]
    fn delete_all_counts_existing() {
        let store = MemoryStore::with([
            (SecretKey::StorageAccessKey, "a"),
            (SecretKey::ShortenerSignature, "s"),
        ]);
        assert_eq!(store.delete_all().unwrap(), 2);
        assert_eq!(store.delete_all().unwrap(), 0);
    }
}
