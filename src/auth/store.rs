//! Secret storage abstraction and built-in backends.
//!
//! The host's secret vault is modeled as an async key/value store of opaque
//! string blobs. Hosts with a native vault adapt it to [`SecretStore`];
//! everything else can use the file-backed implementation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use super::error::AuthError;

/// Storage abstraction for persisted secrets.
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, AuthError>;
    async fn store(&self, key: &str, value: &str) -> Result<(), AuthError>;
    async fn delete(&self, key: &str) -> Result<(), AuthError>;
}

/// Ephemeral in-memory store for tests and hosts that manage persistence
/// themselves.
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn get(&self, key: &str) -> Result<Option<String>, AuthError> {
        Ok(self
            .entries
            .lock()
            .expect("secret map poisoned")
            .get(key)
            .cloned())
    }

    async fn store(&self, key: &str, value: &str) -> Result<(), AuthError> {
        self.entries
            .lock()
            .expect("secret map poisoned")
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), AuthError> {
        self.entries
            .lock()
            .expect("secret map poisoned")
            .remove(key);
        Ok(())
    }
}

/// File-backed store: one file per key under a base directory, written with
/// owner-only permissions on Unix.
#[derive(Debug, Clone)]
pub struct FileSecretStore {
    base_dir: PathBuf,
}

impl FileSecretStore {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Store rooted at `~/.feima` (falling back to the working directory
    /// when no home is known).
    pub fn new_default() -> Self {
        Self {
            base_dir: default_secret_dir(),
        }
    }

    fn secret_path(&self, key: &str) -> PathBuf {
        self.base_dir.join(format!("{}.json", normalize_key(key)))
    }

    async fn ensure_parent(path: &Path) -> Result<(), AuthError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl SecretStore for FileSecretStore {
    async fn get(&self, key: &str) -> Result<Option<String>, AuthError> {
        let path = self.secret_path(key);
        match tokio::fs::read_to_string(&path).await {
            Ok(data) => Ok(Some(data)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(AuthError::Store(err.to_string())),
        }
    }

    async fn store(&self, key: &str, value: &str) -> Result<(), AuthError> {
        let path = self.secret_path(key);
        Self::ensure_parent(&path).await?;
        tokio::fs::write(&path, value).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600)).await?;
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), AuthError> {
        let path = self.secret_path(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(AuthError::Store(err.to_string())),
        }
    }
}

fn default_secret_dir() -> PathBuf {
    directories::UserDirs::new()
        .map(|dirs| dirs.home_dir().join(".feima"))
        .unwrap_or_else(|| PathBuf::from(".feima"))
}

/// Keys become file names; anything outside `[a-z0-9.-]` is replaced.
fn normalize_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for ch in key.chars() {
        let lower = ch.to_ascii_lowercase();
        if lower.is_ascii_alphanumeric() || lower == '-' || lower == '.' {
            out.push(lower);
        } else {
            out.push('-');
        }
    }
    out
}
