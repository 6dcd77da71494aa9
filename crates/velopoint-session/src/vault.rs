//! Durable session storage.
//!
//! The vault is a named-slot string store: one slot for the access
//! credential, one for the refresh token, one for the JSON-serialized
//! session projection. Implementations must write slots durably enough
//! to survive a process restart; the [`SessionStore`](crate::SessionStore)
//! is the only writer.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use velopoint_client::TokenSource;

use crate::error::{Error, Result};

/// Slot holding the bearer access credential.
pub const ACCESS_TOKEN_SLOT: &str = "access_token";

/// Slot holding the refresh token.
pub const REFRESH_TOKEN_SLOT: &str = "refresh_token";

/// Slot holding the JSON session projection (`{user, is_authenticated}`).
pub const SESSION_SLOT: &str = "session";

/// Default vault file name within the data directory.
pub const VAULT_FILE: &str = "session.json";

/// Trait for durable session storage backends.
#[async_trait]
pub trait SessionVault: Send + Sync {
    /// Read a slot. `Ok(None)` when the slot is unset.
    async fn get(&self, slot: &str) -> Result<Option<String>>;

    /// Write a slot.
    async fn set(&self, slot: &str, value: &str) -> Result<()>;

    /// Remove a slot.
    async fn remove(&self, slot: &str) -> Result<()>;

    /// Remove every slot.
    async fn clear(&self) -> Result<()>;
}

/// On-disk representation of the vault.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct VaultFile {
    /// When the file was last written.
    #[serde(default)]
    stored_at: Option<DateTime<Utc>>,
    /// Named string slots.
    #[serde(default)]
    slots: HashMap<String, String>,
}

/// File-based vault for production use.
///
/// Stores all slots in a single JSON file, with an in-memory read cache.
#[derive(Debug)]
pub struct FileVault {
    path: PathBuf,
    cache: RwLock<Option<HashMap<String, String>>>,
}

impl FileVault {
    /// Create a vault storing its file inside `data_dir`.
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(VAULT_FILE),
            cache: RwLock::new(None),
        }
    }

    /// Create a vault with a custom file path.
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            path,
            cache: RwLock::new(None),
        }
    }

    /// Create a vault at the platform's per-user data directory.
    pub fn default_location() -> Result<Self> {
        let base = dirs::data_dir()
            .ok_or_else(|| Error::Vault("no platform data directory".to_string()))?;
        Ok(Self::new(&base.join("velopoint")))
    }

    /// The vault file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load_slots(&self) -> Result<HashMap<String, String>> {
        {
            let cache = self.cache.read().await;
            if let Some(slots) = cache.as_ref() {
                return Ok(slots.clone());
            }
        }

        let slots = if self.path.exists() {
            let content = std::fs::read_to_string(&self.path)
                .map_err(|e| Error::Vault(format!("failed to read {}: {}", self.path.display(), e)))?;
            serde_json::from_str::<VaultFile>(&content)?.slots
        } else {
            HashMap::new()
        };

        let mut cache = self.cache.write().await;
        *cache = Some(slots.clone());
        Ok(slots)
    }

    async fn store_slots(&self, slots: HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Vault(format!("failed to create vault directory: {}", e)))?;
        }

        let file = VaultFile {
            stored_at: Some(Utc::now()),
            slots: slots.clone(),
        };
        let json = serde_json::to_string_pretty(&file)?;
        std::fs::write(&self.path, json)
            .map_err(|e| Error::Vault(format!("failed to write {}: {}", self.path.display(), e)))?;

        let mut cache = self.cache.write().await;
        *cache = Some(slots);
        tracing::debug!(path = %self.path.display(), "session vault written");
        Ok(())
    }
}

#[async_trait]
impl SessionVault for FileVault {
    async fn get(&self, slot: &str) -> Result<Option<String>> {
        Ok(self.load_slots().await?.get(slot).cloned())
    }

    async fn set(&self, slot: &str, value: &str) -> Result<()> {
        let mut slots = self.load_slots().await?;
        slots.insert(slot.to_string(), value.to_string());
        self.store_slots(slots).await
    }

    async fn remove(&self, slot: &str) -> Result<()> {
        let mut slots = self.load_slots().await?;
        if slots.remove(slot).is_some() {
            self.store_slots(slots).await?;
        }
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)
                .map_err(|e| Error::Vault(format!("failed to delete vault file: {}", e)))?;
        }
        let mut cache = self.cache.write().await;
        *cache = None;
        Ok(())
    }
}

/// In-memory vault for testing.
#[derive(Debug, Default)]
pub struct MemoryVault {
    slots: RwLock<HashMap<String, String>>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seed a slot, bypassing the trait.
    pub async fn seed(&self, slot: &str, value: &str) {
        self.slots
            .write()
            .await
            .insert(slot.to_string(), value.to_string());
    }
}

#[async_trait]
impl SessionVault for MemoryVault {
    async fn get(&self, slot: &str) -> Result<Option<String>> {
        Ok(self.slots.read().await.get(slot).cloned())
    }

    async fn set(&self, slot: &str, value: &str) -> Result<()> {
        self.slots
            .write()
            .await
            .insert(slot.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, slot: &str) -> Result<()> {
        self.slots.write().await.remove(slot);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.slots.write().await.clear();
        Ok(())
    }
}

/// Adapter exposing a vault's access-token slot as the client's
/// [`TokenSource`], so requests always carry the credential of the
/// currently persisted session.
#[derive(Clone)]
pub struct VaultTokenSource(pub Arc<dyn SessionVault>);

#[async_trait]
impl TokenSource for VaultTokenSource {
    async fn access_token(&self) -> Option<String> {
        self.0.get(ACCESS_TOKEN_SLOT).await.ok().flatten()
    }
}
