use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::APP_NAME;

/// Durable key-value slots backed by one JSON file per key under the
/// app data directory. The localStorage equivalent: a read of a missing
/// or corrupt slot is "no prior state", never an error.
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn new() -> Result<Self> {
        Self::at(Self::data_dir())
    }

    /// Root an instance at an explicit directory (tests point this at a
    /// temp dir).
    pub fn at(root: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create data directory: {}", root.display()))?;
        Ok(Self { root })
    }

    fn data_dir() -> PathBuf {
        let base = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").expect("HOME not set");
                PathBuf::from(home).join(".local/share")
            });
        base.join(APP_NAME)
    }

    fn slot_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", key))
    }

    /// Read and deserialize a slot. Absent or unparseable contents fall
    /// back to `None`; the parse failure is logged and recovered from.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let path = self.slot_path(key);
        let raw = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Discarding corrupt state in {}: {}", path.display(), e);
                None
            }
        }
    }

    pub fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let path = self.slot_path(key);
        let json = serde_json::to_string(value)?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }
}
