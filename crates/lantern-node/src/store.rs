//! JSON-file backed alias persistence

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, warn};

use lantern_core::{clamp_alias, AliasStore};

#[derive(Debug, Serialize, Deserialize, Default)]
struct Persisted {
    alias: String,
}

/// Stores the local nickname in a small JSON file next to the node
pub struct JsonAliasStore {
    path: PathBuf,
}

impl JsonAliasStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    async fn read(&self) -> Option<Persisted> {
        let raw = tokio::fs::read(&self.path).await.ok()?;
        match serde_json::from_slice(&raw) {
            Ok(persisted) => Some(persisted),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "State file unreadable, ignoring");
                None
            }
        }
    }
}

#[async_trait]
impl AliasStore for JsonAliasStore {
    async fn load_alias(&self) -> Option<String> {
        let persisted = self.read().await?;
        if persisted.alias.is_empty() {
            None
        } else {
            Some(persisted.alias)
        }
    }

    async fn save_alias(&self, alias: &str) -> bool {
        let alias = clamp_alias(alias);
        if self.read().await.map(|p| p.alias == alias).unwrap_or(false) {
            return true;
        }
        let persisted = Persisted {
            alias: alias.to_string(),
        };
        let json = match serde_json::to_vec_pretty(&persisted) {
            Ok(json) => json,
            Err(err) => {
                warn!(error = %err, "Cannot serialize state");
                return false;
            }
        };
        match tokio::fs::write(&self.path, json).await {
            Ok(()) => {
                debug!(path = %self.path.display(), alias, "Alias saved");
                true
            }
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "Cannot write state file");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_then_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonAliasStore::new(dir.path().join("node.json"));
        assert_eq!(store.load_alias().await, None);
        assert!(store.save_alias("remy").await);
        assert_eq!(store.load_alias().await, Some("remy".to_string()));
    }

    #[tokio::test]
    async fn test_save_clamps_long_alias() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonAliasStore::new(dir.path().join("node.json"));
        assert!(store.save_alias("a-name-far-longer-than-sixteen").await);
        assert_eq!(store.load_alias().await, Some("a-name-far-longe".to_string()));
    }

    #[tokio::test]
    async fn test_corrupt_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.json");
        tokio::fs::write(&path, b"not json").await.unwrap();
        let store = JsonAliasStore::new(path);
        assert_eq!(store.load_alias().await, None);
    }
}
