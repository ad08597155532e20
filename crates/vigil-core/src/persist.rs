//! Persistence collaborator
//!
//! The engine treats storage as an opaque, best-effort key/blob store.
//! A save failure is logged and never fatal; a load failure degrades to
//! empty state. The default implementation writes JSON files under
//! `~/.vigil`.

use crate::types::{AuditEntry, SecurityAlert};
use crate::{Error, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Lifetime counters persisted across restarts
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EngineCounters {
    pub analyses_run: u64,
    pub threats_detected: u64,
    pub attempts_blocked: u64,
}

/// Opaque key/blob persistence for alerts, the audit log, and counters
#[async_trait]
pub trait StatePersistence: Send + Sync {
    async fn load_alerts(&self) -> Result<Vec<SecurityAlert>>;
    async fn save_alerts(&self, alerts: &[SecurityAlert]) -> Result<()>;
    async fn load_audit_log(&self) -> Result<Vec<AuditEntry>>;
    async fn save_audit_log(&self, entries: &[AuditEntry]) -> Result<()>;
    async fn load_counters(&self) -> Result<EngineCounters>;
    async fn save_counters(&self, counters: &EngineCounters) -> Result<()>;
}

/// JSON-file-backed store
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `~/.vigil`, falling back to the working directory
    pub fn default_location() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::new(home.join(".vigil"))
    }

    async fn read_json<T: DeserializeOwned + Default>(&self, name: &str) -> Result<T> {
        let path = self.root.join(name);
        match tokio::fs::read_to_string(&path).await {
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            // Missing state is not an error: first run, or cleared store.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
            Err(e) => Err(Error::Persistence(format!("read {}: {e}", path.display()))),
        }
    }

    async fn write_json<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| Error::Persistence(format!("create {}: {e}", self.root.display())))?;
        let path = self.root.join(name);
        let raw = serde_json::to_string_pretty(value)?;
        tokio::fs::write(&path, raw)
            .await
            .map_err(|e| Error::Persistence(format!("write {}: {e}", path.display())))
    }
}

#[async_trait]
impl StatePersistence for FileStore {
    async fn load_alerts(&self) -> Result<Vec<SecurityAlert>> {
        self.read_json("alerts.json").await
    }

    async fn save_alerts(&self, alerts: &[SecurityAlert]) -> Result<()> {
        self.write_json("alerts.json", &alerts).await
    }

    async fn load_audit_log(&self) -> Result<Vec<AuditEntry>> {
        self.read_json("audit.json").await
    }

    async fn save_audit_log(&self, entries: &[AuditEntry]) -> Result<()> {
        self.write_json("audit.json", &entries).await
    }

    async fn load_counters(&self) -> Result<EngineCounters> {
        self.read_json("counters.json").await
    }

    async fn save_counters(&self, counters: &EngineCounters) -> Result<()> {
        self.write_json("counters.json", counters).await
    }
}

/// No-op store for embedders that manage state themselves
pub struct NullStore;

#[async_trait]
impl StatePersistence for NullStore {
    async fn load_alerts(&self) -> Result<Vec<SecurityAlert>> {
        Ok(Vec::new())
    }

    async fn save_alerts(&self, _alerts: &[SecurityAlert]) -> Result<()> {
        Ok(())
    }

    async fn load_audit_log(&self) -> Result<Vec<AuditEntry>> {
        Ok(Vec::new())
    }

    async fn save_audit_log(&self, _entries: &[AuditEntry]) -> Result<()> {
        Ok(())
    }

    async fn load_counters(&self) -> Result<EngineCounters> {
        Ok(EngineCounters::default())
    }

    async fn save_counters(&self, _counters: &EngineCounters) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AlertSource, AlertType, ThreatLevel};

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let root = std::env::temp_dir().join(format!("vigil-test-{}", uuid::Uuid::new_v4()));
        let store = FileStore::new(&root);

        let alerts = vec![SecurityAlert::new(
            AlertType::PromptInjection,
            ThreatLevel::High,
            "test alert",
            AlertSource::UserPrompt,
        )];
        store.save_alerts(&alerts).await.unwrap();
        let loaded = store.load_alerts().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, alerts[0].id);

        tokio::fs::remove_dir_all(&root).await.ok();
    }

    #[tokio::test]
    async fn test_missing_state_degrades_to_empty() {
        let root = std::env::temp_dir().join(format!("vigil-test-{}", uuid::Uuid::new_v4()));
        let store = FileStore::new(&root);
        assert!(store.load_alerts().await.unwrap().is_empty());
        let counters = store.load_counters().await.unwrap();
        assert_eq!(counters.analyses_run, 0);
    }
}
