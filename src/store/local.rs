use super::{LeadStore, StoreError};
use crate::models::{CallStatusRecord, InteractionRecord, LeadBatch};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::info;
use uuid::Uuid;

const LEADS_DIR: &str = "leads";
const INTERACTIONS_DIR: &str = "interactions";
const CALL_STATUS_DIR: &str = "call_status";
const ACTIVE_LEADS_FILE: &str = "active.json";

/// Filesystem backend: one JSON document per record under a root directory.
///
/// ```text
/// root/leads/active.json          the lead list, overwritten on upload
/// root/interactions/<key>.json    upserts keyed by lead identity
/// root/call_status/<uuid>.json    append-only status reports
/// ```
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Creates the directory layout eagerly so a bad root fails at startup
    /// instead of on the first answered call.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        for dir in [LEADS_DIR, INTERACTIONS_DIR, CALL_STATUS_DIR] {
            let path = root.join(dir);
            std::fs::create_dir_all(&path)
                .with_context(|| format!("creating store directory {}", path.display()))?;
        }
        info!(root = %root.display(), "local store ready");
        Ok(Self { root })
    }

    fn leads_path(&self) -> PathBuf {
        self.root.join(LEADS_DIR).join(ACTIVE_LEADS_FILE)
    }

    async fn write_document(
        &self,
        path: &Path,
        value: &(impl Serialize + Sync),
    ) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(value)?;
        let mut file = File::create(path).await?;
        file.write_all(content.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl LeadStore for LocalStore {
    async fn replace_leads(&self, batch: LeadBatch) -> Result<(), StoreError> {
        self.write_document(&self.leads_path(), &batch).await
    }

    async fn load_leads(&self) -> Result<Option<LeadBatch>, StoreError> {
        match tokio::fs::read_to_string(self.leads_path()).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    async fn save_interaction(&self, record: InteractionRecord) -> Result<(), StoreError> {
        let key = record
            .identity_key()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let path = self
            .root
            .join(INTERACTIONS_DIR)
            .join(format!("{}.json", key));
        self.write_document(&path, &record).await
    }

    async fn append_call_status(&self, record: CallStatusRecord) -> Result<(), StoreError> {
        let path = self
            .root
            .join(CALL_STATUS_DIR)
            .join(format!("{}.json", Uuid::new_v4()));
        self.write_document(&path, &record).await
    }
}
