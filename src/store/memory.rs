use super::{LeadStore, StoreError};
use crate::models::{CallStatusRecord, InteractionRecord, LeadBatch};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

/// In-process backend for tests and local development. Nothing survives a
/// restart.
#[derive(Default)]
pub struct MemoryStore {
    batch: RwLock<Option<LeadBatch>>,
    interactions: RwLock<HashMap<String, InteractionRecord>>,
    statuses: RwLock<Vec<CallStatusRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the stored interaction records, for inspection.
    pub fn interactions(&self) -> Vec<InteractionRecord> {
        self.interactions.read().unwrap().values().cloned().collect()
    }

    /// Snapshot of the recorded delivery statuses, for inspection.
    pub fn call_statuses(&self) -> Vec<CallStatusRecord> {
        self.statuses.read().unwrap().clone()
    }
}

#[async_trait]
impl LeadStore for MemoryStore {
    async fn replace_leads(&self, batch: LeadBatch) -> Result<(), StoreError> {
        *self.batch.write().unwrap() = Some(batch);
        Ok(())
    }

    async fn load_leads(&self) -> Result<Option<LeadBatch>, StoreError> {
        Ok(self.batch.read().unwrap().clone())
    }

    async fn save_interaction(&self, record: InteractionRecord) -> Result<(), StoreError> {
        let key = record
            .identity_key()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        self.interactions.write().unwrap().insert(key, record);
        Ok(())
    }

    async fn append_call_status(&self, record: CallStatusRecord) -> Result<(), StoreError> {
        self.statuses.write().unwrap().push(record);
        Ok(())
    }
}
