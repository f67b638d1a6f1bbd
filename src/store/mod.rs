use crate::config::StoreConfig;
use crate::models::{CallStatusRecord, InteractionRecord, LeadBatch};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

pub mod http;
pub mod local;
pub mod memory;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("request failure: {0}")]
    Http(#[from] reqwest::Error),
    #[error("store rejected the request ({status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("encoding failure: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Durable home of the active lead list, the interaction records and the
/// call status history. Backends are selected by `[store]` in the config.
#[async_trait]
pub trait LeadStore: Send + Sync {
    /// Replaces the active lead list wholesale.
    async fn replace_leads(&self, batch: LeadBatch) -> Result<(), StoreError>;
    /// Reads the active lead list back, `None` when nothing was uploaded yet.
    async fn load_leads(&self) -> Result<Option<LeadBatch>, StoreError>;
    /// Upserts by the record's identity key, or appends under a fresh id
    /// when the lead carries none.
    async fn save_interaction(&self, record: InteractionRecord) -> Result<(), StoreError>;
    /// Appends one delivery status report.
    async fn append_call_status(&self, record: CallStatusRecord) -> Result<(), StoreError>;
}

/// Builds the configured backend. Failing here is fatal at startup: a
/// campaign tool that silently drops opt-ins is worse than one that refuses
/// to boot.
pub fn build_store(config: &StoreConfig) -> Result<Arc<dyn LeadStore>> {
    match config {
        StoreConfig::Memory => Ok(Arc::new(memory::MemoryStore::new())),
        StoreConfig::Local { root } => Ok(Arc::new(local::LocalStore::new(root)?)),
        StoreConfig::Http {
            url,
            credentials,
            credentials_file,
            headers,
        } => {
            let resolved =
                resolve_credentials(credentials.as_deref(), credentials_file.as_deref(), headers)?;
            Ok(Arc::new(http::HttpStore::new(url.clone(), resolved)))
        }
    }
}

/// Merges the explicit header map with the credential blob (inline JSON
/// object or a file holding one) into the headers sent on every request.
fn resolve_credentials(
    inline: Option<&str>,
    file: Option<&str>,
    extra: &Option<HashMap<String, String>>,
) -> Result<HashMap<String, String>> {
    let mut headers = extra.clone().unwrap_or_default();
    let blob = match (inline, file) {
        (Some(blob), _) => Some(blob.to_string()),
        (None, Some(path)) => Some(
            std::fs::read_to_string(path)
                .with_context(|| format!("reading store credentials file {}", path))?,
        ),
        (None, None) => None,
    };
    if let Some(blob) = blob {
        let credentials: HashMap<String, String> = serde_json::from_str(&blob)
            .context("store credentials must be a JSON object of header names to values")?;
        headers.extend(credentials);
    }
    Ok(headers)
}
