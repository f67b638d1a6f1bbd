use super::{LeadStore, StoreError};
use crate::models::{CallStatusRecord, InteractionRecord, LeadBatch};
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

/// Remote document-store backend speaking a small REST convention:
/// `PUT {base}/{collection}/{id}` upserts one document, `POST
/// {base}/{collection}` appends under a server-side id, `GET` reads back.
/// Every request carries the resolved credential headers.
pub struct HttpStore {
    client: Client,
    base_url: String,
    headers: HashMap<String, String>,
}

impl HttpStore {
    pub fn new(base_url: String, headers: HashMap<String, String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            headers,
        }
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let mut request = self
            .client
            .request(method, format!("{}/{}", self.base_url, path));
        for (key, value) in &self.headers {
            request = request.header(key, value);
        }
        request
    }

    async fn send_document(
        &self,
        method: Method,
        path: &str,
        value: &(impl Serialize + Sync),
    ) -> Result<(), StoreError> {
        debug!(path = %path, "writing document");
        let response = self.request(method, path).json(value).send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(StoreError::Rejected {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            })
        }
    }
}

#[async_trait]
impl LeadStore for HttpStore {
    async fn replace_leads(&self, batch: LeadBatch) -> Result<(), StoreError> {
        self.send_document(Method::PUT, "leads/active", &batch).await
    }

    async fn load_leads(&self) -> Result<Option<LeadBatch>, StoreError> {
        let response = self.request(Method::GET, "leads/active").send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Rejected {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        Ok(Some(response.json().await?))
    }

    async fn save_interaction(&self, record: InteractionRecord) -> Result<(), StoreError> {
        match record.identity_key() {
            Some(key) => {
                self.send_document(Method::PUT, &format!("interactions/{}", key), &record)
                    .await
            }
            None => self.send_document(Method::POST, "interactions", &record).await,
        }
    }

    async fn append_call_status(&self, record: CallStatusRecord) -> Result<(), StoreError> {
        self.send_document(Method::POST, "call_status", &record).await
    }
}
