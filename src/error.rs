use crate::campaign::CampaignError;
use crate::ingest::IngestError;
use crate::store::StoreError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// Failures the administrative endpoints surface as `{ "message": … }` JSON.
/// Messages are operator-facing, in the deployment's language.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error(transparent)]
    Campaign(#[from] CampaignError),
    #[error("Erro ao acessar o banco de dados: {0}")]
    Store(#[from] StoreError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Ingest(e) => match e {
                IngestError::MissingColumn(_) | IngestError::EmptySheet => {
                    StatusCode::BAD_REQUEST
                }
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Campaign(CampaignError::AlreadyRunning) => StatusCode::CONFLICT,
            ApiError::Campaign(CampaignError::NoLeads) => StatusCode::BAD_REQUEST,
            ApiError::Campaign(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("request failed: {}", self);
        } else {
            warn!("request rejected: {}", self);
        }
        (status, Json(json!({ "message": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::Validation("Nenhum arquivo enviado".to_string()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Campaign(CampaignError::AlreadyRunning).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::Campaign(CampaignError::NoLeads).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Campaign(CampaignError::GatewayNotReady).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::Ingest(IngestError::MissingColumn("Telefone")).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Store(StoreError::Rejected {
                status: 503,
                body: String::new()
            })
            .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_response_body_carries_message() {
        let response =
            ApiError::Campaign(CampaignError::AlreadyRunning).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let bytes = axum::body::to_bytes(response.into_body(), 1024)
            .await
            .expect("body reads");
        let body: serde_json::Value = serde_json::from_slice(&bytes).expect("json body");
        assert_eq!(body["message"], "A campanha já está em andamento.");
    }
}
