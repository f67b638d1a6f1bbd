use crate::app::AppState;
use crate::error::ApiError;
use crate::ingest;
use crate::models::LeadBatch;
use crate::store::LeadStore;
use crate::version;
use axum::extract::{Multipart, State};
use axum::Json;
use serde_json::{json, Value};
use tracing::info;

const UPLOAD_FIELD: &str = "csv_file";

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": version::get_short_version(),
        // store construction is fatal at startup, so serving implies ready
        "store_ready": true,
        "gateway_ready": state.gateway_ready(),
        "campaign_active": state.campaign.is_active(),
        "preflight_issues": state.preflight,
    }))
}

/// Receives the lead sheet as multipart form data and replaces the active
/// list with its parsed rows.
pub async fn upload_leads(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let mut upload: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("Falha ao ler o upload: {}", e)))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::Validation(format!("Falha ao ler o arquivo enviado: {}", e)))?;
        upload = Some((filename, data.to_vec()));
        break;
    }

    let (filename, data) =
        upload.ok_or_else(|| ApiError::Validation("Nenhum arquivo enviado".to_string()))?;
    if filename.trim().is_empty() {
        return Err(ApiError::Validation("Nenhum arquivo selecionado".to_string()));
    }

    let leads = ingest::parse_leads(&filename, &data)?;
    let batch = LeadBatch::new(leads);
    let count = batch.count;
    state.store.replace_leads(batch).await?;
    info!(count, file = %filename, "lead list replaced");

    Ok(Json(json!({
        "message": format!("Lista de leads carregada com sucesso! Total de {} leads.", count),
        "count": count,
    })))
}

/// Returns the active lead list, an empty batch when nothing was uploaded.
pub async fn obtain_leads(State(state): State<AppState>) -> Result<Json<LeadBatch>, ApiError> {
    let batch = state.store.load_leads().await?;
    Ok(Json(batch.unwrap_or_else(LeadBatch::empty)))
}

pub async fn start_campaign(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let count = state.campaign.start().await?;
    Ok(Json(json!({
        "message": "Campanha de chamadas iniciada com sucesso!",
        "count": count,
    })))
}

/// Requests a stop. Idempotent: stopping an idle campaign is still a success.
pub async fn stop_campaign(State(state): State<AppState>) -> Json<Value> {
    state.campaign.stop();
    Json(json!({ "message": "Campanha de chamadas parada com sucesso!" }))
}
