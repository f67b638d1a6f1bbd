use crate::app::AppState;
use crate::config::Config;
use axum::routing::{get, post};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;

pub mod admin;
pub mod voice;

/// Routes for the admin surface and the provider-facing voice webhooks.
///
/// The voice routes sit behind a panic boundary that answers with generic
/// apology markup: the provider must always receive valid instructions, even
/// when a handler blows up.
pub fn router(config: &Config) -> Router<AppState> {
    let voice_routes = Router::new()
        .route("/gather", get(voice::gather).post(voice::gather))
        .route(
            "/handle-gather",
            get(voice::handle_gather).post(voice::handle_gather),
        )
        .route(
            "/status_callback",
            get(voice::status_callback).post(voice::status_callback),
        )
        .layer(CatchPanicLayer::custom(voice::PanicFallback::new(
            &config.voice,
        )));

    Router::new()
        .route("/health", get(admin::health))
        .route("/upload-leads", post(admin::upload_leads))
        .route("/obtain-leads", get(admin::obtain_leads))
        .route("/iniciar-chamadas", post(admin::start_campaign))
        .route("/parar-chamadas", post(admin::stop_campaign))
        .merge(voice_routes)
}
