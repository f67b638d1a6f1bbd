use crate::campaign::CampaignController;
use crate::config::Config;
use crate::gateway::{twilio::TwilioGateway, TelephonyGateway};
use crate::preflight::{self, PreflightIssue};
use crate::store::{build_store, LeadStore};
use anyhow::Result;
use axum::{
    extract::State,
    response::{Html, IntoResponse},
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::select;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    services::ServeDir,
};
use tracing::{info, warn};

pub struct AppStateInner {
    pub config: Arc<Config>,
    pub store: Arc<dyn LeadStore>,
    /// `None` when telephony credentials are missing; the server still comes
    /// up for uploads and inspection, campaign start answers 500.
    pub gateway: Option<Arc<dyn TelephonyGateway>>,
    pub campaign: CampaignController,
    pub token: CancellationToken,
    pub preflight: Vec<PreflightIssue>,
}

pub type AppState = Arc<AppStateInner>;

impl AppStateInner {
    /// True when campaign calls can actually go out: a gateway client exists
    /// and both halves of the callback contract are configured.
    pub fn gateway_ready(&self) -> bool {
        self.gateway.is_some()
            && self.config.base_url().is_some()
            && self
                .config
                .telephony
                .outbound_number
                .as_deref()
                .map(|number| !number.trim().is_empty())
                .unwrap_or(false)
    }
}

pub struct AppStateBuilder {
    pub config: Option<Config>,
    pub store: Option<Arc<dyn LeadStore>>,
    pub gateway: Option<Arc<dyn TelephonyGateway>>,
    pub token: Option<CancellationToken>,
}

impl Default for AppStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AppStateBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            store: None,
            gateway: None,
            token: None,
        }
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    pub fn store(mut self, store: Arc<dyn LeadStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn gateway(mut self, gateway: Arc<dyn TelephonyGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    pub fn token(mut self, token: CancellationToken) -> Self {
        self.token = Some(token);
        self
    }

    pub fn build(self) -> Result<AppState> {
        let config = Arc::new(self.config.unwrap_or_default());
        let token = self.token.unwrap_or_default();

        let preflight = preflight::check(&config);
        for issue in &preflight {
            warn!(field = %issue.field, "{}", issue.message);
        }

        // No store means no safe place for opt-ins, so this error is fatal.
        let store = match self.store {
            Some(store) => store,
            None => build_store(&config.store)?,
        };

        let gateway: Option<Arc<dyn TelephonyGateway>> = match self.gateway {
            Some(gateway) => Some(gateway),
            None => match config.telephony.credentials() {
                Some((sid, auth)) => Some(Arc::new(TwilioGateway::new(
                    sid,
                    auth,
                    config.telephony.api_base.clone(),
                ))),
                None => {
                    warn!("telephony credentials missing, campaign start is disabled");
                    None
                }
            },
        };

        let campaign = CampaignController::new(
            config.clone(),
            store.clone(),
            gateway.clone(),
            token.child_token(),
        );

        Ok(Arc::new(AppStateInner {
            config,
            store,
            gateway,
            campaign,
            token,
            preflight,
        }))
    }
}

pub async fn run(state: AppState) -> Result<()> {
    let token = state.token.clone();

    let app = create_router(state.clone());
    let addr: SocketAddr = state.config.http_addr.parse()?;
    let listener = match TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("Failed to bind to {}: {}", addr, e);
            return Err(anyhow::anyhow!("Failed to bind to {}: {}", addr, e));
        }
    };
    info!("listening on {}", addr);

    let http_task = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    );

    select! {
        http_result = http_task => {
            match http_result {
                Ok(_) => info!("Server shut down gracefully"),
                Err(e) => {
                    tracing::error!("Server error: {}", e);
                    return Err(anyhow::anyhow!("Server error: {}", e));
                }
            }
        }
        _ = token.cancelled() => {
            info!("Application shutting down due to cancellation");
        }
    }
    // take the dialer worker down with the server
    token.cancel();
    state.campaign.stop();
    Ok(())
}

// Index page handler
async fn index_handler(State(state): State<AppState>) -> impl IntoResponse {
    let path = Path::new(&state.config.static_path).join("index.html");
    match std::fs::read_to_string(&path) {
        Ok(content) => Html(content).into_response(),
        Err(e) => {
            tracing::error!("Failed to read {}: {}", path.to_string_lossy(), e);
            Html("<html><body><h1>Error loading page</h1></body></html>").into_response()
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    // check if the dashboard page exists
    if !Path::new(&state.config.static_path).join("index.html").exists() {
        warn!("{}/index.html does not exist", state.config.static_path);
    }
    // Serve static files, home of the campaign audio
    let static_files_service = ServeDir::new(&state.config.static_path);

    // CORS configuration to allow cross-origin requests
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::DELETE,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
            axum::http::header::ACCEPT,
            axum::http::header::ORIGIN,
        ]);

    let api_routes = crate::handler::router(&state.config);

    Router::new()
        .route("/", get(index_handler))
        .route("/dashboard", get(index_handler))
        .nest_service("/static", static_files_service)
        .merge(api_routes)
        .layer(cors)
        .with_state(state)
}
