//! Webhooks the telephony provider calls during a live leg. Each invocation
//! is stateless: everything the handler knows about the callee travels in the
//! `lead_data` query parameter and the provider's own form fields, so the two
//! steps of the dialog share nothing server-side.
//!
//! Every path out of these handlers is valid voice markup. A callee must
//! never hear the provider's generic failure announcement because we answered
//! with an error page.

use crate::app::AppState;
use crate::config::{Config, VoiceConfig};
use crate::gateway::CallStatus;
use crate::models::{CallContext, CallStatusRecord, InteractionRecord};
use crate::store::LeadStore;
use crate::twiml::{Gather, VoiceResponse};
use axum::body::Body;
use axum::extract::{FromRequest, Request, State};
use axum::http::{header, HeaderValue, StatusCode};
use chrono::Utc;
use std::collections::HashMap;
use std::convert::Infallible;
use tower_http::catch_panic::ResponseForPanic;
use tracing::{error, info, warn};

/// Webhook bodies are a handful of short fields; anything bigger is noise.
const BODY_LIMIT: usize = 64 * 1024;

/// Merged view of the query string and an urlencoded body, query winning on
/// collisions. The provider delivers its fields in either place depending on
/// the verb each callback was registered with, so handlers read one map
/// instead of caring. Extraction is total: a malformed body just yields
/// fewer fields.
pub struct FormValues(pub HashMap<String, String>);

impl FormValues {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }
}

impl<S> FromRequest<S> for FormValues
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request(req: Request, _state: &S) -> Result<Self, Self::Rejection> {
        let mut values = HashMap::new();
        if let Some(query) = req.uri().query() {
            for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
                values.insert(key.into_owned(), value.into_owned());
            }
        }

        let is_form = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.starts_with("application/x-www-form-urlencoded"))
            .unwrap_or(false);
        if is_form {
            match axum::body::to_bytes(req.into_body(), BODY_LIMIT).await {
                Ok(body) => {
                    for (key, value) in url::form_urlencoded::parse(&body) {
                        values.entry(key.into_owned()).or_insert(value.into_owned());
                    }
                }
                Err(e) => warn!("ignoring unreadable webhook body: {}", e),
            }
        }
        Ok(Self(values))
    }
}

fn static_url(config: &Config, file: &str) -> String {
    format!("{}/static/{}", config.base_url().unwrap_or(""), file)
}

/// First dialog step: play the campaign prompt while collecting exactly one
/// digit, then send the result to `/handle-gather` with the lead context
/// forwarded intact. The trailing say/hangup only plays when the provider
/// skips the action callback entirely.
pub async fn gather(State(state): State<AppState>, values: FormValues) -> VoiceResponse {
    let config = &state.config;
    let voice = &config.voice;
    let lead_data = values.get("lead_data").unwrap_or("");
    let base = config.base_url().unwrap_or("");
    let action = format!(
        "{}/handle-gather?lead_data={}",
        base,
        urlencoding::encode(lead_data)
    );

    VoiceResponse::new()
        .gather(
            Gather::new(action)
                .num_digits(1)
                .method("POST")
                .timeout(config.campaign.gather_timeout_secs)
                .play(static_url(config, &voice.prompt_audio)),
        )
        .say(&voice.no_response_message, &voice.voice, &voice.language)
        .hangup()
}

/// Second dialog step: branch on the digit the provider collected. `1` is an
/// opt-in and `2` a decline, both persisted; other digits and timeouts end
/// the call with the matching sentence, persisted only when the campaign is
/// configured to record every outcome.
pub async fn handle_gather(State(state): State<AppState>, values: FormValues) -> VoiceResponse {
    let voice = &state.config.voice;
    let digit = values
        .get("Digits")
        .map(str::trim)
        .filter(|digit| !digit.is_empty());
    let context = CallContext::decode(values.get("lead_data").unwrap_or(""));

    // The provider's To field is the authoritative callee number; the context
    // copy only covers callbacks that somehow lost it.
    let phone = values
        .get("To")
        .map(|to| to.replace('+', ""))
        .filter(|to| !to.trim().is_empty())
        .unwrap_or_else(|| context.phone.clone());

    if phone.is_empty() {
        error!("digit callback arrived without any callee number, dropping the result");
        return VoiceResponse::new()
            .say(&voice.error_message, &voice.voice, &voice.language)
            .hangup();
    }

    match digit {
        Some("1") => {
            let saved = save_interaction(&state, &context, phone, Some("1")).await;
            let mut response =
                VoiceResponse::new().play(static_url(&state.config, &voice.confirm_audio));
            if !saved {
                response = response.say(&voice.save_error_message, &voice.voice, &voice.language);
            }
            response.hangup()
        }
        Some("2") => {
            save_interaction(&state, &context, phone, Some("2")).await;
            VoiceResponse::new()
                .say(&voice.goodbye_message, &voice.voice, &voice.language)
                .hangup()
        }
        Some(other) => {
            info!(digit = other, to = %phone, "invalid option pressed");
            if state.config.campaign.record_all_outcomes {
                save_interaction(&state, &context, phone, Some(other)).await;
            }
            VoiceResponse::new()
                .say(&voice.invalid_option_message, &voice.voice, &voice.language)
                .hangup()
        }
        None => {
            info!(to = %phone, "gather timed out without a keypress");
            if state.config.campaign.record_all_outcomes {
                save_interaction(&state, &context, phone, None).await;
            }
            VoiceResponse::new()
                .say(&voice.timeout_message, &voice.voice, &voice.language)
                .hangup()
        }
    }
}

/// Persists one interaction, reporting success so the caller can shape the
/// spoken response. The call ends politely either way.
async fn save_interaction(
    state: &AppState,
    context: &CallContext,
    phone: String,
    digit: Option<&str>,
) -> bool {
    let record = InteractionRecord::from_context(context, phone, digit);
    match state.store.save_interaction(record).await {
        Ok(()) => {
            info!(digit = digit.unwrap_or("-"), "interaction recorded");
            true
        }
        Err(e) => {
            error!("failed to persist interaction: {}", e);
            false
        }
    }
}

/// Delivery status report for a placed call. Always answers 204: the
/// provider retries non-2xx responses and there is nothing useful to retry.
pub async fn status_callback(State(state): State<AppState>, values: FormValues) -> StatusCode {
    let call_sid = values.get("CallSid").unwrap_or("").to_string();
    let status = CallStatus::parse(values.get("CallStatus").unwrap_or(""));
    let to = values.get("To").unwrap_or("").to_string();
    info!(sid = %call_sid, status = %status, to = %to, "call status reported");

    let record = CallStatusRecord {
        call_sid,
        status,
        to,
        recorded_at: Utc::now().to_rfc3339(),
    };
    if let Err(e) = state.store.append_call_status(record).await {
        error!("failed to persist call status: {}", e);
    }
    StatusCode::NO_CONTENT
}

/// Outermost failure boundary on the voice routes: a panic anywhere in a
/// webhook still answers the provider with polite markup instead of a bare
/// 500, which would reach the callee as a generic failure announcement.
#[derive(Clone)]
pub struct PanicFallback {
    xml: String,
}

impl PanicFallback {
    pub fn new(voice: &VoiceConfig) -> Self {
        let xml = VoiceResponse::new()
            .say(&voice.error_message, &voice.voice, &voice.language)
            .hangup()
            .render();
        Self { xml }
    }
}

impl ResponseForPanic for PanicFallback {
    type ResponseBody = Body;

    fn response_for_panic(
        &mut self,
        err: Box<dyn std::any::Any + Send + 'static>,
    ) -> axum::http::Response<Self::ResponseBody> {
        let detail = if let Some(s) = err.downcast_ref::<String>() {
            s.as_str()
        } else if let Some(s) = err.downcast_ref::<&str>() {
            s
        } else {
            "non-string panic payload"
        };
        error!("voice handler panicked: {}", detail);

        let mut response = axum::http::Response::new(Body::from(self.xml.clone()));
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/xml; charset=utf-8"),
        );
        response
    }
}
