use crate::config::Config;
use serde::Serialize;
use std::net::SocketAddr;

/// One startup configuration problem, surfaced in the log and on `/health`.
#[derive(Debug, Clone, Serialize)]
pub struct PreflightIssue {
    pub field: String,
    pub message: String,
}

/// Inspects the effective configuration before the server starts. Issues are
/// warnings, not fatal: the admin surface stays up so the operator can see
/// what is missing, but campaign dialing is disabled until they are fixed.
pub fn check(config: &Config) -> Vec<PreflightIssue> {
    let mut issues = Vec::new();
    let mut issue = |field: &str, message: String| {
        issues.push(PreflightIssue {
            field: field.to_string(),
            message,
        });
    };

    if config.http_addr.parse::<SocketAddr>().is_err() {
        issue(
            "http_addr",
            format!("`{}` is not a valid listen address", config.http_addr),
        );
    }

    match config.base_url() {
        None => issue(
            "public_base_url",
            "not configured; the telephony provider cannot reach the voice webhooks".to_string(),
        ),
        Some(base) => match url::Url::parse(base) {
            Err(e) => issue("public_base_url", format!("`{}` is not a valid URL: {}", base, e)),
            Ok(parsed) if parsed.scheme() != "https" => issue(
                "public_base_url",
                format!(
                    "`{}` is not HTTPS; most telephony providers refuse plain-http callbacks",
                    base
                ),
            ),
            Ok(_) => {}
        },
    }

    let telephony = &config.telephony;
    let missing = |value: &Option<String>| {
        value
            .as_deref()
            .map(|v| v.trim().is_empty())
            .unwrap_or(true)
    };
    if missing(&telephony.account_sid) {
        issue(
            "telephony.account_sid",
            "not configured; campaign start is disabled".to_string(),
        );
    }
    if missing(&telephony.auth_token) {
        issue(
            "telephony.auth_token",
            "not configured; campaign start is disabled".to_string(),
        );
    }
    if missing(&telephony.outbound_number) {
        issue(
            "telephony.outbound_number",
            "not configured; campaign start is disabled".to_string(),
        );
    }

    issues
}
