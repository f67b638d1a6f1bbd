use super::{CallRequest, CallStatus, GatewayError, PlacedCall, TelephonyGateway};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

const DEFAULT_API_BASE: &str = "https://api.twilio.com/2010-04-01";

/// Thin client for the Twilio-compatible Calls REST resource.
pub struct TwilioGateway {
    client: reqwest::Client,
    account_sid: String,
    auth_token: String,
    api_base: String,
}

#[derive(Debug, Deserialize)]
struct CallResource {
    sid: String,
    status: String,
}

impl TwilioGateway {
    pub fn new(account_sid: &str, auth_token: &str, api_base: Option<String>) -> Self {
        let api_base = api_base
            .filter(|base| !base.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        Self {
            client: reqwest::Client::new(),
            account_sid: account_sid.to_string(),
            auth_token: auth_token.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    fn calls_url(&self) -> String {
        format!("{}/Accounts/{}/Calls.json", self.api_base, self.account_sid)
    }
}

#[async_trait]
impl TelephonyGateway for TwilioGateway {
    async fn place_call(&self, request: CallRequest) -> Result<PlacedCall, GatewayError> {
        let mut form: Vec<(&str, String)> = vec![
            ("To", request.to),
            ("From", request.from),
            ("Url", request.url),
            ("Method", request.method),
            ("StatusCallback", request.status_callback),
            ("Timeout", request.timeout_secs.to_string()),
        ];
        // repeated form keys, one per subscribed lifecycle event
        for event in request.status_events {
            form.push(("StatusCallbackEvent", event));
        }

        debug!(url = %self.calls_url(), "posting call to provider");
        let response = self
            .client
            .post(self.calls_url())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let call: CallResource = response.json().await?;
        Ok(PlacedCall {
            status: CallStatus::parse(&call.status),
            sid: call.sid,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calls_url_shape() {
        let gateway = TwilioGateway::new("AC123", "token", None);
        assert_eq!(
            gateway.calls_url(),
            "https://api.twilio.com/2010-04-01/Accounts/AC123/Calls.json"
        );
    }

    #[test]
    fn test_api_base_override_trims_slash() {
        let gateway =
            TwilioGateway::new("AC123", "token", Some("http://127.0.0.1:4010/".to_string()));
        assert_eq!(
            gateway.calls_url(),
            "http://127.0.0.1:4010/Accounts/AC123/Calls.json"
        );
    }

    #[test]
    fn test_blank_api_base_falls_back_to_default() {
        let gateway = TwilioGateway::new("AC123", "token", Some("  ".to_string()));
        assert!(gateway.calls_url().starts_with(DEFAULT_API_BASE));
    }
}
