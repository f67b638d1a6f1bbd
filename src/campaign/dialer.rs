use super::CampaignState;
use crate::gateway::{CallRequest, TelephonyGateway};
use crate::models::{normalize_phone, CallContext, Lead};
use std::sync::Arc;
use std::time::Duration;
use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Lifecycle events the provider reports back to `/status_callback`.
const STATUS_CALLBACK_EVENTS: [&str; 4] = ["completed", "failed", "busy", "no-answer"];

/// Walks the lead list in upload order. One worker exists at a time; the
/// controller guarantees that through the campaign flag before spawning.
pub struct DialerWorker {
    pub(crate) state: Arc<CampaignState>,
    pub(crate) gateway: Arc<dyn TelephonyGateway>,
    pub(crate) base_url: String,
    pub(crate) outbound_number: String,
    pub(crate) pacing: Duration,
    pub(crate) ring_timeout_secs: u32,
    pub(crate) token: CancellationToken,
}

impl DialerWorker {
    /// Dials every lead, pacing between calls, and clears the campaign flag
    /// on every exit path. Placement failures only skip the lead in hand.
    pub async fn run(self, leads: Vec<Lead>) {
        info!(total = leads.len(), "dialer worker started");
        for lead in &leads {
            if !self.state.is_active() {
                info!("campaign flag cleared, stopping the dial loop");
                break;
            }
            if self.token.is_cancelled() {
                info!("shutdown requested, stopping the dial loop");
                break;
            }
            if lead.phone_raw.trim().is_empty() {
                warn!(name = %lead.full_name, "lead has no phone number, skipping");
                continue;
            }

            self.dial(lead).await;

            select! {
                _ = self.token.cancelled() => break,
                _ = tokio::time::sleep(self.pacing) => {}
            }
        }
        self.state.finish();
        info!("campaign finished");
    }

    async fn dial(&self, lead: &Lead) {
        let phone = normalize_phone(&lead.phone_raw);
        let context = CallContext::from_lead(lead, phone.clone());
        let request = self.call_request(&context);
        info!(name = %context.name, to = %request.to, "placing call");
        match self.gateway.place_call(request).await {
            Ok(call) => {
                info!(sid = %call.sid, status = %call.status, name = %context.name, "call placed");
            }
            Err(e) => {
                error!(name = %context.name, to = %phone, "failed to place call: {}", e);
            }
        }
    }

    fn call_request(&self, context: &CallContext) -> CallRequest {
        CallRequest {
            to: format!("+{}", context.phone),
            from: self.outbound_number.clone(),
            url: format!("{}/gather?lead_data={}", self.base_url, context.encode()),
            method: "GET".to_string(),
            status_callback: format!("{}/status_callback", self.base_url),
            status_events: STATUS_CALLBACK_EVENTS
                .iter()
                .map(|event| event.to_string())
                .collect(),
            timeout_secs: self.ring_timeout_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{CallStatus, GatewayError, MockTelephonyGateway, PlacedCall};
    use mockall::Sequence;

    fn lead(name: &str, phone: &str) -> Lead {
        Lead {
            full_name: name.to_string(),
            phone_raw: phone.to_string(),
            national_id: "123.456.789-09".to_string(),
            enrollment_id: String::new(),
            employer: String::new(),
        }
    }

    fn placed() -> PlacedCall {
        PlacedCall {
            sid: "CA1".to_string(),
            status: CallStatus::Queued,
        }
    }

    fn worker(gateway: MockTelephonyGateway, state: Arc<CampaignState>) -> DialerWorker {
        DialerWorker {
            state,
            gateway: Arc::new(gateway),
            base_url: "https://ura.example.com".to_string(),
            outbound_number: "+5511999990000".to_string(),
            pacing: Duration::from_secs(5),
            ring_timeout_secs: 30,
            token: CancellationToken::new(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_dials_in_order_with_normalized_numbers() {
        let mut gateway = MockTelephonyGateway::new();
        let mut seq = Sequence::new();
        gateway
            .expect_place_call()
            .once()
            .in_sequence(&mut seq)
            .withf(|request| {
                request.to == "+5511988887777"
                    && request.from == "+5511999990000"
                    && request.url.starts_with("https://ura.example.com/gather?lead_data=")
                    && request.method == "GET"
                    && request.status_callback == "https://ura.example.com/status_callback"
                    && request.timeout_secs == 30
                    && request.status_events
                        == vec!["completed", "failed", "busy", "no-answer"]
            })
            .returning(|_| Ok(placed()));
        gateway
            .expect_place_call()
            .once()
            .in_sequence(&mut seq)
            .withf(|request| request.to == "+551133334444")
            .returning(|_| Ok(placed()));

        let state = Arc::new(CampaignState::new());
        assert!(state.try_begin());
        worker(gateway, state.clone())
            .run(vec![lead("Ana", "(11) 98888-7777"), lead("Bob", "1133334444")])
            .await;

        assert!(!state.is_active(), "worker must clear the flag when done");
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_phone_is_skipped() {
        let mut gateway = MockTelephonyGateway::new();
        gateway
            .expect_place_call()
            .times(1)
            .withf(|request| request.to == "+5511988887777")
            .returning(|_| Ok(placed()));

        let state = Arc::new(CampaignState::new());
        assert!(state.try_begin());
        worker(gateway, state.clone())
            .run(vec![lead("Sem Telefone", "   "), lead("Ana", "11988887777")])
            .await;
        assert!(!state.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_placement_failure_moves_to_next_lead() {
        let mut gateway = MockTelephonyGateway::new();
        let mut seq = Sequence::new();
        gateway
            .expect_place_call()
            .once()
            .in_sequence(&mut seq)
            .returning(|_| {
                Err(GatewayError::Rejected {
                    status: 400,
                    body: "invalid number".to_string(),
                })
            });
        gateway
            .expect_place_call()
            .once()
            .in_sequence(&mut seq)
            .returning(|_| Ok(placed()));

        let state = Arc::new(CampaignState::new());
        assert!(state.try_begin());
        worker(gateway, state.clone())
            .run(vec![lead("Ana", "11988887777"), lead("Bob", "1133334444")])
            .await;
        assert!(!state.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_observed_between_leads() {
        let state = Arc::new(CampaignState::new());
        assert!(state.try_begin());

        let mut gateway = MockTelephonyGateway::new();
        let observer = state.clone();
        // the stop request lands while the first call is in flight; at most
        // the call already in hand goes out, never the rest of the list
        gateway.expect_place_call().times(1).returning(move |_| {
            observer.stop();
            Ok(placed())
        });

        worker(gateway, state.clone())
            .run(vec![
                lead("Ana", "11988887777"),
                lead("Bob", "1133334444"),
                lead("Carla", "11955554444"),
            ])
            .await;
        assert!(!state.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_inactive_state_places_no_calls() {
        let mut gateway = MockTelephonyGateway::new();
        gateway.expect_place_call().never();
        let state = Arc::new(CampaignState::new());
        worker(gateway, state.clone())
            .run(vec![lead("Ana", "11988887777")])
            .await;
        assert!(!state.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_token_interrupts_pacing() {
        let token = CancellationToken::new();
        let canceller = token.clone();
        let mut gateway = MockTelephonyGateway::new();
        // shutdown arrives while the first call is in flight, so the pacing
        // wait after it returns immediately and Bob is never dialed
        gateway.expect_place_call().times(1).returning(move |_| {
            canceller.cancel();
            Ok(placed())
        });

        let state = Arc::new(CampaignState::new());
        assert!(state.try_begin());
        let mut dialer = worker(gateway, state.clone());
        dialer.token = token;

        dialer
            .run(vec![lead("Ana", "11988887777"), lead("Bob", "1133334444")])
            .await;
        assert!(!state.is_active());
    }
}
