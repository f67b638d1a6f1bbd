use crate::config::Config;
use crate::gateway::TelephonyGateway;
use crate::store::{LeadStore, StoreError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub mod dialer;

use dialer::DialerWorker;

/// Process-wide toggle for the single running campaign. The dial loop reads
/// it between leads, so a stop request lands before the next call goes out.
#[derive(Debug, Default)]
pub struct CampaignState {
    active: AtomicBool,
}

impl CampaignState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Flips inactive to active. `false` means a campaign is already running
    /// and the caller lost the race.
    pub fn try_begin(&self) -> bool {
        self.active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub fn stop(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    pub(crate) fn finish(&self) {
        self.active.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Error)]
pub enum CampaignError {
    #[error("A campanha já está em andamento.")]
    AlreadyRunning,
    #[error("Nenhum lead carregado. Por favor, carregue uma lista.")]
    NoLeads,
    #[error("O serviço de telefonia não está configurado.")]
    GatewayNotReady,
    #[error("Erro ao acessar a lista de leads no banco de dados.")]
    Store(#[source] StoreError),
}

/// Owns the campaign flag and spawns the dialer worker. One controller per
/// process, shared behind the application state.
pub struct CampaignController {
    config: Arc<Config>,
    store: Arc<dyn LeadStore>,
    gateway: Option<Arc<dyn TelephonyGateway>>,
    state: Arc<CampaignState>,
    token: CancellationToken,
}

impl CampaignController {
    pub fn new(
        config: Arc<Config>,
        store: Arc<dyn LeadStore>,
        gateway: Option<Arc<dyn TelephonyGateway>>,
        token: CancellationToken,
    ) -> Self {
        Self {
            config,
            store,
            gateway,
            state: Arc::new(CampaignState::new()),
            token,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    /// Loads the active lead list and spawns the dial loop over it. Returns
    /// how many leads were queued.
    pub async fn start(&self) -> Result<usize, CampaignError> {
        if self.state.is_active() {
            return Err(CampaignError::AlreadyRunning);
        }
        let gateway = self
            .gateway
            .clone()
            .ok_or(CampaignError::GatewayNotReady)?;
        let base_url = self
            .config
            .base_url()
            .ok_or(CampaignError::GatewayNotReady)?
            .to_string();
        let outbound_number = self
            .config
            .telephony
            .outbound_number
            .clone()
            .filter(|number| !number.trim().is_empty())
            .ok_or(CampaignError::GatewayNotReady)?;

        let batch = self.store.load_leads().await.map_err(CampaignError::Store)?;
        let leads = batch
            .map(|batch| batch.leads)
            .filter(|leads| !leads.is_empty())
            .ok_or(CampaignError::NoLeads)?;

        // the flag is the mutual exclusion point: losing this race means
        // another request started a campaign since the check above
        if !self.state.try_begin() {
            return Err(CampaignError::AlreadyRunning);
        }

        let count = leads.len();
        info!(total = count, "starting call campaign");
        let worker = DialerWorker {
            state: self.state.clone(),
            gateway,
            base_url,
            outbound_number,
            pacing: Duration::from_secs(self.config.campaign.pacing_secs),
            ring_timeout_secs: self.config.telephony.ring_timeout_secs,
            token: self.token.child_token(),
        };
        tokio::spawn(worker.run(leads));
        Ok(count)
    }

    /// Clears the campaign flag. Safe to call with nothing running; the
    /// worker notices before its next call.
    pub fn stop(&self) {
        self.state.stop();
        info!("campaign stop requested");
    }
}
