use anyhow::Error;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Parser, Debug)]
#[command(version)]
pub struct Cli {
    /// Path to the TOML configuration file. Environment variables still
    /// override whatever the file sets.
    #[clap(long)]
    pub conf: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    pub http_addr: String,
    pub log_level: Option<String>,
    pub log_file: Option<String>,
    /// Externally reachable base URL handed to the telephony provider so it
    /// can fetch `/gather` and post back digits and delivery statuses.
    pub public_base_url: Option<String>,
    /// Directory served under `/static`, home of the campaign audio files.
    pub static_path: String,
    pub telephony: TelephonyConfig,
    pub campaign: CampaignConfig,
    pub voice: VoiceConfig,
    pub store: StoreConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_addr: "0.0.0.0:8080".to_string(),
            log_level: None,
            log_file: None,
            public_base_url: None,
            static_path: "static".to_string(),
            telephony: TelephonyConfig::default(),
            campaign: CampaignConfig::default(),
            voice: VoiceConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TelephonyConfig {
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    /// Caller id for every outbound leg, E.164.
    pub outbound_number: Option<String>,
    /// Seconds the provider lets the callee ring before giving up.
    pub ring_timeout_secs: u32,
    /// Override of the provider REST base, used by tests and regional setups.
    pub api_base: Option<String>,
}

impl Default for TelephonyConfig {
    fn default() -> Self {
        Self {
            account_sid: None,
            auth_token: None,
            outbound_number: None,
            ring_timeout_secs: 30,
            api_base: None,
        }
    }
}

impl TelephonyConfig {
    /// Account sid and auth token, when both are present and non-empty.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        let sid = self.account_sid.as_deref().filter(|s| !s.trim().is_empty())?;
        let token = self.auth_token.as_deref().filter(|s| !s.trim().is_empty())?;
        Some((sid, token))
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CampaignConfig {
    /// Seconds between consecutive outbound calls.
    pub pacing_secs: u64,
    /// Seconds the gather step waits for a keypress.
    pub gather_timeout_secs: u32,
    /// Also persist interaction records for invalid and timed-out responses.
    pub record_all_outcomes: bool,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            pacing_secs: 5,
            gather_timeout_secs: 20,
            record_all_outcomes: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct VoiceConfig {
    pub voice: String,
    pub language: String,
    /// File under `static_path` played inside the gather step.
    pub prompt_audio: String,
    /// File under `static_path` played after a successful opt-in.
    pub confirm_audio: String,
    pub no_response_message: String,
    pub save_error_message: String,
    pub goodbye_message: String,
    pub invalid_option_message: String,
    pub timeout_message: String,
    pub error_message: String,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            voice: "Vitoria".to_string(),
            language: "pt-BR".to_string(),
            prompt_audio: "audio_portabilidadeexclusiva.mp3".to_string(),
            confirm_audio: "audio_continuarinbursa.mp3".to_string(),
            no_response_message: "Não recebemos sua opção. Encerrando.".to_string(),
            save_error_message:
                "Ocorreu um erro ao registrar sua opção. Tente novamente mais tarde.".to_string(),
            goodbye_message: "Você pressionou 2. Encerrando a chamada. Obrigado!".to_string(),
            invalid_option_message: "Opção inválida. Encerrando a chamada.".to_string(),
            timeout_message: "Não detectamos nenhuma opção. Encerrando a chamada.".to_string(),
            error_message: "Desculpe, houve um erro interno do sistema. Encerrando.".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub enum StoreConfig {
    Memory,
    Local {
        root: String,
    },
    Http {
        url: String,
        /// Inline JSON object of header names to values, typically a service
        /// credential blob injected through the environment.
        credentials: Option<String>,
        /// Path to a file holding the same JSON object.
        credentials_file: Option<String>,
        headers: Option<HashMap<String, String>>,
    },
}

impl Default for StoreConfig {
    fn default() -> Self {
        #[cfg(target_os = "windows")]
        {
            StoreConfig::Local {
                root: "./uradial-data".to_string(),
            }
        }
        #[cfg(not(target_os = "windows"))]
        {
            StoreConfig::Local {
                root: "/tmp/uradial-data".to_string(),
            }
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self, Error> {
        let config_str = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&config_str)?;
        Ok(config)
    }

    /// `public_base_url` without its trailing slash, `None` when unset or blank.
    pub fn base_url(&self) -> Option<&str> {
        self.public_base_url
            .as_deref()
            .map(|url| url.trim_end_matches('/'))
            .filter(|url| !url.is_empty())
    }

    /// Overlays the deployment environment on top of the file-based settings.
    /// The lookup closure keeps tests away from the process environment.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |value: String| {
            let trimmed = value.trim().to_string();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed)
            }
        };

        if let Some(value) = lookup("HTTP_ADDR").and_then(non_empty) {
            self.http_addr = value;
        }
        if let Some(value) = lookup("PUBLIC_BASE_URL").and_then(non_empty) {
            self.public_base_url = Some(value);
        }
        if let Some(value) = lookup("TWILIO_ACCOUNT_SID").and_then(non_empty) {
            self.telephony.account_sid = Some(value);
        }
        if let Some(value) = lookup("TWILIO_AUTH_TOKEN").and_then(non_empty) {
            self.telephony.auth_token = Some(value);
        }
        if let Some(value) = lookup("TWILIO_PHONE_NUMBER").and_then(non_empty) {
            self.telephony.outbound_number = Some(value);
        }
        if let Some(value) = lookup("AUDIO_PROMPT_FILE").and_then(non_empty) {
            self.voice.prompt_audio = value;
        }
        if let Some(value) = lookup("AUDIO_CONFIRM_FILE").and_then(non_empty) {
            self.voice.confirm_audio = value;
        }
        if let StoreConfig::Http {
            credentials,
            credentials_file,
            ..
        } = &mut self.store
        {
            if let Some(value) = lookup("STORE_CREDENTIALS_JSON").and_then(non_empty) {
                *credentials = Some(value);
            }
            if let Some(value) = lookup("STORE_CREDENTIALS_FILE").and_then(non_empty) {
                *credentials_file = Some(value);
            }
        }
    }
}
