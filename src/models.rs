use crate::gateway::CallStatus;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// One row of the uploaded sheet. Wire names keep the Portuguese column
/// headers so stored batches stay readable next to the original sheets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    #[serde(rename = "Nome Completo")]
    pub full_name: String,
    #[serde(rename = "Telefone")]
    pub phone_raw: String,
    #[serde(rename = "Cpf", default)]
    pub national_id: String,
    #[serde(rename = "Matricula", default)]
    pub enrollment_id: String,
    #[serde(rename = "Empregador", default)]
    pub employer: String,
}

/// The single active lead list. Every upload replaces it wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadBatch {
    pub leads: Vec<Lead>,
    pub count: usize,
    pub uploaded_at: String,
}

impl LeadBatch {
    pub fn new(leads: Vec<Lead>) -> Self {
        let count = leads.len();
        Self {
            leads,
            count,
            uploaded_at: Utc::now().to_rfc3339(),
        }
    }

    pub fn empty() -> Self {
        Self {
            leads: Vec::new(),
            count: 0,
            uploaded_at: String::new(),
        }
    }
}

/// Lead identity threaded through the provider as a `lead_data` query
/// parameter, so the stateless webhooks know who answered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallContext {
    #[serde(rename = "telefone", default)]
    pub phone: String,
    #[serde(rename = "nome", default)]
    pub name: String,
    #[serde(rename = "cpf", default)]
    pub national_id: String,
    #[serde(rename = "matricula", default)]
    pub enrollment_id: String,
    #[serde(rename = "empregador", default)]
    pub employer: String,
}

impl CallContext {
    pub fn from_lead(lead: &Lead, normalized_phone: String) -> Self {
        let name = lead.full_name.trim();
        Self {
            phone: normalized_phone,
            name: if name.is_empty() {
                "Cliente".to_string()
            } else {
                name.to_string()
            },
            national_id: lead.national_id.trim().to_string(),
            enrollment_id: lead.enrollment_id.trim().to_string(),
            employer: lead.employer.trim().to_string(),
        }
    }

    /// JSON payload percent-encoded for embedding in a callback URL.
    pub fn encode(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_default();
        urlencoding::encode(&json).into_owned()
    }

    /// Total inverse of [`encode`](Self::encode): accepts the raw query value
    /// whether it arrives still percent-encoded or already decoded, and falls
    /// back to an empty context instead of failing the call.
    pub fn decode(raw: &str) -> Self {
        if raw.trim().is_empty() {
            return Self::default();
        }
        let decoded = urlencoding::decode(raw)
            .map(|cow| cow.into_owned())
            .unwrap_or_else(|_| raw.to_string());
        serde_json::from_str(&decoded)
            .or_else(|_| serde_json::from_str(raw))
            .unwrap_or_else(|e| {
                warn!("undecodable lead_data payload, continuing without it: {}", e);
                Self::default()
            })
    }
}

/// Outcome of one answered call, persisted when the callee picks an option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    #[serde(rename = "telefone")]
    pub phone: String,
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "cpf")]
    pub national_id: String,
    #[serde(rename = "matricula")]
    pub enrollment_id: String,
    #[serde(rename = "empregador")]
    pub employer: String,
    /// `None` when the gather timed out before any keypress.
    #[serde(rename = "digito_pressionado")]
    pub digit_pressed: Option<String>,
    #[serde(rename = "data_interesse")]
    pub recorded_at: String,
}

impl InteractionRecord {
    pub fn from_context(context: &CallContext, phone: String, digit: Option<&str>) -> Self {
        Self {
            phone,
            name: context.name.clone(),
            national_id: context.national_id.clone(),
            enrollment_id: context.enrollment_id.clone(),
            employer: context.employer.clone(),
            digit_pressed: digit.map(|d| d.to_string()),
            recorded_at: Utc::now().to_rfc3339(),
        }
    }

    /// Stable document key so repeat answers from the same person overwrite
    /// instead of piling up. `None` when the lead carries no usable id.
    pub fn identity_key(&self) -> Option<String> {
        let digits: String = self
            .national_id
            .chars()
            .filter(|c| c.is_ascii_digit())
            .collect();
        if digits.is_empty() {
            None
        } else {
            Some(format!("cpf-{}", digits))
        }
    }
}

/// One terminal delivery status reported by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallStatusRecord {
    pub call_sid: String,
    pub status: CallStatus,
    pub to: String,
    pub recorded_at: String,
}

/// Strips formatting and prepends the Brazilian country code to bare
/// national numbers (two-digit area code plus eight or nine digits).
/// Anything else passes through digits-only; the provider rejects what it
/// cannot route.
pub fn normalize_phone(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if !digits.starts_with("55") && (digits.len() == 10 || digits.len() == 11) {
        format!("55{}", digits)
    } else {
        digits
    }
}
