//! Lead submission client — shapes the finished lead and posts it to the
//! lead endpoint.
//!
//! ## Delivery
//!
//! * Submissions are dispatched as detached tasks; nobody waits for them.
//! * There is no retry. A failed or partial delivery is logged as a warning
//!   and otherwise ignored, the visitor is already on the confirmation step.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::analytics::{UserData, UtmParams};
use crate::errors::{FunnelError, Result};
use crate::phone;
use crate::store::{wire_value, Capital, LeadAnswers, Motivation, Readiness};

// ─────────────────────────────────────────────────────────
// Request / response shapes
// ─────────────────────────────────────────────────────────

/// The lead itself. Answers are sent as their wire values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadPayload {
    pub name: String,
    /// Canonical international form, e.g. `+41791234567`.
    pub phone: String,
    pub email: String,
    pub capital: String,
    pub motivation: String,
    pub readiness: String,
}

impl LeadPayload {
    pub fn from_answers(answers: &LeadAnswers) -> Self {
        Self {
            name: answers.name.clone(),
            phone: phone::to_international(
                &answers.phone_country_code,
                &answers.phone_national_number,
            ),
            email: answers.email.clone(),
            capital: wire_value(answers.capital, Capital::as_str).to_string(),
            motivation: wire_value(answers.motivation, Motivation::as_str).to_string(),
            readiness: wire_value(answers.readiness, Readiness::as_str).to_string(),
        }
    }
}

/// Body of `POST /api/lead`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadRequest {
    pub lead: LeadPayload,
    pub utm_params: UtmParams,
    pub user_data: UserData,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadResponse {
    /// Whether the backend managed to forward the lead to its chat bot.
    #[serde(default)]
    pub telegram_sent: bool,
}

/// Outcome of a detached submission, only ever logged by the funnel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    Delivered { telegram_sent: bool },
    Failed,
}

// ─────────────────────────────────────────────────────────
// Sinks
// ─────────────────────────────────────────────────────────

/// Receiver of finished leads.
#[async_trait]
pub trait LeadSink: Send + Sync {
    async fn submit(&self, request: &LeadRequest) -> Result<LeadResponse>;
}

/// [`LeadSink`] posting to `{base_url}/api/lead`.
#[derive(Debug, Clone)]
pub struct HttpLeadSink {
    client: Client,
    base_url: String,
}

impl HttpLeadSink {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}/api/lead", self.base_url)
    }
}

#[async_trait]
impl LeadSink for HttpLeadSink {
    async fn submit(&self, request: &LeadRequest) -> Result<LeadResponse> {
        let endpoint = self.endpoint();
        let response = self.client.post(&endpoint).json(request).send().await?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        if !content_type.contains("application/json") {
            // Drain the body so the connection can be reused.
            let _ = response.text().await;
            return Err(FunnelError::UnexpectedResponse {
                endpoint,
                status: status.as_u16(),
                content_type,
            });
        }

        let body: LeadResponse = response.json().await?;
        if !status.is_success() {
            return Err(FunnelError::UnexpectedResponse {
                endpoint,
                status: status.as_u16(),
                content_type,
            });
        }
        Ok(body)
    }
}

/// Submit `request` on a detached task.
///
/// The returned handle may be dropped; the submission runs to completion
/// regardless and its outcome is logged.
pub fn dispatch(sink: Arc<dyn LeadSink>, request: LeadRequest) -> JoinHandle<DeliveryStatus> {
    tokio::spawn(async move {
        match sink.submit(&request).await {
            Ok(response) => {
                info!("Lead sent successfully");
                if !response.telegram_sent {
                    warn!("Lead was saved but failed to send to Telegram bot");
                }
                DeliveryStatus::Delivered {
                    telegram_sent: response.telegram_sent,
                }
            }
            Err(e) => {
                warn!("Error sending lead (silent mode): {e}");
                DeliveryStatus::Failed
            }
        }
    })
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────
