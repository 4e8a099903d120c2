//! Visitor context and the fire-and-forget analytics sink.
//!
//! Every analytics event and lead submission carries the same visitor
//! context: campaign parameters taken from the page URL, a snapshot of the
//! client environment and, once the startup lookup has finished, the
//! visitor's public IP.
//!
//! Events are cached in the local SQLite log (see [`crate::event_log`]) and,
//! when enabled, also POSTed to the analytics endpoint. Neither path can fail
//! the caller; problems are logged and dropped.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::SqlitePool;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use url::Url;

use crate::errors::Result;
use crate::event_log;

/// Event names emitted by the funnel.
pub mod names {
    pub const PAGE_VIEW: &str = "page_view";
    pub const QUIZ_START: &str = "quiz_start";
    pub const QUIZ_STEP: &str = "quiz_step";
    pub const QUIZ_VALIDATION_ERROR: &str = "quiz_validation_error";
    pub const QUIZ_COMPLETE: &str = "quiz_complete";
}

// ─────────────────────────────────────────────────────────
// Campaign parameters
// ─────────────────────────────────────────────────────────

/// Campaign-tracking parameters; each is present only if the page URL had a
/// non-empty value for it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtmParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utm_source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utm_medium: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utm_campaign: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utm_term: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utm_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utm_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utm_source_platform: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gclid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fbclid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msclkid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttclid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yclid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gbraid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wbraid: Option<String>,
    #[serde(rename = "_ga", skip_serializing_if = "Option::is_none")]
    pub ga: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mc_eid: Option<String>,
}

impl UtmParams {
    /// Collect the parameters from a URL query string (without the `?`).
    /// The first occurrence of a repeated key wins.
    pub fn from_query(query: &str) -> Self {
        let mut params = Self::default();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            if value.is_empty() {
                continue;
            }
            if let Some(slot) = params.slot(&key) {
                if slot.is_none() {
                    *slot = Some(value.into_owned());
                }
            }
        }
        params
    }

    /// Collect the parameters from a full page URL. An unparsable URL yields
    /// no parameters.
    pub fn from_url(page_url: &str) -> Self {
        match Url::parse(page_url) {
            Ok(url) => Self::from_query(url.query().unwrap_or("")),
            Err(e) => {
                debug!("Page URL {page_url:?} not parsable ({e}), no UTM parameters");
                Self::default()
            }
        }
    }

    fn slot(&mut self, key: &str) -> Option<&mut Option<String>> {
        let slot = match key {
            "utm_source" => &mut self.utm_source,
            "utm_medium" => &mut self.utm_medium,
            "utm_campaign" => &mut self.utm_campaign,
            "utm_term" => &mut self.utm_term,
            "utm_content" => &mut self.utm_content,
            "utm_id" => &mut self.utm_id,
            "utm_source_platform" => &mut self.utm_source_platform,
            "gclid" => &mut self.gclid,
            "fbclid" => &mut self.fbclid,
            "msclkid" => &mut self.msclkid,
            "ttclid" => &mut self.ttclid,
            "yclid" => &mut self.yclid,
            "gbraid" => &mut self.gbraid,
            "wbraid" => &mut self.wbraid,
            "_ga" => &mut self.ga,
            "mc_eid" => &mut self.mc_eid,
            _ => return None,
        };
        Some(slot)
    }
}

// ─────────────────────────────────────────────────────────
// Client environment
// ─────────────────────────────────────────────────────────

/// Static description of the client the funnel runs in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientContext {
    pub user_agent: String,
    pub language: String,
    pub platform: String,
    pub screen_width: u32,
    pub screen_height: u32,
    pub timezone: String,
}

impl ClientContext {
    /// Describe the current terminal session from its environment.
    pub fn detect() -> Self {
        let var = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());
        let language = var("LANG")
            .map(|lang| lang.split('.').next().unwrap_or("").replace('_', "-"))
            .filter(|lang| !lang.is_empty())
            .unwrap_or_else(|| "en-US".to_string());

        Self {
            user_agent: format!(
                "{}/{} ({})",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION"),
                std::env::consts::OS
            ),
            language,
            platform: format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH),
            screen_width: var("COLUMNS").and_then(|v| v.parse().ok()).unwrap_or(80),
            screen_height: var("LINES").and_then(|v| v.parse().ok()).unwrap_or(24),
            timezone: var("TZ").unwrap_or_else(|| "UTC".to_string()),
        }
    }
}

/// Snapshot of the client environment attached to events and leads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
    pub user_agent: String,
    pub language: String,
    pub platform: String,
    pub screen_width: u32,
    pub screen_height: u32,
    pub timezone: String,
    /// ISO-8601, UTC.
    pub timestamp: String,
    #[serde(rename = "realIP", skip_serializing_if = "Option::is_none")]
    pub real_ip: Option<String>,
}

/// The visitor's public IP, looked up once at startup.
///
/// Written at most once by [`crate::ip::spawn_lookup`] and read-only from
/// then on. Clones share the same cell.
#[derive(Debug, Clone, Default)]
pub struct IpCache {
    cell: Arc<OnceCell<String>>,
}

impl IpCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<&str> {
        self.cell.get().map(String::as_str)
    }

    /// Store the IP. Returns `false` if one was already stored.
    pub fn set(&self, ip: String) -> bool {
        self.cell.set(ip).is_ok()
    }
}

/// Everything known about the current visitor.
#[derive(Debug, Clone)]
pub struct Visitor {
    pub client: ClientContext,
    pub utm: UtmParams,
    pub page_url: String,
    pub referrer: String,
    ip: IpCache,
}

impl Visitor {
    pub fn new(client: ClientContext, page_url: &str, referrer: &str, ip: IpCache) -> Self {
        Self {
            client,
            utm: UtmParams::from_url(page_url),
            page_url: page_url.to_string(),
            referrer: referrer.to_string(),
            ip,
        }
    }

    /// Client snapshot stamped with the current time.
    pub fn user_data(&self) -> UserData {
        UserData {
            user_agent: self.client.user_agent.clone(),
            language: self.client.language.clone(),
            platform: self.client.platform.clone(),
            screen_width: self.client.screen_width,
            screen_height: self.client.screen_height,
            timezone: self.client.timezone.clone(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            real_ip: self.ip.get().map(String::from),
        }
    }

    pub fn event(&self, event: &str, data: Option<Value>) -> AnalyticsEvent {
        AnalyticsEvent {
            event: event.to_string(),
            user_data: self.user_data(),
            utm_params: self.utm.clone(),
            page_url: self.page_url.clone(),
            referrer: self.referrer.clone(),
            data,
        }
    }
}

// ─────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsEvent {
    pub event: String,
    pub user_data: UserData,
    pub utm_params: UtmParams,
    pub page_url: String,
    pub referrer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Destination of funnel observability events.
///
/// Calls never block and never fail; delivery is best effort.
pub trait EventSink: Send + Sync {
    fn log_event(&self, event: &str, data: Option<Value>);
}

/// Something that can durably record an analytics event.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn append(&self, event: &AnalyticsEvent) -> Result<()>;
}

#[async_trait]
impl EventStore for SqlitePool {
    async fn append(&self, event: &AnalyticsEvent) -> Result<()> {
        event_log::append_event(self, event).await
    }
}

/// Remote analytics endpoint (`POST {base}/api/analytics/event`).
#[derive(Debug, Clone)]
pub struct RemoteAnalytics {
    pub client: Client,
    pub base_url: String,
}

impl RemoteAnalytics {
    async fn send(&self, event: &AnalyticsEvent) -> Result<()> {
        let url = format!("{}/api/analytics/event", self.base_url);
        let status = self.client.post(&url).json(event).send().await?.status();
        if !status.is_success() {
            debug!("Analytics endpoint answered {status}");
        }
        Ok(())
    }
}

/// [`EventSink`] that caches events locally and optionally forwards them.
///
/// A single writer task drains the queue, so events reach the log in the
/// order they were logged. Must be created inside a tokio runtime.
pub struct AnalyticsLogger {
    visitor: Arc<Visitor>,
    queue: Mutex<Option<UnboundedSender<AnalyticsEvent>>>,
    writer: Mutex<Option<JoinHandle<()>>>,
}

impl AnalyticsLogger {
    pub fn new(
        visitor: Arc<Visitor>,
        store: Option<Arc<dyn EventStore>>,
        remote: Option<RemoteAnalytics>,
    ) -> Self {
        let (queue, events) = mpsc::unbounded_channel();
        let writer = tokio::spawn(run_writer(events, store, remote));
        Self {
            visitor,
            queue: Mutex::new(Some(queue)),
            writer: Mutex::new(Some(writer)),
        }
    }

    /// Stop accepting events and wait until the queued ones are written.
    pub async fn close(&self) {
        drop(take(&self.queue));
        if let Some(writer) = take(&self.writer) {
            if let Err(e) = writer.await {
                warn!("Analytics writer stopped abnormally: {e}");
            }
        }
    }
}

fn take<T>(slot: &Mutex<Option<T>>) -> Option<T> {
    slot.lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .take()
}

async fn run_writer(
    mut events: UnboundedReceiver<AnalyticsEvent>,
    store: Option<Arc<dyn EventStore>>,
    remote: Option<RemoteAnalytics>,
) {
    while let Some(event) = events.recv().await {
        record_event(store.as_deref(), remote.as_ref(), &event).await;
    }
    debug!("Analytics queue closed");
}

async fn record_event(
    store: Option<&dyn EventStore>,
    remote: Option<&RemoteAnalytics>,
    event: &AnalyticsEvent,
) {
    if let Some(store) = store {
        if let Err(e) = store.append(event).await {
            warn!("Failed to cache analytics event {}: {e}", event.event);
        }
    }
    if let Some(remote) = remote {
        if let Err(e) = remote.send(event).await {
            debug!("Analytics event {} not delivered: {e}", event.event);
        }
    }
}

impl EventSink for AnalyticsLogger {
    fn log_event(&self, event: &str, data: Option<Value>) {
        let event = self.visitor.event(event, data);
        debug!("Analytics event: {}", event.event);

        let queue = self.queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        match queue.as_ref() {
            Some(queue) => {
                if queue.send(event).is_err() {
                    warn!("Analytics writer is gone, event dropped");
                }
            }
            None => debug!("Analytics logger closed, event {} dropped", event.event),
        }
    }
}
