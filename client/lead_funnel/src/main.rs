//! Lead funnel — terminal entry point.
//!
//! Shows the landing view, walks the visitor through the quiz and submits
//! the finished lead to the configured lead endpoint. Analytics events are
//! cached in a local SQLite log.

mod terminal;

use std::sync::Arc;

use reqwest::Client;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use lead_funnel::analytics::{
    AnalyticsLogger, ClientContext, EventStore, IpCache, RemoteAnalytics, Visitor,
};
use lead_funnel::config::Config;
use lead_funnel::lead::HttpLeadSink;
use lead_funnel::quiz::{FunnelServices, QuizSettings};
use lead_funnel::{event_log, ip};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging (RUST_LOG controls verbosity).
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    // Load optional .env file (ignored if missing).
    let _ = dotenvy::dotenv();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!("{e}"))?;

    // HTTP client shared by the IP lookup, lead submission and analytics.
    let client = Client::builder().timeout(config.http_timeout).build()?;

    // ─── Visitor context ──────────────────────────────────
    let ip_cache = IpCache::new();
    ip::spawn_lookup(client.clone(), config.ip_lookup_url.clone(), ip_cache.clone());

    let visitor = Arc::new(Visitor::new(
        ClientContext::detect(),
        &config.page_url,
        &config.referrer,
        ip_cache,
    ));

    // ─── Analytics ────────────────────────────────────────
    // The local log is a best-effort cache; the funnel runs without it.
    let store: Option<Arc<dyn EventStore>> = match event_log::init_pool(&config.database_url).await
    {
        Ok(pool) => Some(Arc::new(pool)),
        Err(e) => {
            warn!("Analytics log unavailable: {e}");
            None
        }
    };
    let remote = config.analytics_remote.then(|| RemoteAnalytics {
        client: client.clone(),
        base_url: config.lead_api_url.clone(),
    });
    let events = Arc::new(AnalyticsLogger::new(visitor.clone(), store, remote));

    // ─── Funnel ───────────────────────────────────────────
    let leads = Arc::new(HttpLeadSink::new(client, &config.lead_api_url));
    info!("Submitting leads to {}", leads.endpoint());

    let services = FunnelServices {
        events: events.clone(),
        leads,
        visitor,
    };
    let settings = QuizSettings {
        language: config.language,
        reset_delay: config.reset_delay,
    };

    info!("Funnel language: {}", settings.language.as_str());

    let outcome = terminal::run(services, settings).await;

    // Flush queued analytics before exiting.
    events.close().await;
    outcome
}
