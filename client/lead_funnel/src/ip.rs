//! One-shot public IP lookup performed at startup.

use reqwest::Client;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::analytics::IpCache;
use crate::errors::Result;

#[derive(Debug, Deserialize)]
struct IpResponse {
    ip: String,
}

/// Ask the lookup service for the caller's public IP.
pub async fn fetch_public_ip(client: &Client, lookup_url: &str) -> Result<Option<String>> {
    let response = client.get(lookup_url).send().await?;
    if !response.status().is_success() {
        debug!("IP lookup answered {}", response.status());
        return Ok(None);
    }
    let body: IpResponse = response.json().await?;
    Ok(Some(body.ip).filter(|ip| !ip.is_empty()))
}

/// Run the lookup in the background and fill `cache` when it succeeds.
///
/// The cache stays empty if the lookup fails; it is never retried.
pub fn spawn_lookup(client: Client, lookup_url: String, cache: IpCache) -> JoinHandle<()> {
    tokio::spawn(async move {
        match fetch_public_ip(&client, &lookup_url).await {
            Ok(Some(ip)) => {
                debug!("Public IP resolved");
                cache.set(ip);
            }
            Ok(None) => debug!("IP lookup returned no address"),
            Err(e) => warn!("Failed to fetch real IP: {e}"),
        }
    })
}
