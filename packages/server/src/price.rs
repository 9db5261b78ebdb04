//! ETH/USD spot price, used only to decorate gas estimates.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde::Deserialize;
use tokio::sync::Mutex;

const PRICE_CACHE_TTL: Duration = Duration::from_secs(300);

#[derive(Deserialize)]
struct SimplePrice {
    ethereum: UsdQuote,
}

#[derive(Deserialize)]
struct UsdQuote {
    usd: f64,
}

pub struct PriceClient {
    http: reqwest::Client,
    url: Option<String>,
    cache: Mutex<Option<(f64, Instant)>>,
}

impl PriceClient {
    pub fn new(url: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url,
            cache: Mutex::new(None),
        }
    }

    /// Current ETH price in USD, or `None` if disabled or unavailable.
    pub async fn eth_usd(&self) -> Option<f64> {
        let url = self.url.as_deref()?;

        let cached = *self.cache.lock().await;
        if let Some((price, fetched_at)) = cached {
            if fetched_at.elapsed() < PRICE_CACHE_TTL {
                return Some(price);
            }
        }

        match self.fetch(url).await {
            Ok(price) => {
                *self.cache.lock().await = Some((price, Instant::now()));
                Some(price)
            }
            Err(e) => {
                tracing::warn!(error = %format!("{:#}", e), "failed to fetch ETH price");
                cached.map(|(price, _)| price)
            }
        }
    }

    async fn fetch(&self, url: &str) -> Result<f64> {
        let quote: SimplePrice = self
            .http
            .get(url)
            .send()
            .await
            .context("price request failed")?
            .error_for_status()
            .context("price endpoint returned an error")?
            .json()
            .await
            .context("failed to parse price response")?;
        Ok(quote.ethereum.usd)
    }
}
