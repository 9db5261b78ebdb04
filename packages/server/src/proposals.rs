//! Governance proposal count proxy.
//!
//! Fetches the upstream proposal index, counts proposals matching the
//! deployment's filter, and caches the result. Upstream failures never reach
//! the caller: a stale cached count is served if one exists, otherwise the
//! configured fallback count.

use std::time::{Duration, Instant, SystemTime};

use anyhow::{bail, Context, Result};
use ens_delegate_core::{count_proposals, Proposal, ProposalFilter};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CountSource {
    Live,
    Cached,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalCount {
    pub filter: ProposalFilter,
    pub count: u64,
    pub source: CountSource,
}

/// Upstream body: a bare array or an object wrapping one. Entries are
/// decoded one by one so a malformed proposal does not hide the rest.
#[derive(Deserialize)]
#[serde(untagged)]
enum ProposalList {
    Bare(Vec<Value>),
    Wrapped { proposals: Vec<Value> },
}

impl ProposalList {
    fn into_vec(self) -> Vec<Proposal> {
        let entries = match self {
            Self::Bare(v) => v,
            Self::Wrapped { proposals } => proposals,
        };
        entries
            .into_iter()
            .filter_map(|entry| match serde_json::from_value(entry) {
                Ok(p) => Some(p),
                Err(e) => {
                    tracing::debug!(error = %e, "skipping malformed proposal");
                    None
                }
            })
            .collect()
    }
}

pub struct ProposalService {
    http: reqwest::Client,
    url: String,
    filter: ProposalFilter,
    fallback_count: u64,
    ttl: Duration,
    /// Last live count and when it was fetched.
    cache: Mutex<Option<(u64, Instant)>>,
    /// Held while fetching upstream; concurrent callers wait and reuse the
    /// refreshed count.
    refresh: Mutex<()>,
}

impl ProposalService {
    pub fn new(url: String, filter: ProposalFilter, fallback_count: u64, ttl: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            url,
            filter,
            fallback_count,
            ttl,
            cache: Mutex::new(None),
            refresh: Mutex::new(()),
        }
    }

    pub fn filter(&self) -> ProposalFilter {
        self.filter
    }

    pub async fn count(&self) -> ProposalCount {
        if let Some(count) = self.fresh().await {
            return self.result(count, CountSource::Cached);
        }

        let _refresh = self.refresh.lock().await;
        if let Some(count) = self.fresh().await {
            return self.result(count, CountSource::Cached);
        }

        let cached = *self.cache.lock().await;
        match self.fetch_count().await {
            Ok(count) => {
                *self.cache.lock().await = Some((count, Instant::now()));
                tracing::debug!(filter = %self.filter, count, "proposal count refreshed");
                self.result(count, CountSource::Live)
            }
            Err(e) => {
                tracing::warn!(error = %format!("{:#}", e), url = %self.url, "proposal index unavailable");
                match cached {
                    Some((count, _)) => self.result(count, CountSource::Cached),
                    None => self.result(self.fallback_count, CountSource::Fallback),
                }
            }
        }
    }

    /// Cached count, if still within the TTL.
    async fn fresh(&self) -> Option<u64> {
        match *self.cache.lock().await {
            Some((count, fetched_at)) if fetched_at.elapsed() < self.ttl => Some(count),
            _ => None,
        }
    }

    async fn fetch_count(&self) -> Result<u64> {
        let resp = self
            .http
            .get(&self.url)
            .send()
            .await
            .context("proposal index request failed")?;
        if !resp.status().is_success() {
            bail!("proposal index returned {}", resp.status());
        }
        let list: ProposalList = resp
            .json()
            .await
            .context("failed to parse proposal index response")?;
        Ok(count_proposals(&list.into_vec(), self.filter, unix_now()))
    }

    fn result(&self, count: u64, source: CountSource) -> ProposalCount {
        ProposalCount {
            filter: self.filter,
            count,
            source,
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
