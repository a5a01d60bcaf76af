//! Query dispatch through the proxy pool.

use crate::cache::CachedCitation;
use crate::config::ProxyPoolConfig;
use crate::error::{QueryError, SourceError};
use crate::pool::ProxyPool;
use crate::source::{Publication, PublicationSource};

use log::{error, info, warn};

/// Sends citation queries through the pool, evicting proxies the remote
/// service rejects and retrying with another one.
pub struct Dispatcher<S> {
    /// The proxy pool. Owned by this session.
    pool: ProxyPool,
    source: S,
    refusal_patterns: Vec<String>,
    pick_retry: usize,
    max_attempts: usize,
}

impl<S: PublicationSource> Dispatcher<S> {
    pub fn new(pool: ProxyPool, source: S, config: &ProxyPoolConfig) -> Self {
        let (total, available) = pool.get_stats();
        info!("Dispatcher ready with {}/{} available proxies", available, total);
        if total == 0 {
            warn!("No proxies in pool; every query will fail");
        }

        Self {
            pool,
            source,
            refusal_patterns: config.refusal_patterns.clone(),
            pick_retry: config.pick_retry,
            max_attempts: config.max_attempts,
        }
    }

    pub fn pool(&self) -> &ProxyPool {
        &self.pool
    }

    /// [`query`](Self::query) with the configured attempt count.
    pub async fn citation_count(&self, keyword: &str) -> Result<u64, QueryError> {
        self.query(keyword, self.max_attempts).await
    }

    /// Search `keyword`, take the first hit and return its citation count.
    pub async fn query(&self, keyword: &str, max_attempts: usize) -> Result<u64, QueryError> {
        for attempt in 1..=max_attempts {
            if self.pool.is_empty() {
                error!("No proxies are available, cannot continue");
                return Err(QueryError::PoolEmpty);
            }

            let Some(proxy) = self.pool.pick_random(self.pick_retry).await else {
                error!("Failed to pick any proxy for '{}'", keyword);
                return Err(QueryError::NoProxyAvailable);
            };
            info!("Using proxy {} for '{}' (attempt {})", proxy.address, keyword, attempt);

            match self.issue(&proxy.transport, keyword).await {
                Ok(Some(publication)) => {
                    self.pool.mark_used(&proxy.address);
                    let cites = publication.num_citations.unwrap_or(0);
                    info!("[Attempt {}] '{}' => {} citations", attempt, keyword, cites);
                    return Ok(cites);
                }
                Ok(None) => {
                    info!("No publications found for '{}'", keyword);
                    return Err(QueryError::NoResultFound {
                        keyword: keyword.to_string(),
                    });
                }
                Err(err) => {
                    let kind = err.classify(&self.refusal_patterns);
                    if kind.evicts() {
                        warn!(
                            "[Attempt {}] {} through {}: {} => removing this proxy",
                            attempt, kind, proxy.address, err.message
                        );
                        self.pool.remove(&proxy.address);
                    } else {
                        warn!(
                            "[Attempt {}] {} through {}: {}",
                            attempt, kind, proxy.address, err.message
                        );
                    }
                }
            }
        }

        error!(
            "Failed to get citation count for '{}' after {} attempts",
            keyword, max_attempts
        );
        Err(QueryError::AttemptsExhausted {
            attempts: max_attempts,
        })
    }

    /// Reuse `cached` when it holds a count, otherwise query again.
    pub async fn resolve(
        &self,
        keyword: &str,
        cached: Option<&str>,
        max_attempts: usize,
    ) -> Result<u64, QueryError> {
        let cached = CachedCitation::parse(cached);
        if let Some(count) = cached.count() {
            return Ok(count);
        }
        if cached == CachedCitation::Failed {
            info!("Re-querying '{}' after a recorded failure", keyword);
        }
        self.query(keyword, max_attempts).await
    }

    async fn issue(
        &self,
        transport: &reqwest::Client,
        keyword: &str,
    ) -> Result<Option<Publication>, SourceError> {
        let Some(first) = self.source.search(transport, keyword).await? else {
            return Ok(None);
        };
        self.source.fill(transport, first).await.map(Some)
    }
}
