//! Candidate validation.

use crate::config::ProxyPoolConfig;
use crate::error::ProbeError;
use crate::proxy::{self, ValidatedProxy};
use crate::source::PublicationSource;
use crate::utils;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::time::Duration;

/// A liveness check run through a candidate's transport.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, address: &str, transport: &reqwest::Client) -> Result<(), ProbeError>;
}

/// Both probes must pass, the first one runs first.
#[async_trait]
impl<A: Probe, B: Probe> Probe for (A, B) {
    async fn probe(&self, address: &str, transport: &reqwest::Client) -> Result<(), ProbeError> {
        self.0.probe(address, transport).await?;
        self.1.probe(address, transport).await
    }
}

/// GETs a fixed endpoint and expects a success status.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    url: String,
    timeout: Duration,
}

impl HttpProbe {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
        }
    }

    pub fn from_config(config: &ProxyPoolConfig) -> Self {
        Self::new(config.probe_url.clone(), config.probe_timeout)
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn probe(&self, _address: &str, transport: &reqwest::Client) -> Result<(), ProbeError> {
        let request = transport.get(&self.url).timeout(self.timeout).send();
        let response = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| ProbeError::Timeout)??;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ProbeError::Status(status))
        }
    }
}

/// Runs a throwaway search through the candidate, rejecting proxies the
/// search service already refuses.
pub struct SearchProbe<S> {
    source: S,
    keyword: String,
    refusal_patterns: Vec<String>,
}

impl<S: PublicationSource> SearchProbe<S> {
    pub fn new(source: S, refusal_patterns: Vec<String>) -> Self {
        Self {
            source,
            keyword: "test".to_string(),
            refusal_patterns,
        }
    }

    pub fn keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = keyword.into();
        self
    }
}

#[async_trait]
impl<S: PublicationSource> Probe for SearchProbe<S> {
    async fn probe(&self, _address: &str, transport: &reqwest::Client) -> Result<(), ProbeError> {
        match self.source.search(transport, &self.keyword).await {
            Ok(_) => Ok(()),
            Err(mut err) => {
                err.kind = err.classify(&self.refusal_patterns);
                Err(err.into())
            }
        }
    }
}

/// Probe candidates in random order and keep at most `config.target_count`
/// of those that pass.
///
/// Rejections are logged and otherwise ignored; an empty result is valid.
pub async fn validate<P: Probe>(
    candidates: Vec<String>,
    config: &ProxyPoolConfig,
    probe: &P,
) -> Vec<ValidatedProxy> {
    let total = candidates.len();
    let mut candidates = utils::filter_candidates(candidates, &config.blocked_patterns);
    if candidates.len() < total {
        debug!("Skipped {} duplicate or blocked candidates", total - candidates.len());
    }

    let seed = config.seed.unwrap_or_else(|| rand::rng().random());
    let mut rng = StdRng::seed_from_u64(seed);
    candidates.shuffle(&mut rng);

    info!(
        "Validating {} candidates (target_count={}, probe_url={})",
        candidates.len(),
        config.target_count,
        config.probe_url
    );

    let mut accepted: Vec<ValidatedProxy> = Vec::new();
    let mut checks = stream::iter(candidates)
        .map(|address| async move {
            let result = check_candidate(&address, config, probe).await;
            (address, result)
        })
        .buffered(config.probe_concurrency);

    while let Some((address, result)) = checks.next().await {
        match result {
            Ok(transport) => {
                let min_interval =
                    proxy::cooldown_for(&address, seed, config.min_interval, config.max_interval);
                debug!("[{}] is valid (interval={:.2}s)", address, min_interval.as_secs_f64());
                accepted.push(ValidatedProxy::new(address, transport, min_interval));
                if accepted.len() >= config.target_count {
                    break;
                }
            }
            Err(e) => warn!("[{}] rejected: {}", address, e),
        }
    }

    info!(
        "{} proxies are valid (out of {}) up to target_count={}",
        accepted.len(),
        total,
        config.target_count
    );
    if accepted.len() < config.target_count {
        warn!(
            "Candidates exhausted with {}/{} proxies validated",
            accepted.len(),
            config.target_count
        );
    }
    accepted
}

async fn check_candidate<P: Probe>(
    address: &str,
    config: &ProxyPoolConfig,
    probe: &P,
) -> Result<reqwest::Client, ProbeError> {
    let transport =
        proxy::build_transport(address, config.request_timeout, config.verify_certificate)
            .map_err(|e| ProbeError::Other(e.to_string()))?;
    probe.probe(address, &transport).await?;
    Ok(transport)
}
