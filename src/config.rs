//! Configuration for the proxy pool and the query dispatcher.

use crate::error::PoolError;

use std::time::Duration;

/// Refusal text emitted by the scholar scraper when it blocks an intermediary.
pub const DEFAULT_REFUSAL_PATTERN: &str = "Cannot fetch from Google Scholar.";

/// Configuration for the proxy pool.
#[derive(Debug, Clone)]
pub struct ProxyPoolConfig {
    /// Files or URLs to read candidate proxy lists from.
    pub sources: Vec<String>,
    /// Maximum number of validated proxies kept in the pool.
    pub target_count: usize,
    /// Lower bound (inclusive) of the per-proxy cooldown.
    pub min_interval: Duration,
    /// Upper bound (exclusive) of the per-proxy cooldown.
    pub max_interval: Duration,
    /// URL used to probe candidates.
    pub probe_url: String,
    /// Timeout for a single probe.
    pub probe_timeout: Duration,
    /// Number of probes in flight at once.
    pub probe_concurrency: usize,
    /// Whether TLS certificates are verified through the proxy.
    pub verify_certificate: bool,
    /// Candidates containing any of these substrings are never probed.
    pub blocked_patterns: Vec<String>,
    /// Failure messages containing any of these substrings mean the remote
    /// service refused the proxy.
    pub refusal_patterns: Vec<String>,
    /// How many times a pick waits for a cooling proxy before giving up.
    pub pick_retry: usize,
    /// Number of proxies tried per query.
    pub max_attempts: usize,
    /// Smallest sleep taken while every proxy is cooling down.
    pub wait_floor: Duration,
    /// Timeout applied to dispatched queries.
    pub request_timeout: Duration,
    /// Seed for candidate shuffling, cooldowns and proxy selection.
    pub seed: Option<u64>,
}

impl ProxyPoolConfig {
    /// Create a new configuration builder.
    pub fn builder() -> ProxyPoolConfigBuilder {
        ProxyPoolConfigBuilder::new()
    }

    /// Check the settings that would make the pool misbehave.
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.min_interval > self.max_interval {
            return Err(PoolError::InvalidConfig(format!(
                "min_interval {:?} exceeds max_interval {:?}",
                self.min_interval, self.max_interval
            )));
        }
        if self.target_count == 0 {
            return Err(PoolError::InvalidConfig("target_count must be positive".into()));
        }
        if self.probe_concurrency == 0 {
            return Err(PoolError::InvalidConfig(
                "probe_concurrency must be positive".into(),
            ));
        }
        let probe_url = url::Url::parse(&self.probe_url).map_err(|e| {
            PoolError::InvalidConfig(format!("probe_url {:?}: {}", self.probe_url, e))
        })?;
        if !matches!(probe_url.scheme(), "http" | "https") {
            return Err(PoolError::InvalidConfig(format!(
                "probe_url must be http(s), got {}",
                probe_url.scheme()
            )));
        }
        if self.wait_floor.is_zero() {
            return Err(PoolError::InvalidConfig("wait_floor must be positive".into()));
        }
        Ok(())
    }
}

impl Default for ProxyPoolConfig {
    fn default() -> Self {
        ProxyPoolConfigBuilder::new().build()
    }
}

/// Builder for `ProxyPoolConfig`.
pub struct ProxyPoolConfigBuilder {
    sources: Vec<String>,
    target_count: Option<usize>,
    min_interval: Option<Duration>,
    max_interval: Option<Duration>,
    probe_url: Option<String>,
    probe_timeout: Option<Duration>,
    probe_concurrency: Option<usize>,
    verify_certificate: Option<bool>,
    blocked_patterns: Vec<String>,
    refusal_patterns: Option<Vec<String>>,
    pick_retry: Option<usize>,
    max_attempts: Option<usize>,
    wait_floor: Option<Duration>,
    request_timeout: Option<Duration>,
    seed: Option<u64>,
}

impl ProxyPoolConfigBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            target_count: None,
            min_interval: None,
            max_interval: None,
            probe_url: None,
            probe_timeout: None,
            probe_concurrency: None,
            verify_certificate: None,
            blocked_patterns: Vec::new(),
            refusal_patterns: None,
            pick_retry: None,
            max_attempts: None,
            wait_floor: None,
            request_timeout: None,
            seed: None,
        }
    }

    /// Set the files or URLs to read candidate proxies from.
    pub fn sources(mut self, sources: Vec<impl Into<String>>) -> Self {
        self.sources = sources.into_iter().map(Into::into).collect();
        self
    }

    /// Set the maximum number of validated proxies.
    pub fn target_count(mut self, count: usize) -> Self {
        self.target_count = Some(count);
        self
    }

    /// Set the cooldown range each proxy draws its interval from.
    pub fn interval_range(mut self, min: Duration, max: Duration) -> Self {
        self.min_interval = Some(min);
        self.max_interval = Some(max);
        self
    }

    /// Set the URL used to probe candidates.
    pub fn probe_url(mut self, url: impl Into<String>) -> Self {
        self.probe_url = Some(url.into());
        self
    }

    /// Set the timeout for a single probe.
    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = Some(timeout);
        self
    }

    /// Set how many candidates are probed at once.
    pub fn probe_concurrency(mut self, concurrency: usize) -> Self {
        self.probe_concurrency = Some(concurrency);
        self
    }

    /// Enable or disable TLS certificate verification.
    pub fn verify_certificate(mut self, verify: bool) -> Self {
        self.verify_certificate = Some(verify);
        self
    }

    /// Set substrings that disqualify a candidate before probing.
    pub fn blocked_patterns(mut self, patterns: Vec<impl Into<String>>) -> Self {
        self.blocked_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Set substrings that identify a refusal by the remote service.
    pub fn refusal_patterns(mut self, patterns: Vec<impl Into<String>>) -> Self {
        self.refusal_patterns = Some(patterns.into_iter().map(Into::into).collect());
        self
    }

    /// Set how many waits a single pick may take.
    pub fn pick_retry(mut self, count: usize) -> Self {
        self.pick_retry = Some(count);
        self
    }

    /// Set the number of proxies tried per query.
    pub fn max_attempts(mut self, count: usize) -> Self {
        self.max_attempts = Some(count);
        self
    }

    /// Set the smallest sleep taken while waiting for a cooling proxy.
    pub fn wait_floor(mut self, floor: Duration) -> Self {
        self.wait_floor = Some(floor);
        self
    }

    /// Set the timeout applied to dispatched queries.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Fix the random seed, making validation and selection reproducible.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> ProxyPoolConfig {
        ProxyPoolConfig {
            sources: self.sources,
            target_count: self.target_count.unwrap_or(5),
            min_interval: self.min_interval.unwrap_or(Duration::from_secs(5)),
            max_interval: self.max_interval.unwrap_or(Duration::from_secs(15)),
            probe_url: self.probe_url.unwrap_or_else(|| "https://httpbin.org/ip".to_string()),
            probe_timeout: self.probe_timeout.unwrap_or(Duration::from_secs(5)),
            probe_concurrency: self.probe_concurrency.unwrap_or(1),
            verify_certificate: self.verify_certificate.unwrap_or(true),
            blocked_patterns: self.blocked_patterns,
            refusal_patterns: self
                .refusal_patterns
                .unwrap_or_else(|| vec![DEFAULT_REFUSAL_PATTERN.to_string()]),
            pick_retry: self.pick_retry.unwrap_or(10),
            max_attempts: self.max_attempts.unwrap_or(3),
            wait_floor: self.wait_floor.unwrap_or(Duration::from_millis(100)),
            request_timeout: self.request_timeout.unwrap_or(Duration::from_secs(30)),
            seed: self.seed,
        }
    }
}

impl Default for ProxyPoolConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
