//! Core proxy pool implementation.

use crate::config::ProxyPoolConfig;
use crate::error::PoolError;
use crate::proxy::ValidatedProxy;
use crate::utils;
use crate::validator::{self, HttpProbe, Probe};

use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::SeedableRng;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tokio::time::{self, Instant};

/// A pool of validated proxies with per-proxy cooldowns.
///
/// The pool only shrinks: proxies leave through [`remove`](Self::remove) and
/// are never re-admitted.
pub struct ProxyPool {
    /// Proxies still in service.
    proxies: RwLock<Vec<ValidatedProxy>>,
    /// Addresses removed so far.
    evicted: Mutex<HashSet<String>>,
    /// Used for random proxy selection.
    rng: Mutex<StdRng>,
    /// Smallest sleep taken while every proxy is cooling down.
    wait_floor: Duration,
}

impl ProxyPool {
    /// Read candidates from the configured sources and validate them with
    /// an [`HttpProbe`] against `config.probe_url`.
    pub async fn new(config: ProxyPoolConfig) -> Result<Self, PoolError> {
        config.validate()?;
        let candidates = load_candidates(&config.sources).await;
        let probe = HttpProbe::from_config(&config);
        Self::build(candidates, &config, &probe).await
    }

    /// Validate `candidates` with `probe` and pool the ones that pass.
    pub async fn build<P: Probe>(
        candidates: Vec<String>,
        config: &ProxyPoolConfig,
        probe: &P,
    ) -> Result<Self, PoolError> {
        config.validate()?;
        let total = candidates.len();
        let proxies = validator::validate(candidates, config, probe).await;

        info!(
            "Constructed proxy pool with {} valid proxies (out of {})",
            proxies.len(),
            total
        );
        if proxies.is_empty() {
            warn!("No valid proxies available at initialization");
        }

        Ok(Self::from_proxies(proxies, config.seed, config.wait_floor))
    }

    /// Pool already-validated proxies. Duplicate addresses keep the first entry.
    pub fn from_proxies(
        proxies: Vec<ValidatedProxy>,
        seed: Option<u64>,
        wait_floor: Duration,
    ) -> Self {
        let mut seen = HashSet::new();
        let proxies = proxies
            .into_iter()
            .filter(|p| seen.insert(p.address.clone()))
            .collect();
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            proxies: RwLock::new(proxies),
            evicted: Mutex::new(HashSet::new()),
            rng: Mutex::new(rng),
            wait_floor,
        }
    }

    /// Proxies whose cooldown has elapsed.
    pub fn available_now(&self) -> Vec<ValidatedProxy> {
        let now = Instant::now();
        self.proxies
            .read()
            .iter()
            .filter(|p| p.is_available_at(now))
            .cloned()
            .collect()
    }

    /// Time until the first proxy leaves its cooldown, `None` if the pool is empty.
    pub fn shortest_wait(&self) -> Option<Duration> {
        let now = Instant::now();
        self.proxies
            .read()
            .iter()
            .map(|p| p.remaining_at(now))
            .min()
    }

    /// Pick a random available proxy, sleeping while all of them cool down.
    ///
    /// Gives up after `retry_budget` rounds, or as soon as the pool is empty.
    pub async fn pick_random(&self, retry_budget: usize) -> Option<ValidatedProxy> {
        for _ in 0..retry_budget {
            let (chosen, wait) = {
                let now = Instant::now();
                let proxies = self.proxies.read();
                if proxies.is_empty() {
                    warn!("No proxy left in pool");
                    return None;
                }
                let available: Vec<&ValidatedProxy> =
                    proxies.iter().filter(|p| p.is_available_at(now)).collect();
                let chosen = available.choose(&mut *self.rng.lock()).map(|p| (*p).clone());
                let wait = proxies.iter().map(|p| p.remaining_at(now)).min();
                (chosen, wait)
            };

            if let Some(proxy) = chosen {
                return Some(proxy);
            }

            let wait = wait.unwrap_or_default().max(self.wait_floor);
            info!("All proxies are cooling down. Waiting {:.1} seconds...", wait.as_secs_f64());
            time::sleep(wait).await;
        }
        None
    }

    /// Record a successful use of the proxy at `address`.
    pub fn mark_used(&self, address: &str) {
        let mut proxies = self.proxies.write();
        if let Some(proxy) = proxies.iter_mut().find(|p| p.address == address) {
            proxy.last_access = Some(Instant::now());
        }
    }

    /// Permanently remove the proxy at `address`. Returns false if it was
    /// not in the pool.
    pub fn remove(&self, address: &str) -> bool {
        let mut proxies = self.proxies.write();
        let Some(idx) = proxies.iter().position(|p| p.address == address) else {
            return false;
        };
        proxies.swap_remove(idx);
        self.evicted.lock().insert(address.to_string());
        info!("Removed proxy {} from pool. {} left.", address, proxies.len());
        true
    }

    /// Number of proxies in the pool.
    pub fn len(&self) -> usize {
        self.proxies.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.read().is_empty()
    }

    pub fn contains(&self, address: &str) -> bool {
        self.proxies.read().iter().any(|p| p.address == address)
    }

    /// Whether `address` was removed from this pool.
    pub fn was_evicted(&self, address: &str) -> bool {
        self.evicted.lock().contains(address)
    }

    pub fn evicted_count(&self) -> usize {
        self.evicted.lock().len()
    }

    /// Addresses of the proxies in the pool.
    pub fn addresses(&self) -> Vec<String> {
        self.proxies.read().iter().map(|p| p.address.clone()).collect()
    }

    /// Get statistics about the proxy pool: (total, available now).
    pub fn get_stats(&self) -> (usize, usize) {
        let now = Instant::now();
        let proxies = self.proxies.read();
        let available = proxies.iter().filter(|p| p.is_available_at(now)).count();
        (proxies.len(), available)
    }

    /// Write the surviving addresses, one per line.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), PoolError> {
        let addresses = self.addresses();
        utils::write_proxy_list(path.as_ref(), addresses.iter().map(String::as_str))?;
        debug!("Saved {} proxies to {}", addresses.len(), path.as_ref().display());
        Ok(())
    }
}

/// Read candidates from every source; unreadable sources are skipped.
pub async fn load_candidates(sources: &[String]) -> Vec<String> {
    info!("Loading candidates from {} sources", sources.len());

    let mut all = Vec::new();
    for source in sources {
        match utils::fetch_proxies_from_source(source).await {
            Ok(found) => {
                info!("Fetched {} candidates from {}", found.len(), source);
                all.extend(found);
            }
            Err(e) => warn!("Failed to fetch candidates from {}: {:#}", source, e),
        }
    }
    all
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proxy(address: &str, secs: u64) -> ValidatedProxy {
        ValidatedProxy::new(address, reqwest::Client::new(), Duration::from_secs(secs))
    }

    fn pool(proxies: Vec<ValidatedProxy>) -> ProxyPool {
        ProxyPool::from_proxies(proxies, Some(1), Duration::from_millis(100))
    }

    fn assert_waited(start: Instant, expected: Duration) {
        let elapsed = start.elapsed();
        assert!(
            elapsed >= expected && elapsed < expected + Duration::from_millis(5),
            "waited {:?}, expected {:?}",
            elapsed,
            expected
        );
    }

    #[tokio::test(start_paused = true)]
    async fn never_used_proxies_are_available() {
        let pool = pool(vec![proxy("a:1", 5), proxy("b:1", 10)]);
        assert_eq!(pool.available_now().len(), 2);
        assert_eq!(pool.shortest_wait(), Some(Duration::ZERO));
        assert_eq!(pool.get_stats(), (2, 2));
    }

    #[tokio::test(start_paused = true)]
    async fn used_proxy_reports_its_cooldown() {
        let pool = pool(vec![proxy("a:1", 5)]);
        pool.mark_used("a:1");
        assert!(pool.available_now().is_empty());
        assert_eq!(pool.shortest_wait(), Some(Duration::from_secs(5)));

        time::advance(Duration::from_secs(5)).await;
        assert_eq!(pool.available_now().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn shortest_wait_covers_cooling_members() {
        let pool = pool(vec![proxy("a:1", 8), proxy("b:1", 3)]);
        pool.mark_used("a:1");
        pool.mark_used("b:1");
        time::advance(Duration::from_secs(1)).await;
        assert_eq!(pool.shortest_wait(), Some(Duration::from_secs(2)));
    }

    #[test]
    fn empty_pool_has_no_wait() {
        let pool = pool(Vec::new());
        assert_eq!(pool.shortest_wait(), None);
        assert!(pool.is_empty());
    }

    #[test]
    fn remove_is_idempotent() {
        let pool = pool(vec![proxy("a:1", 5), proxy("b:1", 5)]);
        assert!(pool.remove("a:1"));
        let after_once = pool.addresses();
        assert!(!pool.remove("a:1"));
        assert_eq!(pool.addresses(), after_once);
        assert_eq!(pool.len(), 1);
        assert!(pool.was_evicted("a:1"));
        assert_eq!(pool.evicted_count(), 1);
        assert!(!pool.remove("missing:1"));
    }

    #[test]
    fn duplicate_addresses_are_pooled_once() {
        let pool = pool(vec![proxy("a:1", 5), proxy("a:1", 9)]);
        assert_eq!(pool.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn pick_returns_members_only() {
        let pool = pool(vec![proxy("a:1", 1), proxy("b:1", 1), proxy("c:1", 1)]);
        pool.remove("b:1");
        for _ in 0..20 {
            let picked = pool.pick_random(3).await.unwrap();
            assert!(pool.contains(&picked.address));
            assert_ne!(picked.address, "b:1");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn pick_waits_for_cooldown() {
        let pool = pool(vec![proxy("a:1", 5)]);
        pool.mark_used("a:1");
        let start = Instant::now();
        let picked = pool.pick_random(3).await.unwrap();
        assert_eq!(picked.address, "a:1");
        assert_waited(start, Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn pick_gives_up_after_budget() {
        let pool = pool(vec![proxy("a:1", 60)]);
        pool.mark_used("a:1");
        let start = Instant::now();
        // Each round sleeps the full remaining cooldown, so a single round
        // ends exactly when the proxy frees up and the budget is spent.
        assert!(pool.pick_random(1).await.is_none());
        assert_waited(start, Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn pick_sleeps_at_least_the_floor() {
        let pool = ProxyPool::from_proxies(
            vec![proxy("a:1", 0)],
            Some(1),
            Duration::from_millis(100),
        );
        // A zero cooldown proxy is always available.
        pool.mark_used("a:1");
        assert!(pool.pick_random(1).await.is_some());

        let pool = ProxyPool::from_proxies(
            vec![ValidatedProxy::new("b:1", reqwest::Client::new(), Duration::from_millis(10))],
            Some(1),
            Duration::from_millis(100),
        );
        pool.mark_used("b:1");
        let start = Instant::now();
        assert!(pool.pick_random(2).await.is_some());
        assert_waited(start, Duration::from_millis(100));
    }

    #[tokio::test]
    async fn pick_on_empty_pool_returns_none() {
        let pool = pool(Vec::new());
        assert!(pool.pick_random(10).await.is_none());
    }

    #[test]
    fn save_writes_survivors() {
        let pool = pool(vec![proxy("a:1", 5), proxy("b:1", 5)]);
        pool.remove("a:1");
        let path = std::env::temp_dir().join(format!("pool-save-{}.txt", std::process::id()));
        tokio_test::assert_ok!(pool.save(&path));
        let content = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(utils::parse_proxy_list(&content), vec!["b:1"]);
    }

    #[tokio::test]
    async fn inverted_interval_range_fails_build() {
        struct Never;

        #[async_trait::async_trait]
        impl Probe for Never {
            async fn probe(
                &self,
                _address: &str,
                _transport: &reqwest::Client,
            ) -> Result<(), crate::error::ProbeError> {
                unreachable!("config is rejected before probing")
            }
        }

        let config = ProxyPoolConfig::builder()
            .interval_range(Duration::from_secs(9), Duration::from_secs(1))
            .build();
        let result = ProxyPool::build(vec!["a:1".into()], &config, &Never).await;
        assert!(matches!(result, Err(PoolError::InvalidConfig(_))));
    }
}
