//! Validated proxy representation.

use crate::error::PoolError;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use tokio::time::Instant;

/// A proxy that passed validation and may be used for queries.
#[derive(Debug, Clone)]
pub struct ValidatedProxy {
    /// Candidate address, e.g. "203.0.113.7:3128". Unique within a pool.
    pub address: String,
    /// HTTP client that routes through this proxy.
    pub transport: reqwest::Client,
    /// Minimum idle time between two uses of this proxy.
    pub min_interval: Duration,
    /// Last successful use; `None` if never used.
    pub last_access: Option<Instant>,
}

impl ValidatedProxy {
    /// Create a never-used proxy record.
    pub fn new(
        address: impl Into<String>,
        transport: reqwest::Client,
        min_interval: Duration,
    ) -> Self {
        Self {
            address: address.into(),
            transport,
            min_interval,
            last_access: None,
        }
    }

    /// Whether the cooldown has elapsed at `now`.
    pub fn is_available_at(&self, now: Instant) -> bool {
        match self.last_access {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.min_interval,
        }
    }

    /// Time left until the proxy may be used again.
    pub fn remaining_at(&self, now: Instant) -> Duration {
        match self.last_access {
            None => Duration::ZERO,
            Some(last) => self
                .min_interval
                .saturating_sub(now.saturating_duration_since(last)),
        }
    }
}

/// Convert a candidate address to a `reqwest::Proxy`.
///
/// Every request goes through the proxy. Bare `host:port` candidates are
/// HTTP proxies (HTTPS targets are tunnelled with CONNECT); candidates with
/// an explicit scheme such as `socks5://` keep it.
pub fn to_reqwest_proxy(address: &str) -> Result<reqwest::Proxy, reqwest::Error> {
    if address.contains("://") {
        reqwest::Proxy::all(address)
    } else {
        reqwest::Proxy::all(format!("http://{}", address))
    }
}

/// Build the transport bound to one candidate.
pub fn build_transport(
    address: &str,
    timeout: Duration,
    verify_certificate: bool,
) -> Result<reqwest::Client, PoolError> {
    let transport_err = |source| PoolError::Transport {
        address: address.to_string(),
        source,
    };
    let proxy = to_reqwest_proxy(address).map_err(transport_err)?;
    reqwest::Client::builder()
        .proxy(proxy)
        .timeout(timeout)
        .danger_accept_invalid_certs(!verify_certificate)
        .pool_max_idle_per_host(1)
        .build()
        .map_err(transport_err)
}

/// Cooldown drawn uniformly from `[min, max)`, determined by the address and seed.
pub fn cooldown_for(address: &str, seed: u64, min: Duration, max: Duration) -> Duration {
    if max <= min {
        return min;
    }
    let mut rng = StdRng::seed_from_u64(address_seed(address, seed));

    let lo = u64::try_from(min.as_nanos()).unwrap_or(u64::MAX);
    let hi = u64::try_from(max.as_nanos()).unwrap_or(u64::MAX);
    if hi <= lo {
        return min;
    }
    Duration::from_nanos(rng.random_range(lo..hi))
}

/// FNV-1a over the address bytes, starting from `seed`.
fn address_seed(address: &str, seed: u64) -> u64 {
    address.bytes().fold(seed ^ 0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0000_0100_0000_01b3)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cooldown_stays_in_range() {
        let min = Duration::from_secs(5);
        let max = Duration::from_secs(15);
        for i in 0..200 {
            let address = format!("10.0.{}.{}:8080", i / 256, i % 256);
            let interval = cooldown_for(&address, 42, min, max);
            assert!(interval >= min && interval < max, "{:?}", interval);
        }
    }

    #[test]
    fn cooldown_depends_only_on_address_and_seed() {
        let min = Duration::from_secs(1);
        let max = Duration::from_secs(100);
        let a = cooldown_for("1.2.3.4:80", 7, min, max);
        assert_eq!(a, cooldown_for("1.2.3.4:80", 7, min, max));
        let others: Vec<_> = (0..8)
            .map(|seed| cooldown_for("1.2.3.4:80", seed, min, max))
            .collect();
        assert!(others.iter().any(|d| *d != others[0]));
    }

    #[test]
    fn address_seed_is_fixed_fnv1a() {
        assert_eq!(address_seed("a:1", 0), 0xe661_e419_04a0_9e69);
        assert_ne!(address_seed("a:1", 1), address_seed("a:1", 0));
    }

    #[test]
    fn degenerate_range_yields_floor() {
        let d = Duration::from_secs(3);
        assert_eq!(cooldown_for("a:1", 0, d, d), d);
    }

    #[test]
    fn bare_and_schemed_candidates_convert() {
        assert!(to_reqwest_proxy("127.0.0.1:3128").is_ok());
        assert!(to_reqwest_proxy("socks5://127.0.0.1:1080").is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn never_used_proxy_is_available() {
        let proxy = ValidatedProxy::new("a:1", reqwest::Client::new(), Duration::from_secs(60));
        let now = Instant::now();
        assert!(proxy.is_available_at(now));
        assert_eq!(proxy.remaining_at(now), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn used_proxy_cools_down() {
        let mut proxy = ValidatedProxy::new("a:1", reqwest::Client::new(), Duration::from_secs(5));
        proxy.last_access = Some(Instant::now());
        assert!(!proxy.is_available_at(Instant::now()));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(proxy.remaining_at(Instant::now()), Duration::from_secs(3));

        tokio::time::advance(Duration::from_secs(3)).await;
        assert!(proxy.is_available_at(Instant::now()));
    }
}
