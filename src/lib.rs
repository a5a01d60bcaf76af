//! # scholar-proxy-pool
//!
//! A validated proxy pool for querying rate-limited search services.
//!
//! Candidates are probed through their proxy, the working ones are pooled with a
//! randomized per-proxy cooldown, and queries are dispatched through a random
//! available proxy. Proxies the service refuses are evicted and the query is
//! retried with another one.

pub mod cache;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod pool;
pub mod proxy;
pub mod source;
mod utils;
pub mod validator;

pub use cache::{format_outcome, CachedCitation};
pub use config::{ProxyPoolConfig, ProxyPoolConfigBuilder, DEFAULT_REFUSAL_PATTERN};
pub use dispatch::Dispatcher;
pub use error::{FailureKind, PoolError, ProbeError, QueryError, SourceError};
pub use pool::{load_candidates, ProxyPool};
pub use proxy::ValidatedProxy;
pub use source::{Publication, PublicationSource};
pub use utils::{parse_proxy_list, write_proxy_list};
pub use validator::{validate, HttpProbe, Probe, SearchProbe};
