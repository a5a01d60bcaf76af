//! Error types for the scholar-proxy-pool crate.

use std::fmt;

use thiserror::Error;

/// Error raised while building or persisting a pool.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("cannot build transport for {address}: {source}")]
    Transport {
        address: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a candidate failed validation. Absorbed by the validator.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("probe timed out")]
    Timeout,

    #[error("probe answered with status {0}")]
    Status(reqwest::StatusCode),

    #[error("probe request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("remote service refused the proxy: {0}")]
    Refused(String),

    #[error("probe failed: {0}")]
    Other(String),
}

impl From<reqwest::Error> for ProbeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProbeError::Timeout
        } else {
            ProbeError::Request(err)
        }
    }
}

impl From<SourceError> for ProbeError {
    fn from(err: SourceError) -> Self {
        match err.kind {
            FailureKind::Refused => ProbeError::Refused(err.message),
            FailureKind::Timeout => ProbeError::Timeout,
            FailureKind::Other => ProbeError::Other(err.message),
        }
    }
}

/// Terminal outcome of a dispatched query.
///
/// Each variant asks the caller for a different reaction: `NoResultFound`
/// concerns one keyword, `PoolEmpty` and `NoProxyAvailable` mean the pool
/// can no longer serve anything.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("proxy pool is empty")]
    PoolEmpty,

    #[error("no proxy became available")]
    NoProxyAvailable,

    #[error("no publication found for {keyword:?}")]
    NoResultFound { keyword: String },

    #[error("query failed after {attempts} attempts")]
    AttemptsExhausted { attempts: usize },
}

impl QueryError {
    /// Integer code written in place of a citation count.
    pub fn sentinel(&self) -> i64 {
        match self {
            QueryError::AttemptsExhausted { .. } => -1,
            QueryError::NoResultFound { .. } => -2,
            QueryError::NoProxyAvailable => -3,
            QueryError::PoolEmpty => -4,
        }
    }

    /// True when no further query can succeed with this pool.
    pub fn is_pool_exhausted(&self) -> bool {
        matches!(self, QueryError::PoolEmpty | QueryError::NoProxyAvailable)
    }
}

/// Classification of a failed remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The remote service recognised and blocked the intermediary.
    Refused,
    /// The call did not finish in time.
    Timeout,
    /// Anything else. Treated as a tainted proxy.
    Other,
}

impl FailureKind {
    /// Whether a proxy that produced this failure leaves the pool.
    pub fn evicts(self) -> bool {
        matches!(self, FailureKind::Refused | FailureKind::Other)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Refused => f.write_str("refused"),
            FailureKind::Timeout => f.write_str("timeout"),
            FailureKind::Other => f.write_str("failure"),
        }
    }
}

/// Failure reported by a [`PublicationSource`](crate::source::PublicationSource).
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct SourceError {
    pub kind: FailureKind,
    pub message: String,
}

impl SourceError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn refused(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Refused, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Timeout, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Other, message)
    }

    /// Final classification: an `Other` failure whose text carries a known
    /// refusal pattern is a refusal.
    pub fn classify(&self, refusal_patterns: &[String]) -> FailureKind {
        match self.kind {
            FailureKind::Other
                if refusal_patterns
                    .iter()
                    .any(|p| !p.is_empty() && self.message.contains(p.as_str())) =>
            {
                FailureKind::Refused
            }
            kind => kind,
        }
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            FailureKind::Timeout
        } else {
            match err.status() {
                Some(reqwest::StatusCode::FORBIDDEN)
                | Some(reqwest::StatusCode::TOO_MANY_REQUESTS) => FailureKind::Refused,
                _ => FailureKind::Other,
            }
        };
        SourceError::new(kind, err.to_string())
    }
}
