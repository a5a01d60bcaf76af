//! Previously recorded citation counts.
//!
//! Result tables store either a count or a negative sentinel (see
//! [`QueryError::sentinel`]). Older tables may also hold free-text error
//! markers. Anything that is not a plain non-negative count is re-queried.

use crate::error::QueryError;

/// A value read back from an earlier run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachedCitation {
    /// Authoritative count; no query needed.
    Count(u64),
    /// The earlier run failed for this row.
    Failed,
    /// No value recorded.
    Missing,
}

impl CachedCitation {
    pub fn parse(value: Option<&str>) -> Self {
        let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
            return CachedCitation::Missing;
        };
        match value.parse::<i64>() {
            Ok(n) if n >= 0 => CachedCitation::Count(n as u64),
            _ => CachedCitation::Failed,
        }
    }

    /// The cached count, if it can be reused as is.
    pub fn count(self) -> Option<u64> {
        match self {
            CachedCitation::Count(n) => Some(n),
            CachedCitation::Failed | CachedCitation::Missing => None,
        }
    }
}

/// Text written to a result table for a query outcome.
pub fn format_outcome(result: &Result<u64, QueryError>) -> String {
    match result {
        Ok(count) => count.to_string(),
        Err(e) => e.sentinel().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_are_authoritative() {
        assert_eq!(CachedCitation::parse(Some("50000")), CachedCitation::Count(50000));
        assert_eq!(CachedCitation::parse(Some(" 0 ")), CachedCitation::Count(0));
        assert_eq!(CachedCitation::parse(Some("12")).count(), Some(12));
    }

    #[test]
    fn sentinels_and_markers_are_failures() {
        assert_eq!(CachedCitation::parse(Some("-1")), CachedCitation::Failed);
        assert_eq!(CachedCitation::parse(Some("-4")), CachedCitation::Failed);
        assert_eq!(CachedCitation::parse(Some("error")), CachedCitation::Failed);
        assert_eq!(CachedCitation::parse(Some("12.5")), CachedCitation::Failed);
    }

    #[test]
    fn blanks_are_missing() {
        assert_eq!(CachedCitation::parse(None), CachedCitation::Missing);
        assert_eq!(CachedCitation::parse(Some("  ")), CachedCitation::Missing);
    }

    #[test]
    fn formatted_failures_read_back_as_failed() {
        let written = format_outcome(&Err(QueryError::NoProxyAvailable));
        assert_eq!(written, "-3");
        assert_eq!(CachedCitation::parse(Some(&written)), CachedCitation::Failed);
        assert_eq!(format_outcome(&Ok(7)), "7");
    }
}
