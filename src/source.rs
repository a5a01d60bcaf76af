//! Interface to the remote publication search service.

use crate::error::SourceError;

use async_trait::async_trait;

/// A publication record returned by a search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publication {
    pub title: String,
    /// Opaque handle the source uses to fetch the full record.
    pub handle: String,
    /// Citation count, when the record carries one.
    pub num_citations: Option<u64>,
}

/// Search capability routed through whichever transport the caller supplies.
///
/// Implementations should report refusals by the service as
/// [`FailureKind::Refused`](crate::error::FailureKind::Refused) where they can
/// tell; `Other` failures are additionally matched against the configured
/// refusal patterns by the dispatcher.
#[async_trait]
pub trait PublicationSource: Send + Sync {
    /// First match for `keyword`, or `None` when the search is empty.
    async fn search(
        &self,
        transport: &reqwest::Client,
        keyword: &str,
    ) -> Result<Option<Publication>, SourceError>;

    /// Fetch the detailed record for a search hit.
    async fn fill(
        &self,
        transport: &reqwest::Client,
        publication: Publication,
    ) -> Result<Publication, SourceError>;
}

#[async_trait]
impl<S: PublicationSource + ?Sized> PublicationSource for std::sync::Arc<S> {
    async fn search(
        &self,
        transport: &reqwest::Client,
        keyword: &str,
    ) -> Result<Option<Publication>, SourceError> {
        (**self).search(transport, keyword).await
    }

    async fn fill(
        &self,
        transport: &reqwest::Client,
        publication: Publication,
    ) -> Result<Publication, SourceError> {
        (**self).fill(transport, publication).await
    }
}
