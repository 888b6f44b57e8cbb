//! Complex detail fetcher: metadata document + listings document per complex.

use tracing::{debug, warn};

use crate::error::SourceError;
use crate::extractors::{parse_complex_detail, parse_listings, CompiledProfile};
use crate::model::{ComplexDetail, Listing};
use crate::source::RemoteSource;

/// What one complex contributed. Partial results are valid output.
#[derive(Debug, Clone, Default)]
pub struct DetailOutcome {
    pub detail: Option<ComplexDetail>,
    pub listings: Vec<Listing>,
    /// Recoverable problems met on either document
    pub issues: Vec<SourceError>,
}

impl DetailOutcome {
    /// Nothing usable came back from either document
    pub fn is_failed(&self) -> bool {
        self.detail.is_none() && self.listings.is_empty() && !self.issues.is_empty()
    }
}

pub struct DetailFetcher<'a, S: RemoteSource + ?Sized> {
    source: &'a S,
    profile: &'a CompiledProfile,
}

impl<'a, S: RemoteSource + ?Sized> DetailFetcher<'a, S> {
    pub fn new(source: &'a S, profile: &'a CompiledProfile) -> Self {
        Self { source, profile }
    }

    /// Fetch and parse both documents of `complex_id`.
    ///
    /// A failure on one document never suppresses the other.
    pub async fn fetch_detail(&self, complex_id: &str) -> DetailOutcome {
        let mut outcome = DetailOutcome::default();

        match self.source.metadata_document(complex_id).await {
            Ok(html) => match parse_complex_detail(&html, complex_id, self.profile) {
                Ok(detail) => outcome.detail = Some(detail),
                Err(e) => outcome.issues.push(e),
            },
            Err(e) => outcome.issues.push(e),
        }

        match self.source.listings_document(complex_id).await {
            Ok(html) => outcome.listings = parse_listings(&html, self.profile),
            Err(e) => outcome.issues.push(e),
        }

        for issue in &outcome.issues {
            warn!(complex = %complex_id, kind = issue.kind(), error = %issue, "Complex document skipped");
        }
        debug!(
            complex = %complex_id,
            has_detail = outcome.detail.is_some(),
            listings = outcome.listings.len(),
            "Complex detail fetched"
        );

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::ExtractionProfile;
    use crate::testing::MockSource;

    const META: &str = r#"<span class="ComplexSummary_name__a">Test Complex</span>
        <ul><li class="DataList_item__a"><div class="DataList_term__a">공급면적</div><div class="DataList_definition__a">84㎡</div></li></ul>"#;
    const ARTICLES: &str = r#"<ul><li class="ComplexArticleItem_item__a">
        <span class="ComplexArticleItem_name__a">unit A</span>
        <span class="ComplexArticleItem_price__a">5억</span>
    </li></ul>"#;

    #[tokio::test]
    async fn test_both_documents() {
        let mock = MockSource::new()
            .with_metadata("1", META)
            .with_listings("1", ARTICLES);
        let profile = ExtractionProfile::default().compile();
        let outcome = DetailFetcher::new(&mock, &profile).fetch_detail("1").await;

        let detail = outcome.detail.unwrap();
        assert_eq!(detail.name, "Test Complex");
        assert_eq!(detail.attribute["공급면적"], "84㎡");
        assert_eq!(outcome.listings.len(), 1);
        assert!(outcome.issues.is_empty());
    }

    #[tokio::test]
    async fn test_metadata_failure_keeps_listings() {
        let mock = MockSource::new()
            .with_metadata_error("1", SourceError::unreachable("mock://metadata/1", "HTTP 500"))
            .with_listings("1", ARTICLES);
        let profile = ExtractionProfile::default().compile();
        let outcome = DetailFetcher::new(&mock, &profile).fetch_detail("1").await;

        assert!(outcome.detail.is_none());
        assert_eq!(outcome.listings[0].price_normalized, Some(500_000_000));
        assert_eq!(outcome.issues.len(), 1);
        assert!(!outcome.is_failed());
        assert_eq!(mock.calls(), vec!["metadata:1", "listings:1"]);
    }

    #[tokio::test]
    async fn test_listings_failure_keeps_metadata() {
        let mock = MockSource::new().with_metadata("1", META);
        let profile = ExtractionProfile::default().compile();
        let outcome = DetailFetcher::new(&mock, &profile).fetch_detail("1").await;

        assert!(outcome.detail.is_some());
        assert!(outcome.listings.is_empty());
        assert_eq!(outcome.issues[0].kind(), "SourceUnreachable");
    }

    #[tokio::test]
    async fn test_total_failure() {
        let mock = MockSource::new();
        let profile = ExtractionProfile::default().compile();
        let outcome = DetailFetcher::new(&mock, &profile).fetch_detail("1").await;
        assert!(outcome.is_failed());
        assert_eq!(outcome.issues.len(), 2);
    }
}
