//! Canned remote source for tests.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{SourceError, SourceResult};
use crate::source::RemoteSource;

#[derive(Default)]
struct Canned {
    indexes: HashMap<String, SourceResult<Value>>,
    metadata: HashMap<String, SourceResult<String>>,
    listings: HashMap<String, SourceResult<String>>,
    delays: HashMap<String, Duration>,
}

/// [`RemoteSource`] answering from canned documents.
///
/// Keys without a canned answer fail as unreachable. Every call is recorded
/// as `"index:<code>"`, `"metadata:<id>"` or `"listings:<id>"`.
#[derive(Default, Clone)]
pub struct MockSource {
    canned: Arc<RwLock<Canned>>,
    calls: Arc<RwLock<Vec<String>>>,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn update(&self, f: impl FnOnce(&mut Canned)) {
        let mut canned = self.canned.write().unwrap_or_else(|e| e.into_inner());
        f(&mut canned);
    }

    pub fn with_index(self, code: &str, document: Value) -> Self {
        self.update(|c| {
            c.indexes.insert(code.into(), Ok(document));
        });
        self
    }

    pub fn with_index_error(self, code: &str, error: SourceError) -> Self {
        self.update(|c| {
            c.indexes.insert(code.into(), Err(error));
        });
        self
    }

    pub fn with_metadata(self, complex_id: &str, html: &str) -> Self {
        self.update(|c| {
            c.metadata.insert(complex_id.into(), Ok(html.into()));
        });
        self
    }

    pub fn with_metadata_error(self, complex_id: &str, error: SourceError) -> Self {
        self.update(|c| {
            c.metadata.insert(complex_id.into(), Err(error));
        });
        self
    }

    pub fn with_listings(self, complex_id: &str, html: &str) -> Self {
        self.update(|c| {
            c.listings.insert(complex_id.into(), Ok(html.into()));
        });
        self
    }

    pub fn with_listings_error(self, complex_id: &str, error: SourceError) -> Self {
        self.update(|c| {
            c.listings.insert(complex_id.into(), Err(error));
        });
        self
    }

    /// Delay both document answers of a complex
    pub fn with_delay(self, complex_id: &str, delay: Duration) -> Self {
        self.update(|c| {
            c.delays.insert(complex_id.into(), delay);
        });
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn record(&self, call: String) {
        self.calls
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(call);
    }

    fn answer<T: Clone>(
        &self,
        pick: impl FnOnce(&Canned) -> Option<&SourceResult<T>>,
        url: String,
    ) -> SourceResult<T> {
        let canned = self.canned.read().unwrap_or_else(|e| e.into_inner());
        pick(&canned)
            .cloned()
            .unwrap_or_else(|| Err(SourceError::unreachable(url, "no canned response")))
    }

    fn delay_for(&self, complex_id: &str) -> Option<Duration> {
        let canned = self.canned.read().unwrap_or_else(|e| e.into_inner());
        canned.delays.get(complex_id).copied()
    }
}

#[async_trait]
impl RemoteSource for MockSource {
    async fn complex_index(&self, sub_district_code: &str) -> SourceResult<Value> {
        self.record(format!("index:{sub_district_code}"));
        self.answer(
            |c| c.indexes.get(sub_district_code),
            format!("mock://index/{sub_district_code}"),
        )
    }

    async fn metadata_document(&self, complex_id: &str) -> SourceResult<String> {
        self.record(format!("metadata:{complex_id}"));
        if let Some(delay) = self.delay_for(complex_id) {
            tokio::time::sleep(delay).await;
        }
        self.answer(
            |c| c.metadata.get(complex_id),
            format!("mock://metadata/{complex_id}"),
        )
    }

    async fn listings_document(&self, complex_id: &str) -> SourceResult<String> {
        self.record(format!("listings:{complex_id}"));
        if let Some(delay) = self.delay_for(complex_id) {
            tokio::time::sleep(delay).await;
        }
        self.answer(
            |c| c.listings.get(complex_id),
            format!("mock://listings/{complex_id}"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_canned_answers_and_calls() {
        let mock = MockSource::new()
            .with_index("1", json!({"complexList": []}))
            .with_metadata("9", "<html></html>")
            .with_listings_error("9", SourceError::unreachable("x", "boom"));

        assert!(mock.complex_index("1").await.is_ok());
        assert!(mock.metadata_document("9").await.is_ok());
        assert!(mock.listings_document("9").await.is_err());
        assert_eq!(mock.complex_index("2").await.unwrap_err().kind(), "SourceUnreachable");
        assert_eq!(
            mock.calls(),
            vec!["index:1", "metadata:9", "listings:9", "index:2"]
        );
    }
}
