//! Collector configuration.
//!
//! Plain data with defaults; callers pass it explicitly. Nothing here is read
//! from the environment.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::extractors::ExtractionProfile;

/// URL templates of the remote sources.
///
/// `{code}` is replaced by a sub-district code, `{id}` by a complex id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub complex_index: String,
    pub complex_metadata: String,
    pub complex_listings: String,
    /// Referer sent to the complex index
    pub index_referer: String,
    /// Referer sent for complex documents
    pub document_referer: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            complex_index: "https://new.land.naver.com/api/regions/complexes".into(),
            complex_metadata: "https://fin.land.naver.com/complexes/{id}?tab=complex-info".into(),
            complex_listings: "https://fin.land.naver.com/complexes/{id}?tab=article".into(),
            index_referer: "https://new.land.naver.com/complexes".into(),
            document_referer: "https://fin.land.naver.com/".into(),
        }
    }
}

impl Endpoints {
    pub fn metadata_url(&self, complex_id: &str) -> String {
        self.complex_metadata.replace("{id}", complex_id)
    }

    pub fn listings_url(&self, complex_id: &str) -> String {
        self.complex_listings.replace("{id}", complex_id)
    }
}

/// Configuration for one collector.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    pub endpoints: Endpoints,

    pub user_agent: String,

    /// Per remote call. Expiry is reported as an unreachable source.
    pub request_timeout_ms: u64,

    /// Complex detail fetches in flight per sub-district.
    ///
    /// 1 is fully sequential. Output order does not depend on this value.
    pub max_concurrent_fetches: usize,

    /// `realEstateType` of the complex index query
    pub real_estate_type: String,

    /// `tradeTypes` of the listings query (A1 = sale)
    pub trade_type: String,

    pub profile: ExtractionProfile,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            endpoints: Endpoints::default(),
            user_agent: "Mozilla/5.0".into(),
            request_timeout_ms: 15_000,
            max_concurrent_fetches: 1,
            real_estate_type: "APT".into(),
            trade_type: "A1".into(),
            profile: ExtractionProfile::default(),
        }
    }
}

impl CollectorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_max_concurrent_fetches(mut self, n: usize) -> Self {
        self.max_concurrent_fetches = n;
        self
    }

    pub fn with_profile(mut self, profile: ExtractionProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Concurrency clamped to at least one
    pub fn concurrency(&self) -> usize {
        self.max_concurrent_fetches.max(1)
    }
}
