//! Typed errors for the collector.
//!
//! Two families: [`CollectError`] aborts a run, [`SourceError`] is recorded
//! against the unit it affected (one sub-district, one complex) and the run
//! moves on.

use serde::Serialize;
use thiserror::Error;

/// Fatal conditions. Only region resolution and setup can produce these.
#[derive(Debug, Error)]
pub enum CollectError {
    /// City has no entry in the region dataset
    #[error("region not found: {city}")]
    RegionNotFound { city: String },

    /// District given but absent under the city
    #[error("district not found: {district} (in {city})")]
    DistrictNotFound { city: String, district: String },

    /// Region dataset could not be read
    #[error("failed to read region dataset {path}: {source}")]
    DatasetIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Region dataset is not the expected hierarchy
    #[error("invalid region dataset: {0}")]
    DatasetFormat(#[from] serde_json::Error),

    /// HTTP client could not be constructed
    #[error("http client error: {0}")]
    HttpClient(String),

    /// Async runtime could not be started (FFI entry points)
    #[error("runtime error: {0}")]
    Runtime(String),
}

/// Recoverable conditions, scoped to a single unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SourceError {
    /// Remote answered, but with nothing usable
    #[error("empty source: {what}")]
    SourceEmpty { what: String },

    /// Transport failure: timeout, connection error, non-2xx, unreadable payload
    #[error("source unreachable: {url}: {reason}")]
    SourceUnreachable { url: String, reason: String },

    /// Document was fetched but lacked the markers needed to build a record
    #[error("incomplete parse of {what}: {reason}")]
    ParseIncomplete { what: String, reason: String },
}

impl SourceError {
    pub fn empty(what: impl Into<String>) -> Self {
        Self::SourceEmpty { what: what.into() }
    }

    pub fn unreachable(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::SourceUnreachable {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub fn incomplete(what: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ParseIncomplete {
            what: what.into(),
            reason: reason.into(),
        }
    }

    /// Short machine-readable name of the condition.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SourceEmpty { .. } => "SourceEmpty",
            Self::SourceUnreachable { .. } => "SourceUnreachable",
            Self::ParseIncomplete { .. } => "ParseIncomplete",
        }
    }
}

/// Result type alias for fatal operations.
pub type Result<T> = std::result::Result<T, CollectError>;

/// Result type alias for per-unit remote operations.
pub type SourceResult<T> = std::result::Result<T, SourceError>;
