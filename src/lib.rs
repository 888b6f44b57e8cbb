//! Housing complex collector
//!
//! Resolves an administrative region (city -> district -> sub-district) to
//! housing complexes, then correlates each complex's metadata page with its
//! for-sale listings into one flat record per listing:
//! - Region index loaded from a JSON dataset
//! - Complex enumeration from a remote JSON index
//! - Label-whitelist metadata and positional listing extraction (CSS selectors)
//! - Korean price parsing (억/만) and price bands
//! - Ordered aggregation with progress events and cancellation
//!
//! A C ABI in [`ffi`] exposes the pipeline to a presentation host.

pub mod config;
pub mod detail;
pub mod enumerator;
pub mod error;
pub mod extractors;
pub mod ffi;
pub mod model;
pub mod pipeline;
pub mod price;
pub mod region;
pub mod source;
pub mod table;
pub mod testing;

pub use config::{CollectorConfig, Endpoints};
pub use error::{CollectError, SourceError};
pub use model::*;
pub use pipeline::{
    CollectQuery, Collector, ProgressEvent, RunReport, RunStage, RunSummary, UnitIssue, UnitRef,
};
pub use price::{categorize, PriceBand};
pub use region::{RegionIndex, Resolution};
pub use source::{HttpSource, RemoteSource};
pub use table::RecordTable;
