//! Records flowing through one collection run.
//!
//! Every struct here has a fixed field set: absent source values are `None`
//! (or an explicit unknown marker for listing text), never a missing key.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Text used when a listing field's marker is absent
pub const UNKNOWN: &str = "Unknown";
/// Image field when the listing has no image
pub const NO_IMAGE: &str = "No image";
/// Comment field when the listing has no comment
pub const NO_COMMENT: &str = "No comment";

/// A sub-district (eup/myeon/dong level).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegionNode {
    pub code: String,
    pub name: String,
}

/// One row of the remote complex index, reconciled to a fixed schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplexSummary {
    pub complex_id: Option<String>,
    pub name: Option<String>,
    pub build_year: Option<String>,
    pub total_household_count: Option<u64>,
    pub area_size: Option<String>,
    pub price: Option<String>,
    pub address: Option<String>,
    pub floor: Option<String>,
}

/// Whitelisted metadata of a complex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplexDetail {
    pub complex_id: String,
    pub name: String,
    /// label -> text, whitelisted labels only
    pub attribute: BTreeMap<String, String>,
}

impl ComplexDetail {
    /// Detail carrying only identity, used when the metadata document failed.
    pub fn placeholder(complex_id: impl Into<String>, name: Option<&str>) -> Self {
        Self {
            complex_id: complex_id.into(),
            name: name.unwrap_or(UNKNOWN).to_string(),
            attribute: BTreeMap::new(),
        }
    }
}

/// One for-sale unit scraped from a complex's listings document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub title: String,
    pub price_text: String,
    pub price_normalized: Option<u64>,
    pub area: String,
    pub floor_text: String,
    pub direction: String,
    pub image_url: String,
    pub comment: String,
}

/// Where a record came from. Stamped when the record is emitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provenance {
    pub sub_district_code: String,
    pub sub_district_name: String,
    pub city_name: String,
    pub district_name: Option<String>,
}

/// Flattened complex detail + listing + provenance: one output row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedRecord {
    #[serde(flatten)]
    pub provenance: Provenance,
    pub complex_id: String,
    pub complex_name: String,
    pub attribute: BTreeMap<String, String>,
    #[serde(flatten)]
    pub listing: Listing,
}

impl AggregatedRecord {
    pub fn new(provenance: Provenance, detail: &ComplexDetail, listing: Listing) -> Self {
        Self {
            provenance,
            complex_id: detail.complex_id.clone(),
            complex_name: detail.name.clone(),
            attribute: detail.attribute.clone(),
            listing,
        }
    }
}
