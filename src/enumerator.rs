//! Complex enumerator: sub-district code -> complexes located there.
//!
//! The remote index schema is not stable, so every row is reconciled into a
//! [`ComplexSummary`] with all fields present.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{SourceError, SourceResult};
use crate::model::ComplexSummary;
use crate::source::RemoteSource;

/// Key of the complex array in the index document
pub const COMPLEX_LIST_KEY: &str = "complexList";

pub struct ComplexEnumerator<'a, S: RemoteSource + ?Sized> {
    source: &'a S,
}

impl<'a, S: RemoteSource + ?Sized> ComplexEnumerator<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self { source }
    }

    /// One index read for `sub_district_code`.
    ///
    /// `Err(SourceEmpty)` for a missing/non-array/empty list,
    /// `Err(SourceUnreachable)` for transport failures. Both are recoverable.
    pub async fn list_complexes(&self, sub_district_code: &str) -> SourceResult<Vec<ComplexSummary>> {
        let document = self.source.complex_index(sub_district_code).await?;
        let complexes = normalize_complex_list(&document).map_err(|e| {
            warn!(code = %sub_district_code, error = %e, "No complexes in index response");
            e
        })?;
        debug!(code = %sub_district_code, complexes = complexes.len(), "Complex index read");
        Ok(complexes)
    }
}

/// Reconcile an index document into fixed-schema summaries.
pub fn normalize_complex_list(document: &Value) -> SourceResult<Vec<ComplexSummary>> {
    let rows = document
        .get(COMPLEX_LIST_KEY)
        .and_then(Value::as_array)
        .ok_or_else(|| SourceError::empty(format!("{COMPLEX_LIST_KEY} missing or not an array")))?;

    let summaries: Vec<ComplexSummary> = rows
        .iter()
        .filter_map(Value::as_object)
        .map(normalize_row)
        .collect();

    if summaries.is_empty() {
        return Err(SourceError::empty(format!("{COMPLEX_LIST_KEY} is empty")));
    }
    Ok(summaries)
}

fn normalize_row(row: &Map<String, Value>) -> ComplexSummary {
    ComplexSummary {
        complex_id: text_field(row, &["complexNo", "complexId"]),
        name: text_field(row, &["complexName", "name"]),
        build_year: text_field(row, &["buildYear", "useApproveYmd"]),
        total_household_count: count_field(row, &["totalHouseholdCount"]),
        area_size: text_field(row, &["areaSize"]),
        price: text_field(row, &["price"]),
        address: text_field(row, &["address", "cortarAddress"]),
        floor: text_field(row, &["floor", "highFloor"]),
    }
}

/// First present, non-null key as text. Numbers are rendered as written.
fn text_field(row: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match row.get(*key)? {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    })
}

/// First present key as a non-negative count, accepting "1,234" strings.
fn count_field(row: &Map<String, Value>, keys: &[&str]) -> Option<u64> {
    keys.iter().find_map(|key| match row.get(*key)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.replace(',', "").trim().parse().ok(),
        _ => None,
    })
}
