//! Row-oriented output table.
//!
//! Columns are fixed provenance and complex columns, then one column per
//! whitelisted attribute label in whitelist order, then the listing columns,
//! then the derived `priceBand`. Cells are JSON values; a missing attribute
//! is `null`.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::extractors::ATTRIBUTE_WHITELIST;
use crate::model::AggregatedRecord;
use crate::price::categorize;

pub const LEADING_COLUMNS: [&str; 6] = [
    "cityName",
    "districtName",
    "subDistrictName",
    "subDistrictCode",
    "complexId",
    "complexName",
];

pub const LISTING_COLUMNS: [&str; 8] = [
    "title",
    "priceText",
    "priceNormalized",
    "area",
    "floorText",
    "direction",
    "imageUrl",
    "comment",
];

pub const PRICE_BAND_COLUMN: &str = "priceBand";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl RecordTable {
    /// Table with the default attribute whitelist as attribute columns.
    pub fn new(records: &[AggregatedRecord]) -> Self {
        let labels: Vec<String> = ATTRIBUTE_WHITELIST.iter().map(|s| s.to_string()).collect();
        Self::with_attribute_columns(records, &labels)
    }

    pub fn with_attribute_columns(records: &[AggregatedRecord], labels: &[String]) -> Self {
        let columns = LEADING_COLUMNS
            .iter()
            .map(|c| c.to_string())
            .chain(labels.iter().cloned())
            .chain(LISTING_COLUMNS.iter().map(|c| c.to_string()))
            .chain(std::iter::once(PRICE_BAND_COLUMN.to_string()))
            .collect();

        let rows = records.iter().map(|r| row(r, labels)).collect();
        Self { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Header line plus one line per row, fields quoted when needed.
    pub fn to_delimited(&self, separator: char) -> String {
        let mut out = String::new();
        push_line(&mut out, self.columns.iter().map(String::as_str), separator);
        for row in &self.rows {
            let cells: Vec<String> = row.iter().map(cell_text).collect();
            push_line(&mut out, cells.iter().map(String::as_str), separator);
        }
        out
    }

    pub fn to_csv(&self) -> String {
        self.to_delimited(',')
    }

    /// One JSON object per row keyed by column name
    pub fn to_json_rows(&self) -> Vec<Value> {
        self.rows
            .iter()
            .map(|row| {
                let object: Map<String, Value> = self
                    .columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect();
                Value::Object(object)
            })
            .collect()
    }
}

fn row(record: &AggregatedRecord, labels: &[String]) -> Vec<Value> {
    let p = &record.provenance;
    let l = &record.listing;

    let mut cells = vec![
        Value::from(p.city_name.as_str()),
        p.district_name.as_deref().map_or(Value::Null, Value::from),
        Value::from(p.sub_district_name.as_str()),
        Value::from(p.sub_district_code.as_str()),
        Value::from(record.complex_id.as_str()),
        Value::from(record.complex_name.as_str()),
    ];
    cells.extend(
        labels
            .iter()
            .map(|label| record.attribute.get(label).map_or(Value::Null, |v| Value::from(v.as_str()))),
    );
    cells.extend([
        Value::from(l.title.as_str()),
        Value::from(l.price_text.as_str()),
        l.price_normalized.map_or(Value::Null, Value::from),
        Value::from(l.area.as_str()),
        Value::from(l.floor_text.as_str()),
        Value::from(l.direction.as_str()),
        Value::from(l.image_url.as_str()),
        Value::from(l.comment.as_str()),
        Value::from(categorize(l.price_normalized).label()),
    ]);
    cells
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn push_line<'a>(out: &mut String, fields: impl Iterator<Item = &'a str>, separator: char) {
    for (i, field) in fields.enumerate() {
        if i > 0 {
            out.push(separator);
        }
        let needs_quotes = field.contains(separator)
            || field.contains('"')
            || field.contains('\n')
            || field.contains('\r');
        if needs_quotes {
            out.push('"');
            out.push_str(&field.replace('"', "\"\""));
            out.push('"');
        } else {
            out.push_str(field);
        }
    }
    out.push('\n');
}
