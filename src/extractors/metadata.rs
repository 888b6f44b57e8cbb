//! Complex metadata extraction
//!
//! Scans label/value pairs and keeps only whitelisted labels.

use std::collections::BTreeMap;

use scraper::Html;

use super::rules::CompiledProfile;
use crate::error::{SourceError, SourceResult};
use crate::model::{ComplexDetail, UNKNOWN};

/// Build a [`ComplexDetail`] from a metadata document.
///
/// Fails with `ParseIncomplete` only when the document has neither a name
/// marker nor any label/value pair.
pub fn parse_complex_detail(
    html: &str,
    complex_id: &str,
    profile: &CompiledProfile,
) -> SourceResult<ComplexDetail> {
    let document = Html::parse_document(html);
    let root = document.root_element();

    let name = profile.complex_name.first(root);
    let items = CompiledProfile::select_all(root, &profile.attribute_item);

    if name.is_none() && items.is_empty() {
        return Err(SourceError::incomplete(
            format!("complex {complex_id} metadata"),
            "no name marker and no label/value pairs",
        ));
    }

    let mut attribute = BTreeMap::new();
    for item in items {
        let (Some(label), Some(value)) = (
            profile.attribute_label.first(item),
            profile.attribute_value.first(item),
        ) else {
            continue;
        };
        if profile.is_whitelisted(&label) {
            attribute.insert(label, value);
        }
    }

    Ok(ComplexDetail {
        complex_id: complex_id.to_string(),
        name: name.unwrap_or_else(|| UNKNOWN.to_string()),
        attribute,
    })
}
