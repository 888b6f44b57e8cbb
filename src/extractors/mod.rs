//! HTML extraction modules
//!
//! Field extraction is driven by a declared [`ExtractionProfile`]; the modules
//! below apply it to the two per-complex documents.

mod css_extractor;
mod listings;
mod metadata;
mod rules;

pub use css_extractor::*;
pub use listings::*;
pub use metadata::*;
pub use rules::*;
