//! Declared extraction rules.
//!
//! Each output field names a selector plus an accessor (text, attribute or a
//! position among repeated elements). A site redesign means a new
//! [`ExtractionProfile`], never a pipeline change.

use scraper::{ElementRef, Selector};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::css_extractor::{extract_css_first_attr, extract_css_first_text, extract_css_text};

/// Labels kept from a complex's metadata document, in output column order
pub const ATTRIBUTE_WHITELIST: [&str; 14] = [
    "공급면적",
    "전용면적",
    "해당면적 세대수",
    "현관구조",
    "방/욕실",
    "위치",
    "사용승인일",
    "세대수",
    "난방",
    "주차",
    "전기차 충전시설",
    "용적률/건폐율",
    "관리사무소 전화",
    "건설사",
];

/// How a value is read off a matched element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Accessor {
    Text,
    Attr(String),
}

/// Selector + accessor for one field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractRule {
    pub selector: String,
    #[serde(default = "default_accessor")]
    pub accessor: Accessor,
}

fn default_accessor() -> Accessor {
    Accessor::Text
}

impl ExtractRule {
    pub fn text(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            accessor: Accessor::Text,
        }
    }

    pub fn attr(selector: impl Into<String>, attr: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            accessor: Accessor::Attr(attr.into()),
        }
    }

    fn compile(&self) -> CompiledRule {
        CompiledRule {
            selector: compile_selector(&self.selector),
            accessor: self.accessor.clone(),
        }
    }
}

/// Positions of the fixed summary fields among a listing's summary items
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryPositions {
    pub area: usize,
    pub floor: usize,
    pub direction: usize,
    /// Fewer items than this and all positional fields are unknown
    pub min_items: usize,
}

impl Default for SummaryPositions {
    fn default() -> Self {
        Self {
            area: 1,
            floor: 2,
            direction: 3,
            min_items: 4,
        }
    }
}

/// Markup vocabulary of one version of the source site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionProfile {
    pub complex_name: ExtractRule,
    /// Container of one label/value pair
    pub attribute_item: String,
    pub attribute_label: ExtractRule,
    pub attribute_value: ExtractRule,
    pub attribute_whitelist: Vec<String>,
    /// Container of one for-sale listing
    pub listing_item: String,
    pub listing_title: ExtractRule,
    pub listing_price: ExtractRule,
    pub listing_summary_item: String,
    pub summary_positions: SummaryPositions,
    pub listing_image: ExtractRule,
    pub listing_comment: ExtractRule,
}

impl Default for ExtractionProfile {
    fn default() -> Self {
        // CSS-module class names carry a build hash suffix, so match on the stable prefix
        Self {
            complex_name: ExtractRule::text(r#"span[class*="ComplexSummary_name__"]"#),
            attribute_item: r#"li[class*="DataList_item__"]"#.into(),
            attribute_label: ExtractRule::text(r#"div[class*="DataList_term__"]"#),
            attribute_value: ExtractRule::text(r#"div[class*="DataList_definition__"]"#),
            attribute_whitelist: ATTRIBUTE_WHITELIST.iter().map(|s| s.to_string()).collect(),
            listing_item: r#"li[class*="ComplexArticleItem_item__"]"#.into(),
            listing_title: ExtractRule::text(r#"span[class*="ComplexArticleItem_name__"]"#),
            listing_price: ExtractRule::text(r#"span[class*="ComplexArticleItem_price__"]"#),
            listing_summary_item: r#"li[class*="ComplexArticleItem_item-summary__"]"#.into(),
            summary_positions: SummaryPositions::default(),
            listing_image: ExtractRule::attr("img", "src"),
            listing_comment: ExtractRule::text(r#"p[class*="ComplexArticleItem_comment__"]"#),
        }
    }
}

impl ExtractionProfile {
    /// Compile every selector once. Invalid selectors behave as absent markers.
    pub fn compile(&self) -> CompiledProfile {
        CompiledProfile {
            complex_name: self.complex_name.compile(),
            attribute_item: compile_selector(&self.attribute_item),
            attribute_label: self.attribute_label.compile(),
            attribute_value: self.attribute_value.compile(),
            attribute_whitelist: self.attribute_whitelist.clone(),
            listing_item: compile_selector(&self.listing_item),
            listing_title: self.listing_title.compile(),
            listing_price: self.listing_price.compile(),
            listing_summary_item: compile_selector(&self.listing_summary_item),
            summary_positions: self.summary_positions.clone(),
            listing_image: self.listing_image.compile(),
            listing_comment: self.listing_comment.compile(),
        }
    }
}

fn compile_selector(selector: &str) -> Option<Selector> {
    match Selector::parse(selector) {
        Ok(s) => Some(s),
        Err(e) => {
            warn!(selector = %selector, error = ?e, "Invalid extraction selector");
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompiledRule {
    selector: Option<Selector>,
    accessor: Accessor,
}

impl CompiledRule {
    /// Value of the first match under `scope`
    pub fn first(&self, scope: ElementRef<'_>) -> Option<String> {
        let selector = self.selector.as_ref()?;
        match &self.accessor {
            Accessor::Text => extract_css_first_text(scope, selector),
            Accessor::Attr(name) => extract_css_first_attr(scope, selector, name),
        }
    }
}

/// [`ExtractionProfile`] with selectors parsed.
#[derive(Debug, Clone)]
pub struct CompiledProfile {
    pub complex_name: CompiledRule,
    pub attribute_item: Option<Selector>,
    pub attribute_label: CompiledRule,
    pub attribute_value: CompiledRule,
    pub attribute_whitelist: Vec<String>,
    pub listing_item: Option<Selector>,
    pub listing_title: CompiledRule,
    pub listing_price: CompiledRule,
    pub listing_summary_item: Option<Selector>,
    pub summary_positions: SummaryPositions,
    pub listing_image: CompiledRule,
    pub listing_comment: CompiledRule,
}

impl CompiledProfile {
    pub fn is_whitelisted(&self, label: &str) -> bool {
        self.attribute_whitelist.iter().any(|l| l == label)
    }

    /// Elements matching an optional container selector
    pub fn select_all<'a>(
        scope: ElementRef<'a>,
        selector: &Option<Selector>,
    ) -> Vec<ElementRef<'a>> {
        match selector {
            Some(sel) => scope.select(sel).collect(),
            None => Vec::new(),
        }
    }

    /// Texts of a listing's summary items, in document order
    pub fn summary_texts(&self, listing: ElementRef<'_>) -> Vec<String> {
        match &self.listing_summary_item {
            Some(sel) => extract_css_text(listing, sel),
            None => Vec::new(),
        }
    }
}
