//! For-sale listing extraction
//!
//! One [`Listing`] per listing block. Missing markers become explicit unknown
//! values so every listing has the same shape.

use scraper::Html;

use super::rules::CompiledProfile;
use crate::model::{Listing, NO_COMMENT, NO_IMAGE, UNKNOWN};
use crate::price;

/// Extract every listing block of a listings document.
pub fn parse_listings(html: &str, profile: &CompiledProfile) -> Vec<Listing> {
    let document = Html::parse_document(html);
    let root = document.root_element();

    CompiledProfile::select_all(root, &profile.listing_item)
        .into_iter()
        .map(|item| {
            let title = profile
                .listing_title
                .first(item)
                .unwrap_or_else(|| UNKNOWN.to_string());
            let price_text = profile
                .listing_price
                .first(item)
                .unwrap_or_else(|| UNKNOWN.to_string());

            // Position-dependent fields are all-or-nothing
            let summary = profile.summary_texts(item);
            let positions = &profile.summary_positions;
            let complete = summary.len() >= positions.min_items;
            let positional = |index: usize| -> String {
                summary
                    .get(index)
                    .filter(|_| complete)
                    .cloned()
                    .unwrap_or_else(|| UNKNOWN.to_string())
            };

            Listing {
                price_normalized: price::parse(&price_text),
                title,
                price_text,
                area: positional(positions.area),
                floor_text: positional(positions.floor),
                direction: positional(positions.direction),
                image_url: profile
                    .listing_image
                    .first(item)
                    .unwrap_or_else(|| NO_IMAGE.to_string()),
                comment: profile
                    .listing_comment
                    .first(item)
                    .unwrap_or_else(|| NO_COMMENT.to_string()),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::ExtractionProfile;

    const DOC: &str = r#"
    <html><body><ul>
        <li class="ComplexArticleItem_item__L5o7k">
            <span class="ComplexArticleItem_name__4h3AA">unit A</span>
            <span class="ComplexArticleItem_price__DFeIb">5억</span>
            <ul>
                <li class="ComplexArticleItem_item-summary__oHSwl">매매</li>
                <li class="ComplexArticleItem_item-summary__oHSwl">84㎡</li>
                <li class="ComplexArticleItem_item-summary__oHSwl">10/20</li>
                <li class="ComplexArticleItem_item-summary__oHSwl">남향</li>
            </ul>
            <img src="https://landthumb/1.jpg">
            <p class="ComplexArticleItem_comment__zN_dK">역세권, 올수리</p>
        </li>
        <li class="ComplexArticleItem_item__L5o7k">
            <span class="ComplexArticleItem_price__DFeIb">매매 3억 5,000</span>
            <ul>
                <li class="ComplexArticleItem_item-summary__oHSwl">매매</li>
                <li class="ComplexArticleItem_item-summary__oHSwl">59㎡</li>
                <li class="ComplexArticleItem_item-summary__oHSwl">3/15</li>
            </ul>
        </li>
        <li class="ComplexArticleItem_item__L5o7k">
            <span class="ComplexArticleItem_name__4h3AA">unit C</span>
            <span class="ComplexArticleItem_price__DFeIb">가격문의</span>
        </li>
    </ul></body></html>"#;

    fn listings() -> Vec<Listing> {
        parse_listings(DOC, &ExtractionProfile::default().compile())
    }

    #[test]
    fn test_full_listing() {
        let l = &listings()[0];
        assert_eq!(l.title, "unit A");
        assert_eq!(l.price_text, "5억");
        assert_eq!(l.price_normalized, Some(500_000_000));
        assert_eq!(l.area, "84㎡");
        assert_eq!(l.floor_text, "10/20");
        assert_eq!(l.direction, "남향");
        assert_eq!(l.image_url, "https://landthumb/1.jpg");
        assert_eq!(l.comment, "역세권, 올수리");
    }

    #[test]
    fn test_short_summary_is_all_unknown() {
        let l = &listings()[1];
        assert_eq!(l.title, UNKNOWN);
        assert_eq!(l.price_normalized, Some(350_000_000));
        // three items present, four required: nothing is partially filled
        assert_eq!(l.area, UNKNOWN);
        assert_eq!(l.floor_text, UNKNOWN);
        assert_eq!(l.direction, UNKNOWN);
        assert_eq!(l.image_url, NO_IMAGE);
        assert_eq!(l.comment, NO_COMMENT);
    }

    #[test]
    fn test_unparsable_price_is_null() {
        let ls = listings();
        assert_eq!(ls.len(), 3);
        assert_eq!(ls[2].price_text, "가격문의");
        assert_eq!(ls[2].price_normalized, None);
    }

    #[test]
    fn test_no_listing_blocks() {
        let profile = ExtractionProfile::default().compile();
        assert!(parse_listings("<html><body></body></html>", &profile).is_empty());
    }
}
