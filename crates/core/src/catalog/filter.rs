//! Keyword filtering over catalog listings.

use super::types::{CatalogItem, Filters};

fn matches_any(haystack: &str, keywords: &[String]) -> bool {
    keywords
        .iter()
        .any(|k| haystack.contains(&k.to_lowercase()))
}

/// Narrow a listing with inclusive then exclusive keywords.
///
/// The inclusive pass keeps items whose filename contains any inclusive
/// keyword (all items when none are configured). The exclusive pass then
/// removes matches from that subset only.
pub fn filter_items(items: &[CatalogItem], filters: &Filters) -> Vec<CatalogItem> {
    let included: Vec<&CatalogItem> = if filters.inclusive.is_empty() {
        items.iter().collect()
    } else {
        items
            .iter()
            .filter(|item| matches_any(&item.filename.to_lowercase(), &filters.inclusive))
            .collect()
    };

    included
        .into_iter()
        .filter(|item| !matches_any(&item.filename.to_lowercase(), &filters.exclusive))
        .cloned()
        .collect()
}

/// Free-text search: an inclusive-only filter with a single term.
pub fn search_items(items: &[CatalogItem], term: &str) -> Vec<CatalogItem> {
    if term.trim().is_empty() {
        return items.to_vec();
    }
    filter_items(
        items,
        &Filters {
            inclusive: vec![term.trim().to_string()],
            exclusive: vec![],
        },
    )
}
