//! Remote catalog listings: item model, keyword filters, listing cache and
//! display names.
//!
//! Listings come from a [`crate::client::CatalogClient`]. The browser decides
//! whether a section is served from the JSON cache (slow hosts only), then
//! names, filters and sorts the items before handing them to callers.

pub mod browse;
mod cache;
pub mod filter;
mod names;
mod types;

pub use browse::{section_tag, sort_items, CatalogBrowser, SourceListing};
pub use cache::CatalogCache;
pub use filter::{filter_items, search_items};
pub use names::{apply_display_names, extract_tag, ArcadeNames};
pub use types::*;
