//! Section listing with cache policy, naming, filtering and sorting.

use tracing::{debug, warn};

use super::cache::CatalogCache;
use super::filter::filter_items;
use super::names::{apply_display_names, extract_tag, ArcadeNames};
use super::types::{CatalogItem, Filters};
use crate::client::{CatalogClient, ClientError};
use crate::config::{Section, Source};
use crate::metrics;

/// Every section of a source merged into one tagged listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceListing {
    pub items: Vec<CatalogItem>,
    /// Sections whose listing failed and were served from the cache.
    pub stale_sections: Vec<String>,
    /// Sections whose listing failed with nothing cached.
    pub failed_sections: Vec<String>,
}

impl SourceListing {
    /// True when the source has sections and none of them produced items.
    pub fn all_failed(&self, source: &Source) -> bool {
        !source.sections.is_empty() && self.failed_sections.len() == source.sections.len()
    }
}

/// Lists sections through a client and keeps the listing cache.
#[derive(Debug, Clone)]
pub struct CatalogBrowser {
    cache: CatalogCache,
    arcade: Option<ArcadeNames>,
}

impl CatalogBrowser {
    pub fn new(cache: CatalogCache) -> Self {
        Self {
            cache,
            arcade: None,
        }
    }

    pub fn with_arcade_names(mut self, names: ArcadeNames) -> Self {
        self.arcade = Some(names);
        self
    }

    pub fn cache(&self) -> &CatalogCache {
        &self.cache
    }

    /// List a section, filtered by the source's keywords and sorted.
    ///
    /// Cacheable host types are served from the cache unless `refresh` is
    /// set. A fresh listing of a cacheable host is written back.
    pub async fn load_section(
        &self,
        client: &dyn CatalogClient,
        source: &Source,
        section: &Section,
        refresh: bool,
    ) -> Result<Vec<CatalogItem>, ClientError> {
        let host_type = client.host_type();
        let cacheable = host_type.is_cacheable();

        if cacheable && !refresh {
            if let Some(items) = self.cache.get(&source.display_name, &section.name).await {
                metrics::CACHE_HITS.inc();
                debug!(source = %source.display_name, section = %section.name, "Serving cached listing");
                return Ok(finish(items, &source.filters));
            }
            metrics::CACHE_MISSES.inc();
        }

        let locator = section.locator(host_type);
        let mut items = match client.list_directory(locator).await {
            Ok(items) => {
                metrics::LISTINGS_TOTAL
                    .with_label_values(&[host_type.as_str(), "success"])
                    .inc();
                metrics::LISTING_ITEMS
                    .with_label_values(&[host_type.as_str()])
                    .observe(items.len() as f64);
                items
            }
            Err(e) => {
                metrics::LISTINGS_TOTAL
                    .with_label_values(&[host_type.as_str(), "error"])
                    .inc();
                return Err(e);
            }
        };

        apply_display_names(&mut items, self.arcade.as_ref());

        if cacheable {
            if let Err(e) = self
                .cache
                .put(&source.display_name, &section.name, &items)
                .await
            {
                warn!(source = %source.display_name, error = %e, "Failed to write listing cache");
            }
        }

        Ok(finish(items, &source.filters))
    }

    /// List every section of `source` and merge the files into one listing.
    ///
    /// Each item is tagged with its section's system tag. A failing section
    /// falls back to its cached copy and never aborts the others.
    pub async fn load_source(
        &self,
        client: &dyn CatalogClient,
        source: &Source,
        refresh: bool,
    ) -> SourceListing {
        let mut listing = SourceListing::default();
        for section in &source.sections {
            match self.load_section(client, source, section, refresh).await {
                Ok(items) => listing.items.extend(tagged_files(items, section)),
                Err(e) => {
                    warn!(
                        source = %source.display_name,
                        section = %section.name,
                        error = %e,
                        "Section listing failed"
                    );
                    self.add_cached(&mut listing, source, section).await;
                }
            }
        }
        sort_items(&mut listing.items);
        listing
    }

    /// Source-wide listing built only from the cache, for when the host
    /// cannot be reached at all.
    pub async fn cached_source(&self, source: &Source) -> SourceListing {
        let mut listing = SourceListing::default();
        for section in &source.sections {
            self.add_cached(&mut listing, source, section).await;
        }
        sort_items(&mut listing.items);
        listing
    }

    async fn add_cached(&self, listing: &mut SourceListing, source: &Source, section: &Section) {
        match self.cached_section(source, section).await {
            Some(items) => {
                listing.items.extend(tagged_files(items, section));
                listing.stale_sections.push(section.name.clone());
            }
            None => listing.failed_sections.push(section.name.clone()),
        }
    }

    /// Last cached listing for a section, filtered and sorted.
    pub async fn cached_section(&self, source: &Source, section: &Section) -> Option<Vec<CatalogItem>> {
        self.cache
            .get(&source.display_name, &section.name)
            .await
            .map(|items| finish(items, &source.filters))
    }
}

/// Directories first, then case-insensitive by title.
pub fn sort_items(items: &mut [CatalogItem]) {
    items.sort_by(|a, b| {
        b.is_directory
            .cmp(&a.is_directory)
            .then_with(|| a.title().to_lowercase().cmp(&b.title().to_lowercase()))
    });
}

/// Tag shown next to items of `section` in a source-wide listing: the
/// configured system tag, else the `(TAG)` of the section name, else the
/// name itself.
pub fn section_tag(section: &Section) -> String {
    if !section.system_tag.is_empty() {
        return section.system_tag.clone();
    }
    extract_tag(&section.name).unwrap_or_else(|| section.name.clone())
}

fn tagged_files(items: Vec<CatalogItem>, section: &Section) -> impl Iterator<Item = CatalogItem> {
    let tag = section_tag(section);
    items
        .into_iter()
        .filter(|item| !item.is_directory)
        .map(move |item| CatalogItem {
            tag: Some(tag.clone()),
            ..item
        })
}

fn finish(items: Vec<CatalogItem>, filters: &Filters) -> Vec<CatalogItem> {
    let mut items = if filters.is_empty() {
        items
    } else {
        filter_items(&items, filters)
    };
    sort_items(&mut items);
    items
}
