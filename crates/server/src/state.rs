use std::sync::Arc;

use romhaul_core::client::ClientFactory;
use romhaul_core::{ArtMatcher, CatalogBrowser, Config, PostProcessor, SanitizedConfig};

/// Shared application state
pub struct AppState {
    config: Config,
    browser: CatalogBrowser,
    factory: Arc<dyn ClientFactory>,
    art: ArtMatcher,
    processor: PostProcessor,
}

impl AppState {
    pub fn new(
        config: Config,
        browser: CatalogBrowser,
        factory: Arc<dyn ClientFactory>,
        art: ArtMatcher,
    ) -> Self {
        let processor = PostProcessor::new(&config.downloads);
        Self {
            config,
            browser,
            factory,
            art,
            processor,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn browser(&self) -> &CatalogBrowser {
        &self.browser
    }

    pub fn factory(&self) -> &dyn ClientFactory {
        self.factory.as_ref()
    }

    pub fn art(&self) -> &ArtMatcher {
        &self.art
    }

    pub fn processor(&self) -> &PostProcessor {
        &self.processor
    }
}
