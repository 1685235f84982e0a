//! Search provider implementations

pub mod bing;
pub mod exa;
pub mod google;
pub mod serper;

// Re-export providers for convenience
pub use bing::BingProvider;
pub use exa::ExaProvider;
pub use google::GoogleProvider;
pub use serper::SerperProvider;

use crate::config::{ProviderKind, ProviderSettings, Settings};
use crate::error::{SearchError, SearchResult};
use crate::rotation::KeyRotationStore;
use crate::types::SearchProvider;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Build the adapter for one configured provider
pub fn build_provider(
    provider: &ProviderSettings,
    settings: &Settings,
    keys: Arc<KeyRotationStore>,
) -> SearchResult<Arc<dyn SearchProvider>> {
    let base_url = provider.base_url.as_deref();

    let built: Arc<dyn SearchProvider> = match provider.kind {
        ProviderKind::Exa => {
            let exa = ExaProvider::new(keys, provider.timeout)?;
            Arc::new(match base_url {
                Some(url) => exa.with_base_url(url),
                None => exa,
            })
        }
        ProviderKind::Google => {
            let cx = settings.google_cse_id.as_deref().ok_or_else(|| {
                SearchError::ConfigError("GOOGLE_CSE_ID is required".to_string())
            })?;
            let google = GoogleProvider::new(keys, cx, provider.timeout)?;
            Arc::new(match base_url {
                Some(url) => google.with_base_url(url),
                None => google,
            })
        }
        ProviderKind::Serper => {
            let serper = SerperProvider::new(keys, provider.timeout)?;
            Arc::new(match base_url {
                Some(url) => serper.with_base_url(url),
                None => serper,
            })
        }
        ProviderKind::Bing => {
            let bing = BingProvider::new(provider.timeout)?;
            Arc::new(match base_url {
                Some(url) => bing.with_base_url(url),
                None => bing,
            })
        }
    };

    Ok(built)
}

/// Adapters by provider name
#[derive(Debug, Default, Clone)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, Arc<dyn SearchProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adapters for every enabled provider. A provider that fails to build is
    /// logged and left out.
    pub fn from_settings(settings: &Settings, keys: Arc<KeyRotationStore>) -> Self {
        let mut registry = Self::new();
        for provider in settings.enabled_providers() {
            match build_provider(provider, settings, Arc::clone(&keys)) {
                Ok(adapter) => registry.register(adapter),
                Err(e) => log::error!("{} disabled: {e}", provider.name()),
            }
        }
        registry
    }

    pub fn register(&mut self, provider: Arc<dyn SearchProvider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn SearchProvider>> {
        self.providers.get(&name.to_lowercase()).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        self.providers.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
