//! Process-wide wiring of the search subsystem
//!
//! [`SearchServices`] is built once from [`Settings`] and handed to whoever
//! needs search. Tests build their own instance, so nothing is global.

use crate::{
    config::{ProviderKind, Settings},
    coordinator::{CoordinatorConfig, SimultaneousDistinctCoordinator},
    error::SearchResult,
    fallback::{FallbackSearchManager, ProviderPolicy},
    filter::UrlFilter,
    providers::ProviderRegistry,
    rotation::KeyRotationStore,
};
use std::sync::Arc;

#[derive(Debug)]
pub struct SearchServices {
    pub settings: Settings,
    pub keys: Arc<KeyRotationStore>,
    pub url_filter: Arc<UrlFilter>,
    pub providers: ProviderRegistry,
    pub fallback: Arc<FallbackSearchManager>,
    pub coordinator: SimultaneousDistinctCoordinator,
}

impl SearchServices {
    pub fn from_env() -> SearchResult<Self> {
        Self::from_settings(Settings::from_env()?)
    }

    pub fn from_settings(settings: Settings) -> SearchResult<Self> {
        settings.validate()?;

        let keys = Arc::new(KeyRotationStore::from_keys(&settings.keys));
        let providers = ProviderRegistry::from_settings(&settings, Arc::clone(&keys));
        Ok(Self::assemble(settings, keys, providers))
    }

    /// Wire pre-built adapters, e.g. ones pointed at mock servers
    pub fn assemble(settings: Settings, keys: Arc<KeyRotationStore>, providers: ProviderRegistry) -> Self {
        let url_filter = Arc::new(UrlFilter::default());

        let mut fallback = FallbackSearchManager::new(settings.cache_ttl);
        for provider_settings in &settings.providers {
            if let Some(adapter) = providers.get(provider_settings.name()) {
                fallback.register(adapter, ProviderPolicy::from(provider_settings));
            }
        }
        let fallback = Arc::new(fallback);

        let coordinator_config = CoordinatorConfig::default()
            .with_max_concurrent(settings.coordinator.max_workers)
            .with_branch_timeout(settings.coordinator.branch_timeout);

        let mut coordinator = SimultaneousDistinctCoordinator::new(coordinator_config)
            .with_fallback(Arc::clone(&fallback))
            .with_url_filter(Arc::clone(&url_filter));
        if let Some(neural) = providers.get(ProviderKind::Exa.name()) {
            coordinator = coordinator.with_neural_provider(neural);
        }
        if let Some(keyword) = providers.get(ProviderKind::Google.name()) {
            coordinator = coordinator.with_keyword_provider(keyword);
        }

        log::info!(
            "Search services ready: providers [{}]",
            providers.names().join(", ")
        );

        Self {
            settings,
            keys,
            url_filter,
            providers,
            fallback,
            coordinator,
        }
    }
}
