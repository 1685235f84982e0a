//! Serial multi-provider search with health tracking
//!
//! Providers are tried one at a time, best first, until one returns at least
//! one result. The order comes from the configured priority, with ties broken
//! by the live error count. Every failed or empty attempt counts against the
//! provider; once it reaches its `max_errors` it sits out until an operator
//! resets it. Successful result sets are cached by `(query, max_results)`.

use crate::{
    cache::{CacheKey, ResultCache},
    config::ProviderSettings,
    error::{SearchError, SearchResult as Result},
    query::LocaleProfile,
    types::{SearchOptions, SearchProvider, SearchResult},
};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::time::{timeout, Duration};

const PROBE_QUERY: &str = "teste mercado digital Brasil";
const PROBE_MAX_RESULTS: u32 = 3;

/// How the manager treats one provider
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderPolicy {
    pub enabled: bool,
    pub priority: u32,
    pub max_errors: u32,
    pub timeout: Duration,
    /// Localize the query before sending it to this provider
    pub enhance_query: bool,
}

impl ProviderPolicy {
    pub fn new(priority: u32, max_errors: u32) -> Self {
        Self {
            enabled: true,
            priority,
            max_errors,
            timeout: Duration::from_secs(15),
            enhance_query: false,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_query_enhancement(mut self, enhance: bool) -> Self {
        self.enhance_query = enhance;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

impl From<&ProviderSettings> for ProviderPolicy {
    fn from(settings: &ProviderSettings) -> Self {
        Self {
            enabled: settings.enabled,
            priority: settings.priority,
            max_errors: settings.max_errors,
            timeout: settings.timeout,
            enhance_query: settings.enhance_query,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct ProviderStats {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub avg_response_time_ms: f64,
}

impl ProviderStats {
    fn record(&mut self, success: bool, elapsed: Duration) {
        self.total_requests += 1;
        if success {
            self.successful_requests += 1;
            // Update rolling average
            let new_time = elapsed.as_millis() as f64;
            self.avg_response_time_ms = (self.avg_response_time_ms
                * (self.successful_requests - 1) as f64
                + new_time)
                / self.successful_requests as f64;
        } else {
            self.failed_requests += 1;
        }
    }
}

#[derive(Debug, Default)]
struct ProviderHealth {
    error_count: u32,
    stats: ProviderStats,
}

#[derive(Debug)]
struct ProviderEntry {
    provider: Arc<dyn SearchProvider>,
    policy: ProviderPolicy,
    health: Mutex<ProviderHealth>,
}

impl ProviderEntry {
    fn name(&self) -> &str {
        self.provider.name()
    }

    fn error_count(&self) -> u32 {
        self.health.lock().unwrap_or_else(|p| p.into_inner()).error_count
    }

    fn is_available(&self) -> bool {
        self.policy.enabled && self.error_count() < self.policy.max_errors
    }
}

/// Snapshot of one provider for operators
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderStatus {
    pub name: String,
    pub enabled: bool,
    pub available: bool,
    pub priority: u32,
    pub error_count: u32,
    pub max_errors: u32,
    pub stats: ProviderStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success { results: usize },
    Empty,
    Failed { error: String },
}

/// One provider call made while serving a search
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderAttempt {
    pub provider: String,
    pub outcome: AttemptOutcome,
    pub elapsed_ms: u64,
}

/// Results of a fallback search with provenance
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FallbackOutcome {
    pub results: Vec<SearchResult>,
    /// Provider whose results were returned
    pub provider: Option<String>,
    pub from_cache: bool,
    pub attempts: Vec<ProviderAttempt>,
    /// Set when every provider was exhausted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_message: Option<String>,
}

/// Result of probing a single provider
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeReport {
    pub provider: String,
    pub success: bool,
    pub results: usize,
    pub response_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample: Option<SearchResult>,
}

#[derive(Debug)]
pub struct FallbackSearchManager {
    providers: Vec<ProviderEntry>,
    cache: ResultCache,
    locale: LocaleProfile,
}

impl FallbackSearchManager {
    pub fn new(cache_ttl: Duration) -> Self {
        Self {
            providers: Vec::new(),
            cache: ResultCache::new(cache_ttl),
            locale: LocaleProfile::default(),
        }
    }

    pub fn with_locale(mut self, locale: LocaleProfile) -> Self {
        self.locale = locale;
        self
    }

    pub fn with_provider(mut self, provider: Arc<dyn SearchProvider>, policy: ProviderPolicy) -> Self {
        self.register(provider, policy);
        self
    }

    /// Add a provider. Registering a name twice replaces the earlier entry.
    pub fn register(&mut self, provider: Arc<dyn SearchProvider>, policy: ProviderPolicy) {
        self.providers.retain(|entry| entry.name() != provider.name());
        log::info!(
            "Fallback provider registered: {} (priority {}, max errors {})",
            provider.name(),
            policy.priority,
            policy.max_errors
        );
        self.providers.push(ProviderEntry {
            provider,
            policy,
            health: Mutex::new(ProviderHealth::default()),
        });
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(ProviderEntry::name).collect()
    }

    /// Best available result set for `query`. Provider failures are absorbed;
    /// an exhausted chain yields an empty vector.
    pub async fn search_with_fallback(&self, query: &str, max_results: u32) -> Result<Vec<SearchResult>> {
        Ok(self.search_with_report(query, max_results).await?.results)
    }

    /// Like [`FallbackSearchManager::search_with_fallback`] but also reports
    /// which providers were tried and how each attempt went
    pub async fn search_with_report(&self, query: &str, max_results: u32) -> Result<FallbackOutcome> {
        if query.trim().is_empty() {
            return Err(SearchError::InvalidInput(
                "Query cannot be empty".to_string(),
            ));
        }
        if max_results == 0 {
            return Err(SearchError::InvalidInput(
                "max_results must be greater than 0".to_string(),
            ));
        }

        let cache_key = CacheKey::new(query, max_results);
        if let Some(entry) = self.cache.get(&cache_key) {
            log::info!("Cache hit for '{query}' ({})", entry.provider);
            return Ok(FallbackOutcome {
                results: entry.results,
                provider: Some(entry.provider),
                from_cache: true,
                attempts: Vec::new(),
                fallback_message: None,
            });
        }

        let ordered = self.ordered_providers();
        let mut attempts = Vec::with_capacity(ordered.len());

        for entry in ordered {
            let name = entry.name().to_string();
            log::info!("Trying {name} for '{query}'");

            let options = self.options_for(entry, query, max_results);
            let started = Instant::now();
            let outcome = self.invoke(entry, &options).await;
            let elapsed_ms = started.elapsed().as_millis() as u64;

            match outcome {
                Ok(results) if !results.is_empty() => {
                    log::info!("{name} returned {} results", results.len());
                    self.cache.insert(cache_key, results.clone(), &name);
                    attempts.push(ProviderAttempt {
                        provider: name.clone(),
                        outcome: AttemptOutcome::Success {
                            results: results.len(),
                        },
                        elapsed_ms,
                    });
                    return Ok(FallbackOutcome {
                        results,
                        provider: Some(name),
                        from_cache: false,
                        attempts,
                        fallback_message: None,
                    });
                }
                Ok(_) => {
                    log::warn!("{name} returned no results");
                    self.record_error(entry);
                    attempts.push(ProviderAttempt {
                        provider: name,
                        outcome: AttemptOutcome::Empty,
                        elapsed_ms,
                    });
                }
                Err(e) => {
                    log::warn!("{name} failed: {e}");
                    self.record_error(entry);
                    attempts.push(ProviderAttempt {
                        provider: name,
                        outcome: AttemptOutcome::Failed {
                            error: e.to_string(),
                        },
                        elapsed_ms,
                    });
                }
            }
        }

        let message = if attempts.is_empty() {
            "No search provider is currently available".to_string()
        } else {
            let tried: Vec<&str> = attempts.iter().map(|a| a.provider.as_str()).collect();
            format!(
                "No results for '{query}' from any provider (tried: {})",
                tried.join(", ")
            )
        };
        log::error!("{message}");

        Ok(FallbackOutcome {
            results: Vec::new(),
            provider: None,
            from_cache: false,
            attempts,
            fallback_message: Some(message),
        })
    }

    /// Available providers, ascending by `(priority, error_count)`
    fn ordered_providers(&self) -> Vec<&ProviderEntry> {
        let mut available: Vec<(&ProviderEntry, u32)> = self
            .providers
            .iter()
            .filter(|entry| entry.is_available())
            .map(|entry| (entry, entry.error_count()))
            .collect();
        available.sort_by_key(|(entry, errors)| (entry.policy.priority, *errors));
        available.into_iter().map(|(entry, _)| entry).collect()
    }

    fn options_for(&self, entry: &ProviderEntry, query: &str, max_results: u32) -> SearchOptions {
        let query = if entry.policy.enhance_query {
            self.locale.enhance_query(query)
        } else {
            query.to_string()
        };
        SearchOptions::new(query, max_results).with_locale(&self.locale.language, &self.locale.region)
    }

    /// Call a provider under its timeout and update its statistics
    async fn invoke(&self, entry: &ProviderEntry, options: &SearchOptions) -> Result<Vec<SearchResult>> {
        let start_time = Instant::now();
        let result = match timeout(entry.policy.timeout, entry.provider.search(options)).await {
            Ok(search_result) => search_result,
            Err(_) => Err(SearchError::Timeout {
                timeout_ms: entry.policy.timeout.as_millis() as u64,
            }),
        };

        let success = matches!(&result, Ok(results) if !results.is_empty());
        entry
            .health
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .stats
            .record(success, start_time.elapsed());

        result
    }

    fn record_error(&self, entry: &ProviderEntry) {
        let mut health = entry.health.lock().unwrap_or_else(|p| p.into_inner());
        health.error_count += 1;
        if health.error_count == entry.policy.max_errors {
            log::error!(
                "{} marked unavailable after {} errors",
                entry.name(),
                health.error_count
            );
        }
    }

    fn entry(&self, name: &str) -> Option<&ProviderEntry> {
        self.providers
            .iter()
            .find(|entry| entry.name().eq_ignore_ascii_case(name))
    }

    /// Whether `name` is registered, enabled and below its error limit
    pub fn is_provider_available(&self, name: &str) -> bool {
        self.entry(name).is_some_and(ProviderEntry::is_available)
    }

    pub fn provider_status(&self) -> Vec<ProviderStatus> {
        self.providers
            .iter()
            .map(|entry| {
                let health = entry.health.lock().unwrap_or_else(|p| p.into_inner());
                ProviderStatus {
                    name: entry.name().to_string(),
                    enabled: entry.policy.enabled,
                    available: entry.policy.enabled && health.error_count < entry.policy.max_errors,
                    priority: entry.policy.priority,
                    error_count: health.error_count,
                    max_errors: entry.policy.max_errors,
                    stats: health.stats.clone(),
                }
            })
            .collect()
    }

    /// Zero the error count of one provider, or of all when `name` is `None`.
    /// Returns how many providers were reset.
    pub fn reset_provider_errors(&self, name: Option<&str>) -> usize {
        let mut reset = 0;
        for entry in &self.providers {
            if name.is_some_and(|n| !entry.name().eq_ignore_ascii_case(n)) {
                continue;
            }
            entry
                .health
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .error_count = 0;
            log::info!("Error count reset for {}", entry.name());
            reset += 1;
        }
        reset
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
        log::info!("Search cache cleared");
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }

    /// Send a fixed probe query to one provider, bypassing the cache and the
    /// error accounting
    pub async fn test_provider(&self, name: &str) -> Result<ProbeReport> {
        let entry = self
            .entry(name)
            .ok_or_else(|| SearchError::InvalidInput(format!("Unknown provider '{name}'")))?;

        let options = self.options_for(entry, PROBE_QUERY, PROBE_MAX_RESULTS);
        let started = Instant::now();
        let outcome = match timeout(entry.policy.timeout, entry.provider.search(&options)).await {
            Ok(result) => result,
            Err(_) => Err(SearchError::Timeout {
                timeout_ms: entry.policy.timeout.as_millis() as u64,
            }),
        };
        let response_time_ms = started.elapsed().as_millis() as u64;

        Ok(match outcome {
            Ok(mut results) => ProbeReport {
                provider: entry.name().to_string(),
                success: !results.is_empty(),
                results: results.len(),
                response_time_ms,
                error: None,
                sample: (!results.is_empty()).then(|| results.swap_remove(0)),
            },
            Err(e) => ProbeReport {
                provider: entry.name().to_string(),
                success: false,
                results: 0,
                response_time_ms,
                error: Some(e.to_string()),
                sample: None,
            },
        })
    }
}
