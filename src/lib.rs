//! # market-search
//!
//! Multi-provider web search for market research. Several search backends
//! (a neural engine, keyword engines and a scraping engine) sit behind one
//! [`SearchProvider`] trait, and two orchestrators build on top of them:
//!
//! * [`fallback::FallbackSearchManager`] tries providers one by one in
//!   priority order, caches the first non-empty answer and takes failing
//!   providers out of rotation.
//! * [`coordinator::SimultaneousDistinctCoordinator`] queries the neural and
//!   keyword engines at the same time with deliberately different phrasings
//!   and keeps every branch's results.
//!
//! API keys rotate per request ([`rotation`]) and result URLs can be screened
//! and ranked for research value ([`filter`]).
//!
//! ## Quick Start
//!
//! ```no_run
//! use market_search::{query::ResearchContext, services::SearchServices};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Keys and provider settings come from the environment
//!     let services = SearchServices::from_env()?;
//!
//!     let results = services.fallback.search_with_fallback("fintech", 10).await?;
//!     for result in &results {
//!         println!("{}: {}", result.title, result.url);
//!     }
//!
//!     let context = ResearchContext::new().with_segment("pagamentos");
//!     let report = services
//!         .coordinator
//!         .execute_simultaneous_distinct_search("fintech", &context)
//!         .await?;
//!     println!("{} results", report.statistics.total_results);
//!
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod fallback;
pub mod filter;
pub mod providers;
pub mod query;
pub mod rotation;
pub mod services;
pub mod types;
pub mod utils;

// Re-export common types
pub use config::{ProviderKind, Settings};
pub use coordinator::{ConsolidatedResult, SimultaneousDistinctCoordinator};
pub use error::{SearchError, SearchResult as Result};
pub use fallback::FallbackSearchManager;
pub use filter::{FilterDecision, UrlFilter};
pub use query::ResearchContext;
pub use rotation::KeyRotationStore;
pub use services::SearchServices;
pub use types::{ResultSource, SearchOptions, SearchProvider, SearchResult};

/// Query a single provider directly, without fallback or caching
///
/// Failures are wrapped in a [`SearchError::ProviderError`] that carries
/// provider-specific troubleshooting advice.
///
/// # Examples
///
/// ```no_run
/// use market_search::{web_search, providers::BingProvider, SearchOptions};
/// use std::time::Duration;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bing = BingProvider::new(Duration::from_secs(15))?;
/// let options = SearchOptions::new("mercado de fintechs", 10).with_locale("pt", "br");
/// let results = web_search(&bing, &options).await?;
/// # Ok(())
/// # }
/// ```
pub async fn web_search(
    provider: &dyn SearchProvider,
    options: &SearchOptions,
) -> Result<Vec<SearchResult>> {
    if options.query.trim().is_empty() {
        return Err(SearchError::InvalidInput(
            "A search query is required".to_string(),
        ));
    }

    log::info!(
        "Performing search: provider: {}, query: {}",
        provider.name(),
        options.query
    );

    match provider.search(options).await {
        Ok(results) => {
            log::info!("Received {} results", results.len());
            Ok(results)
        }
        Err(error) => {
            let troubleshooting = get_troubleshooting_info(provider.name(), &error);
            let detailed_error = format!(
                "Search with provider '{}' failed: {}\n\nTroubleshooting: {}",
                provider.name(),
                error,
                troubleshooting
            );

            log::error!("{detailed_error}");
            Err(SearchError::ProviderError(detailed_error))
        }
    }
}

/// Get provider-specific troubleshooting information based on error
pub fn get_troubleshooting_info(provider_name: &str, error: &SearchError) -> String {
    let by_error = match error {
        SearchError::AuthenticationError(_)
        | SearchError::HttpError {
            status_code: Some(401 | 403),
            ..
        } => Some("This is likely an authentication issue. Check your API key and make sure it's valid and has the correct permissions."),
        SearchError::HttpError {
            status_code: Some(400),
            ..
        } => Some("This is likely due to invalid request parameters. Check your query and other search options."),
        SearchError::RateLimit(_)
        | SearchError::HttpError {
            status_code: Some(429),
            ..
        } => Some("You've exceeded the rate limit for this API. Add more keys for rotation, try again later or reduce your request frequency."),
        SearchError::HttpError {
            status_code: Some(500..=599),
            ..
        } => Some("The search provider is experiencing server issues. Try again later."),
        SearchError::Timeout { .. } => Some("The provider did not answer in time. Raise its timeout setting or try again later."),
        _ => None,
    };

    if let Some(suggestion) = by_error {
        return suggestion.to_string();
    }

    match provider_name {
        "exa" => "Make sure EXA_API_KEY (or EXA_API_KEY_1, EXA_API_KEY_2, ...) holds a valid Exa API key with remaining credits.".to_string(),
        "google" => "Make sure your Google API key is valid and has the Custom Search API enabled. Also check if your Search Engine ID (GOOGLE_CSE_ID) is correct.".to_string(),
        "serper" => "Check that your Serper API key is valid. Verify that you have enough credits remaining in your Serper account.".to_string(),
        "bing" => "Bing may be serving a consent or captcha page. Try adding a delay between requests or reduce your request frequency.".to_string(),
        _ => format!(
            "Check your {provider_name} API credentials and make sure your search request is valid."
        ),
    }
}
