//! Core types and traits shared by every provider and orchestrator

use crate::error::SearchError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// How a result was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultSource {
    /// Exact keyword match engines (Google, Serper, Bing scraping)
    Keyword,
    /// Meaning-based similarity ranking (Exa)
    Neural,
    /// Collected by the fallback chain during a multi-provider search
    Fallback,
}

impl fmt::Display for ResultSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultSource::Keyword => write!(f, "keyword"),
            ResultSource::Neural => write!(f, "neural"),
            ResultSource::Fallback => write!(f, "fallback"),
        }
    }
}

/// Represents a web search result returned by any search provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Title of the web page
    pub title: String,
    /// URL of the search result
    pub url: String,
    /// Snippet/description of the web page (empty when the provider has none)
    pub snippet: String,
    /// Search mode that produced the result
    pub source: ResultSource,
    /// Name of the provider that returned this result
    pub provider: String,
    /// Provider relevance score, when one is reported
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    /// When the result was published or last updated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_date: Option<String>,
    /// The source website domain
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

impl SearchResult {
    /// Copy of this result attributed to another search mode
    pub fn relabeled(&self, source: ResultSource) -> Self {
        Self {
            source,
            ..self.clone()
        }
    }
}

/// Common options for a single provider call
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOptions {
    /// The search query text
    pub query: String,
    /// Maximum number of results to return
    pub max_results: u32,
    /// Language for results (provider default when `None`)
    pub language: Option<String>,
    /// Country/region for results (provider default when `None`)
    pub region: Option<String>,
    /// Restrict results to these domains (provider default when empty)
    pub include_domains: Vec<String>,
    /// Only results published on or after this date (YYYY-MM-DD)
    pub start_published_date: Option<String>,
    /// Google-style relative date restriction, e.g. `m12`
    pub date_restrict: Option<String>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            query: String::new(),
            max_results: 10,
            language: None,
            region: None,
            include_domains: Vec::new(),
            start_published_date: None,
            date_restrict: None,
        }
    }
}

impl SearchOptions {
    pub fn new(query: impl Into<String>, max_results: u32) -> Self {
        Self {
            query: query.into(),
            max_results,
            ..Default::default()
        }
    }

    pub fn with_locale(mut self, language: &str, region: &str) -> Self {
        self.language = Some(language.to_string());
        self.region = Some(region.to_string());
        self
    }

    pub fn with_include_domains(mut self, domains: Vec<String>) -> Self {
        self.include_domains = domains;
        self
    }

    pub fn with_start_published_date(mut self, date: &str) -> Self {
        self.start_published_date = Some(date.to_string());
        self
    }

    pub fn with_date_restrict(mut self, restrict: &str) -> Self {
        self.date_restrict = Some(restrict.to_string());
        self
    }
}

/// Trait that all search provider implementations must satisfy
#[async_trait::async_trait]
pub trait SearchProvider: Send + Sync + std::fmt::Debug {
    /// Name of the search provider
    fn name(&self) -> &str;

    /// Search mode of this provider's results
    fn source(&self) -> ResultSource;

    /// Perform one request. Implementations must not retry internally.
    async fn search(&self, options: &SearchOptions) -> Result<Vec<SearchResult>, SearchError>;

    /// Get provider configuration (for debugging/logging, secrets masked)
    fn config(&self) -> HashMap<String, String> {
        HashMap::new()
    }
}
