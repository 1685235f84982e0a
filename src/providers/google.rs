//! Google Custom Search API provider

use crate::{
    error::{SearchError, SearchResult},
    rotation::KeyRotationStore,
    types::{ResultSource, SearchOptions, SearchProvider, SearchResult as SearchResultType},
    utils::http::HttpClient,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/customsearch/v1";
const PROVIDER_NAME: &str = "google";
/// The API refuses `num` above 10
const MAX_RESULTS_PER_REQUEST: u32 = 10;

/// Google Custom Search API response types
#[derive(Debug, Deserialize)]
struct GoogleSearchItem {
    #[serde(default)]
    title: String,
    link: String,
    #[serde(default, rename = "displayLink")]
    display_link: Option<String>,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    pagemap: Option<GooglePageMap>,
}

#[derive(Debug, Deserialize)]
struct GooglePageMap {
    #[serde(default)]
    metatags: Option<Vec<HashMap<String, String>>>,
}

#[derive(Debug, Deserialize)]
struct GoogleSearchResponse {
    #[serde(default)]
    items: Option<Vec<GoogleSearchItem>>,
}

impl GoogleSearchItem {
    fn published_date(&self) -> Option<String> {
        self.pagemap
            .as_ref()
            .and_then(|pm| pm.metatags.as_ref())
            .and_then(|tags| tags.first())
            .and_then(|meta| {
                meta.get("article:published_time")
                    .or_else(|| meta.get("date"))
                    .or_else(|| meta.get("og:updated_time"))
            })
            .cloned()
    }
}

/// Google Custom Search provider
#[derive(Debug)]
pub struct GoogleProvider {
    keys: Arc<KeyRotationStore>,
    cx: String,
    base_url: String,
    http_client: HttpClient,
}

impl GoogleProvider {
    /// Create a provider for the Programmable Search Engine `cx`
    pub fn new(keys: Arc<KeyRotationStore>, cx: &str, timeout: Duration) -> SearchResult<Self> {
        if !keys.has_keys(PROVIDER_NAME) {
            return Err(SearchError::ConfigError(
                "Google API key is required (GOOGLE_SEARCH_KEY)".to_string(),
            ));
        }
        if cx.trim().is_empty() {
            return Err(SearchError::ConfigError(
                "Google Search Engine ID (cx) is required (GOOGLE_CSE_ID)".to_string(),
            ));
        }

        Ok(Self {
            keys,
            cx: cx.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            http_client: HttpClient::new(timeout)?,
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    fn build_params(&self, api_key: String, options: &SearchOptions) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("key", api_key),
            ("cx", self.cx.clone()),
            ("q", options.query.clone()),
            (
                "num",
                options.max_results.clamp(1, MAX_RESULTS_PER_REQUEST).to_string(),
            ),
            ("safe", "off".to_string()),
        ];

        if let Some(language) = &options.language {
            params.push(("lr", format!("lang_{language}")));
        }
        if let Some(region) = &options.region {
            params.push(("gl", region.clone()));
        }
        if let Some(restrict) = &options.date_restrict {
            params.push(("dateRestrict", restrict.clone()));
        }

        params
    }
}

#[async_trait::async_trait]
impl SearchProvider for GoogleProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn source(&self) -> ResultSource {
        ResultSource::Keyword
    }

    async fn search(&self, options: &SearchOptions) -> SearchResult<Vec<SearchResultType>> {
        if options.query.trim().is_empty() {
            return Err(SearchError::InvalidInput(
                "Query cannot be empty".to_string(),
            ));
        }

        let api_key = self.keys.get_next_key(PROVIDER_NAME).ok_or_else(|| {
            SearchError::ConfigError("No Google API key available".to_string())
        })?;

        log::debug!("Google Search request: {}", options.query);

        let params = self.build_params(api_key, options);
        let response: GoogleSearchResponse =
            self.http_client.get_json(&self.base_url, &params, &[]).await?;

        let items = response.items.unwrap_or_default();
        log::debug!("Google Search returned {} results", items.len());

        let results = items
            .into_iter()
            .map(|item| SearchResultType {
                published_date: item.published_date(),
                domain: item.display_link,
                url: item.link,
                title: item.title,
                snippet: item.snippet,
                source: ResultSource::Keyword,
                provider: PROVIDER_NAME.to_string(),
                score: None,
            })
            .collect();

        Ok(results)
    }

    fn config(&self) -> HashMap<String, String> {
        let mut config = HashMap::new();
        config.insert("api_key".to_string(), "***".to_string()); // Hide API key
        config.insert(
            "api_keys".to_string(),
            self.keys.key_count(PROVIDER_NAME).to_string(),
        );
        config.insert("cx".to_string(), self.cx.clone());
        config.insert("base_url".to_string(), self.base_url.clone());
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> GoogleProvider {
        let keys = Arc::new(KeyRotationStore::new().with_keys("google", vec!["k".to_string()]));
        GoogleProvider::new(keys, "engine", Duration::from_secs(15)).unwrap()
    }

    #[test]
    fn test_requires_key_and_cx() {
        let empty = Arc::new(KeyRotationStore::new());
        assert!(GoogleProvider::new(empty, "engine", Duration::from_secs(15)).is_err());

        let keys = Arc::new(KeyRotationStore::new().with_keys("google", vec!["k".to_string()]));
        let err = GoogleProvider::new(keys, " ", Duration::from_secs(15)).unwrap_err();
        assert!(err.to_string().contains("cx"));
    }

    #[test]
    fn test_params_cap_num_and_map_locale() {
        let options = SearchOptions::new("fintech", 20)
            .with_locale("pt", "br")
            .with_date_restrict("m12");
        let params: HashMap<_, _> = provider()
            .build_params("key".to_string(), &options)
            .into_iter()
            .collect();

        assert_eq!(params["num"], "10");
        assert_eq!(params["lr"], "lang_pt");
        assert_eq!(params["gl"], "br");
        assert_eq!(params["safe"], "off");
        assert_eq!(params["dateRestrict"], "m12");
        assert_eq!(params["cx"], "engine");
    }

    #[test]
    fn test_published_date_from_metatags() {
        let item: GoogleSearchItem = serde_json::from_value(serde_json::json!({
            "title": "t",
            "link": "https://exame.com/a",
            "pagemap": {"metatags": [{"og:updated_time": "2024-03-01"}]}
        }))
        .unwrap();
        assert_eq!(item.published_date().as_deref(), Some("2024-03-01"));
    }

    #[test]
    fn test_config_masks_key() {
        let config = provider().config();
        assert_eq!(config["api_key"], "***");
        assert_eq!(config["api_keys"], "1");
    }
}
