//! Serper (google.serper.dev) provider

use crate::{
    error::{SearchError, SearchResult},
    rotation::KeyRotationStore,
    types::{ResultSource, SearchOptions, SearchProvider, SearchResult as SearchResultType},
    utils::http::{extract_domain, HttpClient},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://google.serper.dev/search";
const PROVIDER_NAME: &str = "serper";

#[derive(Debug, Deserialize)]
struct SerperOrganicResult {
    #[serde(default)]
    title: String,
    link: String,
    #[serde(default)]
    snippet: Option<String>,
    #[serde(default)]
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SerperResponse {
    #[serde(default)]
    organic: Option<Vec<SerperOrganicResult>>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Serialize)]
struct SerperRequest<'a> {
    q: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    gl: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    hl: Option<&'a str>,
    num: u32,
}

#[derive(Debug)]
pub struct SerperProvider {
    keys: Arc<KeyRotationStore>,
    base_url: String,
    http_client: HttpClient,
}

impl SerperProvider {
    pub fn new(keys: Arc<KeyRotationStore>, timeout: Duration) -> SearchResult<Self> {
        if !keys.has_keys(PROVIDER_NAME) {
            return Err(SearchError::ConfigError(
                "Serper API key is required (SERPER_API_KEY)".to_string(),
            ));
        }

        Ok(Self {
            keys,
            base_url: DEFAULT_BASE_URL.to_string(),
            http_client: HttpClient::new(timeout)?,
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }
}

#[async_trait::async_trait]
impl SearchProvider for SerperProvider {
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
            SearchError::ConfigError("No Serper API key available".to_string())
        })?;

        let request_body = SerperRequest {
            q: &options.query,
            gl: options.region.as_deref(),
            hl: options.language.as_deref(),
            num: options.max_results,
        };

        log::debug!("Serper request: {}", options.query);

        let response: SerperResponse = self
            .http_client
            .post_json(&self.base_url, &request_body, &[("X-API-KEY", api_key)])
            .await?;

        // Serper reports some failures in a 200 body without organic results
        let organic = match (response.organic, response.message) {
            (Some(organic), _) => organic,
            (None, Some(message)) => {
                return Err(SearchError::ProviderError(format!("Serper error: {message}")))
            }
            (None, None) => Vec::new(),
        };

        log::debug!("Serper returned {} results", organic.len());

        let results = organic
            .into_iter()
            .map(|result| SearchResultType {
                domain: extract_domain(&result.link),
                url: result.link,
                title: result.title,
                snippet: result.snippet.unwrap_or_default(),
                source: ResultSource::Keyword,
                provider: PROVIDER_NAME.to_string(),
                score: None,
                published_date: result.date,
            })
            .collect();

        Ok(results)
    }

    fn config(&self) -> HashMap<String, String> {
        let mut config = HashMap::new();
        config.insert("api_key".to_string(), "***".to_string());
        config.insert(
            "api_keys".to_string(),
            self.keys.key_count(PROVIDER_NAME).to_string(),
        );
        config.insert("base_url".to_string(), self.base_url.clone());
        config
    }
}
