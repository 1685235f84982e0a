//! Exa neural search provider

use crate::{
    error::{SearchError, SearchResult},
    rotation::KeyRotationStore,
    types::{ResultSource, SearchOptions, SearchProvider, SearchResult as SearchResultType},
    utils::http::{extract_domain, normalize_text, truncate_chars, HttpClient},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.exa.ai/search";
const PROVIDER_NAME: &str = "exa";
const SNIPPET_CHARS: usize = 300;

#[derive(Debug, Deserialize)]
struct ExaSearchResult {
    #[serde(default)]
    title: Option<String>,
    url: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default, rename = "publishedDate")]
    published_date: Option<String>,
    #[serde(default)]
    score: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ExaSearchResponse {
    results: Vec<ExaSearchResult>,
}

#[derive(Debug, Serialize)]
struct ExaContents {
    text: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExaSearchRequest<'a> {
    query: &'a str,
    num_results: u32,
    use_autoprompt: bool,
    #[serde(rename = "type")]
    search_type: &'a str,
    #[serde(skip_serializing_if = "no_domains")]
    include_domains: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    start_published_date: Option<&'a str>,
    contents: ExaContents,
}

fn no_domains(domains: &&[String]) -> bool {
    domains.is_empty()
}

#[derive(Debug)]
pub struct ExaProvider {
    keys: Arc<KeyRotationStore>,
    base_url: String,
    search_type: String,
    http_client: HttpClient,
}

impl ExaProvider {
    pub fn new(keys: Arc<KeyRotationStore>, timeout: Duration) -> SearchResult<Self> {
        if !keys.has_keys(PROVIDER_NAME) {
            return Err(SearchError::ConfigError(
                "Exa API key is required (EXA_API_KEY)".to_string(),
            ));
        }

        Ok(Self {
            keys,
            base_url: DEFAULT_BASE_URL.to_string(),
            search_type: "neural".to_string(),
            http_client: HttpClient::new(timeout)?,
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    /// `neural` (default), `keyword` or `auto`
    pub fn with_search_type(mut self, search_type: &str) -> SearchResult<Self> {
        if !matches!(search_type, "neural" | "keyword" | "auto") {
            return Err(SearchError::ConfigError(
                "Exa search type must be 'neural', 'keyword' or 'auto'".to_string(),
            ));
        }
        self.search_type = search_type.to_string();
        Ok(self)
    }
}

#[async_trait::async_trait]
impl SearchProvider for ExaProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn source(&self) -> ResultSource {
        ResultSource::Neural
    }

    async fn search(&self, options: &SearchOptions) -> SearchResult<Vec<SearchResultType>> {
        if options.query.trim().is_empty() {
            return Err(SearchError::InvalidInput(
                "Query cannot be empty".to_string(),
            ));
        }

        let api_key = self.keys.get_next_key(PROVIDER_NAME).ok_or_else(|| {
            SearchError::ConfigError("No Exa API key available".to_string())
        })?;

        let request_body = ExaSearchRequest {
            query: &options.query,
            num_results: options.max_results,
            use_autoprompt: true,
            search_type: &self.search_type,
            include_domains: &options.include_domains,
            start_published_date: options.start_published_date.as_deref(),
            contents: ExaContents { text: true },
        };

        log::debug!("Exa request: {} (type {})", options.query, self.search_type);

        let response: ExaSearchResponse = self
            .http_client
            .post_json(&self.base_url, &request_body, &[("x-api-key", api_key)])
            .await?;

        log::debug!("Exa returned {} results", response.results.len());

        let results = response
            .results
            .into_iter()
            .map(|result| SearchResultType {
                domain: extract_domain(&result.url),
                title: result.title.unwrap_or_default(),
                snippet: result
                    .text
                    .map(|text| truncate_chars(&normalize_text(&text), SNIPPET_CHARS))
                    .unwrap_or_default(),
                url: result.url,
                source: ResultSource::Neural,
                provider: PROVIDER_NAME.to_string(),
                score: result.score,
                published_date: result.published_date,
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
        config.insert("type".to_string(), self.search_type.clone());
        config.insert(
            "timeout_ms".to_string(),
            self.http_client.timeout().as_millis().to_string(),
        );
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> Arc<KeyRotationStore> {
        Arc::new(KeyRotationStore::new().with_keys("exa", vec!["k".to_string()]))
    }

    #[test]
    fn test_requires_key() {
        let err = ExaProvider::new(Arc::new(KeyRotationStore::new()), Duration::from_secs(5))
            .unwrap_err();
        assert!(matches!(err, SearchError::ConfigError(_)));
    }

    #[test]
    fn test_config_masks_key() {
        let provider = ExaProvider::new(store(), Duration::from_secs(30)).unwrap();
        let config = provider.config();
        assert_eq!(config["api_key"], "***");
        assert_eq!(config["type"], "neural");
        assert_eq!(config["timeout_ms"], "30000");
        assert_eq!(provider.source(), ResultSource::Neural);
    }

    #[test]
    fn test_search_type_validation() {
        let provider = ExaProvider::new(store(), Duration::from_secs(30)).unwrap();
        assert!(provider.with_search_type("semantic").is_err());
    }

    #[test]
    fn test_request_body_shape() {
        let domains = vec!["exame.com".to_string()];
        let body = ExaSearchRequest {
            query: "fintech",
            num_results: 20,
            use_autoprompt: true,
            search_type: "neural",
            include_domains: &domains,
            start_published_date: Some("2023-01-01"),
            contents: ExaContents { text: true },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["numResults"], 20);
        assert_eq!(json["useAutoprompt"], true);
        assert_eq!(json["type"], "neural");
        assert_eq!(json["includeDomains"][0], "exame.com");
        assert_eq!(json["startPublishedDate"], "2023-01-01");
        assert_eq!(json["contents"]["text"], true);

        let body = ExaSearchRequest {
            include_domains: &[],
            start_published_date: None,
            ..body
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("includeDomains").is_none());
        assert!(json.get("startPublishedDate").is_none());
    }
}
