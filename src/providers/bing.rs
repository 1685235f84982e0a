//! Bing provider backed by HTML scraping
//!
//! Bing offers no free structured API, so this provider reads the public
//! results page. Layout changes are outside our control: when the expected
//! markup is missing the provider returns no results instead of failing.

use crate::{
    error::{SearchError, SearchResult},
    types::{ResultSource, SearchOptions, SearchProvider, SearchResult as SearchResultType},
    utils::http::{extract_domain, normalize_text, HttpClient},
};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://www.bing.com/search";
const PROVIDER_NAME: &str = "bing";

#[derive(Debug)]
pub struct BingProvider {
    base_url: String,
    http_client: HttpClient,
}

impl BingProvider {
    pub fn new(timeout: Duration) -> SearchResult<Self> {
        Ok(Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            http_client: HttpClient::new(timeout)?,
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    fn build_params(options: &SearchOptions) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("q", options.query.clone()),
            ("count", options.max_results.to_string()),
        ];
        if let Some(region) = &options.region {
            params.push(("cc", region.clone()));
        }
        match (&options.language, &options.region) {
            (Some(language), Some(region)) => {
                params.push(("setlang", format!("{language}-{region}").to_lowercase()))
            }
            (Some(language), None) => params.push(("setlang", language.clone())),
            _ => {}
        }
        params
    }

    /// Extract organic results from a results page
    fn parse_results(html: &str, max_results: u32) -> SearchResult<Vec<SearchResultType>> {
        let document = Html::parse_document(html);

        let block_selector = Selector::parse("li.b_algo")
            .map_err(|_| SearchError::ParseError("Invalid CSS selector for results".to_string()))?;
        let link_selector = Selector::parse("h2 a")
            .map_err(|_| SearchError::ParseError("Invalid CSS selector for links".to_string()))?;
        let snippet_selector = Selector::parse("p").map_err(|_| {
            SearchError::ParseError("Invalid CSS selector for snippets".to_string())
        })?;

        let mut results = Vec::new();

        for block in document.select(&block_selector) {
            if results.len() >= max_results as usize {
                break;
            }

            let Some(link) = block.select(&link_selector).next() else {
                continue;
            };
            let Some(href) = link.value().attr("href") else {
                continue;
            };
            // Bing-internal redirects and relative links carry no usable target
            if !href.starts_with("http") {
                continue;
            }

            let title = element_text(&link);
            if title.is_empty() {
                continue;
            }

            let snippet = block
                .select(&snippet_selector)
                .next()
                .map(|p| element_text(&p))
                .unwrap_or_default();

            results.push(SearchResultType {
                domain: extract_domain(href),
                url: href.to_string(),
                title,
                snippet,
                source: ResultSource::Keyword,
                provider: PROVIDER_NAME.to_string(),
                score: None,
                published_date: None,
            });
        }

        Ok(results)
    }
}

fn element_text(element: &ElementRef<'_>) -> String {
    normalize_text(&element.text().collect::<String>())
}

#[async_trait::async_trait]
impl SearchProvider for BingProvider {
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

        log::debug!("Bing request: {}", options.query);

        let params = Self::build_params(options);
        let html = self
            .http_client
            .get_text(
                &self.base_url,
                &params,
                &[("Accept-Language", "pt-BR,pt;q=0.9,en;q=0.8".to_string())],
            )
            .await?;

        let results = Self::parse_results(&html, options.max_results)?;
        if results.is_empty() {
            log::warn!(
                "Bing page had no recognizable results (length: {})",
                html.len()
            );
        }
        Ok(results)
    }

    fn config(&self) -> HashMap<String, String> {
        let mut config = HashMap::new();
        config.insert("base_url".to_string(), self.base_url.clone());
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

    const PAGE: &str = r#"
        <html><body><ol id="b_results">
          <li class="b_algo">
            <h2><a href="https://exame.com/mercado">Mercado <strong>digital</strong> cresce</a></h2>
            <div class="b_caption"><p>Dados   do setor em 2024</p></div>
          </li>
          <li class="b_ad"><h2><a href="https://ads.example/">Anúncio</a></h2></li>
          <li class="b_algo">
            <h2><a href="/ck/a?u=redirect">Interno</a></h2>
          </li>
          <li class="b_algo">
            <h2><a href="https://g1.globo.com/economia">Economia</a></h2>
          </li>
        </ol></body></html>
    "#;

    #[test]
    fn test_parse_organic_blocks() {
        let results = BingProvider::parse_results(PAGE, 10).unwrap();
        assert_eq!(results.len(), 2);

        assert_eq!(results[0].title, "Mercado digital cresce");
        assert_eq!(results[0].url, "https://exame.com/mercado");
        assert_eq!(results[0].snippet, "Dados do setor em 2024");
        assert_eq!(results[0].domain.as_deref(), Some("exame.com"));
        assert_eq!(results[0].provider, "bing");

        assert_eq!(results[1].snippet, "");
    }

    #[test]
    fn test_parse_respects_max_results() {
        let results = BingProvider::parse_results(PAGE, 1).unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_unrecognized_markup_yields_empty() {
        let results =
            BingProvider::parse_results("<html><body><div>captcha</div></body></html>", 10)
                .unwrap();
        assert!(results.is_empty());
        assert!(BingProvider::parse_results("", 10).unwrap().is_empty());
    }

    #[test]
    fn test_locale_params() {
        let options = SearchOptions::new("saas", 15).with_locale("pt", "BR");
        let params: HashMap<_, _> = BingProvider::build_params(&options).into_iter().collect();
        assert_eq!(params["cc"], "BR");
        assert_eq!(params["setlang"], "pt-br");
        assert_eq!(params["count"], "15");
    }
}
