//! HTTP utilities for making requests to search APIs

use crate::error::{SearchError, SearchResult};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use url::Url;

/// Browser user agent; the scraping provider is served a degraded page without one
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Header list attached to a single request
pub type Headers<'a> = &'a [(&'a str, String)];

/// HTTP client wrapper with search-specific functionality
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    timeout: Duration,
}

impl HttpClient {
    /// Create a client whose requests never outlive `timeout`
    pub fn new(timeout: Duration) -> SearchResult<Self> {
        let client = Client::builder()
            .user_agent(DEFAULT_USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| SearchError::ConfigError(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Make a GET request with query parameters and deserialize the JSON response
    pub async fn get_json<T>(
        &self,
        url: &str,
        params: &[(&str, String)],
        headers: Headers<'_>,
    ) -> SearchResult<T>
    where
        T: DeserializeOwned,
    {
        let request = with_headers(self.client.get(url).query(params), headers);
        let response = self.send(request).await?;
        self.handle_response_json(response).await
    }

    /// Make a POST request with a JSON body and deserialize the JSON response
    pub async fn post_json<T, B>(&self, url: &str, body: &B, headers: Headers<'_>) -> SearchResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let request = with_headers(self.client.post(url).json(body), headers);
        let response = self.send(request).await?;
        self.handle_response_json(response).await
    }

    /// Make a GET request with query parameters and return the response as text
    pub async fn get_text(
        &self,
        url: &str,
        params: &[(&str, String)],
        headers: Headers<'_>,
    ) -> SearchResult<String> {
        let request = with_headers(self.client.get(url).query(params), headers);
        let response = self.send(request).await?;
        self.handle_response_text(response).await
    }

    async fn send(&self, request: RequestBuilder) -> SearchResult<Response> {
        request.send().await.map_err(|e| self.map_send_error(e))
    }

    fn map_send_error(&self, error: reqwest::Error) -> SearchError {
        if error.is_timeout() {
            SearchError::Timeout {
                timeout_ms: self.timeout.as_millis() as u64,
            }
        } else {
            SearchError::from(error)
        }
    }

    /// Handle HTTP response and deserialize as JSON
    async fn handle_response_json<T>(&self, response: Response) -> SearchResult<T>
    where
        T: DeserializeOwned,
    {
        let text = self.handle_response_text(response).await?;
        serde_json::from_str::<T>(&text).map_err(|e| {
            SearchError::ParseError(format!(
                "Malformed response payload: {e}. Body: {}",
                truncate_chars(&text, 200)
            ))
        })
    }

    /// Handle HTTP response and return as text
    async fn handle_response_text(&self, response: Response) -> SearchResult<String> {
        let status = response.status();

        if status.is_success() {
            return response.text().await.map_err(|e| self.map_send_error(e));
        }

        let status_code = status.as_u16();
        let response_body = response.text().await.ok();

        Err(match status_code {
            401 | 403 => SearchError::AuthenticationError(format!(
                "Request rejected with status: {status}"
            )),
            429 => SearchError::RateLimit(format!("Request throttled with status: {status}")),
            _ => SearchError::HttpError {
                message: format!("Request failed with status: {status}"),
                status_code: Some(status_code),
                response_body,
            },
        })
    }
}

fn with_headers(mut request: RequestBuilder, headers: Headers<'_>) -> RequestBuilder {
    for (key, value) in headers {
        request = request.header(*key, value);
    }
    request
}

/// Extract the host from a URL
pub fn extract_domain(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(|host| host.to_string()))
}

/// Normalize text by removing excess whitespace
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cut `text` to at most `max_chars` characters without splitting a code point
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_domain() {
        assert_eq!(
            extract_domain("https://www.exame.com/negocios"),
            Some("www.exame.com".to_string())
        );
        assert_eq!(extract_domain("not a url"), None);
        assert_eq!(extract_domain(""), None);
    }

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("  mercado \n  digital\t2024 "), "mercado digital 2024");
        assert_eq!(normalize_text(""), "");
    }

    #[test]
    fn test_truncate_chars_respects_code_points() {
        assert_eq!(truncate_chars("análise", 3), "aná");
        assert_eq!(truncate_chars("curto", 300), "curto");
        assert_eq!(truncate_chars("", 5), "");
    }

    #[test]
    fn test_client_keeps_timeout() {
        let client = HttpClient::new(Duration::from_secs(7)).unwrap();
        assert_eq!(client.timeout(), Duration::from_secs(7));
    }
}
