//! Provider adapter tests against mock HTTP servers
//!
//! Each adapter is pointed at a local wiremock server so request shape,
//! response mapping, key rotation and error classification can be checked
//! without touching the real APIs.

use market_search::{
    error::SearchError,
    providers::{BingProvider, ExaProvider, GoogleProvider, SerperProvider},
    types::{ResultSource, SearchOptions, SearchProvider},
    KeyRotationStore,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::{
    matchers::{body_partial_json, header, headers, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

const TIMEOUT: Duration = Duration::from_secs(5);

fn keys(provider: &str, keys: &[&str]) -> Arc<KeyRotationStore> {
    Arc::new(
        KeyRotationStore::new().with_keys(provider, keys.iter().map(|k| k.to_string()).collect()),
    )
}

fn options(query: &str) -> SearchOptions {
    SearchOptions::new(query, 5).with_locale("pt", "br")
}

fn exa(server: &MockServer, api_keys: &[&str]) -> ExaProvider {
    ExaProvider::new(keys("exa", api_keys), TIMEOUT)
        .unwrap()
        .with_base_url(&format!("{}/search", server.uri()))
}

fn serper(server: &MockServer, api_keys: &[&str]) -> SerperProvider {
    SerperProvider::new(keys("serper", api_keys), TIMEOUT)
        .unwrap()
        .with_base_url(&format!("{}/search", server.uri()))
}

fn google(server: &MockServer) -> GoogleProvider {
    GoogleProvider::new(keys("google", &["gkey"]), "engine-id", TIMEOUT)
        .unwrap()
        .with_base_url(&format!("{}/customsearch/v1", server.uri()))
}

#[tokio::test]
async fn test_exa_maps_results() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .and(header("x-api-key", "exa-key"))
        .and(body_partial_json(json!({
            "query": "fintech",
            "numResults": 5,
            "type": "neural",
            "contents": { "text": true }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {
                    "title": "Panorama das fintechs",
                    "url": "https://www.exame.com/fintechs",
                    "text": "O   setor\ncresceu muito",
                    "score": 0.92,
                    "publishedDate": "2024-03-01"
                },
                { "url": "https://valor.globo.com/x" }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = exa(&server, &["exa-key"]);
    let results = provider.search(&options("fintech")).await.unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].title, "Panorama das fintechs");
    assert_eq!(results[0].snippet, "O setor cresceu muito");
    assert_eq!(results[0].score, Some(0.92));
    assert_eq!(results[0].published_date.as_deref(), Some("2024-03-01"));
    assert_eq!(results[0].domain.as_deref(), Some("www.exame.com"));
    assert_eq!(results[0].source, ResultSource::Neural);
    assert_eq!(results[1].title, "");
    assert_eq!(results[1].snippet, "");
}

#[tokio::test]
async fn test_exa_sends_domain_and_date_constraints() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "includeDomains": ["exame.com"],
            "startPublishedDate": "2023-01-01"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = exa(&server, &["k"]);
    let mut search = options("fintech").with_include_domains(vec!["exame.com".to_string()]);
    search.start_published_date = Some("2023-01-01".to_string());

    let results = provider.search(&search).await.unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn test_exa_rotates_keys_per_request() {
    let server = MockServer::start().await;
    for key in ["first", "second"] {
        Mock::given(method("POST"))
            .and(header("x-api-key", key))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": [] })))
            .expect(2)
            .mount(&server)
            .await;
    }

    let provider = exa(&server, &["first", "second"]);
    for _ in 0..4 {
        provider.search(&options("saúde digital")).await.unwrap();
    }
}

#[tokio::test]
async fn test_http_errors_are_classified() {
    let cases: [(u16, &str); 5] = [
        (401, "auth"),
        (403, "auth"),
        (429, "rate"),
        (500, "http"),
        (404, "http"),
    ];

    for (status, expected) in cases {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(status).set_body_string("nope"))
            .mount(&server)
            .await;

        let provider = serper(&server, &["k"]);
        let error = provider.search(&options("varejo")).await.unwrap_err();

        match (expected, &error) {
            ("auth", SearchError::AuthenticationError(_)) => {}
            ("rate", SearchError::RateLimit(_)) => {}
            ("http", SearchError::HttpError { status_code, response_body, .. }) => {
                assert_eq!(*status_code, Some(status));
                assert_eq!(response_body.as_deref(), Some("nope"));
            }
            _ => panic!("Status {status}: expected {expected} error, got {error:?}"),
        }
    }
}

#[tokio::test]
async fn test_malformed_json_is_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
        .mount(&server)
        .await;

    let provider = exa(&server, &["k"]);
    match provider.search(&options("agro")).await.unwrap_err() {
        SearchError::ParseError(msg) => assert!(msg.contains("Malformed")),
        other => panic!("Expected ParseError, got {other:?}"),
    }
}

#[tokio::test]
async fn test_slow_server_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "organic": [] }))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let provider = SerperProvider::new(keys("serper", &["k"]), Duration::from_millis(50))
        .unwrap()
        .with_base_url(&format!("{}/search", server.uri()));

    let error = provider.search(&options("energia")).await.unwrap_err();
    assert!(matches!(error, SearchError::Timeout { .. }), "got {error:?}");
    assert!(error.is_transient());
}

#[tokio::test]
async fn test_serper_maps_organic_results() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .and(header("X-API-KEY", "serper-key"))
        .and(body_partial_json(json!({ "q": "fintech", "gl": "br", "hl": "pt", "num": 5 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "organic": [
                {
                    "title": "Fintechs no Brasil",
                    "link": "https://g1.globo.com/economia/fintechs",
                    "snippet": "Setor cresce",
                    "date": "2 days ago"
                }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = serper(&server, &["serper-key"]);
    let results = provider.search(&options("fintech")).await.unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].url, "https://g1.globo.com/economia/fintechs");
    assert_eq!(results[0].snippet, "Setor cresce");
    assert_eq!(results[0].provider, "serper");
    assert_eq!(results[0].source, ResultSource::Keyword);
}

#[tokio::test]
async fn test_serper_error_message_in_ok_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "message": "Not enough credits" })),
        )
        .mount(&server)
        .await;

    let provider = serper(&server, &["k"]);
    match provider.search(&options("moda")).await.unwrap_err() {
        SearchError::ProviderError(msg) => assert!(msg.contains("Not enough credits")),
        other => panic!("Expected ProviderError, got {other:?}"),
    }
}

#[tokio::test]
async fn test_google_sends_expected_params() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/customsearch/v1"))
        .and(query_param("key", "gkey"))
        .and(query_param("cx", "engine-id"))
        .and(query_param("q", "fintech Brasil"))
        .and(query_param("num", "10"))
        .and(query_param("lr", "lang_pt"))
        .and(query_param("gl", "br"))
        .and(query_param("dateRestrict", "m12"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                {
                    "title": "Relatório de fintechs",
                    "link": "https://valor.globo.com/financas/fintechs",
                    "displayLink": "valor.globo.com",
                    "snippet": "Crescimento de 30%",
                    "pagemap": { "metatags": [{ "article:published_time": "2024-05-10" }] }
                }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = google(&server);
    let search = SearchOptions::new("fintech Brasil", 25)
        .with_locale("pt", "br")
        .with_date_restrict("m12");
    let results = provider.search(&search).await.unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].domain.as_deref(), Some("valor.globo.com"));
    assert_eq!(results[0].published_date.as_deref(), Some("2024-05-10"));
}

#[tokio::test]
async fn test_google_without_items_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "searchInformation": { "totalResults": "0" }
        })))
        .mount(&server)
        .await;

    let provider = google(&server);
    assert!(provider.search(&options("nicho raro")).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_bing_scrapes_results_page() {
    let page = r#"
        <html><body><ol id="b_results">
          <li class="b_algo">
            <h2><a href="https://startse.com/artigos/fintech">Fintechs em alta</a></h2>
            <div class="b_caption"><p>Análise do mercado</p></div>
          </li>
        </ol></body></html>
    "#;

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "fintech"))
        .and(query_param("setlang", "pt-br"))
        .and(headers("Accept-Language", vec!["pt-BR", "pt;q=0.9", "en;q=0.8"]))
        .respond_with(ResponseTemplate::new(200).set_body_string(page))
        .expect(1)
        .mount(&server)
        .await;

    let provider = BingProvider::new(TIMEOUT)
        .unwrap()
        .with_base_url(&format!("{}/search", server.uri()));
    let results = provider.search(&options("fintech")).await.unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].title, "Fintechs em alta");
    assert_eq!(results[0].domain.as_deref(), Some("startse.com"));
}

#[tokio::test]
async fn test_bing_degraded_page_yields_no_results() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("<html><body>Verifique que você é humano</body></html>"),
        )
        .mount(&server)
        .await;

    let provider = BingProvider::new(TIMEOUT)
        .unwrap()
        .with_base_url(&format!("{}/search", server.uri()));
    assert!(provider.search(&options("fintech")).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_query_is_rejected_before_any_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let provider = exa(&server, &["k"]);
    assert!(matches!(
        provider.search(&options("  ")).await,
        Err(SearchError::InvalidInput(_))
    ));
}
