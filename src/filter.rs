//! URL filtering and prioritization
//!
//! [`UrlFilter::filter_url`] classifies a candidate page from its URL, title
//! and snippet. Checks run in a fixed order and the first rejection wins:
//!
//! 1. well-formed `http(s)` URL
//! 2. exact domain blocklist (`www.` stripped, case-insensitive)
//! 3. regex blocklist over `path?query` (login pages, binaries, checkout...)
//! 4. irrelevant-term density in title + snippet (two or more hits)
//!
//! Accepted URLs get a priority score used to order batches. The only state
//! that changes across calls is the cumulative counters, so the same input
//! always yields the same decision.

use crate::types::SearchResult;
use chrono::Datelike;
use regex::Regex;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::{Mutex, RwLock};
use url::Url;

const BASE_PRIORITY: f64 = 1.0;
const PREFERENTIAL_BONUS: f64 = 3.0;
const TITLE_KEYWORD_BONUS: f64 = 0.5;
const SNIPPET_KEYWORD_BONUS: f64 = 0.3;
const CURRENT_YEAR_BONUS: f64 = 1.0;
const PREVIOUS_YEAR_BONUS: f64 = 0.5;
const LOCALE_BONUS: f64 = 0.8;
const GENERIC_TITLE_PENALTY: f64 = 1.0;
const MIN_PRIORITY: f64 = 0.1;
const IRRELEVANT_TERMS_TO_BLOCK: usize = 2;

/// Why a URL was accepted or rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterCategory {
    Invalid,
    DomainBlocked,
    PatternBlocked,
    ContentIrrelevant,
    Approved,
    Preferential,
    Error,
}

/// Verdict for one candidate URL
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterDecision {
    pub approved: bool,
    pub reason: String,
    pub category: FilterCategory,
    pub priority: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

impl FilterDecision {
    fn rejected(category: FilterCategory, reason: String, domain: Option<String>) -> Self {
        Self {
            approved: false,
            reason,
            category,
            priority: 0.0,
            domain,
        }
    }
}

/// A search result that passed the filter, with its verdict
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilteredResult {
    pub result: SearchResult,
    pub decision: FilterDecision,
}

/// Word lists and domain sets driving the filter
#[derive(Debug, Clone)]
pub struct FilterRules {
    pub blocked_domains: HashSet<String>,
    pub blocked_patterns: Vec<String>,
    pub irrelevant_terms: Vec<String>,
    pub preferential_domains: HashSet<String>,
    pub quality_keywords: Vec<String>,
    pub locale_terms: Vec<String>,
    pub generic_title_terms: Vec<String>,
    /// Year whose mention earns the full recency bonus; the year before earns half
    pub current_year: i32,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// News and business outlets favoured for Brazilian market research
pub const PREFERENTIAL_DOMAINS: &[&str] = &[
    "g1.globo.com",
    "exame.com",
    "valor.globo.com",
    "estadao.com.br",
    "folha.uol.com.br",
    "canaltech.com.br",
    "tecmundo.com.br",
    "olhardigital.com.br",
    "infomoney.com.br",
    "startse.com",
    "revistapegn.globo.com",
    "epocanegocios.globo.com",
    "istoedinheiro.com.br",
    "convergenciadigital.com.br",
    "mobiletime.com.br",
    "teletime.com.br",
];

impl Default for FilterRules {
    fn default() -> Self {
        Self {
            blocked_domains: strings(&[
                "accounts.google.com",
                "login.microsoft.com",
                "instagram.com",
                "facebook.com",
                "zhihu.com",
                "answers.microsoft.com",
                "gmail.com",
                "outlook.com",
                "twitter.com",
                "linkedin.com",
                "youtube.com",
                "tiktok.com",
                "pinterest.com",
                "reddit.com",
                "quora.com",
                "stackoverflow.com",
                "github.com",
                "wikipedia.org",
                "amazon.com.br",
                "mercadolivre.com.br",
                "olx.com.br",
                "booking.com",
                "airbnb.com",
                "uber.com",
                "ifood.com.br",
            ])
            .into_iter()
            .collect(),
            blocked_patterns: strings(&[
                r"/login",
                r"/signin",
                r"/register",
                r"/cadastro",
                r"/auth",
                r"/account",
                r"/profile",
                r"/settings",
                r"/admin",
                r"/dashboard",
                r"/api/",
                r"\.(pdf|jpg|png|gif|mp4|zip|exe)(\?|$)",
                r"/download",
                r"/cart",
                r"/checkout",
                r"/payment",
                r"/privacy",
                r"/terms",
                r"/cookies",
                r"/sitemap",
            ]),
            irrelevant_terms: strings(&[
                "login",
                "signin",
                "register",
                "cadastro",
                "entrar",
                "conta",
                "perfil",
                "configurações",
                "settings",
                "carrinho",
                "comprar",
                "checkout",
                "pagamento",
                "download",
                "baixar",
                "instalar",
                "app store",
                "play store",
                "android",
                "ios",
                "mobile app",
                "termos de uso",
                "política de privacidade",
                "cookies",
                "contato",
                "fale conosco",
                "suporte",
                "ajuda",
                "sobre nós",
                "quem somos",
                "nossa história",
                "trabalhe conosco",
                "vagas",
                "careers",
                "jobs",
            ]),
            preferential_domains: strings(PREFERENTIAL_DOMAINS).into_iter().collect(),
            quality_keywords: strings(&[
                "análise",
                "mercado",
                "tendência",
                "oportunidade",
                "estratégia",
                "crescimento",
                "inovação",
                "dados",
                "pesquisa",
                "relatório",
                "estudo",
                "insights",
                "business",
                "negócios",
                "empresa",
                "startup",
                "investimento",
                "tecnologia",
                "digital",
            ]),
            locale_terms: strings(&["brasil", "brasileiro", "br"]),
            generic_title_terms: strings(&["home", "página inicial", "bem-vindo"]),
            current_year: chrono::Utc::now().year(),
        }
    }
}

/// Cumulative counters since construction or the last reset
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterStats {
    pub total_analyzed: u64,
    pub blocked_domain: u64,
    pub blocked_pattern: u64,
    pub blocked_content: u64,
    pub approved: u64,
    pub preferential: u64,
}

/// Counters plus derived rates, for status output
#[derive(Debug, Clone, Serialize)]
pub struct FilterReport {
    #[serde(flatten)]
    pub counts: FilterStats,
    pub approval_rate: f64,
    pub domain_block_rate: f64,
    pub pattern_block_rate: f64,
    pub content_block_rate: f64,
    pub preferential_rate: f64,
    pub blocked_domains_count: usize,
    pub preferential_domains_count: usize,
}

/// URL classifier with process-wide counters
#[derive(Debug)]
pub struct UrlFilter {
    rules: FilterRules,
    blocked_domains: RwLock<HashSet<String>>,
    patterns: Vec<Regex>,
    stats: Mutex<FilterStats>,
}

impl Default for UrlFilter {
    fn default() -> Self {
        Self::new(FilterRules::default())
    }
}

impl UrlFilter {
    /// Build a filter. Patterns that fail to compile are logged and skipped.
    pub fn new(rules: FilterRules) -> Self {
        let patterns = rules
            .blocked_patterns
            .iter()
            .filter_map(|pattern| match Regex::new(pattern) {
                Ok(regex) => Some(regex),
                Err(e) => {
                    log::error!("Ignoring invalid URL pattern '{pattern}': {e}");
                    None
                }
            })
            .collect();

        let blocked_domains = rules
            .blocked_domains
            .iter()
            .map(|d| clean_domain(d))
            .collect();

        log::info!(
            "URL filter ready with {} blocked domains",
            rules.blocked_domains.len()
        );

        Self {
            rules,
            blocked_domains: RwLock::new(blocked_domains),
            patterns,
            stats: Mutex::new(FilterStats::default()),
        }
    }

    /// Classify one candidate URL
    pub fn filter_url(&self, url: &str, title: &str, snippet: &str) -> FilterDecision {
        self.bump(|s| s.total_analyzed += 1);

        let lowered = url.trim().to_lowercase();
        if !(lowered.starts_with("http://") || lowered.starts_with("https://")) {
            return FilterDecision::rejected(
                FilterCategory::Invalid,
                "URL is not an http(s) address".to_string(),
                None,
            );
        }

        let parsed = match Url::parse(url.trim()) {
            Ok(parsed) => parsed,
            Err(e) => {
                log::error!("Failed to parse URL {url}: {e}");
                return FilterDecision::rejected(
                    FilterCategory::Error,
                    format!("URL could not be processed: {e}"),
                    None,
                );
            }
        };

        let domain = clean_domain(parsed.host_str().unwrap_or_default());

        if self.is_domain_blocked(&domain) {
            self.bump(|s| s.blocked_domain += 1);
            log::debug!("URL blocked (domain): {url}");
            return FilterDecision::rejected(
                FilterCategory::DomainBlocked,
                format!("Blocked domain: {domain}"),
                Some(domain),
            );
        }

        let target = match parsed.query() {
            Some(query) if !query.is_empty() => format!("{}?{}", parsed.path(), query),
            _ => parsed.path().to_string(),
        }
        .to_lowercase();

        if let Some(pattern) = self.patterns.iter().find(|p| p.is_match(&target)) {
            self.bump(|s| s.blocked_pattern += 1);
            log::debug!("URL blocked (pattern): {url}");
            return FilterDecision::rejected(
                FilterCategory::PatternBlocked,
                format!("Blocked pattern: {}", pattern.as_str()),
                Some(domain),
            );
        }

        let text = format!("{title} {snippet}").to_lowercase();
        let hits: Vec<&str> = self
            .rules
            .irrelevant_terms
            .iter()
            .filter(|term| text.contains(term.as_str()))
            .map(String::as_str)
            .collect();

        if hits.len() >= IRRELEVANT_TERMS_TO_BLOCK {
            self.bump(|s| s.blocked_content += 1);
            log::debug!("URL blocked (irrelevant terms): {url}");
            let shown: Vec<&str> = hits.into_iter().take(3).collect();
            return FilterDecision::rejected(
                FilterCategory::ContentIrrelevant,
                format!("Irrelevant terms: {}", shown.join(", ")),
                Some(domain),
            );
        }

        let priority = self.priority(&domain, title, snippet);
        let preferential = self.rules.preferential_domains.contains(&domain);
        self.bump(|s| {
            s.approved += 1;
            if preferential {
                s.preferential += 1;
            }
        });

        log::debug!("URL approved: {url} (priority {priority:.1})");

        FilterDecision {
            approved: true,
            reason: "URL suitable for analysis".to_string(),
            category: if preferential {
                FilterCategory::Preferential
            } else {
                FilterCategory::Approved
            },
            priority,
            domain: Some(domain),
        }
    }

    /// Keep accepted results, highest priority first (ties keep input order)
    pub fn filter_results(&self, results: Vec<SearchResult>) -> Vec<FilteredResult> {
        let total = results.len();
        let mut approved: Vec<FilteredResult> = results
            .into_iter()
            .filter_map(|result| {
                let decision = self.filter_url(&result.url, &result.title, &result.snippet);
                decision
                    .approved
                    .then_some(FilteredResult { result, decision })
            })
            .collect();

        approved.sort_by(|a, b| {
            b.decision
                .priority
                .partial_cmp(&a.decision.priority)
                .unwrap_or(Ordering::Equal)
        });

        log::info!("URL filter applied: {}/{} approved", approved.len(), total);
        approved
    }

    fn priority(&self, domain: &str, title: &str, snippet: &str) -> f64 {
        let mut priority = BASE_PRIORITY;

        if self.rules.preferential_domains.contains(domain) {
            priority += PREFERENTIAL_BONUS;
        }

        let title = title.to_lowercase();
        let snippet = snippet.to_lowercase();

        for keyword in &self.rules.quality_keywords {
            if title.contains(keyword.as_str()) {
                priority += TITLE_KEYWORD_BONUS;
            }
            if snippet.contains(keyword.as_str()) {
                priority += SNIPPET_KEYWORD_BONUS;
            }
        }

        let current = self.rules.current_year.to_string();
        let previous = (self.rules.current_year - 1).to_string();
        let mentions = |year: &str| title.contains(year) || snippet.contains(year);
        if mentions(&current) {
            priority += CURRENT_YEAR_BONUS;
        } else if mentions(&previous) {
            priority += PREVIOUS_YEAR_BONUS;
        }

        let combined = format!("{title} {snippet}");
        if self
            .rules
            .locale_terms
            .iter()
            .any(|term| combined.contains(term.as_str()))
        {
            priority += LOCALE_BONUS;
        }

        if self
            .rules
            .generic_title_terms
            .iter()
            .any(|term| title.contains(term.as_str()))
        {
            priority -= GENERIC_TITLE_PENALTY;
        }

        priority.max(MIN_PRIORITY)
    }

    fn is_domain_blocked(&self, domain: &str) -> bool {
        self.blocked_domains
            .read()
            .map(|set| set.contains(domain))
            .unwrap_or_else(|poisoned| poisoned.into_inner().contains(domain))
    }

    pub fn add_blocked_domain(&self, domain: &str) {
        let domain = clean_domain(domain);
        log::info!("Domain added to blocklist: {domain}");
        self.blocked_domains
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .insert(domain);
    }

    pub fn remove_blocked_domain(&self, domain: &str) -> bool {
        let domain = clean_domain(domain);
        let removed = self
            .blocked_domains
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .remove(&domain);
        if removed {
            log::info!("Domain removed from blocklist: {domain}");
        }
        removed
    }

    pub fn stats(&self) -> FilterReport {
        let counts = self.stats.lock().unwrap_or_else(|p| p.into_inner()).clone();
        let rate = |n: u64| {
            if counts.total_analyzed == 0 {
                0.0
            } else {
                n as f64 / counts.total_analyzed as f64 * 100.0
            }
        };

        FilterReport {
            approval_rate: rate(counts.approved),
            domain_block_rate: rate(counts.blocked_domain),
            pattern_block_rate: rate(counts.blocked_pattern),
            content_block_rate: rate(counts.blocked_content),
            preferential_rate: rate(counts.preferential),
            blocked_domains_count: self
                .blocked_domains
                .read()
                .map(|s| s.len())
                .unwrap_or_else(|p| p.into_inner().len()),
            preferential_domains_count: self.rules.preferential_domains.len(),
            counts,
        }
    }

    pub fn reset_stats(&self) {
        *self.stats.lock().unwrap_or_else(|p| p.into_inner()) = FilterStats::default();
        log::info!("URL filter statistics reset");
    }

    fn bump(&self, update: impl FnOnce(&mut FilterStats)) {
        update(&mut self.stats.lock().unwrap_or_else(|p| p.into_inner()));
    }
}

fn clean_domain(domain: &str) -> String {
    let domain = domain.trim().to_lowercase();
    domain
        .strip_prefix("www.")
        .map(str::to_string)
        .unwrap_or(domain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResultSource;

    fn filter() -> UrlFilter {
        UrlFilter::new(FilterRules {
            current_year: 2024,
            ..Default::default()
        })
    }

    fn result(url: &str, title: &str, snippet: &str) -> SearchResult {
        SearchResult {
            title: title.to_string(),
            url: url.to_string(),
            snippet: snippet.to_string(),
            source: ResultSource::Keyword,
            provider: "test".to_string(),
            score: None,
            published_date: None,
            domain: None,
        }
    }

    #[test]
    fn test_not_a_url_is_invalid() {
        let decision = filter().filter_url("not-a-url", "", "");
        assert!(!decision.approved);
        assert_eq!(decision.category, FilterCategory::Invalid);
        assert_eq!(decision.priority, 0.0);
    }

    #[test]
    fn test_preferential_news_domain() {
        let decision =
            filter().filter_url("http://g1.globo.com/x", "Análise de mercado 2024 Brasil", "");
        assert!(decision.approved);
        assert_eq!(decision.category, FilterCategory::Preferential);
        assert!(decision.priority > 1.0);
        // 1.0 base + 3.0 domain + 0.5 análise + 0.5 mercado + 1.0 year + 0.8 locale
        assert!((decision.priority - 6.8).abs() < 1e-9);
        assert_eq!(decision.domain.as_deref(), Some("g1.globo.com"));
    }

    #[test]
    fn test_unparsable_http_url_is_error() {
        let decision = filter().filter_url("http://[::1", "", "");
        assert_eq!(decision.category, FilterCategory::Error);
        assert!(!decision.approved);
    }

    #[test]
    fn test_blocked_domain_strips_www_and_case() {
        let decision = filter().filter_url("https://WWW.YouTube.com/watch?v=1", "Mercado", "");
        assert_eq!(decision.category, FilterCategory::DomainBlocked);
        assert_eq!(decision.domain.as_deref(), Some("youtube.com"));
    }

    #[test]
    fn test_blocked_domain_is_exact_match() {
        // subdomains of a blocked domain are not blocked
        let decision = filter().filter_url("https://pt.wikipedia.org.example.com/a", "", "");
        assert!(decision.approved);
    }

    #[test]
    fn test_pattern_blocklist() {
        let f = filter();
        assert_eq!(
            f.filter_url("https://example.com/login", "", "").category,
            FilterCategory::PatternBlocked
        );
        assert_eq!(
            f.filter_url("https://example.com/relatorio.pdf", "", "").category,
            FilterCategory::PatternBlocked
        );
        assert_eq!(
            f.filter_url("https://example.com/relatorio.pdf?download=1", "", "").category,
            FilterCategory::PatternBlocked
        );
        assert_eq!(
            f.filter_url("https://shop.com/produtos/checkout", "", "").category,
            FilterCategory::PatternBlocked
        );
        assert!(f.filter_url("https://example.com/pdf-guide", "", "").approved);
    }

    #[test]
    fn test_two_irrelevant_terms_reject() {
        let f = filter();
        let decision = f.filter_url("https://example.com/a", "Faça login", "baixar o app");
        assert_eq!(decision.category, FilterCategory::ContentIrrelevant);

        // a single hit is tolerated
        let decision = f.filter_url("https://example.com/a", "Faça login", "mercado");
        assert!(decision.approved);
    }

    #[test]
    fn test_irrelevant_terms_match_inside_words() {
        // "contatos" hits both "conta" and "contato"
        let decision = filter().filter_url(
            "https://exemplo.com.br/pagina",
            "Contatos da loja",
            "baixar agora",
        );
        assert_eq!(decision.category, FilterCategory::ContentIrrelevant);
        assert!(decision.reason.contains("conta"));
        assert!(decision.reason.contains("baixar"));
    }

    #[test]
    fn test_priority_bonuses_and_floor() {
        let f = filter();
        let plain = f.filter_url("https://example.com/a", "Notícias", "");
        assert_eq!(plain.category, FilterCategory::Approved);
        assert!((plain.priority - 1.0).abs() < 1e-9);

        let last_year = f.filter_url("https://example.com/a", "Notícias 2023", "");
        assert!((last_year.priority - 1.5).abs() < 1e-9);

        let snippet_keyword = f.filter_url("https://example.com/a", "", "dados do setor");
        assert!((snippet_keyword.priority - 1.3).abs() < 1e-9);

        let generic = f.filter_url("https://example.com/a", "Home", "");
        assert!((generic.priority - MIN_PRIORITY).abs() < 1e-9);
    }

    #[test]
    fn test_locale_term_matches_inside_words() {
        let f = filter();
        // "br" inside "obras"
        let obras = f.filter_url("https://exemplo.com/x", "Obras públicas", "");
        assert!((obras.priority - 1.8).abs() < 1e-9);

        let plain = f.filter_url("https://exemplo.com/x", "Notícias locais", "");
        assert!((plain.priority - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_same_input_same_decision_counters_grow() {
        let f = filter();
        let first = f.filter_url("https://exame.com/mercado", "Mercado digital", "");
        let second = f.filter_url("https://exame.com/mercado", "Mercado digital", "");
        assert_eq!(first, second);

        let stats = f.stats();
        assert_eq!(stats.counts.total_analyzed, 2);
        assert_eq!(stats.counts.approved, 2);
        assert_eq!(stats.counts.preferential, 2);
    }

    #[test]
    fn test_filter_results_sorts_and_drops() {
        let f = filter();
        let results = vec![
            result("https://example.com/a", "Notícia", ""),
            result("https://facebook.com/page", "Mercado", ""),
            result("https://exame.com/b", "Análise", ""),
            result("https://example.com/c", "Outra notícia", ""),
        ];

        let filtered = f.filter_results(results);
        let urls: Vec<&str> = filtered.iter().map(|r| r.result.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://exame.com/b",
                "https://example.com/a",
                "https://example.com/c"
            ]
        );
        assert!(filtered.iter().all(|r| r.decision.approved));
    }

    #[test]
    fn test_stats_rates_and_reset() {
        let f = filter();
        f.filter_url("https://facebook.com/x", "", "");
        f.filter_url("https://example.com/login", "", "");
        f.filter_url("https://example.com/ok", "", "");
        f.filter_url("https://exame.com/ok", "", "");

        let stats = f.stats();
        assert_eq!(stats.counts.total_analyzed, 4);
        assert_eq!(stats.counts.blocked_domain, 1);
        assert_eq!(stats.counts.blocked_pattern, 1);
        assert!((stats.approval_rate - 50.0).abs() < 1e-9);
        assert!((stats.preferential_rate - 25.0).abs() < 1e-9);

        f.reset_stats();
        let stats = f.stats();
        assert_eq!(stats.counts, FilterStats::default());
        assert_eq!(stats.approval_rate, 0.0);
    }

    #[test]
    fn test_runtime_blocklist_changes() {
        let f = filter();
        assert!(f.filter_url("https://spam.example/a", "", "").approved);

        f.add_blocked_domain("www.Spam.example");
        assert_eq!(
            f.filter_url("https://spam.example/a", "", "").category,
            FilterCategory::DomainBlocked
        );

        assert!(f.remove_blocked_domain("spam.example"));
        assert!(!f.remove_blocked_domain("spam.example"));
        assert!(f.filter_url("https://spam.example/a", "", "").approved);
    }

    #[test]
    fn test_invalid_patterns_are_skipped() {
        let f = UrlFilter::new(FilterRules {
            blocked_patterns: vec!["(".to_string(), "/private".to_string()],
            ..Default::default()
        });
        assert_eq!(
            f.filter_url("https://example.com/private", "", "").category,
            FilterCategory::PatternBlocked
        );
    }
}
