//! Provider-specific query phrasing
//!
//! The neural engine ranks by meaning, so its query is phrased as an
//! open-ended research question. The keyword engine gets statistics and
//! market terms that match literal page text. Both are built from the same
//! base query and research context and are guaranteed to differ.

use chrono::Datelike;
use serde::{Deserialize, Serialize};

const NEURAL_SUFFIX: &str = "insights análise profunda";
const NEURAL_SEGMENT_SUFFIX: &str = "tendências oportunidades";
const NEURAL_TAIL: &str = "estratégia inovação futuro";
const KEYWORD_SUFFIX: &str = "dados estatísticas";
const KEYWORD_TAIL: &str = "crescimento números";
const NEURAL_DISAMBIGUATION: &str = "insights análise neural semântica";
const KEYWORD_DISAMBIGUATION: &str = "dados estatísticas keywords específicas";

/// Market the research targets
#[derive(Debug, Clone, PartialEq)]
pub struct LocaleProfile {
    /// Country name appended to queries that do not mention the market
    pub country_term: String,
    /// Whole words that already tie a query to the market
    pub markers: Vec<String>,
    /// Phrase naming the domestic market, used by keyword queries
    pub market_phrase: String,
    pub language: String,
    pub region: String,
    pub current_year: i32,
}

impl Default for LocaleProfile {
    fn default() -> Self {
        Self {
            country_term: "Brasil".to_string(),
            markers: vec![
                "brasil".to_string(),
                "brasileiro".to_string(),
                "br".to_string(),
            ],
            market_phrase: "mercado brasileiro".to_string(),
            language: "pt".to_string(),
            region: "br".to_string(),
            current_year: chrono::Utc::now().year(),
        }
    }
}

impl LocaleProfile {
    /// Append the country term when no marker is present and the current
    /// year when neither it nor the previous year is mentioned.
    pub fn enhance_query(&self, query: &str) -> String {
        let mut enhanced = query.trim().to_string();
        let lowered = enhanced.to_lowercase();

        if !self.markers.iter().any(|m| lowered.contains(m.as_str())) {
            enhanced.push(' ');
            enhanced.push_str(&self.country_term);
        }

        let current = self.current_year.to_string();
        let previous = (self.current_year - 1).to_string();
        if !lowered.contains(&current) && !lowered.contains(&previous) {
            enhanced.push(' ');
            enhanced.push_str(&current);
        }

        enhanced
    }
}

/// What the caller is researching
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchContext {
    pub segment: Option<String>,
    pub audience: Option<String>,
}

impl ResearchContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_segment(mut self, segment: &str) -> Self {
        self.segment = non_blank(segment);
        self
    }

    pub fn with_audience(mut self, audience: &str) -> Self {
        self.audience = non_blank(audience);
        self
    }
}

fn non_blank(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// The pair of phrasings sent to the neural and keyword branches
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DistinctQueries {
    pub neural: String,
    pub keyword: String,
}

#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    locale: LocaleProfile,
}

impl QueryBuilder {
    pub fn new(locale: LocaleProfile) -> Self {
        Self { locale }
    }

    pub fn locale(&self) -> &LocaleProfile {
        &self.locale
    }

    pub fn neural_query(&self, base: &str, context: &ResearchContext) -> String {
        let mut query = format!("{} {NEURAL_SUFFIX}", base.trim());
        if let Some(segment) = &context.segment {
            query.push_str(&format!(" {segment} {NEURAL_SEGMENT_SUFFIX}"));
        }
        if let Some(audience) = &context.audience {
            query.push_str(&format!(" {audience}"));
        }
        query.push_str(&format!(" {NEURAL_TAIL}"));
        query
    }

    pub fn keyword_query(&self, base: &str, context: &ResearchContext) -> String {
        let mut query = format!("{} {KEYWORD_SUFFIX}", base.trim());
        if let Some(segment) = &context.segment {
            query.push_str(&format!(" {segment} {}", self.locale.market_phrase));
        }
        query.push_str(&format!(
            " {} {} {KEYWORD_TAIL}",
            self.locale.country_term, self.locale.current_year
        ));
        query
    }

    pub fn distinct_queries(&self, base: &str, context: &ResearchContext) -> DistinctQueries {
        let (neural, keyword) = ensure_distinct(
            self.neural_query(base, context),
            self.keyword_query(base, context),
        );
        log::info!("Neural query: {neural}");
        log::info!("Keyword query: {keyword}");
        DistinctQueries { neural, keyword }
    }
}

/// Identical phrasings get provider-specific terms appended to each side
pub fn ensure_distinct(neural: String, keyword: String) -> (String, String) {
    if neural != keyword {
        return (neural, keyword);
    }
    log::warn!("Neural and keyword queries were identical, disambiguating");
    (
        format!("{neural} {NEURAL_DISAMBIGUATION}"),
        format!("{keyword} {KEYWORD_DISAMBIGUATION}"),
    )
}
