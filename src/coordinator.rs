//! Simultaneous distinct search
//!
//! One logical research query fans out to several branches at once:
//!
//! * **neural**: the semantic engine with an open-ended phrasing
//! * **keyword**: the keyword engine with a statistics-oriented phrasing
//! * **fallback**: the fallback chain, keeping only results that the two
//!   engines above did not produce
//!
//! Branches run as tokio tasks under a shared semaphore, each with its own
//! timeout. A branch that fails, times out or panics is reported in
//! `errors` and never disturbs the others. Everything that succeeded is kept
//! and labelled by branch.

use crate::{
    error::{SearchError, SearchResult as Result},
    fallback::FallbackSearchManager,
    filter::{UrlFilter, PREFERENTIAL_DOMAINS},
    query::{DistinctQueries, QueryBuilder, ResearchContext},
    types::{ResultSource, SearchOptions, SearchProvider, SearchResult},
};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::time::{timeout, Duration};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchBranch {
    Neural,
    Keyword,
    Fallback,
}

impl fmt::Display for SearchBranch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchBranch::Neural => write!(f, "neural"),
            SearchBranch::Keyword => write!(f, "keyword"),
            SearchBranch::Fallback => write!(f, "fallback"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorConfig {
    /// Branches allowed to run at the same time
    pub max_concurrent: usize,
    /// Independent limit for each branch
    pub branch_timeout: Duration,
    pub neural_results: u32,
    /// The keyword engine serves at most 10 per request
    pub keyword_results: u32,
    pub fallback_results: u32,
    /// Domains the neural branch is restricted to (none = unrestricted)
    pub include_domains: Vec<String>,
    pub start_published_date: Option<String>,
    pub date_restrict: Option<String>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 3,
            branch_timeout: Duration::from_secs(120),
            neural_results: 20,
            keyword_results: 10,
            fallback_results: 15,
            include_domains: PREFERENTIAL_DOMAINS.iter().map(|d| d.to_string()).collect(),
            start_published_date: Some("2023-01-01".to_string()),
            date_restrict: Some("m12".to_string()),
        }
    }
}

impl CoordinatorConfig {
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max;
        self
    }

    pub fn with_branch_timeout(mut self, timeout: Duration) -> Self {
        self.branch_timeout = timeout;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchStatistics {
    /// Sum over successful branches only
    pub total_results: usize,
    pub neural_count: usize,
    pub keyword_count: usize,
    pub fallback_count: usize,
    pub search_time_ms: u64,
    pub branches_dispatched: usize,
    pub branches_failed: usize,
    pub simultaneous_execution: bool,
    pub distinct_queries: bool,
}

/// Per-branch results, errors and statistics of one distinct search
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsolidatedResult {
    pub base_query: String,
    pub queries: DistinctQueries,
    /// Provider behind each dispatched branch
    pub providers: BTreeMap<SearchBranch, String>,
    pub neural_results: Vec<SearchResult>,
    pub keyword_results: Vec<SearchResult>,
    pub fallback_results: Vec<SearchResult>,
    pub errors: BTreeMap<SearchBranch, String>,
    pub statistics: SearchStatistics,
    /// Set when no branch produced anything
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_message: Option<String>,
    pub started_at: DateTime<Utc>,
}

impl ConsolidatedResult {
    pub fn results(&self, branch: SearchBranch) -> &[SearchResult] {
        match branch {
            SearchBranch::Neural => &self.neural_results,
            SearchBranch::Keyword => &self.keyword_results,
            SearchBranch::Fallback => &self.fallback_results,
        }
    }

    /// Every result, neural first
    pub fn all_results(&self) -> impl Iterator<Item = &SearchResult> {
        self.neural_results
            .iter()
            .chain(&self.keyword_results)
            .chain(&self.fallback_results)
    }
}

#[derive(Debug)]
pub struct SimultaneousDistinctCoordinator {
    neural: Option<Arc<dyn SearchProvider>>,
    keyword: Option<Arc<dyn SearchProvider>>,
    fallback: Option<Arc<FallbackSearchManager>>,
    url_filter: Option<Arc<UrlFilter>>,
    queries: QueryBuilder,
    config: CoordinatorConfig,
    semaphore: Arc<Semaphore>,
}

impl SimultaneousDistinctCoordinator {
    pub fn new(config: CoordinatorConfig) -> Self {
        let permits = config.max_concurrent.max(1);
        Self {
            neural: None,
            keyword: None,
            fallback: None,
            url_filter: None,
            queries: QueryBuilder::default(),
            config,
            semaphore: Arc::new(Semaphore::new(permits)),
        }
    }

    pub fn with_neural_provider(mut self, provider: Arc<dyn SearchProvider>) -> Self {
        self.neural = Some(provider);
        self
    }

    pub fn with_keyword_provider(mut self, provider: Arc<dyn SearchProvider>) -> Self {
        self.keyword = Some(provider);
        self
    }

    pub fn with_fallback(mut self, manager: Arc<FallbackSearchManager>) -> Self {
        self.fallback = Some(manager);
        self
    }

    /// Filter and re-rank every branch's results before returning them
    pub fn with_url_filter(mut self, filter: Arc<UrlFilter>) -> Self {
        self.url_filter = Some(filter);
        self
    }

    pub fn with_query_builder(mut self, queries: QueryBuilder) -> Self {
        self.queries = queries;
        self
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub async fn execute_simultaneous_distinct_search(
        &self,
        base_query: &str,
        context: &ResearchContext,
    ) -> Result<ConsolidatedResult> {
        let base_query = base_query.trim();
        if base_query.is_empty() {
            return Err(SearchError::InvalidInput(
                "Query cannot be empty".to_string(),
            ));
        }

        let started_at = Utc::now();
        let clock = Instant::now();
        let queries = self.queries.distinct_queries(base_query, context);
        let locale = self.queries.locale();

        let mut providers = BTreeMap::new();
        let mut branches = Vec::new();
        let mut handles = Vec::new();

        if let Some(provider) = &self.neural {
            let mut options = SearchOptions::new(queries.neural.clone(), self.config.neural_results)
                .with_locale(&locale.language, &locale.region)
                .with_include_domains(self.config.include_domains.clone());
            options.start_published_date = self.config.start_published_date.clone();

            providers.insert(SearchBranch::Neural, provider.name().to_string());
            branches.push(SearchBranch::Neural);
            handles.push(self.spawn_provider(Arc::clone(provider), options));
        }

        if let Some(provider) = &self.keyword {
            let mut options = SearchOptions::new(queries.keyword.clone(), self.config.keyword_results)
                .with_locale(&locale.language, &locale.region);
            options.date_restrict = self.config.date_restrict.clone();

            providers.insert(SearchBranch::Keyword, provider.name().to_string());
            branches.push(SearchBranch::Keyword);
            handles.push(self.spawn_provider(Arc::clone(provider), options));
        }

        if let Some(manager) = &self.fallback {
            let manager = Arc::clone(manager);
            let query = base_query.to_string();
            let max_results = self.config.fallback_results;

            providers.insert(SearchBranch::Fallback, "fallback chain".to_string());
            branches.push(SearchBranch::Fallback);
            handles.push(self.spawn_branch(async move {
                manager.search_with_fallback(&query, max_results).await
            }));
        }

        log::info!(
            "Dispatching {} branches for '{base_query}' (max {} concurrent)",
            branches.len(),
            self.config.max_concurrent
        );

        let outcomes = join_all(handles).await;

        let mut result_sets: BTreeMap<SearchBranch, Vec<SearchResult>> = BTreeMap::new();
        let mut errors = BTreeMap::new();

        for (branch, outcome) in branches.into_iter().zip(outcomes) {
            match outcome {
                Ok(Ok(results)) => {
                    log::info!("{branch} branch returned {} results", results.len());
                    result_sets.insert(branch, results);
                }
                Ok(Err(e)) => {
                    log::warn!("{branch} branch failed: {e}");
                    errors.insert(branch, e.to_string());
                }
                Err(e) => {
                    log::error!("{branch} branch aborted: {e}");
                    errors.insert(branch, format!("Branch task aborted: {e}"));
                }
            }
        }

        let excluded: Vec<&str> = [SearchBranch::Neural, SearchBranch::Keyword]
            .iter()
            .filter_map(|b| providers.get(b).map(String::as_str))
            .collect();

        let neural_results = self.finish(result_sets.remove(&SearchBranch::Neural));
        let keyword_results = self.finish(result_sets.remove(&SearchBranch::Keyword));
        let fallback_results = self.finish(result_sets.remove(&SearchBranch::Fallback).map(|results| {
            results
                .into_iter()
                .filter(|r| !excluded.contains(&r.provider.as_str()))
                .map(|r| r.relabeled(ResultSource::Fallback))
                .collect()
        }));

        let total_results = neural_results.len() + keyword_results.len() + fallback_results.len();
        let statistics = SearchStatistics {
            total_results,
            neural_count: neural_results.len(),
            keyword_count: keyword_results.len(),
            fallback_count: fallback_results.len(),
            search_time_ms: clock.elapsed().as_millis() as u64,
            branches_dispatched: providers.len(),
            branches_failed: errors.len(),
            simultaneous_execution: providers.len() > 1,
            distinct_queries: queries.neural != queries.keyword,
        };

        let fallback_message = (total_results == 0).then(|| {
            log::warn!("Distinct search for '{base_query}' produced no results");
            "No results from any provider; continue with degraded data".to_string()
        });

        log::info!(
            "Distinct search finished: {} results in {}ms ({} branch errors)",
            statistics.total_results,
            statistics.search_time_ms,
            statistics.branches_failed
        );

        Ok(ConsolidatedResult {
            base_query: base_query.to_string(),
            queries,
            providers,
            neural_results,
            keyword_results,
            fallback_results,
            errors,
            statistics,
            fallback_message,
            started_at,
        })
    }

    fn spawn_provider(
        &self,
        provider: Arc<dyn SearchProvider>,
        options: SearchOptions,
    ) -> tokio::task::JoinHandle<Result<Vec<SearchResult>>> {
        self.spawn_branch(async move { provider.search(&options).await })
    }

    /// Run `work` on its own task once a worker slot is free, under the branch timeout
    fn spawn_branch<F>(&self, work: F) -> tokio::task::JoinHandle<Result<Vec<SearchResult>>>
    where
        F: Future<Output = Result<Vec<SearchResult>>> + Send + 'static,
    {
        let semaphore = Arc::clone(&self.semaphore);
        let limit = self.config.branch_timeout;

        tokio::spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|e| SearchError::Other(format!("Worker pool closed: {e}")))?;

            match timeout(limit, work).await {
                Ok(result) => result,
                Err(_) => Err(SearchError::Timeout {
                    timeout_ms: limit.as_millis() as u64,
                }),
            }
        })
    }

    fn finish(&self, results: Option<Vec<SearchResult>>) -> Vec<SearchResult> {
        let results = results.unwrap_or_default();
        match &self.url_filter {
            Some(filter) => filter
                .filter_results(results)
                .into_iter()
                .map(|filtered| filtered.result)
                .collect(),
            None => results,
        }
    }
}
