//! market-search CLI - Command-line front end for the market-search library
//!
//! Runs fallback searches, simultaneous distinct searches and single-provider
//! queries against the providers configured in the environment, and checks
//! URLs against the research filter.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use market_search::{
    config::ProviderKind,
    coordinator::{ConsolidatedResult, SearchBranch},
    fallback::{AttemptOutcome, FallbackOutcome},
    filter::FilterDecision,
    query::ResearchContext,
    utils::http::truncate_chars,
    web_search, SearchOptions, SearchResult, SearchServices, Settings,
};

#[derive(Parser)]
#[command(name = "market-search")]
#[command(about = "Multi-provider market research search CLI")]
#[command(version)]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search with automatic fallback across providers
    Search {
        /// Search query
        query: String,

        /// Maximum number of results
        #[arg(short, long, default_value = "10")]
        max_results: u32,

        /// Show which providers were tried
        #[arg(long)]
        attempts: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
    /// Search neural and keyword engines simultaneously with distinct queries
    Distinct {
        /// Base research query
        query: String,

        /// Market segment, e.g. "pagamentos"
        #[arg(short, long)]
        segment: Option<String>,

        /// Target audience
        #[arg(short, long)]
        audience: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
    /// Search using a single provider
    Single {
        /// Search query
        query: String,

        /// Search provider
        #[arg(short, long, value_enum)]
        provider: Provider,

        /// Maximum number of results
        #[arg(short, long, default_value = "10")]
        max_results: u32,

        /// Language code (e.g., pt, en)
        #[arg(short, long, default_value = "pt")]
        language: String,

        /// Region code (e.g., br, us)
        #[arg(short, long, default_value = "br")]
        region: String,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
    /// Check a URL against the research filter
    Filter {
        /// Candidate URL
        url: String,

        /// Page title
        #[arg(short, long, default_value = "")]
        title: String,

        /// Page snippet
        #[arg(short, long, default_value = "")]
        snippet: String,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
    /// List providers, their configuration and health
    Providers {
        /// Send a probe query to every enabled provider
        #[arg(long)]
        probe: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Provider {
    Exa,
    Google,
    Serper,
    Bing,
}

impl From<Provider> for ProviderKind {
    fn from(provider: Provider) -> Self {
        match provider {
            Provider::Exa => ProviderKind::Exa,
            Provider::Google => ProviderKind::Google,
            Provider::Serper => ProviderKind::Serper,
            Provider::Bing => ProviderKind::Bing,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum OutputFormat {
    Table,
    Json,
    Simple,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match cli.command {
        Commands::Search {
            query,
            max_results,
            attempts,
            format,
        } => handle_search(&query, max_results, attempts, format).await,
        Commands::Distinct {
            query,
            segment,
            audience,
            format,
        } => handle_distinct(&query, segment, audience, format).await,
        Commands::Single {
            query,
            provider,
            max_results,
            language,
            region,
            format,
        } => handle_single(&query, provider, max_results, &language, &region, format).await,
        Commands::Filter {
            url,
            title,
            snippet,
            format,
        } => handle_filter(&url, &title, &snippet, format),
        Commands::Providers { probe } => handle_providers(probe).await,
    }
}

fn load_services() -> anyhow::Result<SearchServices> {
    SearchServices::from_env().context("Failed to load search configuration")
}

async fn handle_search(
    query: &str,
    max_results: u32,
    show_attempts: bool,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let services = load_services()?;
    let outcome = services
        .fallback
        .search_with_report(query, max_results)
        .await
        .context("Fallback search failed")?;

    if let OutputFormat::Json = format {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    display_results(&outcome.results, format, outcome.provider.as_deref());
    if show_attempts || outcome.results.is_empty() {
        display_attempts(&outcome);
    }
    Ok(())
}

async fn handle_distinct(
    query: &str,
    segment: Option<String>,
    audience: Option<String>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let services = load_services()?;

    let mut context = ResearchContext::new();
    if let Some(segment) = segment {
        context = context.with_segment(&segment);
    }
    if let Some(audience) = audience {
        context = context.with_audience(&audience);
    }

    let consolidated = services
        .coordinator
        .execute_simultaneous_distinct_search(query, &context)
        .await
        .context("Distinct search failed")?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&consolidated)?),
        _ => display_consolidated(&consolidated, format),
    }
    Ok(())
}

async fn handle_single(
    query: &str,
    provider: Provider,
    max_results: u32,
    language: &str,
    region: &str,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let services = load_services()?;
    let kind = ProviderKind::from(provider);

    let Some(adapter) = services.providers.get(kind.name()) else {
        bail!(
            "Provider '{}' is not configured. Run `market-search providers` to see what is missing.",
            kind.name()
        );
    };

    let options = SearchOptions::new(query, max_results).with_locale(language, region);
    let results = web_search(adapter.as_ref(), &options).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&results)?),
        _ => display_results(&results, format, Some(kind.name())),
    }
    Ok(())
}

fn handle_filter(url: &str, title: &str, snippet: &str, format: OutputFormat) -> anyhow::Result<()> {
    let filter = market_search::UrlFilter::default();
    let decision = filter.filter_url(url, title, snippet);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&decision)?),
        _ => display_decision(url, &decision),
    }
    Ok(())
}

async fn handle_providers(probe: bool) -> anyhow::Result<()> {
    let settings = Settings::from_env().context("Failed to load search configuration")?;

    println!("{}", "Search Providers:".bold().blue());
    println!();

    for provider in &settings.providers {
        let keys = settings
            .keys
            .get(provider.name())
            .map(|k| k.len())
            .unwrap_or(0);
        let status = if provider.enabled {
            "✅".green()
        } else {
            "❌".red()
        };
        let requirement = match provider.kind.key_var() {
            Some(var) if provider.kind == ProviderKind::Google => {
                format!("{var} + GOOGLE_CSE_ID ({keys} key(s))")
            }
            Some(var) => format!("{var} ({keys} key(s))"),
            None => "No API key required".to_string(),
        };
        println!(
            "{} {} - priority {}, max errors {}, timeout {}s - {}",
            status,
            provider.name().bold(),
            provider.priority,
            provider.max_errors,
            provider.timeout.as_secs(),
            requirement.italic()
        );
    }

    if probe {
        let services = SearchServices::from_settings(settings)?;
        println!();
        println!("{}", "Probe results:".bold().blue());
        for name in services.fallback.provider_names() {
            let report = services.fallback.test_provider(name).await?;
            if report.success {
                println!(
                    "{} {} - {} results in {}ms",
                    "✅".green(),
                    name.bold(),
                    report.results,
                    report.response_time_ms
                );
            } else {
                println!(
                    "{} {} - {}",
                    "❌".red(),
                    name.bold(),
                    report.error.unwrap_or_else(|| "no results".to_string())
                );
            }
        }
    }

    println!();
    println!("{}", "Set environment variables to enable providers:".bold());
    println!("export EXA_API_KEY=your_key          # EXA_API_KEY_1, EXA_API_KEY_2, ... for rotation");
    println!("export GOOGLE_SEARCH_KEY=your_key");
    println!("export GOOGLE_CSE_ID=your_search_engine_id");
    println!("export SERPER_API_KEY=your_key");

    Ok(())
}

fn display_results(results: &[SearchResult], format: OutputFormat, provider: Option<&str>) {
    match format {
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string_pretty(results) {
                println!("{json}");
            }
        }
        OutputFormat::Simple => {
            for (i, result) in results.iter().enumerate() {
                println!("{}. {}", i + 1, result.title);
                println!("   {}", result.url);
                if !result.snippet.is_empty() {
                    println!("   {}", result.snippet);
                }
                println!();
            }
        }
        OutputFormat::Table => {
            if let Some(provider) = provider {
                println!("{} {}", "Search Results from".bold(), provider.bold().blue());
            } else {
                println!("{}", "Search Results".bold().blue());
            }
            println!("{}", "─".repeat(80).dimmed());

            for (i, result) in results.iter().enumerate() {
                display_result(i + 1, result);
            }

            println!("{} {}", "Total results:".bold(), results.len().to_string().bold());
        }
    }
}

fn display_result(position: usize, result: &SearchResult) {
    println!("{}. {}", position.to_string().bold(), result.title.bold());
    println!("   🔗 {}", result.url.blue().underline());

    if let Some(domain) = &result.domain {
        println!("   🌐 {}", domain.green());
    }

    if !result.snippet.is_empty() {
        let truncated = if result.snippet.chars().count() > 200 {
            format!("{}...", truncate_chars(&result.snippet, 200))
        } else {
            result.snippet.clone()
        };
        println!("   📄 {}", truncated.italic());
    }

    if let Some(published_date) = &result.published_date {
        println!("   📅 {}", published_date.yellow());
    }

    println!(
        "   🔍 Provider: {} ({})",
        result.provider.cyan(),
        result.source.to_string().dimmed()
    );
    println!();
}

fn display_attempts(outcome: &FallbackOutcome) {
    println!();
    if outcome.from_cache {
        println!("{}", "Served from cache".dimmed());
    }
    for attempt in &outcome.attempts {
        let status = match &attempt.outcome {
            AttemptOutcome::Success { results } => format!("{results} results").green(),
            AttemptOutcome::Empty => "no results".yellow(),
            AttemptOutcome::Failed { error } => error.clone().red(),
        };
        println!("  {} ({}ms): {}", attempt.provider.bold(), attempt.elapsed_ms, status);
    }
    if let Some(message) = &outcome.fallback_message {
        println!("{}", message.yellow());
    }
}

fn display_consolidated(consolidated: &ConsolidatedResult, format: OutputFormat) {
    println!("{} {}", "Neural query:".bold(), consolidated.queries.neural);
    println!("{} {}", "Keyword query:".bold(), consolidated.queries.keyword);
    println!();

    for branch in [SearchBranch::Neural, SearchBranch::Keyword, SearchBranch::Fallback] {
        let Some(provider) = consolidated.providers.get(&branch) else {
            continue;
        };
        println!("{} {}", format!("[{branch}]").bold().blue(), provider);
        if let Some(error) = consolidated.errors.get(&branch) {
            println!("   {}", error.red());
            println!();
            continue;
        }
        match format {
            OutputFormat::Simple => {
                for result in consolidated.results(branch) {
                    println!("   {} - {}", result.title, result.url);
                }
                println!();
            }
            _ => {
                for (i, result) in consolidated.results(branch).iter().enumerate() {
                    display_result(i + 1, result);
                }
            }
        }
    }

    let stats = &consolidated.statistics;
    println!("{}", "─".repeat(80).dimmed());
    println!(
        "{} {} (neural {}, keyword {}, fallback {}) in {}ms",
        "Total results:".bold(),
        stats.total_results.to_string().bold(),
        stats.neural_count,
        stats.keyword_count,
        stats.fallback_count,
        stats.search_time_ms
    );
    if let Some(message) = &consolidated.fallback_message {
        println!("{}", message.yellow());
    }
}

fn display_decision(url: &str, decision: &FilterDecision) {
    let verdict = if decision.approved {
        "APPROVED".green().bold()
    } else {
        "REJECTED".red().bold()
    };
    println!("{} {}", verdict, url);
    println!("   Category: {:?}", decision.category);
    println!("   Reason: {}", decision.reason);
    println!("   Priority: {:.1}", decision.priority);
}
