//! Simultaneous distinct search example
//!
//! Sends a semantic phrasing to Exa and a statistics phrasing to Google at
//! the same time, plus the fallback chain, and prints each branch.

use market_search::{coordinator::SearchBranch, ResearchContext, SearchServices};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let services = SearchServices::from_env()?;
    let context = ResearchContext::new()
        .with_segment("pagamentos digitais")
        .with_audience("pequenas empresas");

    let report = services
        .coordinator
        .execute_simultaneous_distinct_search("fintech", &context)
        .await?;

    println!("🧠 Neural query:  {}", report.queries.neural);
    println!("🔑 Keyword query: {}", report.queries.keyword);
    println!();

    for branch in [SearchBranch::Neural, SearchBranch::Keyword, SearchBranch::Fallback] {
        let Some(provider) = report.providers.get(&branch) else {
            println!("[{branch}] not configured");
            continue;
        };
        if let Some(error) = report.errors.get(&branch) {
            println!("[{branch}] {provider} failed: {error}");
            continue;
        }
        println!("[{branch}] {provider}");
        for result in report.results(branch).iter().take(3) {
            println!("   {} - {}", result.title, result.url);
        }
    }

    let stats = &report.statistics;
    println!();
    println!(
        "Total: {} results in {}ms ({} of {} branches failed)",
        stats.total_results, stats.search_time_ms, stats.branches_failed, stats.branches_dispatched
    );
    if let Some(message) = &report.fallback_message {
        println!("⚠️ {message}");
    }

    Ok(())
}
