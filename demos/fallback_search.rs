//! Fallback search example
//!
//! Providers come from the environment (EXA_API_KEY, GOOGLE_SEARCH_KEY +
//! GOOGLE_CSE_ID, SERPER_API_KEY). Bing needs no key, so this runs even with
//! nothing configured.

use market_search::{fallback::AttemptOutcome, SearchServices};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let services = SearchServices::from_env()?;
    println!(
        "🔍 Fallback order: {}",
        services.fallback.provider_names().join(" → ")
    );

    let outcome = services
        .fallback
        .search_with_report("mercado de fintechs", 5)
        .await?;

    for attempt in &outcome.attempts {
        let status = match &attempt.outcome {
            AttemptOutcome::Success { results } => format!("{results} results"),
            AttemptOutcome::Empty => "no results".to_string(),
            AttemptOutcome::Failed { error } => error.clone(),
        };
        println!("   {} ({}ms): {status}", attempt.provider, attempt.elapsed_ms);
    }

    match &outcome.provider {
        Some(provider) => println!("Found {} results via {provider}:", outcome.results.len()),
        None => println!(
            "⚠️ {}",
            outcome.fallback_message.as_deref().unwrap_or("No results")
        ),
    }

    for (i, result) in outcome.results.iter().enumerate() {
        println!("{}. {}", i + 1, result.title);
        println!("   URL: {}", result.url);
        if let Some(domain) = &result.domain {
            println!("   Domain: {domain}");
        }
        println!();
    }

    // A second identical call is answered from the cache
    let cached = services
        .fallback
        .search_with_report("mercado de fintechs", 5)
        .await?;
    println!("Second call served from cache: {}", cached.from_cache);

    Ok(())
}
