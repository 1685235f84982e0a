//! Process configuration, read once at startup
//!
//! Everything comes from named settings (environment variables in
//! production). [`Settings::from_lookup`] takes any `name -> value` function
//! so tests can configure a process without touching the real environment.

use crate::error::{SearchError, SearchResult};
use crate::types::ResultSource;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_CACHE_TTL_SECS: u64 = 3600;
const DEFAULT_MAX_WORKERS: usize = 3;
const DEFAULT_BRANCH_TIMEOUT_SECS: u64 = 120;

/// The search backends this crate knows how to talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Exa,
    Google,
    Serper,
    Bing,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::Exa,
        ProviderKind::Google,
        ProviderKind::Serper,
        ProviderKind::Bing,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::Exa => "exa",
            ProviderKind::Google => "google",
            ProviderKind::Serper => "serper",
            ProviderKind::Bing => "bing",
        }
    }

    /// Prefix of the per-provider override settings (`EXA_PRIORITY`, ...)
    pub fn env_prefix(&self) -> &'static str {
        match self {
            ProviderKind::Exa => "EXA",
            ProviderKind::Google => "GOOGLE",
            ProviderKind::Serper => "SERPER",
            ProviderKind::Bing => "BING",
        }
    }

    /// Base name of the API key setting; numbered variants append `_1`, `_2`, ...
    pub fn key_var(&self) -> Option<&'static str> {
        match self {
            ProviderKind::Exa => Some("EXA_API_KEY"),
            ProviderKind::Google => Some("GOOGLE_SEARCH_KEY"),
            ProviderKind::Serper => Some("SERPER_API_KEY"),
            ProviderKind::Bing => None,
        }
    }

    pub fn source(&self) -> ResultSource {
        match self {
            ProviderKind::Exa => ResultSource::Neural,
            _ => ResultSource::Keyword,
        }
    }

    fn default_priority(&self) -> u32 {
        match self {
            ProviderKind::Exa => 1,
            ProviderKind::Google => 2,
            ProviderKind::Serper => 3,
            ProviderKind::Bing => 4,
        }
    }

    fn default_max_errors(&self) -> u32 {
        match self {
            ProviderKind::Bing => 5,
            _ => 3,
        }
    }

    fn default_timeout(&self) -> Duration {
        match self {
            ProviderKind::Exa => Duration::from_secs(30),
            _ => Duration::from_secs(15),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ProviderKind {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "exa" => Ok(ProviderKind::Exa),
            "google" => Ok(ProviderKind::Google),
            "serper" => Ok(ProviderKind::Serper),
            "bing" => Ok(ProviderKind::Bing),
            other => Err(SearchError::InvalidInput(format!(
                "Unknown provider '{other}'. Expected one of: exa, google, serper, bing"
            ))),
        }
    }
}

/// Startup configuration of one provider
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSettings {
    pub kind: ProviderKind,
    pub enabled: bool,
    /// Lower runs first in the fallback chain
    pub priority: u32,
    /// Consecutive failures before the provider is taken out of rotation
    pub max_errors: u32,
    pub timeout: Duration,
    /// Endpoint override, mostly for pointing at a mock server
    pub base_url: Option<String>,
    /// Whether fallback queries are localized before reaching this provider
    pub enhance_query: bool,
}

impl ProviderSettings {
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            enabled: true,
            priority: kind.default_priority(),
            max_errors: kind.default_max_errors(),
            timeout: kind.default_timeout(),
            base_url: None,
            enhance_query: kind == ProviderKind::Exa,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorSettings {
    pub max_workers: usize,
    pub branch_timeout: Duration,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            branch_timeout: Duration::from_secs(DEFAULT_BRANCH_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// One entry per [`ProviderKind`], in declaration order
    pub providers: Vec<ProviderSettings>,
    /// API keys per provider name, in rotation order
    pub keys: BTreeMap<String, Vec<String>>,
    /// Programmable Search Engine id required by Google
    pub google_cse_id: Option<String>,
    pub cache_ttl: Duration,
    pub coordinator: CoordinatorSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            providers: ProviderKind::ALL.iter().map(|k| ProviderSettings::new(*k)).collect(),
            keys: BTreeMap::new(),
            google_cse_id: None,
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            coordinator: CoordinatorSettings::default(),
        }
    }
}

impl Settings {
    /// Read the process environment
    pub fn from_env() -> SearchResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build settings from an arbitrary `name -> value` source.
    ///
    /// Providers whose credentials are missing are logged as configuration
    /// errors and disabled. Unparsable numbers or flags are hard errors.
    pub fn from_lookup<F>(lookup: F) -> SearchResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut settings = Settings {
            google_cse_id: get("GOOGLE_CSE_ID"),
            ..Default::default()
        };

        if let Some(ttl) = parse_var::<u64>(&get, "SEARCH_CACHE_TTL_SECS")? {
            settings.cache_ttl = Duration::from_secs(ttl);
        }
        if let Some(workers) = parse_var::<usize>(&get, "COORDINATOR_MAX_WORKERS")? {
            settings.coordinator.max_workers = workers;
        }
        if let Some(secs) = parse_var::<u64>(&get, "COORDINATOR_TIMEOUT_SECS")? {
            settings.coordinator.branch_timeout = Duration::from_secs(secs);
        }

        for kind in ProviderKind::ALL {
            if let Some(var) = kind.key_var() {
                let keys = load_keys(&get, var);
                if !keys.is_empty() {
                    settings.keys.insert(kind.name().to_string(), keys);
                }
            }
        }

        let mut providers = Vec::with_capacity(ProviderKind::ALL.len());
        for kind in ProviderKind::ALL {
            let prefix = kind.env_prefix();
            let mut provider = ProviderSettings::new(kind);

            if let Some(value) = get(&format!("{prefix}_ENABLED")) {
                provider.enabled = parse_flag(&format!("{prefix}_ENABLED"), &value)?;
            }
            if let Some(priority) = parse_var(&get, &format!("{prefix}_PRIORITY"))? {
                provider.priority = priority;
            }
            if let Some(max_errors) = parse_var(&get, &format!("{prefix}_MAX_ERRORS"))? {
                provider.max_errors = max_errors;
            }
            if let Some(secs) = parse_var::<u64>(&get, &format!("{prefix}_TIMEOUT_SECS"))? {
                provider.timeout = Duration::from_secs(secs);
            }
            provider.base_url = get(&format!("{prefix}_BASE_URL"));

            if provider.enabled {
                if let Some(missing) = settings.missing_credentials(kind) {
                    log::error!(
                        "Configuration error: {missing} not set, {} disabled",
                        kind.name()
                    );
                    provider.enabled = false;
                }
            }

            providers.push(provider);
        }
        settings.providers = providers;

        Ok(settings)
    }

    fn missing_credentials(&self, kind: ProviderKind) -> Option<&'static str> {
        let var = kind.key_var()?;
        if !self.keys.contains_key(kind.name()) {
            return Some(var);
        }
        if kind == ProviderKind::Google && self.google_cse_id.is_none() {
            return Some("GOOGLE_CSE_ID");
        }
        None
    }

    pub fn validate(&self) -> SearchResult<()> {
        if self.coordinator.max_workers == 0 {
            return Err(SearchError::ConfigError(
                "COORDINATOR_MAX_WORKERS must be greater than 0".into(),
            ));
        }
        if self.coordinator.branch_timeout.is_zero() {
            return Err(SearchError::ConfigError(
                "COORDINATOR_TIMEOUT_SECS must be greater than 0".into(),
            ));
        }
        for provider in &self.providers {
            let prefix = provider.kind.env_prefix();
            if provider.timeout.is_zero() {
                return Err(SearchError::ConfigError(format!(
                    "{prefix}_TIMEOUT_SECS must be greater than 0"
                )));
            }
            if provider.max_errors == 0 {
                return Err(SearchError::ConfigError(format!(
                    "{prefix}_MAX_ERRORS must be greater than 0"
                )));
            }
        }
        if !self.providers.iter().any(|p| p.enabled) {
            log::warn!("No search provider is enabled; searches will return no results");
        }
        Ok(())
    }

    pub fn provider(&self, kind: ProviderKind) -> Option<&ProviderSettings> {
        self.providers.iter().find(|p| p.kind == kind)
    }

    pub fn enabled_providers(&self) -> impl Iterator<Item = &ProviderSettings> {
        self.providers.iter().filter(|p| p.enabled)
    }
}

/// `{var}` first, then `{var}_1`, `{var}_2`, ... until the first missing index
fn load_keys<G>(get: &G, var: &str) -> Vec<String>
where
    G: Fn(&str) -> Option<String>,
{
    let mut keys: Vec<String> = get(var).into_iter().collect();
    let numbered = (1..).map_while(|i| get(&format!("{var}_{i}")));
    for key in numbered {
        if !keys.contains(&key) {
            keys.push(key);
        }
    }
    keys
}

fn parse_var<T>(get: &impl Fn(&str) -> Option<String>, name: &str) -> SearchResult<Option<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    get(name)
        .map(|value| {
            value.parse::<T>().map_err(|e| {
                SearchError::ConfigError(format!("{name}: invalid value '{value}': {e}"))
            })
        })
        .transpose()
}

fn parse_flag(name: &str, value: &str) -> SearchResult<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(SearchError::ConfigError(format!(
            "{name}: expected true/false, got '{value}'"
        ))),
    }
}
