//! Web search client with a per-run query quota.
//!
//! Each client record becomes one query (see [`build_query`]). The
//! [`SearchClient`] sends it to a Custom-Search-style JSON API and returns the
//! result snippets. Failures never abort a run: they are logged and reported
//! as an outcome that carries no evidence.

mod query;

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use clientintel_shared::{ClientIntelError, Credentials, Result, SearchConfig, parse_url};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, instrument, warn};
use url::Url;

pub use query::{QueryFilters, build_query};

/// User-Agent string for search requests.
const USER_AGENT: &str = concat!("ClientIntel/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// SearchOutcome
// ---------------------------------------------------------------------------

/// Result of one [`SearchClient::search`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// The API answered; snippets in ranking order (possibly none).
    Snippets(Vec<String>),
    /// The request or response failed; already logged.
    Failed,
    /// The run's query ceiling was reached; no request was made.
    QuotaExhausted,
}

impl SearchOutcome {
    /// Snippets to use as evidence. Failures and quota exhaustion yield none.
    pub fn into_snippets(self) -> Vec<String> {
        match self {
            Self::Snippets(snippets) => snippets,
            Self::Failed | Self::QuotaExhausted => Vec::new(),
        }
    }

    pub fn is_quota_exhausted(&self) -> bool {
        matches!(self, Self::QuotaExhausted)
    }
}

// ---------------------------------------------------------------------------
// QueryQuota
// ---------------------------------------------------------------------------

/// Ceiling on outbound searches for one run.
///
/// Owned by a single [`SearchClient`]; the counter is atomic so a shared
/// client stays correct if callers ever run concurrently.
#[derive(Debug)]
pub struct QueryQuota {
    limit: u32,
    used: AtomicU32,
}

impl QueryQuota {
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            used: AtomicU32::new(0),
        }
    }

    /// Reserve one query. Returns `false` once the ceiling is reached.
    pub fn try_acquire(&self) -> bool {
        self.used
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < self.limit).then_some(n + 1)
            })
            .is_ok()
    }

    /// Queries issued so far.
    pub fn used(&self) -> u32 {
        self.used.load(Ordering::SeqCst)
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.used())
    }
}

// ---------------------------------------------------------------------------
// SearchOptions
// ---------------------------------------------------------------------------

/// Everything needed to construct a [`SearchClient`].
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// API endpoint, e.g. `https://www.googleapis.com/customsearch/v1`.
    pub endpoint: String,
    pub api_key: String,
    /// Search scope identifier (`cx`).
    pub engine_id: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Query ceiling for the run.
    pub max_queries: u32,
    /// Pause after each request.
    pub delay: Duration,
}

impl SearchOptions {
    /// Merge the `[search]` config section with loaded credentials.
    pub fn from_config(config: &SearchConfig, credentials: &Credentials) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            api_key: credentials.search_api_key.clone(),
            engine_id: credentials.search_engine_id.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            max_queries: config.max_queries,
            delay: Duration::from_millis(config.delay_ms),
        }
    }
}

// ---------------------------------------------------------------------------
// SearchClient
// ---------------------------------------------------------------------------

/// Search API client that owns its run's [`QueryQuota`].
pub struct SearchClient {
    client: Client,
    endpoint: Url,
    api_key: String,
    engine_id: String,
    quota: QueryQuota,
    delay: Duration,
}

impl SearchClient {
    pub fn new(opts: SearchOptions) -> Result<Self> {
        let endpoint = parse_url("search.endpoint", &opts.endpoint)?;

        Ok(Self {
            client: build_client(opts.timeout)?,
            endpoint,
            api_key: opts.api_key,
            engine_id: opts.engine_id,
            quota: QueryQuota::new(opts.max_queries),
            delay: opts.delay,
        })
    }

    pub fn quota(&self) -> &QueryQuota {
        &self.quota
    }

    /// Run one query.
    ///
    /// Short-circuits with [`SearchOutcome::QuotaExhausted`] once the ceiling
    /// is hit. Any network, status, or body error is logged and reported as
    /// [`SearchOutcome::Failed`]. Every request is followed by the configured
    /// throttle delay.
    #[instrument(skip_all, fields(query = %query))]
    pub async fn search(&self, query: &str) -> SearchOutcome {
        if !self.quota.try_acquire() {
            warn!(limit = self.quota.limit(), "search quota exhausted, skipping request");
            return SearchOutcome::QuotaExhausted;
        }

        let outcome = match self.fetch(query).await {
            Ok(body) => {
                let snippets = extract_snippets(&body);
                debug!(snippets = snippets.len(), "search returned");
                SearchOutcome::Snippets(snippets)
            }
            Err(e) => {
                warn!(error = %e, "search failed, treating as no results");
                SearchOutcome::Failed
            }
        };

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        outcome
    }

    async fn fetch(&self, query: &str) -> Result<Value> {
        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&[
                ("q", query),
                ("key", self.api_key.as_str()),
                ("cx", self.engine_id.as_str()),
            ])
            .send()
            .await
            // The request URL carries the API key; keep it out of logs.
            .map_err(|e| ClientIntelError::Network(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientIntelError::Network(format!("HTTP {status}")));
        }

        response.json::<Value>().await.map_err(|e| {
            ClientIntelError::Network(format!("invalid search response: {}", e.without_url()))
        })
    }
}

/// Build a reqwest client with appropriate settings.
fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(|e| ClientIntelError::Network(format!("failed to build HTTP client: {e}")))
}

/// Pull `items[*].snippet` strings, in order. Items without a string snippet
/// are skipped; a body without an `items` array yields nothing.
fn extract_snippets(body: &Value) -> Vec<String> {
    body.get("items")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("snippet").and_then(Value::as_str))
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
