//! End-to-end `enrich` pipeline: CSV → search → model → parse → tags → CSV.

use std::path::PathBuf;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{Instrument, debug, debug_span, info, instrument};

use clientintel_insight::{
    Extraction, InsightExtractor, ModelOptions, materialize_tags, parse_response,
};
use clientintel_search::{QueryFilters, SearchClient, SearchOptions, SearchOutcome, build_query};
use clientintel_shared::{
    AppConfig, ClientIntelError, ClientRecord, Credentials, EnrichedRecord, Result, RunId,
};

/// `Raw Data Found` value for a record without snippets.
pub const NO_DATA: &str = "No data";

// ---------------------------------------------------------------------------
// Run statistics
// ---------------------------------------------------------------------------

/// Counters for one run, also written as the optional JSON report.
#[derive(Debug, Clone, Serialize)]
pub struct RunStats {
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub model: String,
    /// Rows processed.
    pub records: usize,
    /// Search requests sent (successful or not).
    pub searches_issued: usize,
    /// Search requests that failed.
    pub searches_failed: usize,
    /// Searches skipped because the quota was spent.
    pub quota_skipped: usize,
    /// Rows that ended with no snippets.
    pub no_evidence: usize,
    /// Model requests that returned text.
    pub model_calls: usize,
    /// Model requests that failed and used the fallback text.
    pub model_fallbacks: usize,
}

impl RunStats {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            run_id: RunId::new(),
            started_at: Utc::now(),
            finished_at: None,
            model: model.into(),
            records: 0,
            searches_issued: 0,
            searches_failed: 0,
            quota_skipped: 0,
            no_evidence: 0,
            model_calls: 0,
            model_fallbacks: 0,
        }
    }

    fn record_search(&mut self, outcome: &SearchOutcome) {
        match outcome {
            SearchOutcome::Snippets(_) => self.searches_issued += 1,
            SearchOutcome::Failed => {
                self.searches_issued += 1;
                self.searches_failed += 1;
            }
            SearchOutcome::QuotaExhausted => self.quota_skipped += 1,
        }
    }

    fn record_extraction(&mut self, extraction: &Extraction) {
        match extraction {
            Extraction::NoEvidence => {}
            Extraction::Completed(_) => self.model_calls += 1,
            Extraction::Fallback(_) => self.model_fallbacks += 1,
        }
    }
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called before a record is searched.
    fn record_started(&self, current: usize, total: usize);
    /// Called when the run completes.
    fn done(&self, stats: &RunStats);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn record_started(&self, _current: usize, _total: usize) {}
    fn done(&self, _stats: &RunStats) {}
}

// ---------------------------------------------------------------------------
// Enricher
// ---------------------------------------------------------------------------

/// Runs records through search, extraction, parsing, and tagging.
pub struct Enricher {
    search: SearchClient,
    extractor: InsightExtractor,
    filters: QueryFilters,
}

impl Enricher {
    pub fn new(search: SearchClient, extractor: InsightExtractor, filters: QueryFilters) -> Self {
        Self {
            search,
            extractor,
            filters,
        }
    }

    /// Build both API clients from config and credentials.
    pub fn from_config(config: &AppConfig, credentials: &Credentials) -> Result<Self> {
        let vocabulary = config.tag_vocabulary()?;

        let search = SearchClient::new(SearchOptions::from_config(&config.search, credentials))?;
        let extractor = InsightExtractor::new(
            ModelOptions::from_config(&config.model, credentials),
            vocabulary,
        )?
        .skip_without_evidence(config.pipeline.skip_model_without_evidence);

        let filters = if config.pipeline.use_filters {
            QueryFilters {
                keywords: config.pipeline.query_keywords.clone(),
                sites: config.pipeline.query_sites.clone(),
            }
        } else {
            QueryFilters::none()
        };

        Ok(Self::new(search, extractor, filters))
    }

    pub fn extractor(&self) -> &InsightExtractor {
        &self.extractor
    }

    pub fn search(&self) -> &SearchClient {
        &self.search
    }

    /// Enrich one record. Never fails: every recoverable problem degrades to
    /// default values and is counted in `stats`.
    pub async fn enrich_record(&self, record: &ClientRecord, stats: &mut RunStats) -> EnrichedRecord {
        let full_name = record.full_name();
        let query = build_query(&full_name, &record.state, &self.filters);
        debug!(%query, "searching");

        let outcome = self.search.search(&query).await;
        stats.record_search(&outcome);
        let snippets = outcome.into_snippets();
        if snippets.is_empty() {
            stats.no_evidence += 1;
        }

        let extraction = self.extractor.extract(&full_name, &snippets).await;
        stats.record_extraction(&extraction);

        let insight = parse_response(extraction.raw_text());
        let tag_flags = materialize_tags(&insight, self.extractor.vocabulary());

        let raw_data = if snippets.is_empty() {
            NO_DATA.to_string()
        } else {
            snippets.join("\n")
        };

        let digested_summary = match extraction {
            Extraction::NoEvidence => insight.summary.clone(),
            Extraction::Completed(_) | Extraction::Fallback(_) => {
                format!("{} (Confidence: {})", insight.summary, insight.confidence)
            }
        };

        stats.records += 1;

        EnrichedRecord {
            record: record.clone(),
            raw_data,
            digested_summary,
            outreach_email: insight.email,
            tag_flags,
        }
    }

    /// Enrich every record in order. One output per input, same order.
    #[instrument(skip_all, fields(records = records.len()))]
    pub async fn enrich_records(
        &self,
        records: &[ClientRecord],
        stats: &mut RunStats,
        progress: &dyn ProgressReporter,
    ) -> Vec<EnrichedRecord> {
        let total = records.len();
        let mut enriched = Vec::with_capacity(total);

        for (i, record) in records.iter().enumerate() {
            progress.record_started(i + 1, total);
            let span = debug_span!("record", row = i + 1);
            enriched.push(self.enrich_record(record, stats).instrument(span).await);
        }

        enriched
    }
}

// ---------------------------------------------------------------------------
// File-level run
// ---------------------------------------------------------------------------

/// Configuration for the `enrich` pipeline.
#[derive(Debug, Clone)]
pub struct EnrichFileConfig {
    /// Input CSV.
    pub input: PathBuf,
    /// Output CSV.
    pub output: PathBuf,
    /// Optional JSON run report.
    pub report: Option<PathBuf>,
    /// Resolved application config (file + CLI overrides).
    pub app: AppConfig,
}

/// Run the full `enrich` pipeline.
///
/// 1. Load the client table
/// 2. Enrich each record in order
/// 3. Write the enriched CSV
/// 4. Write the run report (if requested)
#[instrument(skip_all, fields(input = %config.input.display()))]
pub async fn enrich_file(
    config: &EnrichFileConfig,
    credentials: &Credentials,
    progress: &dyn ProgressReporter,
) -> Result<RunStats> {
    let start = Instant::now();
    config.app.validate()?;
    let enricher = Enricher::from_config(&config.app, credentials)?;

    let mut stats = RunStats::new(enricher.extractor().model());
    info!(run_id = %stats.run_id, "starting enrichment run");

    // --- Phase 1: Load ---
    progress.phase("Loading client table");
    let table = clientintel_table::read_clients_from_path(&config.input, &config.app.columns)?;

    // --- Phase 2: Enrich ---
    progress.phase("Enriching records");
    let enriched = enricher
        .enrich_records(&table.records, &mut stats, progress)
        .await;

    // --- Phase 3: Write ---
    progress.phase("Writing enriched table");
    clientintel_table::write_enriched_to_path(
        &config.output,
        &table.headers,
        &enriched,
        enricher.extractor().vocabulary(),
    )?;

    stats.finished_at = Some(Utc::now());

    // --- Phase 4: Report ---
    if let Some(path) = &config.report {
        write_report(path, &stats)?;
    }

    info!(
        records = stats.records,
        searches = stats.searches_issued,
        quota_skipped = stats.quota_skipped,
        model_calls = stats.model_calls,
        model_fallbacks = stats.model_fallbacks,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "enrichment complete"
    );

    progress.done(&stats);
    Ok(stats)
}

fn write_report(path: &std::path::Path, stats: &RunStats) -> Result<()> {
    let json = serde_json::to_string_pretty(stats)
        .map_err(|e| ClientIntelError::output(format!("failed to serialize run report: {e}")))?;
    std::fs::write(path, json).map_err(|e| ClientIntelError::io(path, e))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::time::Duration;

    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use clientintel_shared::TagVocabulary;

    use super::*;

    const SEARCH_PATH: &str = "/customsearch/v1";
    const CHAT_PATH: &str = "/v1/chat/completions";

    fn record(first: &str, last: &str, state: &str) -> ClientRecord {
        ClientRecord {
            first_name: first.into(),
            last_name: last.into(),
            state: state.into(),
            cells: vec![first.into(), last.into(), state.into()],
        }
    }

    fn enricher(server: &MockServer, max_queries: u32) -> Enricher {
        let search = SearchClient::new(SearchOptions {
            endpoint: format!("{}{SEARCH_PATH}", server.uri()),
            api_key: "g-key".into(),
            engine_id: "cx".into(),
            timeout: Duration::from_secs(5),
            max_queries,
            delay: Duration::ZERO,
        })
        .unwrap();

        let extractor = InsightExtractor::new(
            ModelOptions {
                api_base: format!("{}/v1", server.uri()),
                api_key: "sk-test".into(),
                model: "gpt-3.5-turbo".into(),
                temperature: 0.5,
                timeout: Duration::from_secs(5),
            },
            TagVocabulary::default(),
        )
        .unwrap();

        Enricher::new(search, extractor, QueryFilters::none())
    }

    async fn mount_search(server: &MockServer, query: &str, snippets: &[&str]) {
        let items: Vec<_> = snippets.iter().map(|s| json!({ "snippet": s })).collect();
        Mock::given(method("GET"))
            .and(path(SEARCH_PATH))
            .and(query_param("q", query))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": items })))
            .mount(server)
            .await;
    }

    async fn mount_model(server: &MockServer, content: &str, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path(CHAT_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "role": "assistant", "content": content } }]
            })))
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    fn stats() -> RunStats {
        RunStats::new("gpt-3.5-turbo")
    }

    #[tokio::test]
    async fn new_job_scenario() {
        let server = MockServer::start().await;
        mount_search(
            &server,
            "\"Jane Doe\" CA",
            &["Jane Doe joined Acme Corp as VP in March."],
        )
        .await;
        mount_model(
            &server,
            "Summary: Jane started a new role.\nTags: [NEW JOB]\nConfidence: High\nEmail: Hi Jane, congrats on the new role!",
            1,
        )
        .await;

        let mut stats = stats();
        let out = enricher(&server, 10)
            .enrich_record(&record("Jane", "Doe", "CA"), &mut stats)
            .await;

        assert_eq!(out.raw_data, "Jane Doe joined Acme Corp as VP in March.");
        assert_eq!(out.digested_summary, "Jane started a new role. (Confidence: High)");
        assert_eq!(out.outreach_email, "Hi Jane, congrats on the new role!");
        assert_eq!(out.tag_flags.raised(), vec!["NEW JOB"]);
        assert_eq!(out.tag_flags.0.len(), TagVocabulary::default().len());
        assert_eq!(stats.model_calls, 1);
        assert_eq!(stats.searches_issued, 1);
    }

    #[tokio::test]
    async fn empty_search_uses_defaults_without_model_call() {
        let server = MockServer::start().await;
        mount_search(&server, "\"Jane Doe\" CA", &[]).await;
        mount_model(&server, "unused", 0).await;

        let mut stats = stats();
        let out = enricher(&server, 10)
            .enrich_record(&record("Jane", "Doe", "CA"), &mut stats)
            .await;

        assert_eq!(out.raw_data, "No data");
        assert_eq!(out.digested_summary, "N/A");
        assert_eq!(out.outreach_email, "N/A");
        assert_eq!(out.tag_flags.raised(), vec!["CONFIDENCE: LOW"]);
        assert_eq!(stats.no_evidence, 1);
        assert_eq!(stats.model_calls, 0);
    }

    #[tokio::test]
    async fn model_failure_still_fills_every_column() {
        let server = MockServer::start().await;
        mount_search(&server, "\"Jane Doe\" CA", &["Jane Doe moved to Austin."]).await;
        Mock::given(method("POST"))
            .and(path(CHAT_PATH))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let mut stats = stats();
        let out = enricher(&server, 10)
            .enrich_record(&record("Jane", "Doe", "CA"), &mut stats)
            .await;

        assert_eq!(out.raw_data, "Jane Doe moved to Austin.");
        assert_eq!(
            out.digested_summary,
            "No major updates found. (Confidence: Low)"
        );
        assert!(!out.outreach_email.is_empty());
        assert_ne!(out.outreach_email, "N/A");
        assert_eq!(out.tag_flags.0.len(), TagVocabulary::default().len());
        assert_eq!(out.tag_flags.get("CONFIDENCE: LOW"), Some(true));
        assert_eq!(stats.model_fallbacks, 1);
    }

    #[tokio::test]
    async fn search_failure_degrades_to_no_data() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(SEARCH_PATH))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        mount_model(&server, "unused", 0).await;

        let mut stats = stats();
        let out = enricher(&server, 10)
            .enrich_record(&record("Jane", "Doe", "CA"), &mut stats)
            .await;

        assert_eq!(out.raw_data, "No data");
        assert_eq!(stats.searches_failed, 1);
    }

    #[tokio::test]
    async fn quota_exhaustion_behaves_like_no_results() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(SEARCH_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "items": [{ "snippet": "found something" }] })),
            )
            .expect(1)
            .mount(&server)
            .await;
        mount_model(&server, "Summary: Found.\nConfidence: Medium", 1).await;

        let records = vec![
            record("Jane", "Doe", "CA"),
            record("John", "Roe", "NY"),
            record("Ana", "Lopez", "FL"),
        ];
        let mut stats = stats();
        let out = enricher(&server, 1)
            .enrich_records(&records, &mut stats, &SilentProgress)
            .await;

        assert_eq!(out.len(), 3);
        assert_eq!(out[0].digested_summary, "Found. (Confidence: Medium)");
        for later in &out[1..] {
            assert_eq!(later.raw_data, "No data");
            assert_eq!(later.digested_summary, "N/A");
            assert!(!later.raw_data.contains("limit"));
        }
        assert_eq!(stats.searches_issued, 1);
        assert_eq!(stats.quota_skipped, 2);
        assert_eq!(stats.records, 3);
    }

    #[tokio::test]
    async fn records_keep_input_order() {
        let server = MockServer::start().await;
        mount_search(&server, "\"A One\" CA", &["a"]).await;
        mount_search(&server, "\"B Two\" NY", &[]).await;
        mount_search(&server, "\"C Three\" TX", &["c"]).await;
        mount_model(&server, "Summary: ok\nConfidence: High", 2).await;

        let records = vec![
            record("A", "One", "CA"),
            record("B", "Two", "NY"),
            record("C", "Three", "TX"),
        ];
        let mut stats = stats();
        let out = enricher(&server, 10)
            .enrich_records(&records, &mut stats, &SilentProgress)
            .await;

        let names: Vec<String> = out.iter().map(|r| r.record.full_name()).collect();
        assert_eq!(names, vec!["A One", "B Two", "C Three"]);
        assert_eq!(out[0].raw_data, "a");
        assert_eq!(out[1].raw_data, "No data");
        assert_eq!(out[2].raw_data, "c");
    }

    #[tokio::test]
    async fn enrich_file_end_to_end() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(SEARCH_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": [] })))
            .mount(&server)
            .await;

        let mut app = AppConfig::default();
        app.search.endpoint = format!("{}{SEARCH_PATH}", server.uri());
        app.search.delay_ms = 0;
        app.model.api_base = format!("{}/v1", server.uri());

        let dir = std::env::temp_dir().join(format!("clientintel-e2e-{}", RunId::new()));
        let config = EnrichFileConfig {
            input: Path::new("../../../fixtures/csv/clients.fixture.csv").to_path_buf(),
            output: dir.join("enriched.csv"),
            report: Some(dir.join("report.json")),
            app,
        };
        let credentials = Credentials {
            search_api_key: "g-key".into(),
            search_engine_id: "cx".into(),
            model_api_key: "sk-test".into(),
        };

        let stats = enrich_file(&config, &credentials, &SilentProgress)
            .await
            .expect("run");
        assert_eq!(stats.records, 3);
        assert_eq!(stats.no_evidence, 3);
        assert!(stats.finished_at.is_some());

        let output = std::fs::read_to_string(&config.output).expect("output csv");
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("Client ID,First Name,Last Name,State,Advisor,Full Name"));
        assert!(lines[1].starts_with("1001,Jane,Doe,CA,Kim,Jane Doe,No data,N/A,N/A,"));
        assert!(lines[3].starts_with("1003,,Nguyen,WA,Lee,"));
        assert!(lines[3].contains("Nguyen,No data,N/A,N/A,"));

        let report = std::fs::read_to_string(dir.join("report.json")).expect("report");
        let report: serde_json::Value = serde_json::from_str(&report).expect("json");
        assert_eq!(report["records"], 3);
        assert_eq!(report["model"], "gpt-3.5-turbo");

        let _ = std::fs::remove_dir_all(&dir);
    }

    async fn query_sent_with(use_filters: bool) -> (String, u32) {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(SEARCH_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": [] })))
            .expect(1)
            .mount(&server)
            .await;

        let mut app = AppConfig::default();
        app.search.endpoint = format!("{}{SEARCH_PATH}", server.uri());
        app.search.delay_ms = 0;
        app.model.api_base = format!("{}/v1", server.uri());
        app.pipeline.use_filters = use_filters;
        let credentials = Credentials {
            search_api_key: "g-key".into(),
            search_engine_id: "cx".into(),
            model_api_key: "sk-test".into(),
        };

        let enricher = Enricher::from_config(&app, &credentials).expect("enricher");
        let mut stats = stats();
        enricher
            .enrich_record(&record("Jane", "Doe", "CA"), &mut stats)
            .await;

        let requests = server.received_requests().await.expect("recording enabled");
        let q = requests[0]
            .url
            .query_pairs()
            .find(|(k, _)| k == "q")
            .map(|(_, v)| v.into_owned())
            .expect("q param");
        (q, enricher.search().quota().used())
    }

    #[tokio::test]
    async fn configured_filters_reach_the_search_request() {
        let (q, used) = query_sent_with(true).await;

        assert!(q.starts_with("\"Jane Doe\" CA ("), "{q}");
        assert!(q.contains("(obituary OR wedding OR "), "{q}");
        assert!(q.contains("OR relocated)"), "{q}");
        assert!(
            q.ends_with("(site:linkedin.com OR site:legacy.com OR site:theknot.com OR site:zillow.com OR site:patch.com)"),
            "{q}"
        );
        assert_eq!(used, 1);
    }

    #[tokio::test]
    async fn disabled_filters_search_by_name_and_state_only() {
        let (q, used) = query_sent_with(false).await;

        assert_eq!(q, "\"Jane Doe\" CA");
        assert_eq!(used, 1);
    }
}
