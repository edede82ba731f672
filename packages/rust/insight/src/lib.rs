//! Language-model insight extraction for client records.
//!
//! - [`InsightExtractor`]: prompt the model with a client's search snippets
//! - [`parse_response`]: read the `Summary/Tags/Confidence/Email` sections back
//! - [`materialize_tags`]: turn parsed tags into fixed boolean columns

mod client;
mod parser;
mod prompt;
mod tags;

use tracing::{debug, instrument, warn};

use clientintel_shared::{Result, TagVocabulary};

pub use client::{ChatClient, ModelOptions};
pub use parser::parse_response;
pub use prompt::{FALLBACK_RESPONSE, build_extraction_prompt};
pub use tags::materialize_tags;

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// What the extractor produced for one client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// No snippets and the model call was skipped.
    NoEvidence,
    /// Raw text returned by the model.
    Completed(String),
    /// The model call failed; holds [`FALLBACK_RESPONSE`].
    Fallback(String),
}

impl Extraction {
    /// Raw text to hand to [`parse_response`], if any.
    pub fn raw_text(&self) -> Option<&str> {
        match self {
            Self::NoEvidence => None,
            Self::Completed(text) | Self::Fallback(text) => Some(text),
        }
    }
}

// ---------------------------------------------------------------------------
// InsightExtractor
// ---------------------------------------------------------------------------

/// Builds the prompt for a client and calls the model once.
pub struct InsightExtractor {
    client: ChatClient,
    vocabulary: TagVocabulary,
    skip_without_evidence: bool,
}

impl InsightExtractor {
    /// By default a client with no snippets is not sent to the model.
    pub fn new(opts: ModelOptions, vocabulary: TagVocabulary) -> Result<Self> {
        Ok(Self {
            client: ChatClient::new(opts)?,
            vocabulary,
            skip_without_evidence: true,
        })
    }

    /// Whether to skip the model call when there are no snippets.
    pub fn skip_without_evidence(mut self, skip: bool) -> Self {
        self.skip_without_evidence = skip;
        self
    }

    pub fn vocabulary(&self) -> &TagVocabulary {
        &self.vocabulary
    }

    pub fn model(&self) -> &str {
        self.client.model()
    }

    /// Ask the model about one client.
    ///
    /// Model failures are logged and replaced by [`FALLBACK_RESPONSE`]; this
    /// never returns an error.
    #[instrument(skip_all, fields(snippets = snippets.len()))]
    pub async fn extract(&self, full_name: &str, snippets: &[String]) -> Extraction {
        if snippets.is_empty() && self.skip_without_evidence {
            debug!("no evidence, skipping model call");
            return Extraction::NoEvidence;
        }

        let prompt =
            build_extraction_prompt(full_name.trim(), &snippets.join("\n"), &self.vocabulary);

        match self.client.complete(&prompt).await {
            Ok(text) => Extraction::Completed(text),
            Err(e) => {
                warn!(error = %e, "model call failed, using fallback response");
                Extraction::Fallback(FALLBACK_RESPONSE.to_string())
            }
        }
    }
}
