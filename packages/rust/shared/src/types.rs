//! Core domain types for client enrichment runs.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ClientIntelError, Result};

/// Summary used when the model text has no `Summary:` line.
pub const DEFAULT_SUMMARY: &str = "N/A";

/// Confidence used when the model text has no `Confidence:` line.
pub const DEFAULT_CONFIDENCE: &str = "Low";

/// Email used when the model text has no `Email:` line.
pub const DEFAULT_EMAIL: &str = "N/A";

/// Default tag vocabulary, in output column order.
pub const DEFAULT_TAGS: &[&str] = &[
    "HIGH PRIORITY",
    "NEW JOB",
    "FAMILY EXPANSION",
    "MOVED",
    "LANGUAGE: SPANISH",
    "CONFIDENCE: LOW",
];

/// Tag raised whenever the model reports low confidence.
pub const DEFAULT_LOW_CONFIDENCE_TAG: &str = "CONFIDENCE: LOW";

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one enrichment run (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// ClientRecord
// ---------------------------------------------------------------------------

/// One input row. Name and state are pulled out of the configured columns;
/// `cells` keeps the full row so the sink can pass it through unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientRecord {
    /// First name (empty when the column or cell is missing).
    pub first_name: String,
    /// Last name (empty when the column or cell is missing).
    pub last_name: String,
    /// State (empty when the column or cell is missing).
    pub state: String,
    /// Every original cell, in input column order.
    pub cells: Vec<String>,
}

impl ClientRecord {
    /// `first_name + " " + last_name`. Never fails; may be a lone space.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

// ---------------------------------------------------------------------------
// ParsedInsight
// ---------------------------------------------------------------------------

/// Fields recovered from one model response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedInsight {
    pub summary: String,
    pub tags: BTreeSet<String>,
    /// `High`, `Medium` or `Low` when the model follows the format; kept
    /// verbatim otherwise.
    pub confidence: String,
    pub email: String,
}

impl Default for ParsedInsight {
    fn default() -> Self {
        Self {
            summary: DEFAULT_SUMMARY.into(),
            tags: BTreeSet::new(),
            confidence: DEFAULT_CONFIDENCE.into(),
            email: DEFAULT_EMAIL.into(),
        }
    }
}

impl ParsedInsight {
    /// Whether the confidence label reads "low" (case-insensitive).
    pub fn is_low_confidence(&self) -> bool {
        self.confidence.trim().eq_ignore_ascii_case("low")
    }
}

// ---------------------------------------------------------------------------
// TagVocabulary
// ---------------------------------------------------------------------------

/// Fixed, ordered list of tag labels. Defines the boolean output columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagVocabulary {
    labels: Vec<String>,
    low_confidence_tag: Option<String>,
}

impl TagVocabulary {
    /// Build a vocabulary. Labels must be non-empty and unique, and the
    /// low-confidence tag (if any) must be one of them.
    pub fn new(labels: Vec<String>, low_confidence_tag: Option<String>) -> Result<Self> {
        let mut seen = BTreeSet::new();
        for label in &labels {
            if label.trim().is_empty() {
                return Err(ClientIntelError::validation("tag labels must not be blank"));
            }
            if !seen.insert(label.as_str()) {
                return Err(ClientIntelError::validation(format!(
                    "duplicate tag label: {label}"
                )));
            }
        }

        if let Some(low) = &low_confidence_tag {
            if !labels.contains(low) {
                return Err(ClientIntelError::validation(format!(
                    "low-confidence tag '{low}' is not in the tag vocabulary"
                )));
            }
        }

        Ok(Self {
            labels,
            low_confidence_tag,
        })
    }

    /// Labels in column order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// The tag raised by a low confidence rating, if configured.
    pub fn low_confidence_tag(&self) -> Option<&str> {
        self.low_confidence_tag.as_deref()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl Default for TagVocabulary {
    fn default() -> Self {
        Self {
            labels: DEFAULT_TAGS.iter().map(|t| (*t).to_string()).collect(),
            low_confidence_tag: Some(DEFAULT_LOW_CONFIDENCE_TAG.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// TagFlags / EnrichedRecord
// ---------------------------------------------------------------------------

/// One boolean per vocabulary entry, in vocabulary order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagFlags(pub Vec<(String, bool)>);

impl TagFlags {
    /// Flag for `label`, or `None` when the label is not in the vocabulary.
    pub fn get(&self, label: &str) -> Option<bool> {
        self.0.iter().find(|(l, _)| l == label).map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.0.iter().map(|(l, v)| (l.as_str(), *v))
    }

    /// Labels whose flag is set.
    pub fn raised(&self) -> Vec<&str> {
        self.iter().filter(|(_, v)| *v).map(|(l, _)| l).collect()
    }
}

/// An input record plus every derived column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichedRecord {
    pub record: ClientRecord,
    /// Snippets joined by newlines, or `No data`.
    pub raw_data: String,
    /// Summary with a confidence annotation.
    pub digested_summary: String,
    pub outreach_email: String,
    pub tag_flags: TagFlags,
}
