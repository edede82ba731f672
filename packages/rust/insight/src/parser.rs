//! Response Parser: recover labeled sections from free-form model text.
//!
//! Only single lines are read. A `Summary:` or `Email:` that wraps onto a
//! second line is cut at the first newline.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use clientintel_shared::ParsedInsight;

/// `Label: value`, tolerating case, surrounding whitespace, a leading list
/// bullet, and markdown bold around the label or the value.
static SECTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?:[-*•]\s+)?(?:\*\*)?(?i:(summary|tags|confidence|email))(?:\*\*)?\s*:(?:\s*\*\*)*\s*(.*?)(?:\*\*)?\s*$",
    )
    .expect("valid regex")
});

/// Parse a model response into a [`ParsedInsight`].
///
/// A matched label takes its trimmed remainder, even when empty. Missing or
/// unrecognized sections keep their defaults. `None` yields the defaults
/// outright. Never fails.
pub fn parse_response(raw: Option<&str>) -> ParsedInsight {
    let mut insight = ParsedInsight::default();
    let Some(raw) = raw else {
        return insight;
    };

    let mut matched = 0usize;
    for line in raw.lines() {
        let Some(caps) = SECTION_RE.captures(line) else {
            continue;
        };
        let label = caps[1].to_ascii_lowercase();
        let value = caps[2].trim();

        if value.is_empty() {
            debug!(section = %label, "empty section");
        }

        match label.as_str() {
            "tags" => insight.tags = parse_tags(value),
            "summary" => insight.summary = value.to_string(),
            "confidence" => insight.confidence = value.to_string(),
            "email" => insight.email = value.to_string(),
            _ => continue,
        }
        matched += 1;
    }

    if matched == 0 {
        warn!(
            chars = raw.len(),
            "model response had no labeled sections, using defaults"
        );
    }

    insight
}

/// `[A, B, C]` or `A, B, C` into a set of trimmed, non-empty labels.
fn parse_tags(value: &str) -> BTreeSet<String> {
    let inner = value.trim();
    let inner = inner.strip_prefix('[').unwrap_or(inner);
    let inner = inner.strip_suffix(']').unwrap_or(inner);

    inner
        .split(',')
        .map(|t| t.trim().trim_matches(|c| c == '"' || c == '\'').trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::FALLBACK_RESPONSE;

    fn tags(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|t| (*t).to_string()).collect()
    }

    #[test]
    fn recovers_all_four_sections() {
        let raw = "Summary: Jane started a new role.\n\
                   Tags: [NEW JOB, LANGUAGE: SPANISH]\n\
                   Confidence: High\n\
                   Email: Hi Jane, congrats on the new role!";
        let insight = parse_response(Some(raw));

        assert_eq!(insight.summary, "Jane started a new role.");
        assert_eq!(insight.tags, tags(&["NEW JOB", "LANGUAGE: SPANISH"]));
        assert_eq!(insight.confidence, "High");
        assert_eq!(insight.email, "Hi Jane, congrats on the new role!");
    }

    #[test]
    fn none_yields_defaults() {
        assert_eq!(parse_response(None), ParsedInsight::default());
    }

    #[test]
    fn unlabeled_text_yields_defaults() {
        let insight = parse_response(Some("I could not find anything useful.\nSorry!"));
        assert_eq!(insight, ParsedInsight::default());
    }

    #[test]
    fn missing_sections_keep_defaults() {
        let insight = parse_response(Some("Summary: Moved to Austin.\nConfidence: Medium"));
        assert_eq!(insight.summary, "Moved to Austin.");
        assert_eq!(insight.confidence, "Medium");
        assert!(insight.tags.is_empty());
        assert_eq!(insight.email, "N/A");
    }

    #[test]
    fn labels_tolerate_case_bullets_and_bold() {
        let raw = "- summary: Retired in May.\n\
                   * TAGS : HIGH PRIORITY\n\
                   **Confidence:** medium\n\
                   **Email**: Hi there!";
        let insight = parse_response(Some(raw));
        assert_eq!(insight.summary, "Retired in May.");
        assert_eq!(insight.tags, tags(&["HIGH PRIORITY"]));
        assert_eq!(insight.confidence, "medium");
        assert_eq!(insight.email, "Hi there!");
    }

    #[test]
    fn multi_line_sections_are_cut_at_first_newline() {
        let raw = "Summary: First line.\nsecond line of summary\nEmail: Dear Jane,\nBest regards";
        let insight = parse_response(Some(raw));
        assert_eq!(insight.summary, "First line.");
        assert_eq!(insight.email, "Dear Jane,");
    }

    #[test]
    fn empty_section_assigns_empty_value() {
        let insight = parse_response(Some("Summary:\nConfidence:   \nEmail: Hi"));
        assert_eq!(insight.summary, "");
        assert_eq!(insight.confidence, "");
        assert_eq!(insight.email, "Hi");
    }

    #[test]
    fn absent_section_keeps_default() {
        let insight = parse_response(Some("Tags: [MOVED]"));
        assert_eq!(insight.summary, "N/A");
        assert_eq!(insight.confidence, "Low");
        assert_eq!(insight.email, "N/A");
    }

    #[test]
    fn bold_values_are_unwrapped() {
        let insight = parse_response(Some("**Confidence**: **Low**\n**Summary:** **Moved to Ohio.**"));
        assert_eq!(insight.confidence, "Low");
        assert!(insight.is_low_confidence());
        assert_eq!(insight.summary, "Moved to Ohio.");
    }

    #[test]
    fn label_inside_text_is_not_a_section() {
        let insight = parse_response(Some("Note that the Summary: field is empty"));
        assert_eq!(insight.summary, "N/A");
    }

    #[test]
    fn tag_list_variants() {
        assert_eq!(parse_tags("[]"), BTreeSet::new());
        assert_eq!(parse_tags(""), BTreeSet::new());
        assert_eq!(parse_tags("[ , ,]"), BTreeSet::new());
        assert_eq!(parse_tags("NEW JOB"), tags(&["NEW JOB"]));
        assert_eq!(
            parse_tags(r#"["NEW JOB", 'MOVED']"#),
            tags(&["NEW JOB", "MOVED"])
        );
        assert_eq!(
            parse_tags("[MOVED, MOVED, FAMILY EXPANSION]"),
            tags(&["MOVED", "FAMILY EXPANSION"])
        );
    }

    #[test]
    fn fallback_parses_to_stable_values() {
        let first = parse_response(Some(FALLBACK_RESPONSE));
        let second = parse_response(Some(FALLBACK_RESPONSE));

        assert_eq!(first, second);
        assert_eq!(first.summary, "No major updates found.");
        assert!(first.tags.is_empty());
        assert_eq!(first.confidence, "Low");
        assert!(first.email.starts_with("Hi,"));
    }

    #[test]
    fn windows_line_endings() {
        let insight = parse_response(Some("Summary: Moved.\r\nConfidence: High\r\n"));
        assert_eq!(insight.summary, "Moved.");
        assert_eq!(insight.confidence, "High");
    }
}
