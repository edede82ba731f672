//! Fixed prompt template and fallback response.
//!
//! The four section labels are a contract with [`crate::parse_response`]:
//! the template asks for them and the parser reads them back line by line.

use clientintel_shared::TagVocabulary;

/// Response substituted when the model call fails. Carries all four sections
/// so downstream parsing never special-cases failure.
pub const FALLBACK_RESPONSE: &str = "Summary: No major updates found.\n\
Tags: []\n\
Confidence: Low\n\
Email: Hi, I hope all is well. I wanted to check in and see if there is anything new we should review together.";

/// Build the extraction prompt for one client.
pub fn build_extraction_prompt(
    full_name: &str,
    evidence: &str,
    vocabulary: &TagVocabulary,
) -> String {
    let tags = vocabulary.labels().join(", ");
    let evidence = if evidence.trim().is_empty() {
        "(no public data found)"
    } else {
        evidence
    };

    format!(
        r#"You are assisting a financial advisor. A client named {full_name} appears in the following recent public data:

{evidence}

Tasks:
1. Summarize any life events (birth, death, marriage, move), job changes, or languages spoken.
2. Assign a confidence level for how well the data supports this: High / Medium / Low.
3. Choose tags only from this list: {tags}.
4. Write a warm, short outreach email referencing any key updates found.

Respond in exactly this format, one line per section:

Summary: <one-paragraph summary>
Tags: [<comma-separated tags, or empty>]
Confidence: <High|Medium|Low>
Email: <email body on a single line>"#
    )
}
