//! Tag Materializer: parsed tags onto the fixed vocabulary columns.

use clientintel_shared::{ParsedInsight, TagFlags, TagVocabulary};

/// One flag per vocabulary entry, in vocabulary order.
///
/// An entry is set when the model listed it (ASCII case-insensitive). The
/// vocabulary's low-confidence tag is also set whenever the confidence reads
/// "low", listed or not.
pub fn materialize_tags(insight: &ParsedInsight, vocabulary: &TagVocabulary) -> TagFlags {
    let low_tag = vocabulary.low_confidence_tag();

    let flags = vocabulary
        .labels()
        .iter()
        .map(|label| {
            let listed = insight.tags.iter().any(|t| t.eq_ignore_ascii_case(label));
            let low = low_tag == Some(label.as_str()) && insight.is_low_confidence();
            (label.clone(), listed || low)
        })
        .collect();

    TagFlags(flags)
}
