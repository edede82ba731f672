//! Record Sink: write the enriched table as CSV.

use std::io::Write;
use std::path::Path;

use tracing::{info, instrument};

use clientintel_shared::{ClientIntelError, EnrichedRecord, Result, TagVocabulary};

/// Derived column holding `first + " " + last`.
pub const FULL_NAME_COLUMN: &str = "Full Name";
/// Derived column holding the joined snippets.
pub const RAW_DATA_COLUMN: &str = "Raw Data Found";
/// Derived column holding the summary with its confidence annotation.
pub const SUMMARY_COLUMN: &str = "Digested Summary";
/// Derived column holding the outreach email draft.
pub const EMAIL_COLUMN: &str = "Custom Email Template";

/// Write the enriched table to a CSV file, creating parent directories.
#[instrument(skip_all, fields(path = %path.display(), rows = records.len()))]
pub fn write_enriched_to_path(
    path: &Path,
    headers: &[String],
    records: &[EnrichedRecord],
    vocabulary: &TagVocabulary,
) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| ClientIntelError::io(parent, e))?;
    }

    let file = std::fs::File::create(path).map_err(|e| ClientIntelError::io(path, e))?;
    write_enriched(file, headers, records, vocabulary)?;
    info!("enriched table written");
    Ok(())
}

/// Serialize the enriched table: original columns first, then the derived
/// text columns, then one `true`/`false` column per tag.
///
/// A derived column whose name already exists in the input replaces that
/// column in place instead of being appended twice.
pub fn write_enriched<W: Write>(
    sink: W,
    headers: &[String],
    records: &[EnrichedRecord],
    vocabulary: &TagVocabulary,
) -> Result<()> {
    let layout = OutputLayout::new(headers, vocabulary);
    let mut writer = csv::Writer::from_writer(sink);

    writer
        .write_record(&layout.headers)
        .map_err(|e| ClientIntelError::output(format!("failed to write header row: {e}")))?;

    for (idx, enriched) in records.iter().enumerate() {
        let row = layout.row(enriched);
        writer.write_record(&row).map_err(|e| {
            ClientIntelError::output(format!("failed to write row {}: {e}", idx + 1))
        })?;
    }

    writer
        .flush()
        .map_err(|e| ClientIntelError::output(format!("failed to flush output: {e}")))?;

    Ok(())
}

/// Column positions for the derived fields.
struct OutputLayout {
    headers: Vec<String>,
    full_name: usize,
    raw_data: usize,
    summary: usize,
    email: usize,
    tags: Vec<(String, usize)>,
}

impl OutputLayout {
    fn new(input_headers: &[String], vocabulary: &TagVocabulary) -> Self {
        let mut headers = input_headers.to_vec();
        let mut slot = |name: &str| match headers.iter().position(|h| h == name) {
            Some(idx) => idx,
            None => {
                headers.push(name.to_string());
                headers.len() - 1
            }
        };

        let full_name = slot(FULL_NAME_COLUMN);
        let raw_data = slot(RAW_DATA_COLUMN);
        let summary = slot(SUMMARY_COLUMN);
        let email = slot(EMAIL_COLUMN);
        let tags = vocabulary
            .labels()
            .iter()
            .map(|label| (label.clone(), slot(label)))
            .collect();

        Self {
            headers,
            full_name,
            raw_data,
            summary,
            email,
            tags,
        }
    }

    fn row(&self, enriched: &EnrichedRecord) -> Vec<String> {
        let mut row = enriched.record.cells.clone();
        row.resize(self.headers.len(), String::new());

        row[self.full_name] = enriched.record.full_name();
        row[self.raw_data] = enriched.raw_data.clone();
        row[self.summary] = enriched.digested_summary.clone();
        row[self.email] = enriched.outreach_email.clone();
        for (label, idx) in &self.tags {
            let flag = enriched.tag_flags.get(label).unwrap_or(false);
            row[*idx] = flag.to_string();
        }

        row
    }
}
