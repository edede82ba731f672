//! CSV adapters at both ends of the enrichment pipeline.
//!
//! - [`read_clients`]: header row plus client rows
//! - [`write_enriched`]: original columns plus derived ones

mod reader;
mod writer;

use clientintel_shared::ClientRecord;

pub use reader::{read_clients, read_clients_from_path};
pub use writer::{
    EMAIL_COLUMN, FULL_NAME_COLUMN, RAW_DATA_COLUMN, SUMMARY_COLUMN, write_enriched,
    write_enriched_to_path,
};

/// A loaded input table.
#[derive(Debug, Clone)]
pub struct ClientTable {
    /// Header row, in input order.
    pub headers: Vec<String>,
    /// One record per data row, in input order.
    pub records: Vec<ClientRecord>,
}
