//! Record Source: read client rows from CSV.

use std::io::Read;
use std::path::Path;

use tracing::{debug, info, instrument, warn};

use clientintel_shared::{ClientIntelError, ClientRecord, ColumnsConfig, Result};

use crate::ClientTable;

/// Read a client table from a CSV file on disk.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn read_clients_from_path(path: &Path, columns: &ColumnsConfig) -> Result<ClientTable> {
    let file = std::fs::File::open(path).map_err(|e| ClientIntelError::io(path, e))?;
    let table = read_clients(file, columns)?;
    info!(rows = table.records.len(), "client table loaded");
    Ok(table)
}

/// Read a client table from any CSV source with a header row.
///
/// Name and state come from the configured columns; a missing column or cell
/// yields an empty string. Rows are normalized to the header width so every
/// original cell can be written back out unchanged.
pub fn read_clients<R: Read>(source: R, columns: &ColumnsConfig) -> Result<ClientTable> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(source);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| ClientIntelError::input(format!("failed to read header row: {e}")))?
        .iter()
        .map(str::to_string)
        .collect();

    if headers.is_empty() {
        return Err(ClientIntelError::input("input table has no header row"));
    }

    let first_idx = column_index(&headers, &columns.first_name);
    let last_idx = column_index(&headers, &columns.last_name);
    let state_idx = column_index(&headers, &columns.state);

    for (name, idx) in [
        (&columns.first_name, first_idx),
        (&columns.last_name, last_idx),
        (&columns.state, state_idx),
    ] {
        if idx.is_none() {
            warn!(column = %name, "input column missing, using empty values");
        }
    }

    let mut records = Vec::new();
    for (row_idx, result) in reader.records().enumerate() {
        let row = result.map_err(|e| {
            ClientIntelError::input(format!("failed to read row {}: {e}", row_idx + 1))
        })?;

        if row.len() > headers.len() {
            warn!(
                row = row_idx + 1,
                cells = row.len(),
                columns = headers.len(),
                "row has more cells than headers, extra cells dropped"
            );
        }

        let mut cells: Vec<String> = row.iter().take(headers.len()).map(str::to_string).collect();
        cells.resize(headers.len(), String::new());

        let cell = |idx: Option<usize>| {
            idx.and_then(|i| cells.get(i))
                .map(|s| s.trim().to_string())
                .unwrap_or_default()
        };

        let first_name = cell(first_idx);
        let last_name = cell(last_idx);
        let state = cell(state_idx);

        let record = ClientRecord {
            first_name,
            last_name,
            state,
            cells,
        };
        debug!(row = row_idx + 1, name = %record.full_name(), "read client row");
        records.push(record);
    }

    Ok(ClientTable { headers, records })
}

/// Locate a column by header, exact match first, then case-insensitive.
fn column_index(headers: &[String], name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|h| h.trim() == name)
        .or_else(|| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        })
}
