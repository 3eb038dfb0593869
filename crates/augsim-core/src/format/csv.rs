//! CSV reading and writing
//!
//! Reading sniffs the delimiter from the header line and infers cell types.
//! Writing always uses `,` and quotes every non-numeric field.
//!
//! Coercions on a write/read cycle: text that looks like a number or a
//! boolean comes back as that type, and surrounding whitespace is trimmed.
//! Numbers with a leading zero ("08") are read as text, so codes survive.
//! Non-finite floats are written as `NaN`/`inf` and read back as text.

use super::{decode_text, TableFormat};
use crate::error::{Error, Result};
use crate::progress::ProgressSink;
use crate::table::{CellValue, Column, Row, Table};
use csv::{QuoteStyle, ReaderBuilder, WriterBuilder};
use std::path::Path;

const DELIMITERS: [u8; 4] = [b',', b';', b'\t', b'|'];

/// Comma-separated values
#[derive(Debug, Default, Clone, Copy)]
pub struct CsvFormat;

impl TableFormat for CsvFormat {
    fn id(&self) -> &'static str {
        "csv"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["csv", "txt"]
    }

    fn sniff(&self, head: &[u8]) -> bool {
        let text = decode_text(head);
        let first_line = text.lines().next().unwrap_or("");
        !first_line.is_empty()
            && first_line.chars().all(|c| !c.is_control() || c == '\t')
            && DELIMITERS.iter().any(|&d| first_line.contains(d as char))
    }

    fn decode(
        &self,
        bytes: &[u8],
        source: &Path,
        progress: &mut dyn ProgressSink,
    ) -> Result<Table> {
        parse_csv_bytes(bytes, source, progress)
    }

    fn can_encode(&self) -> bool {
        true
    }

    fn encode(&self, table: &Table, progress: &mut dyn ProgressSink) -> Result<Vec<u8>> {
        write_csv_bytes(table, progress)
    }
}

/// Pick the delimiter that occurs most often in the header line
pub fn sniff_delimiter(text: &str) -> u8 {
    let header = text.lines().next().unwrap_or("");
    DELIMITERS
        .iter()
        .copied()
        .map(|d| (d, header.matches(d as char).count()))
        .filter(|&(_, n)| n > 0)
        // max_by_key keeps the last maximum; reverse so ',' wins ties
        .rev()
        .max_by_key(|&(_, n)| n)
        .map(|(d, _)| d)
        .unwrap_or(b',')
}

/// Parse CSV file content into a Table
pub fn parse_csv_bytes(
    bytes: &[u8],
    source: &Path,
    progress: &mut dyn ProgressSink,
) -> Result<Table> {
    let text = decode_text(bytes);
    let total = text.len() as u64;
    let delimiter = sniff_delimiter(&text);

    let mut csv_reader = ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .flexible(true) // Allow varying number of fields
        .from_reader(text.as_bytes());

    // Parse headers into columns
    let headers = csv_reader
        .headers()
        .map_err(|e| Error::invalid_content(source, e.to_string()))?;

    let columns: Vec<Column> = headers
        .iter()
        .enumerate()
        .map(|(i, name)| Column::new(name.trim().to_string(), i))
        .collect();

    if columns.is_empty() || columns.iter().all(|c| c.name.is_empty()) {
        return Err(Error::invalid_content(source, "no columns found in CSV"));
    }

    // Parse rows
    let mut rows = Vec::new();
    let mut ragged = 0usize;
    for result in csv_reader.records() {
        let record = result.map_err(|e| Error::invalid_content(source, e.to_string()))?;

        let mut cells: Vec<CellValue> = record.iter().map(CellValue::parse).collect();

        // Pad with empty cells if row is shorter than header, truncate if longer
        if cells.len() != columns.len() {
            ragged += 1;
            cells.resize(columns.len(), CellValue::Empty);
        }

        rows.push(Row::new(cells));

        if rows.len() % 1024 == 0 {
            let done = record.position().map(|p| p.byte()).unwrap_or(0);
            progress.advance(done, total);
        }
    }
    progress.advance(total, total);

    if ragged > 0 {
        tracing::warn!(
            path = %source.display(),
            rows = ragged,
            "rows with a cell count different from the header were padded or truncated"
        );
    }

    Ok(Table {
        columns,
        rows,
        source_path: source.to_path_buf(),
    })
}

/// Parse CSV from a string (useful for testing)
pub fn parse_csv_str(content: &str, source_name: &str) -> Result<Table> {
    parse_csv_bytes(
        content.as_bytes(),
        Path::new(source_name),
        &mut crate::progress::NoProgress,
    )
}

/// Serialize a table as CSV
pub fn write_csv_bytes(table: &Table, progress: &mut dyn ProgressSink) -> Result<Vec<u8>> {
    let mut writer = WriterBuilder::new()
        .delimiter(b',')
        .quote_style(QuoteStyle::NonNumeric)
        .from_writer(Vec::new());

    let header: Vec<&str> = table.columns.iter().map(|c| c.name.as_str()).collect();
    writer.write_record(&header).map_err(csv_to_io)?;

    let total = table.rows.len() as u64;
    for (i, row) in table.rows.iter().enumerate() {
        writer
            .write_record(row.cells.iter().map(CellValue::to_string_value))
            .map_err(csv_to_io)?;
        if (i + 1) % 1024 == 0 {
            progress.advance(i as u64 + 1, total);
        }
    }
    progress.advance(total, total);

    writer
        .into_inner()
        .map_err(|e| Error::Io(std::io::Error::other(e.to_string())))
}

fn csv_to_io(err: csv::Error) -> Error {
    Error::Io(err.into())
}
