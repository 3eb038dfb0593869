//! JSON table documents
//!
//! A document is `{"columns": ["a", ...], "rows": [[1, "x", null], ...]}`.
//! Cells map to JSON null, booleans, numbers and strings. Non-finite floats
//! have no JSON representation and are written as `null`.

use super::TableFormat;
use crate::error::{Error, Result};
use crate::progress::ProgressSink;
use crate::table::{CellValue, Table};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::path::Path;

/// JSON table documents
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonFormat;

#[derive(Serialize, Deserialize)]
struct Document {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl TableFormat for JsonFormat {
    fn id(&self) -> &'static str {
        "json"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["json"]
    }

    fn sniff(&self, head: &[u8]) -> bool {
        head.iter()
            .find(|b| !b.is_ascii_whitespace())
            .is_some_and(|&b| b == b'{')
    }

    fn decode(
        &self,
        bytes: &[u8],
        source: &Path,
        progress: &mut dyn ProgressSink,
    ) -> Result<Table> {
        let doc: Document = serde_json::from_slice(bytes)
            .map_err(|e| Error::invalid_content(source, e.to_string()))?;

        let total = doc.rows.len() as u64;
        let mut rows = Vec::with_capacity(doc.rows.len());
        for (i, row) in doc.rows.into_iter().enumerate() {
            let cells = row
                .into_iter()
                .map(|v| json_to_cell(v).ok_or(i))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|i| {
                    Error::invalid_content(source, format!("row {} holds a nested value", i + 1))
                })?;
            rows.push(cells);
        }
        progress.advance(total, total);

        Table::from_parts(source.to_path_buf(), doc.columns, rows)
            .map_err(|e| Error::invalid_content(source, e.to_string()))
    }

    fn can_encode(&self) -> bool {
        true
    }

    fn encode(&self, table: &Table, progress: &mut dyn ProgressSink) -> Result<Vec<u8>> {
        let total = table.rows.len() as u64;
        let doc = Document {
            columns: table.columns.iter().map(|c| c.name.clone()).collect(),
            rows: table
                .rows
                .iter()
                .map(|r| r.cells.iter().map(cell_to_json).collect())
                .collect(),
        };
        let bytes = serde_json::to_vec_pretty(&doc).map_err(|e| Error::Io(e.into()))?;
        progress.advance(total, total);
        Ok(bytes)
    }
}

fn json_to_cell(value: Value) -> Option<CellValue> {
    Some(match value {
        Value::Null => CellValue::Empty,
        Value::Bool(b) => CellValue::Boolean(b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => CellValue::Integer(i),
            None => CellValue::Float(n.as_f64()?),
        },
        Value::String(s) => CellValue::Text(s),
        Value::Array(_) | Value::Object(_) => return None,
    })
}

fn cell_to_json(cell: &CellValue) -> Value {
    match cell {
        CellValue::Integer(i) => Value::from(*i),
        CellValue::Float(f) => Number::from_f64(*f).map_or(Value::Null, Value::Number),
        CellValue::Boolean(b) => Value::Bool(*b),
        CellValue::Text(s) => Value::String(s.clone()),
        CellValue::Empty => Value::Null,
    }
}
