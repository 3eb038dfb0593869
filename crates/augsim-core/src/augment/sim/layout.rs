//! SIM record layouts
//!
//! Extracts published from December 2020 on name some fields differently
//! and store the age in plain years. Normalizing converts them to the
//! October 2020 layout the augmenters read.

use crate::table::{CellValue, Column, Row, Table};
use serde::{Deserialize, Serialize};

/// Columns that only appear in the December 2020 layout
const DEC2020_MARKERS: &[&str] = &["ANO_OBITO", "MES_OBITO", "CD_GEOCODI"];

/// Record layout of a SIM extract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    /// Layout of October 2020; already normalized
    Oct2020,
    /// Layout of December 2020
    Dec2020,
}

impl Layout {
    /// Guess the layout from the column names
    pub fn detect(table: &Table) -> Self {
        if DEC2020_MARKERS
            .iter()
            .any(|name| table.column_index(name).is_some())
        {
            Layout::Dec2020
        } else {
            Layout::Oct2020
        }
    }

    /// Parse a layout name as accepted on the command line
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "oct2020" | "10.2020" => Some(Layout::Oct2020),
            "dec2020" | "12.2020" => Some(Layout::Dec2020),
            _ => None,
        }
    }

    /// A copy of `table` in the October 2020 layout
    pub fn normalize(&self, table: &Table) -> Table {
        match self {
            Layout::Oct2020 => table.clone(),
            Layout::Dec2020 => normalize_dec2020(table),
        }
    }
}

fn normalize_dec2020(table: &Table) -> Table {
    let year = table.column_index("ANO_OBITO");
    let month = table.column_index("MES_OBITO");
    let age = table.column_index("IDADE");
    let geocode = table.column_index("CD_GEOCODI");
    // The neighbourhood code is cut out of the census sector code
    let neighbourhood_after = geocode.filter(|_| table.column_index("CODBAIRES").is_none());

    let mut names: Vec<String> = table
        .columns
        .iter()
        .map(|c| match c.name.as_str() {
            "ANO_OBITO" => "ANO".to_string(),
            "MES_OBITO" => "MES".to_string(),
            other => other.to_string(),
        })
        .collect();
    if let Some(at) = neighbourhood_after {
        names.insert(at + 1, "CODBAIRES".to_string());
    }

    let rows = table
        .rows
        .iter()
        .map(|row| {
            let mut cells = row.cells.clone();
            for idx in [year, month].into_iter().flatten() {
                cells[idx] = integer_or_empty(&cells[idx]);
            }
            if let Some(idx) = age {
                if let Some(coded) = cells[idx].as_i64().and_then(|y| y.checked_add(400)) {
                    cells[idx] = CellValue::Text(coded.to_string());
                }
            }
            if let Some(at) = neighbourhood_after {
                let code = neighbourhood_code(&cells[at]);
                cells.insert(at + 1, code);
            }
            Row::new(cells)
        })
        .collect();

    Table {
        columns: names
            .into_iter()
            .enumerate()
            .map(|(i, name)| Column::new(name, i))
            .collect(),
        rows,
        source_path: table.source_path.clone(),
    }
}

/// Integer cells stay, blanks become empty, anything else is kept as read
fn integer_or_empty(cell: &CellValue) -> CellValue {
    match cell.as_i64() {
        Some(n) => CellValue::Integer(n),
        None if cell.to_string_value().trim().is_empty() => CellValue::Empty,
        None => cell.clone(),
    }
}

/// Characters 8 and 9 of the census sector code
fn neighbourhood_code(geocode: &CellValue) -> CellValue {
    let code: String = geocode.to_string_value().chars().skip(7).take(2).collect();
    if code.is_empty() {
        CellValue::Empty
    } else {
        CellValue::Text(code)
    }
}
