//! Rules for merging several tables into one

use crate::error::{Error, Result};
use crate::table::{CellValue, Column, Row, Table};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

/// How input tables are merged
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum CombineRule {
    /// Append rows in input order under the union of the columns
    #[default]
    Concatenate,
    /// Merge rows that share the same value in `key`
    ///
    /// Later non-empty cells override earlier ones. Rows with an empty key
    /// are kept unmerged after the keyed rows.
    MergeOnKey { key: String },
}

impl CombineRule {
    /// Merge the tables; a single table is returned unchanged
    pub fn combine(&self, mut tables: Vec<Table>) -> Result<Table> {
        if tables.is_empty() {
            return Err(Error::augmentation("no input tables"));
        }

        if let CombineRule::MergeOnKey { key } = self {
            if let Some(table) = tables.iter().find(|t| t.column_index(key).is_none()) {
                return Err(Error::augmentation(format!(
                    "key column '{}' is missing from '{}'",
                    key,
                    table.source_path.display()
                )));
            }
        }

        if tables.len() == 1 {
            return Ok(tables.remove(0));
        }

        match self {
            CombineRule::Concatenate => Ok(concatenate(&tables)),
            CombineRule::MergeOnKey { key } => Ok(merge_on_key(&tables, key)),
        }
    }
}

/// A column name with its occurrence among same-named columns
type Slot = (String, usize);

/// Number each column by how many earlier columns share its name
fn slots(table: &Table) -> Vec<Slot> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    table
        .columns
        .iter()
        .map(|col| {
            let n = counts.entry(col.name.as_str()).or_insert(0);
            *n += 1;
            (col.name.clone(), *n - 1)
        })
        .collect()
}

/// Union of all columns, in first-seen order
///
/// A name repeated within a table keeps each of its columns; the k-th
/// occurrence in every table lands in the same output column.
fn union_columns(tables: &[Table]) -> Vec<Slot> {
    let mut union: Vec<Slot> = Vec::new();
    let mut seen: HashSet<Slot> = HashSet::new();

    for table in tables {
        for slot in slots(table) {
            if seen.insert(slot.clone()) {
                union.push(slot);
            }
        }
    }
    union
}

/// For each unified column, the index of the matching column in `table`
fn column_mapping(union: &[Slot], table: &Table) -> Vec<Option<usize>> {
    let positions: HashMap<Slot, usize> = slots(table)
        .into_iter()
        .enumerate()
        .map(|(i, slot)| (slot, i))
        .collect();
    union.iter().map(|slot| positions.get(slot).copied()).collect()
}

fn project(row: &Row, mapping: &[Option<usize>]) -> Vec<CellValue> {
    mapping
        .iter()
        .map(|from| {
            from.and_then(|i| row.get(i).cloned())
                .unwrap_or(CellValue::Empty)
        })
        .collect()
}

fn build(union: Vec<Slot>, rows: Vec<Vec<CellValue>>) -> Table {
    Table {
        columns: union
            .into_iter()
            .enumerate()
            .map(|(i, (name, _))| Column::new(name, i))
            .collect(),
        rows: rows.into_iter().map(Row::new).collect(),
        source_path: PathBuf::new(),
    }
}

fn concatenate(tables: &[Table]) -> Table {
    let union = union_columns(tables);

    let mut rows = Vec::with_capacity(tables.iter().map(Table::row_count).sum());
    for table in tables {
        let mapping = column_mapping(&union, table);
        rows.extend(table.rows.iter().map(|row| project(row, &mapping)));
    }

    build(union, rows)
}

fn merge_on_key(tables: &[Table], key: &str) -> Table {
    let union = union_columns(tables);

    // Rows in first-seen key order
    let mut keyed: Vec<Vec<CellValue>> = Vec::new();
    let mut index_of: HashMap<String, usize> = HashMap::new();
    let mut without_key: Vec<Vec<CellValue>> = Vec::new();

    for table in tables {
        let mapping = column_mapping(&union, table);
        let Some(key_idx) = table.column_index(key) else {
            continue;
        };

        for row in &table.rows {
            let cells = project(row, &mapping);
            let key_text = row
                .get(key_idx)
                .map(CellValue::to_string_value)
                .unwrap_or_default();

            if key_text.is_empty() {
                without_key.push(cells);
                continue;
            }

            match index_of.get(&key_text) {
                Some(&i) => {
                    // Override non-empty cells
                    for (j, cell) in cells.into_iter().enumerate() {
                        if !cell.is_empty() {
                            keyed[i][j] = cell;
                        }
                    }
                }
                None => {
                    index_of.insert(key_text, keyed.len());
                    keyed.push(cells);
                }
            }
        }
    }

    keyed.extend(without_key);
    build(union, keyed)
}
