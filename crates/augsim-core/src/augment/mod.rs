//! Augmentation engine: combines the input tables into one output table
//!
//! A run goes through three steps:
//! 1. each input is normalized to the current record [`Layout`]
//! 2. the normalized tables are merged with a [`CombineRule`]
//! 3. every registered [`Augmenter`] adds computed columns right after the
//!    column it reads from
//!
//! The engine borrows its inputs and returns a new table; the same inputs
//! always produce the same output.

pub mod combine;
pub mod sim;

use crate::error::{Error, Result};
use crate::progress::{NoProgress, ProgressSink};
use crate::table::{CellValue, Column, Row, Table};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub use combine::CombineRule;
pub use sim::Layout;

const PROGRESS_EVERY: usize = 1024;

/// Produces computed columns from the value of one source column
pub trait Augmenter: Send + Sync {
    /// Column the values are derived from
    fn source_column(&self) -> &'static str;

    /// Columns this augmenter can fill, in output order
    fn produces(&self) -> &'static [&'static str];

    /// Values for some of the produced columns; columns left out stay as they are
    fn derive(&self, source: &CellValue) -> Vec<(&'static str, CellValue)>;
}

/// How the engine is set up for a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AugmentConfig {
    /// Rule used to merge the input tables
    pub combine: CombineRule,
    /// Add the mortality (SIM) derived columns
    pub derive_sim_columns: bool,
    /// Record layout of the inputs; detected per table when absent
    pub layout: Option<Layout>,
}

impl Default for AugmentConfig {
    fn default() -> Self {
        Self {
            combine: CombineRule::default(),
            derive_sim_columns: true,
            layout: None,
        }
    }
}

/// Combines N tables into one and derives computed columns
pub struct AugmentationEngine {
    combine: CombineRule,
    layout: Option<Layout>,
    augmenters: Vec<Box<dyn Augmenter>>,
}

impl AugmentationEngine {
    /// An engine that only combines, with no derived columns
    pub fn new(combine: CombineRule) -> Self {
        Self {
            combine,
            layout: None,
            augmenters: Vec::new(),
        }
    }

    /// Build an engine from a run configuration
    pub fn from_config(config: &AugmentConfig) -> Self {
        let mut engine = Self::new(config.combine.clone());
        engine.layout = config.layout;
        if config.derive_sim_columns {
            engine.augmenters = sim::sim_augmenters();
        }
        engine
    }

    /// Add an augmenter; augmenters run in the order they were added
    pub fn with_augmenter(mut self, augmenter: Box<dyn Augmenter>) -> Self {
        self.augmenters.push(augmenter);
        self
    }

    /// Augment the tables, in input order
    pub fn augment(&self, tables: &[Table]) -> Result<Table> {
        self.augment_with_progress(tables, &mut NoProgress)
    }

    /// Augment the tables, reporting rows processed while deriving columns
    pub fn augment_with_progress(
        &self,
        tables: &[Table],
        progress: &mut dyn ProgressSink,
    ) -> Result<Table> {
        if tables.is_empty() {
            return Err(Error::augmentation("no input tables"));
        }

        let normalized: Vec<Table> = tables
            .iter()
            .map(|table| {
                let layout = self.layout.unwrap_or_else(|| Layout::detect(table));
                tracing::debug!(source = %table.source_path.display(), ?layout, "normalizing");
                layout.normalize(table)
            })
            .collect();

        let combined = self.combine.combine(normalized)?;
        tracing::debug!(
            rule = ?self.combine,
            rows = combined.row_count(),
            columns = combined.column_count(),
            "combined inputs"
        );

        Ok(self.derive(combined, progress))
    }

    /// Insert the produced columns and fill them row by row
    fn derive(&self, table: Table, progress: &mut dyn ProgressSink) -> Table {
        // Output column names, each tagged with the input column it copies from
        let mut layout: Vec<(String, Option<usize>)> = table
            .columns
            .iter()
            .map(|c| (c.name.clone(), Some(c.index)))
            .collect();

        let mut active = Vec::new();
        for augmenter in &self.augmenters {
            let Some(source) = table.column_index(augmenter.source_column()) else {
                continue;
            };
            let Some(anchor) = layout
                .iter()
                .position(|(name, _)| name == augmenter.source_column())
            else {
                continue;
            };

            let mut at = anchor + 1;
            for &produced in augmenter.produces() {
                if !layout.iter().any(|(name, _)| name == produced) {
                    layout.insert(at, (produced.to_string(), None));
                    at += 1;
                }
            }
            active.push((augmenter.as_ref(), source));
        }

        if active.is_empty() {
            let total = table.rows.len() as u64;
            progress.advance(total, total);
            return table;
        }

        let mut positions: HashMap<&str, usize> = HashMap::new();
        for (i, (name, _)) in layout.iter().enumerate() {
            positions.entry(name.as_str()).or_insert(i);
        }

        let total = table.rows.len();
        let mut rows = Vec::with_capacity(total);
        for (done, row) in table.rows.iter().enumerate() {
            let mut cells: Vec<CellValue> = layout
                .iter()
                .map(|(_, from)| {
                    from.and_then(|i| row.get(i).cloned())
                        .unwrap_or(CellValue::Empty)
                })
                .collect();

            for (augmenter, source) in &active {
                let Some(value) = row.get(*source) else {
                    continue;
                };
                for (name, derived) in augmenter.derive(value) {
                    if let Some(&i) = positions.get(name) {
                        cells[i] = derived;
                    }
                }
            }
            rows.push(Row::new(cells));

            if (done + 1) % PROGRESS_EVERY == 0 {
                progress.advance((done + 1) as u64, total as u64);
            }
        }
        progress.advance(total as u64, total as u64);

        Table {
            columns: layout
                .into_iter()
                .enumerate()
                .map(|(i, (name, _))| Column::new(name, i))
                .collect(),
            rows,
            source_path: table.source_path,
        }
    }
}

impl Default for AugmentationEngine {
    fn default() -> Self {
        Self::from_config(&AugmentConfig::default())
    }
}
