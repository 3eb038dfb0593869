//! Table file formats
//!
//! Each format implements [`TableFormat`]: decoding is mandatory, encoding is
//! optional. A [`FormatRegistry`] maps format ids and file extensions to
//! implementations, so new formats can be added without touching the reader,
//! the writer or the pipeline.

pub mod csv;
pub mod dbf;
pub mod json;

use crate::error::Result;
use crate::progress::ProgressSink;
use crate::table::Table;
use std::borrow::Cow;
use std::path::Path;

pub use self::csv::CsvFormat;
pub use self::dbf::DbfFormat;
pub use self::json::JsonFormat;

/// A table file format
pub trait TableFormat: Send + Sync {
    /// Short identifier, e.g. "csv"
    fn id(&self) -> &'static str;

    /// File extensions (lowercase, without dot) handled by this format
    fn extensions(&self) -> &'static [&'static str];

    /// Whether the first bytes of a file look like this format
    fn sniff(&self, head: &[u8]) -> bool;

    /// Decode a whole file into a table
    fn decode(&self, bytes: &[u8], source: &Path, progress: &mut dyn ProgressSink)
        -> Result<Table>;

    /// Whether [`TableFormat::encode`] is supported
    fn can_encode(&self) -> bool {
        false
    }

    /// Encode a table into the bytes of a file
    fn encode(&self, table: &Table, _progress: &mut dyn ProgressSink) -> Result<Vec<u8>> {
        Err(crate::error::Error::UnsupportedOutputFormat {
            path: table.source_path.clone(),
            format: self.id().to_string(),
        })
    }
}

/// Registry of known formats, in sniffing order
pub struct FormatRegistry {
    formats: Vec<Box<dyn TableFormat>>,
}

impl FormatRegistry {
    /// Create an empty registry
    pub fn empty() -> Self {
        Self {
            formats: Vec::new(),
        }
    }

    /// Registry with the built-in formats
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(DbfFormat));
        registry.register(Box::new(JsonFormat));
        registry.register(Box::new(CsvFormat));
        registry
    }

    /// Add a format; a format with the same id is replaced
    pub fn register(&mut self, format: Box<dyn TableFormat>) {
        self.formats.retain(|f| f.id() != format.id());
        self.formats.push(format);
    }

    /// Look up a format by id (case-insensitive)
    pub fn by_id(&self, id: &str) -> Option<&dyn TableFormat> {
        self.formats
            .iter()
            .find(|f| f.id().eq_ignore_ascii_case(id))
            .map(|f| f.as_ref())
    }

    /// Look up a format by the extension of `path`
    pub fn for_path(&self, path: &Path) -> Option<&dyn TableFormat> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        self.formats
            .iter()
            .find(|f| f.extensions().contains(&ext.as_str()))
            .map(|f| f.as_ref())
    }

    /// First format whose sniffer accepts `head`
    pub fn sniff(&self, head: &[u8]) -> Option<&dyn TableFormat> {
        self.formats
            .iter()
            .find(|f| f.sniff(head))
            .map(|f| f.as_ref())
    }

    /// All registered formats
    pub fn iter(&self) -> impl Iterator<Item = &dyn TableFormat> {
        self.formats.iter().map(|f| f.as_ref())
    }

    /// All extensions handled by some format
    pub fn extensions(&self) -> Vec<&'static str> {
        self.formats
            .iter()
            .flat_map(|f| f.extensions().iter().copied())
            .collect()
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Decode text as UTF-8 (dropping a BOM), falling back to Latin-1
pub fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(s) => Cow::Borrowed(s),
        Err(_) => Cow::Owned(bytes.iter().map(|&b| b as char).collect()),
    }
}
