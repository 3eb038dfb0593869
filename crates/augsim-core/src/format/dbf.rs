//! dBase (DBF) table decoding
//!
//! Supports the dBase III family as exported by the mortality information
//! system. Only decoding is provided.
//!
//! Layout: a 32-byte header, 32-byte field descriptors terminated by `0x0D`,
//! then fixed-width records each starting with a deletion flag.

use super::{decode_text, TableFormat};
use crate::error::{Error, Result};
use crate::progress::ProgressSink;
use crate::table::{CellValue, Column, Row, Table};
use chrono::NaiveDate;
use std::path::Path;

const HEADER_LEN: usize = 32;
const DESCRIPTOR_LEN: usize = 32;
const DESCRIPTOR_END: u8 = 0x0D;
const DELETED: u8 = b'*';

/// Version bytes written by common dBase/FoxPro producers
const KNOWN_VERSIONS: [u8; 11] = [
    0x02, 0x03, 0x30, 0x31, 0x43, 0x63, 0x83, 0x8B, 0xCB, 0xF5, 0xFB,
];

/// dBase tables
#[derive(Debug, Default, Clone, Copy)]
pub struct DbfFormat;

impl TableFormat for DbfFormat {
    fn id(&self) -> &'static str {
        "dbf"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["dbf"]
    }

    fn sniff(&self, head: &[u8]) -> bool {
        if head.len() < HEADER_LEN || !KNOWN_VERSIONS.contains(&head[0]) {
            return false;
        }
        let header_len = u16::from_le_bytes([head[8], head[9]]) as usize;
        let record_len = u16::from_le_bytes([head[10], head[11]]) as usize;
        let (month, day) = (head[2], head[3]);
        header_len > HEADER_LEN
            && (header_len - HEADER_LEN - 1) % DESCRIPTOR_LEN == 0
            && record_len > 1
            && (1..=12).contains(&month)
            && (1..=31).contains(&day)
    }

    fn decode(
        &self,
        bytes: &[u8],
        source: &Path,
        progress: &mut dyn ProgressSink,
    ) -> Result<Table> {
        parse_dbf_bytes(bytes, source, progress)
    }
}

/// A field descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
struct Field {
    name: String,
    kind: u8,
    length: usize,
}

#[derive(Debug)]
struct Header {
    records: usize,
    header_len: usize,
    record_len: usize,
}

fn read_header(bytes: &[u8]) -> std::result::Result<Header, String> {
    if bytes.len() < HEADER_LEN {
        return Err("file is shorter than a DBF header".to_string());
    }
    let records = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
    let header_len = u16::from_le_bytes([bytes[8], bytes[9]]) as usize;
    let record_len = u16::from_le_bytes([bytes[10], bytes[11]]) as usize;
    if header_len <= HEADER_LEN || header_len > bytes.len() {
        return Err(format!("invalid header length {}", header_len));
    }
    if record_len == 0 {
        return Err("record length is zero".to_string());
    }
    Ok(Header {
        records,
        header_len,
        record_len,
    })
}

fn read_fields(bytes: &[u8], header: &Header) -> std::result::Result<Vec<Field>, String> {
    let mut fields = Vec::new();
    let mut offset = HEADER_LEN;
    while offset < header.header_len && bytes[offset] != DESCRIPTOR_END {
        let desc = bytes
            .get(offset..offset + DESCRIPTOR_LEN)
            .ok_or_else(|| "truncated field descriptor".to_string())?;
        let name_end = desc[..11].iter().position(|&b| b == 0).unwrap_or(11);
        let name = decode_text(&desc[..name_end]).trim().to_string();
        if name.is_empty() {
            return Err(format!("field {} has no name", fields.len() + 1));
        }
        fields.push(Field {
            name,
            kind: desc[11],
            length: desc[16] as usize,
        });
        offset += DESCRIPTOR_LEN;
    }
    if fields.is_empty() {
        return Err("no fields defined".to_string());
    }
    let width: usize = 1 + fields.iter().map(|f| f.length).sum::<usize>();
    if width != header.record_len {
        return Err(format!(
            "field widths add up to {} bytes but records are {} bytes",
            width, header.record_len
        ));
    }
    Ok(fields)
}

fn decode_field(field: &Field, raw: &[u8]) -> std::result::Result<CellValue, String> {
    let text = decode_text(raw);
    let trimmed = text.trim_matches(|c: char| c == ' ' || c == '\0');
    let value = match field.kind {
        b'C' => {
            let value = text.trim_end_matches([' ', '\0']);
            if value.trim().is_empty() {
                CellValue::Empty
            } else {
                CellValue::text(value)
            }
        }
        b'N' | b'F' => {
            if trimmed.is_empty() || trimmed.chars().all(|c| c == '*') {
                CellValue::Empty
            } else if let Ok(i) = trimmed.parse::<i64>() {
                CellValue::Integer(i)
            } else {
                trimmed
                    .parse::<f64>()
                    .map(CellValue::Float)
                    .map_err(|_| format!("field {} holds invalid number '{}'", field.name, trimmed))?
            }
        }
        b'L' => match trimmed.chars().next() {
            Some('T' | 't' | 'Y' | 'y') => CellValue::Boolean(true),
            Some('F' | 'f' | 'N' | 'n') => CellValue::Boolean(false),
            _ => CellValue::Empty,
        },
        b'D' => {
            if trimmed.is_empty() || trimmed.chars().all(|c| c == '0') {
                CellValue::Empty
            } else {
                NaiveDate::parse_from_str(trimmed, "%Y%m%d")
                    .map(|d| CellValue::text(d.format("%Y-%m-%d").to_string()))
                    .map_err(|_| format!("field {} holds invalid date '{}'", field.name, trimmed))?
            }
        }
        b'I' if raw.len() == 4 => {
            CellValue::Integer(i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as i64)
        }
        _ => {
            if trimmed.is_empty() {
                CellValue::Empty
            } else {
                CellValue::text(trimmed)
            }
        }
    };
    Ok(value)
}

/// Parse DBF file content into a Table
pub fn parse_dbf_bytes(
    bytes: &[u8],
    source: &Path,
    progress: &mut dyn ProgressSink,
) -> Result<Table> {
    let invalid = |message: String| Error::invalid_content(source, message);

    let header = read_header(bytes).map_err(invalid)?;
    let fields = read_fields(bytes, &header).map_err(invalid)?;

    for field in &fields {
        if !matches!(field.kind, b'C' | b'N' | b'F' | b'L' | b'D' | b'I') {
            tracing::warn!(
                path = %source.display(),
                field = %field.name,
                kind = %(field.kind as char),
                "unsupported DBF field type, decoding as text"
            );
        }
    }

    let columns: Vec<Column> = fields
        .iter()
        .enumerate()
        .map(|(i, f)| Column::new(f.name.clone(), i))
        .collect();

    let total = header.records as u64;
    let mut rows = Vec::with_capacity(header.records.min(bytes.len() / header.record_len));
    let mut deleted = 0usize;
    for n in 0..header.records {
        let start = header.header_len + n * header.record_len;
        let record = bytes
            .get(start..start + header.record_len)
            .ok_or_else(|| {
                invalid(format!(
                    "file ends after {} of {} records",
                    n, header.records
                ))
            })?;

        if record[0] == DELETED {
            deleted += 1;
            continue;
        }

        let mut cells = Vec::with_capacity(fields.len());
        let mut offset = 1;
        for field in &fields {
            let raw = &record[offset..offset + field.length];
            cells.push(decode_field(field, raw).map_err(|m| invalid(format!("record {}: {}", n + 1, m)))?);
            offset += field.length;
        }
        rows.push(Row::new(cells));

        if (n + 1) % 1024 == 0 {
            progress.advance(n as u64 + 1, total);
        }
    }
    progress.advance(total, total);

    if deleted > 0 {
        tracing::debug!(path = %source.display(), deleted, "skipped deleted DBF records");
    }

    Ok(Table {
        columns,
        rows,
        source_path: source.to_path_buf(),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::progress::NoProgress;

    /// Build a dBase III file from `(name, type, length)` fields and raw records
    pub(crate) fn build_dbf(fields: &[(&str, u8, u8)], records: &[(bool, Vec<Vec<u8>>)]) -> Vec<u8> {
        let record_len: usize = 1 + fields.iter().map(|f| f.2 as usize).sum::<usize>();
        let header_len = HEADER_LEN + fields.len() * DESCRIPTOR_LEN + 1;

        let mut out = vec![0u8; HEADER_LEN];
        out[0] = 0x03;
        out[1..4].copy_from_slice(&[121, 3, 15]);
        out[4..8].copy_from_slice(&(records.len() as u32).to_le_bytes());
        out[8..10].copy_from_slice(&(header_len as u16).to_le_bytes());
        out[10..12].copy_from_slice(&(record_len as u16).to_le_bytes());

        for (name, kind, len) in fields {
            let mut desc = [0u8; DESCRIPTOR_LEN];
            desc[..name.len()].copy_from_slice(name.as_bytes());
            desc[11] = *kind;
            desc[16] = *len;
            out.extend_from_slice(&desc);
        }
        out.push(DESCRIPTOR_END);

        for (deleted, values) in records {
            out.push(if *deleted { DELETED } else { b' ' });
            for ((_, _, len), value) in fields.iter().zip(values) {
                let mut cell = value.clone();
                cell.resize(*len as usize, b' ');
                out.extend_from_slice(&cell);
            }
        }
        out.push(0x1A);
        out
    }

    pub(crate) fn record(deleted: bool, values: &[&str]) -> (bool, Vec<Vec<u8>>) {
        (deleted, values.iter().map(|v| v.as_bytes().to_vec()).collect())
    }

    fn sample() -> Vec<u8> {
        build_dbf(
            &[
                ("DTOBITO", b'C', 8),
                ("IDADE", b'N', 3),
                ("PESO", b'N', 6),
                ("ASSISTMED", b'L', 1),
                ("DTCADASTR", b'D', 8),
            ],
            &[
                record(false, &["01022020", "465", "  72.5", "T", "20200210"]),
                record(true, &["02022020", "470", "", "F", ""]),
                record(false, &["", "", "", "?", "00000000"]),
            ],
        )
    }

    #[test]
    fn test_parse_dbf() {
        let table = parse_dbf_bytes(&sample(), Path::new("DOSP.dbf"), &mut NoProgress).unwrap();

        assert_eq!(
            table.column_names(),
            vec!["DTOBITO", "IDADE", "PESO", "ASSISTMED", "DTCADASTR"]
        );
        // deleted record skipped
        assert_eq!(table.row_count(), 2);
        assert_eq!(
            table.rows[0].cells,
            vec![
                CellValue::text("01022020"),
                CellValue::Integer(465),
                CellValue::Float(72.5),
                CellValue::Boolean(true),
                CellValue::text("2020-02-10"),
            ]
        );
        assert!(table.rows[1].cells.iter().all(CellValue::is_empty));
    }

    #[test]
    fn test_sniff_dbf() {
        assert!(DbfFormat.sniff(&sample()));
        assert!(!DbfFormat.sniff(b"ID,NAME\n1,foo\n"));
    }

    #[test]
    fn test_truncated_dbf_is_invalid() {
        let mut bytes = sample();
        bytes.truncate(bytes.len() - 20);
        let err = parse_dbf_bytes(&bytes, Path::new("x.dbf"), &mut NoProgress).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidOrUnsupportedContent);
    }

    #[test]
    fn test_invalid_number_is_invalid() {
        let bytes = build_dbf(&[("N", b'N', 3)], &[record(false, &["abc"])]);
        assert!(parse_dbf_bytes(&bytes, Path::new("x.dbf"), &mut NoProgress).is_err());
    }

    #[test]
    fn test_latin1_text() {
        let bytes = build_dbf(&[("NOME", b'C', 6)], &[(false, vec![b"Jo\xE3o".to_vec()])]);
        let table = parse_dbf_bytes(&bytes, Path::new("x.dbf"), &mut NoProgress).unwrap();
        assert_eq!(table.rows[0].cells[0], CellValue::text("Jo\u{E3}o"));
    }
}
