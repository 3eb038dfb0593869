//! Parsing of the raw SIM fields the augmenters read

use crate::table::CellValue;
use chrono::NaiveDate;

/// Death date in `ddmmyyyy` form
///
/// Spreadsheets drop the leading zero of days 1 to 9, so 7-digit values are
/// padded back. ISO dates (`yyyy-mm-dd`, as produced for dBase date fields)
/// are accepted too.
pub fn parse_date(cell: &CellValue) -> Option<NaiveDate> {
    let mut text = cell.to_string_value().trim().to_string();
    if text.len() == 7 {
        text.insert(0, '0');
    }
    NaiveDate::parse_from_str(&text, "%d%m%Y")
        .or_else(|_| NaiveDate::parse_from_str(&text, "%Y-%m-%d"))
        .ok()
}

/// Age in whole years from the coded `IDADE` field
///
/// The first digit is the unit and the rest the value: 0 to 2 are minutes,
/// hours and days (under one year), 3 is months, 4 is years and 5 is years
/// above 100.
pub fn parse_age_years(cell: &CellValue) -> Option<i64> {
    let text = cell.to_string_value();
    let text = text.trim();

    let mut chars = text.chars();
    let unit = chars.next()?.to_digit(10)?;
    let value: i64 = chars.as_str().parse().ok()?;

    match unit {
        0..=2 => Some(0),
        3 => Some(value / 12),
        4 => Some(value),
        5 => value.checked_add(100),
        _ => None,
    }
}

/// Normalized ICD-10 code: uppercase, without dots, a letter then digits
pub fn parse_icd(cell: &CellValue) -> Option<String> {
    let icd: String = cell
        .to_string_value()
        .trim()
        .to_uppercase()
        .chars()
        .filter(|&c| c != '.')
        .collect();

    let mut chars = icd.chars();
    let first = chars.next()?;
    let rest = chars.as_str();
    if first.is_ascii_uppercase() && rest.len() >= 2 && rest.bytes().all(|b| b.is_ascii_digit())
    {
        Some(icd)
    } else {
        None
    }
}

/// Integer field such as `CODBAIRES`
pub fn parse_int(cell: &CellValue) -> Option<i64> {
    cell.as_i64()
}
