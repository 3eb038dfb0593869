//! Income band of the residence neighbourhood

use super::values::parse_int;
use crate::augment::Augmenter;
use crate::table::CellValue;

/// Income band (1 high, 2 intermediate, 3 low) per neighbourhood code 1..=96
#[rustfmt::skip]
const INCOME_BAND: [u8; 97] = [
    0, 1, 1, 2, 2, 2, 1, 1, 1, 2,
    2, 3, 1, 3, 1, 1, 1, 3, 2, 3,
    2, 2, 3, 3, 3, 3, 1, 1, 3, 2,
    3, 3, 3, 1, 1, 1, 3, 2, 3, 2,
    2, 3, 3, 3, 1, 3, 2, 3, 1, 1,
    2, 1, 3, 1, 1, 1, 3, 2, 3, 3,
    2, 1, 3, 1, 2, 2, 2, 1, 2, 2,
    1, 1, 1, 2, 2, 3, 3, 3, 3, 1,
    2, 1, 1, 3, 1, 2, 3, 2, 2, 3,
    1, 2, 1, 2, 2, 2, 1,
];

/// Adds `AREARENDA` after `CODBAIRES`
#[derive(Debug, Default, Clone, Copy)]
pub struct NeighbourhoodAugmenter;

impl Augmenter for NeighbourhoodAugmenter {
    fn source_column(&self) -> &'static str {
        "CODBAIRES"
    }

    fn produces(&self) -> &'static [&'static str] {
        &["AREARENDA"]
    }

    fn derive(&self, source: &CellValue) -> Vec<(&'static str, CellValue)> {
        parse_int(source)
            .and_then(income_band)
            .map(|band| vec![("AREARENDA", CellValue::Integer(band.into()))])
            .unwrap_or_default()
    }
}

/// Income band of a neighbourhood, `None` for unknown codes
pub fn income_band(code: i64) -> Option<u8> {
    let idx = usize::try_from(code).ok()?;
    INCOME_BAND.get(idx).copied().filter(|&band| band != 0)
}
