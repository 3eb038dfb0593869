//! Age in years and age groups

use super::values::parse_age_years;
use crate::augment::Augmenter;
use crate::table::CellValue;

/// Lower bounds of the `IDADECAT2` groups
const AGE_GROUP_BOUNDS: [i64; 8] = [0, 5, 20, 40, 60, 70, 80, 90];

/// Adds `IDADEGERAL, IDADECAT1, IDADECAT2` after `IDADE`
#[derive(Debug, Default, Clone, Copy)]
pub struct AgeAugmenter;

impl Augmenter for AgeAugmenter {
    fn source_column(&self) -> &'static str {
        "IDADE"
    }

    fn produces(&self) -> &'static [&'static str] {
        &["IDADEGERAL", "IDADECAT1", "IDADECAT2"]
    }

    fn derive(&self, source: &CellValue) -> Vec<(&'static str, CellValue)> {
        let Some(years) = parse_age_years(source) else {
            return Vec::new();
        };
        vec![
            ("IDADEGERAL", CellValue::Integer(years)),
            ("IDADECAT1", CellValue::Integer(five_year_group(years))),
            ("IDADECAT2", CellValue::Integer(broad_group(years))),
        ]
    }
}

/// 1 under one year, then one group per five years up to 20
pub fn five_year_group(years: i64) -> i64 {
    if years < 1 {
        1
    } else {
        (2 + years / 5).min(20)
    }
}

/// 1 to 8 over the bounds 0, 5, 20, 40, 60, 70, 80 and 90
pub fn broad_group(years: i64) -> i64 {
    AGE_GROUP_BOUNDS.partition_point(|&bound| bound <= years) as i64
}
