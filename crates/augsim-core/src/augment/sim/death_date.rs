//! Calendar and epidemiological fields from the death date

use super::values::parse_date;
use crate::augment::Augmenter;
use crate::table::CellValue;
use chrono::{Datelike, Days, NaiveDate};

/// Adds `DIA, MES, ANO, ANOEPI, SEMANAEPI` after `DTOBITO`
#[derive(Debug, Default, Clone, Copy)]
pub struct DeathDateAugmenter;

impl Augmenter for DeathDateAugmenter {
    fn source_column(&self) -> &'static str {
        "DTOBITO"
    }

    fn produces(&self) -> &'static [&'static str] {
        &["DIA", "MES", "ANO", "ANOEPI", "SEMANAEPI"]
    }

    fn derive(&self, source: &CellValue) -> Vec<(&'static str, CellValue)> {
        let Some(date) = parse_date(source) else {
            return Vec::new();
        };
        let Some((epi_year, epi_week)) = epidemiological_week(date) else {
            return Vec::new();
        };

        vec![
            ("DIA", CellValue::Integer(date.day().into())),
            ("MES", CellValue::Integer(date.month().into())),
            ("ANO", CellValue::Integer(date.year().into())),
            ("ANOEPI", CellValue::Integer(epi_year.into())),
            ("SEMANAEPI", CellValue::Integer(epi_week)),
        ]
    }
}

/// Sunday on which epidemiological week 1 of `year` starts
///
/// Week 1 is the Sunday-to-Saturday week holding at least four days of the
/// new year.
pub fn first_epi_week_start(year: i32) -> Option<NaiveDate> {
    let jan1 = NaiveDate::from_ymd_opt(year, 1, 1)?;
    let weekday = u64::from(jan1.weekday().num_days_from_monday());
    let first_sunday = jan1.checked_add_days(Days::new(6 - weekday))?;

    // Thursday to Sunday: the week before holds less than four days of the year
    if weekday >= 3 {
        Some(first_sunday)
    } else {
        first_sunday.checked_sub_days(Days::new(7))
    }
}

/// Epidemiological year and week (1 to 53) of `date`
pub fn epidemiological_week(date: NaiveDate) -> Option<(i32, i64)> {
    let mut year = date.year() + 1;
    let mut start = first_epi_week_start(year)?;
    while date < start {
        year -= 1;
        start = first_epi_week_start(year)?;
    }
    Some((year, 1 + (date - start).num_days() / 7))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_first_epi_week_start() {
        // 2020-01-01 is a Wednesday: week 1 starts in December
        assert_eq!(first_epi_week_start(2020), Some(date(2019, 12, 29)));
        // 2021-01-01 is a Friday: week 1 starts on the next Sunday
        assert_eq!(first_epi_week_start(2021), Some(date(2021, 1, 3)));
        // 2023-01-01 is a Sunday
        assert_eq!(first_epi_week_start(2023), Some(date(2023, 1, 1)));
    }

    #[test]
    fn test_epidemiological_week() {
        assert_eq!(epidemiological_week(date(2020, 1, 1)), Some((2020, 1)));
        assert_eq!(epidemiological_week(date(2020, 3, 15)), Some((2020, 12)));
        assert_eq!(epidemiological_week(date(2021, 1, 1)), Some((2020, 53)));
        assert_eq!(epidemiological_week(date(2021, 1, 3)), Some((2021, 1)));
        assert_eq!(epidemiological_week(date(2019, 12, 29)), Some((2020, 1)));
    }

    #[test]
    fn test_derive() {
        let values = DeathDateAugmenter.derive(&CellValue::text("01012021"));
        assert_eq!(
            values,
            vec![
                ("DIA", CellValue::Integer(1)),
                ("MES", CellValue::Integer(1)),
                ("ANO", CellValue::Integer(2021)),
                ("ANOEPI", CellValue::Integer(2020)),
                ("SEMANAEPI", CellValue::Integer(53)),
            ]
        );
    }

    #[test]
    fn test_invalid_date_derives_nothing() {
        assert!(DeathDateAugmenter.derive(&CellValue::text("99999999")).is_empty());
        assert!(DeathDateAugmenter.derive(&CellValue::Empty).is_empty());
    }
}
