//! ICD chapter, COVID flag and CID-BR mortality list from the underlying cause
//!
//! CID-BR groups ICD-10 codes into the Brazilian mortality tabulation list.
//! Codes are looked up from the most specific level (2) to the broadest (0);
//! each level is a sorted list of `begin..=end` ranges over the first three
//! characters of the code.

use super::values::parse_icd;
use crate::augment::Augmenter;
use crate::table::CellValue;

const INVALID_CHAPTER: &str = "**";

/// Indicator columns filled from the CID-BR code, in output order
const CONDITIONS: [&str; 15] = [
    "DCOR",
    "OUTCOR",
    "AVC",
    "GRIPE",
    "PNEUMONIA",
    "DPOCASMA",
    "GPP",
    "PERI",
    "ACTRANS",
    "QUEDAFOGINT",
    "SUIC",
    "HOMIC",
    "EXTIND",
    "INTLEG",
    "OUTEXT",
];

/// CID-BR prefixes flagging a single condition
const CONDITION_PREFIXES: [(&str, &str); 17] = [
    ("068", "DCOR"),
    ("069", "OUTCOR"),
    ("070", "AVC"),
    ("073", "GRIPE"),
    ("074", "PNEUMONIA"),
    ("075", "PNEUMONIA"),
    ("076", "DPOCASMA"),
    ("104", "ACTRANS"),
    ("105", "QUEDAFOGINT"),
    ("106", "QUEDAFOGINT"),
    ("107", "QUEDAFOGINT"),
    ("108", "QUEDAFOGINT"),
    ("109", "SUIC"),
    ("110", "HOMIC"),
    ("111", "EXTIND"),
    ("112", "INTLEG"),
    ("113", "OUTEXT"),
];

/// Adds the cause of death columns after `CAUSABAS`
#[derive(Debug, Default, Clone, Copy)]
pub struct DeathCauseAugmenter;

impl Augmenter for DeathCauseAugmenter {
    fn source_column(&self) -> &'static str {
        "CAUSABAS"
    }

    fn produces(&self) -> &'static [&'static str] {
        &[
            "CAPCID",
            "COVID",
            "CIDBR",
            "DCOR",
            "OUTCOR",
            "AVC",
            "GRIPE",
            "PNEUMONIA",
            "DPOCASMA",
            "GPP",
            "PERI",
            "ACTRANS",
            "QUEDAFOGINT",
            "SUIC",
            "HOMIC",
            "EXTIND",
            "INTLEG",
            "OUTEXT",
        ]
    }

    fn derive(&self, source: &CellValue) -> Vec<(&'static str, CellValue)> {
        let Some(icd) = parse_icd(source) else {
            return vec![
                ("CAPCID", CellValue::text(INVALID_CHAPTER)),
                ("COVID", CellValue::Integer(0)),
            ];
        };

        let chapter = match icd_chapter(&icd) {
            Some(n) => CellValue::Integer(n),
            None => CellValue::text(INVALID_CHAPTER),
        };
        let covid_flag = covid(&icd).map_or(CellValue::Empty, CellValue::Integer);
        let cidbr = icd_to_cidbr(&icd);

        let mut values = vec![
            ("CAPCID", chapter),
            ("COVID", covid_flag),
            ("CIDBR", cidbr.map_or(CellValue::Empty, CellValue::text)),
        ];
        if let Some(code) = cidbr {
            values.extend(
                conditions(code)
                    .into_iter()
                    .map(|(name, flag)| (name, CellValue::Integer(flag))),
            );
        }
        values
    }
}

/// First three characters of a normalized code
fn category(icd: &str) -> &str {
    match icd.char_indices().nth(3) {
        Some((end, _)) => &icd[..end],
        None => icd,
    }
}

/// ICD-10 chapter (1 to 21), `None` when the code falls outside every chapter
pub fn icd_chapter(icd: &str) -> Option<i64> {
    let cat = category(icd);
    let mut chars = cat.chars();
    let valid = cat.len() == 3
        && chars.next().is_some_and(|c| c.is_ascii_uppercase())
        && chars.all(|c| c.is_ascii_digit());
    if !valid {
        return None;
    }

    let idx = CHAPTER_BEGIN.partition_point(|&begin| begin <= cat);
    if idx == 0 || cat > CHAPTER_END[idx - 1] {
        return None;
    }
    Some(idx as i64)
}

/// 1 for confirmed COVID-19, 2 for suspected, 0 for an unknown cause
pub fn covid(icd: &str) -> Option<i64> {
    if icd.starts_with("B342") {
        Some(1)
    } else if icd.starts_with("U04") {
        Some(2)
    } else if icd.starts_with("U99") {
        Some(0)
    } else {
        None
    }
}

/// One level of the CID-BR list: sorted, non-overlapping ranges
struct Level {
    begin: &'static [&'static str],
    end: &'static [&'static str],
    values: &'static [&'static str],
}

impl Level {
    fn lookup(&self, cat: &str) -> Option<&'static str> {
        let idx = self.begin.partition_point(|&begin| begin <= cat);
        if idx > 0 && cat <= self.end[idx - 1] {
            Some(self.values[idx - 1])
        } else {
            None
        }
    }
}

const LEVELS: [Level; 3] = [
    Level {
        begin: LEVEL2_BEGIN,
        end: LEVEL2_END,
        values: LEVEL2_VALUES,
    },
    Level {
        begin: LEVEL1_BEGIN,
        end: LEVEL1_END,
        values: LEVEL1_VALUES,
    },
    Level {
        begin: LEVEL0_BEGIN,
        end: LEVEL0_END,
        values: LEVEL0_VALUES,
    },
];

/// CID-BR code of a normalized ICD-10 code
pub fn icd_to_cidbr(icd: &str) -> Option<&'static str> {
    // Diabetes in pregnancy is counted with the other obstetric causes
    if icd.starts_with("O244") {
        return Some("089");
    }
    let cat = category(icd);
    LEVELS.iter().find_map(|level| level.lookup(cat))
}

/// Indicator values for a CID-BR code
///
/// Codes 088 to 092 and 093 to 097 grade `GPP` and `PERI` from 1 to 5;
/// other codes flag at most one condition by prefix.
pub fn conditions(cidbr: &str) -> Vec<(&'static str, i64)> {
    let mut values: Vec<(&'static str, i64)> = CONDITIONS.iter().map(|&name| (name, 0)).collect();
    let mut set = |name: &str, value: i64| {
        if let Some(slot) = values.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = value;
        }
    };

    match category(cidbr).parse::<i64>() {
        Ok(n @ 88..=92) => set("GPP", n - 87),
        Ok(n @ 93..=97) => set("PERI", n - 92),
        _ => {
            for (prefix, name) in CONDITION_PREFIXES {
                if cidbr.starts_with(prefix) {
                    set(name, 1);
                }
            }
        }
    }
    values
}

const LEVEL0_BEGIN: &[&str] = &[
    "A00", "A65", "B25", "B84", "C00", "C15", "C16", "C17", "C18", "C22",
    "C23", "C25", "C26", "C32", "C33", "C37", "C43", "C44", "C50", "C51",
    "C53", "C54", "C56", "C57", "C61", "C62", "C67", "C68", "C70", "C73",
    "C82", "C88", "C90", "C91", "C96", "D00", "D50", "D65", "E00", "E10",
    "E15", "E40", "E50", "F00", "F10", "F20", "G00", "G03", "G04", "G30",
    "G31", "G40", "G43", "H00", "H60", "I00", "I10", "I20", "I26", "I60",
    "I70", "I71", "J00", "J09", "J12", "J20", "J30", "J40", "J60", "K00",
    "K25", "K28", "K65", "K66", "K70", "K80", "K81", "K82", "L00", "M00",
    "N00", "N17", "N20", "O00", "O10", "O11", "O24", "O25", "O26", "O95",
    "O96", "O98", "P00", "P05", "P10", "P20", "P35", "Q00", "Q10", "Q20",
    "Q30", "R00", "R54", "R55", "R98", "R99", "V01", "W00", "W20", "W65",
    "W75", "X00", "X10", "X40", "X50", "X60", "X85", "Y10", "Y35", "Y40",
];

const LEVEL0_END: &[&str] = &[
    "A09", "A79", "B49", "B99", "C14", "C15", "C16", "C17", "C21", "C22",
    "C24", "C25", "C31", "C32", "C34", "C41", "C43", "C49", "C50", "C52",
    "C53", "C55", "C56", "C60", "C61", "C66", "C67", "C69", "C72", "C81",
    "C85", "C89", "C90", "C95", "C97", "D48", "D64", "D89", "E07", "E14",
    "E34", "E46", "E90", "F09", "F19", "F99", "G00", "G03", "G25", "G30",
    "G39", "G41", "G98", "H59", "H95", "I09", "I15", "I25", "I52", "I69",
    "I70", "I99", "J06", "J11", "J18", "J22", "J39", "J47", "J99", "K22",
    "K27", "K64", "K65", "K66", "K77", "K80", "K81", "K93", "L99", "M99",
    "N16", "N19", "N99", "O08", "O10", "O23", "O24", "O25", "O92", "O95",
    "O97", "O99", "P04", "P08", "P15", "P29", "P96", "Q07", "Q18", "Q28",
    "Q99", "R53", "R54", "R96", "R98", "R99", "V99", "W19", "W64", "W74",
    "W99", "X09", "X39", "X49", "X59", "X84", "Y09", "Y34", "Y36", "Y89",
];

const LEVEL0_VALUES: &[&str] = &[
    "001", "031", "031", "031", "032", "033", "034", "052", "035", "036",
    "052", "037", "052", "038", "039", "052", "040", "052", "041", "052",
    "042", "043", "044", "052", "045", "052", "046", "052", "047", "052",
    "048", "052", "049", "050", "052", "051", "053", "054", "057", "055",
    "057", "056", "057", "059", "058", "059", "060", "060", "063", "061",
    "063", "062", "063", "064", "065", "066", "067", "068", "069", "070",
    "071", "072", "077", "073", "074", "075", "077", "076", "077", "082",
    "078", "082", "079", "082", "080", "082", "081", "082", "083", "084",
    "085", "086", "087", "088", "090", "089", "090", "090", "089", "091",
    "092", "090", "093", "094", "095", "096", "097", "098", "100", "099",
    "100", "103", "101", "103", "102", "103", "104", "105", "113", "106",
    "113", "107", "113", "108", "113", "109", "110", "111", "112", "113",
];

const LEVEL1_BEGIN: &[&str] = &[
    "A00", "A01", "A09", "A15", "A17", "A20", "A27", "A30", "A33", "A36",
    "A37", "A39", "A40", "A50", "A80", "A82", "A90", "A91", "A95", "A96",
    "B05", "B15", "B20", "B50", "B55", "B57", "B58", "B65", "B66", "B69",
    "B70", "F10", "I21", "J21", "J45", "K70", "K71", "K74", "K75",
];

const LEVEL1_END: &[&str] = &[
    "A00", "A08", "A09", "A16", "A19", "A20", "A27", "A30", "A35", "A36",
    "A37", "A39", "A41", "A64", "A80", "A82", "A90", "A94", "A95", "A99",
    "B05", "B19", "B24", "B54", "B55", "B57", "B58", "B65", "B68", "B69",
    "B83", "F10", "I21", "J21", "J46", "K70", "K73", "K74", "K77",
];

const LEVEL1_VALUES: &[&str] = &[
    "002", "004", "003", "005", "006", "007", "008", "009", "010", "011",
    "012", "013", "014", "015", "016", "017", "018", "020", "019", "020",
    "021", "022", "023", "024", "025", "026", "027", "028", "030", "029",
    "030", "058.1", "068.1", "075.1", "076.1", "080.1", "080.3", "080.2", "080.3",
];

const LEVEL2_BEGIN: &[&str] = &[
    "A01", "A33", "A34", "A35",
];

const LEVEL2_END: &[&str] = &[
    "A01", "A33", "A34", "A35",
];

const LEVEL2_VALUES: &[&str] = &[
    "004.1", "010.1", "010.2", "010.3",
];

const CHAPTER_BEGIN: &[&str] = &[
    "A00", "C00", "D50", "E00", "F00", "G00", "H00", "H60", "I00", "J00",
    "K00", "L00", "M00", "N00", "O00", "P00", "Q00", "R00", "S00", "V01",
    "Z00",
];

const CHAPTER_END: &[&str] = &[
    "B99", "D48", "D89", "E90", "F99", "G99", "H59", "H95", "I99", "J99",
    "K93", "L99", "M99", "N99", "O99", "P96", "Q99", "R99", "T98", "Y98",
    "Z99",
];
