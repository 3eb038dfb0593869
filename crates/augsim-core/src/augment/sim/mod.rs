//! Mortality information system (SIM) records
//!
//! Death certificate extracts carry a death date (`DTOBITO`), a coded age
//! (`IDADE`), a neighbourhood code (`CODBAIRES`) and an underlying cause of
//! death as an ICD-10 code (`CAUSABAS`). The augmenters here add the columns
//! analysts derive from those fields.

pub mod age;
pub mod death_cause;
pub mod death_date;
pub mod layout;
pub mod neighbourhood;
pub mod values;

pub use age::AgeAugmenter;
pub use death_cause::DeathCauseAugmenter;
pub use death_date::DeathDateAugmenter;
pub use layout::Layout;
pub use neighbourhood::NeighbourhoodAugmenter;

use super::Augmenter;

/// All SIM augmenters, in the order their columns are laid out
pub fn sim_augmenters() -> Vec<Box<dyn Augmenter>> {
    vec![
        Box::new(DeathDateAugmenter),
        Box::new(AgeAugmenter),
        Box::new(NeighbourhoodAugmenter),
        Box::new(DeathCauseAugmenter),
    ]
}
