//! Number normalization and area code lookup

pub mod area_codes;
pub mod normalizer;

pub use area_codes::{AreaCodeTable, DEFAULT_PREFIX_LEN};
pub use normalizer::{only_digits, split_alternate, NormalizedNumber, NumberNormalizer};
