//! Hierarchical term keys for date/time and numeric range indexing.
//!
//! A date value is packed into a 64-bit `DateTerm` whose calendar fields are split
//! into up to twelve levels (millisecond up to year). An indexed value is stored once
//! per level, and a query range `[from, to]` is decomposed into the smallest set of
//! per-level keys (or key ranges) that covers it exactly once:
//!
//! - `DateLevelFormat` selects which levels are materialized.
//! - `calculate_terms` / `calculate_ranges` perform the decomposition.
//! - `numeric` provides the two-tier 4-bit-per-level variant for plain `u64` ranges.

pub mod date_term;
pub mod decompose;
pub mod level_format;
pub mod levels;
pub mod numeric;

pub use date_term::{DateTerm, encode_date_term_to_terms};
pub use decompose::{KeyRange, calculate_ranges, calculate_terms};
pub use level_format::DateLevelFormat;
pub use levels::Granularity;
