//! Split-Block Bloom Filter (SBBF) support for dictionary key pre-filtering.
//!
//! - `KeyFilterBuilder` collects 64-bit keys and builds a filter sized for a target
//!   false positive probability.
//! - `KeyFilter` answers "definitely absent" / "maybe present" probes.

pub mod builder;
pub mod config;
pub mod filter;


pub use builder::KeyFilterBuilder;
pub use config::*;
pub use filter::KeyFilter;
