//! Core definitions (error model, result helpers, runtime shims), relied upon by all
//! stratum-* crates.

#[cfg(feature = "tokio")]
pub mod async_runtime;
pub mod error;
pub mod macros;
pub mod result;

pub use result::Result;
