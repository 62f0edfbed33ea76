//! Output writers.
//!
//! - [`json`]: the published snapshot file

pub mod json;
