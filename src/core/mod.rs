//! Core utilities and common types for MetaExtract.

pub mod error;
pub mod types;

pub use error::{Error, ExecutionError, LoadError, Result};
pub use types::*;
