//! CLTV common types, IDs, and errors.
//!
//! This crate provides foundational types shared across the workspace:
//! - Customer and run identity types
//! - The unified error type with stable codes
//! - Output format specifications

pub mod error;
pub mod id;
pub mod output;

pub use error::{Error, ErrorCategory, Result, StructuredError};
pub use id::{CustomerId, RunId};
pub use output::OutputFormat;
