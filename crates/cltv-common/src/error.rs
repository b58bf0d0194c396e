//! Error types for the CLTV workspace.
//!
//! This module provides structured error handling with:
//! - Stable error codes for machine parsing
//! - Category classification for error grouping
//! - Remediation suggestions for humans
//!
//! # Human-Facing Output
//!
//! ```text
//! ✗ Data Integrity Error
//!   Reason: customer 42: first_order_date 2021-03-01 is after last_order_date 2021-01-01
//!   Fix: Correct the offending rows in the input file and re-run
//! ```
//!
//! # Machine-Facing Output
//!
//! ```json
//! {
//!   "code": 30,
//!   "category": "fit",
//!   "message": "BG/NBD fitting diverged: optimizer did not converge after 5000 iterations",
//!   "recoverable": false
//! }
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for CLTV operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Configuration file and settings errors.
    Config,
    /// Malformed or inconsistent customer data.
    Data,
    /// Model fitting and numerical errors.
    Fit,
    /// Value segmentation errors.
    Segment,
    /// File I/O and serialization errors.
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Data => write!(f, "data"),
            ErrorCategory::Fit => write!(f, "fit"),
            ErrorCategory::Segment => write!(f, "segment"),
            ErrorCategory::Io => write!(f, "io"),
        }
    }
}

/// Unified error type for the CLTV workspace.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // Data integrity errors (20-29)
    #[error("data integrity violation: {0}")]
    DataIntegrity(String),

    #[error("customer {customer_id}: invalid {field} value {value:?}")]
    InvalidField {
        customer_id: String,
        field: String,
        value: String,
    },

    #[error("customer {customer_id}: first order {first} is after last order {last}")]
    OrderDatesReversed {
        customer_id: String,
        first: String,
        last: String,
    },

    #[error("population is empty")]
    EmptyPopulation,

    // Fitting errors (30-39)
    #[error("{model} fitting diverged: {reason}")]
    FittingDivergence { model: String, reason: String },

    #[error("{model} needs at least {required} qualifying customers, got {actual}")]
    InsufficientData {
        model: String,
        required: usize,
        actual: usize,
    },

    // Segmentation errors (40)
    #[error("segmentation degenerate: {distinct} distinct CLTV values, need at least {required}")]
    SegmentationDegenerate { distinct: usize, required: usize },

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl Error {
    /// Returns the error code for this error type.
    ///
    /// Error codes are stable and grouped by category:
    /// - 10-19: Configuration errors
    /// - 20-29: Data integrity errors
    /// - 30-39: Fitting errors
    /// - 40: Segmentation errors
    /// - 60-69: I/O errors
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::InvalidConfig(_) => 11,

            Error::DataIntegrity(_) => 20,
            Error::InvalidField { .. } => 21,
            Error::OrderDatesReversed { .. } => 22,
            Error::EmptyPopulation => 23,

            Error::FittingDivergence { .. } => 30,
            Error::InsufficientData { .. } => 31,

            Error::SegmentationDegenerate { .. } => 40,

            Error::Io(_) => 60,
            Error::Json(_) => 61,
            Error::Csv(_) => 62,
        }
    }

    /// Returns the category for this error.
    pub fn category(&self) -> ErrorCategory {
        match self.code() {
            10..=19 => ErrorCategory::Config,
            20..=29 => ErrorCategory::Data,
            30..=39 => ErrorCategory::Fit,
            40..=49 => ErrorCategory::Segment,
            _ => ErrorCategory::Io,
        }
    }

    /// Whether a run that hit this error still produced usable output.
    ///
    /// Only segmentation failures leave the upstream CLTV values intact.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::SegmentationDegenerate { .. })
    }

    /// Returns a short, human-friendly headline for this error.
    pub fn headline(&self) -> &'static str {
        match self {
            Error::Config(_) | Error::InvalidConfig(_) => "Configuration Error",
            Error::DataIntegrity(_)
            | Error::InvalidField { .. }
            | Error::OrderDatesReversed { .. } => "Data Integrity Error",
            Error::EmptyPopulation => "Empty Population",
            Error::FittingDivergence { .. } => "Model Fitting Diverged",
            Error::InsufficientData { .. } => "Not Enough Customers",
            Error::SegmentationDegenerate { .. } => "Segmentation Degenerate",
            Error::Io(_) => "I/O Error",
            Error::Json(_) => "JSON Error",
            Error::Csv(_) => "CSV Error",
        }
    }

    /// Returns a remediation hint for humans.
    pub fn remediation(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Config => "Run 'cltv check-config' to validate the configuration file",
            ErrorCategory::Data => "Correct the offending rows in the input file and re-run",
            ErrorCategory::Fit => {
                "Check that the population has enough repeat customers with varied behaviour"
            }
            ErrorCategory::Segment => "Segment labels were omitted; CLTV values are still valid",
            ErrorCategory::Io => "Check the file path, permissions and format",
        }
    }

    /// Format the error for a terminal: headline, reason and fix.
    pub fn format_human(&self) -> String {
        format!(
            "✗ {}\n  Reason: {}\n  Fix: {}",
            self.headline(),
            self,
            self.remediation()
        )
    }
}

/// Structured error response for JSON output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// Stable error code.
    pub code: u32,

    /// Error category for grouping.
    pub category: ErrorCategory,

    /// Human-readable error message.
    pub message: String,

    /// Whether the run still produced usable output.
    pub recoverable: bool,
}

impl From<&Error> for StructuredError {
    fn from(err: &Error) -> Self {
        StructuredError {
            code: err.code(),
            category: err.category(),
            message: err.to_string(),
            recoverable: err.is_recoverable(),
        }
    }
}

impl StructuredError {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"code":{},"error":"serialization_failed"}}"#, self.code)
        })
    }
}
