//! Output format specifications.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Supported output formats for the results table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Full report as a single JSON document
    #[default]
    Json,

    /// One JSON object per customer result
    Jsonl,

    /// Result table as CSV with a header row
    Csv,

    /// Human-readable summary: fit, segments and top customers
    Summary,
}

impl OutputFormat {
    /// Whether this format is meant for machines rather than terminals.
    pub fn is_machine_readable(self) -> bool {
        !matches!(self, OutputFormat::Summary)
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Jsonl => write!(f, "jsonl"),
            OutputFormat::Csv => write!(f, "csv"),
            OutputFormat::Summary => write!(f, "summary"),
        }
    }
}
