//! Customer and run identity types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque customer identifier, unique within a population.
///
/// The loader takes it verbatim from the input (`master_id`); nothing in the
/// pipeline interprets its contents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerId(pub String);

impl CustomerId {
    pub fn new(id: impl Into<String>) -> Self {
        CustomerId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CustomerId {
    fn from(id: &str) -> Self {
        CustomerId(id.to_string())
    }
}

impl From<String> for CustomerId {
    fn from(id: String) -> Self {
        CustomerId(id)
    }
}

/// Identifier of one analysis run, stamped on every log event and report.
///
/// Format: `cltv-YYYYMMDD-HHMMSS-XXXXXXXX`
/// Example: `cltv-20260115-143022-9f2c1a7b`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub String);

impl RunId {
    /// Generate a new run ID from the current UTC time and a random suffix.
    pub fn new() -> Self {
        let now = chrono::Utc::now();
        let uuid = uuid::Uuid::new_v4().simple().to_string();
        RunId(format!(
            "cltv-{}-{}-{}",
            now.format("%Y%m%d"),
            now.format("%H%M%S"),
            &uuid[..8]
        ))
    }

    /// Parse an existing run ID string.
    pub fn parse(s: &str) -> Option<Self> {
        if s.len() != 29 || !s.starts_with("cltv-") {
            return None;
        }
        let bytes = s.as_bytes();
        if bytes.get(13) != Some(&b'-') || bytes.get(20) != Some(&b'-') {
            return None;
        }
        let date = &s[5..13];
        let time = &s[14..20];
        let suffix = &s[21..29];
        if !date.chars().all(|c| c.is_ascii_digit()) || !time.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        if !suffix.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')) {
            return None;
        }
        Some(RunId(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
