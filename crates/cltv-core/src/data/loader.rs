//! CSV loader for customer aggregates.
//!
//! Columns follow the omnichannel retail export:
//! `master_id, order_channel, last_order_channel, first_order_date,
//! last_order_date, last_order_date_online, last_order_date_offline,
//! order_num_total_ever_online, order_num_total_ever_offline,
//! customer_value_total_ever_offline, customer_value_total_ever_online,
//! interested_in_categories_12`.
//!
//! Dates are `YYYY-MM-DD`; a trailing time part is accepted and discarded.
//! Order counts may be written as floats (`4.0`) but must be integral.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use cltv_common::CustomerId;
use serde::Deserialize;
use thiserror::Error;

use super::{DataError, RawCustomerAggregate};

/// Error type for loading customer aggregates.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Data(#[from] DataError),
}

impl From<LoadError> for cltv_common::Error {
    fn from(err: LoadError) -> Self {
        match err {
            LoadError::Io { source, .. } => cltv_common::Error::Io(source),
            LoadError::Csv(e) => cltv_common::Error::Csv(e),
            LoadError::Data(e) => e.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    master_id: String,
    #[serde(default)]
    order_channel: Option<String>,
    #[serde(default)]
    last_order_channel: Option<String>,
    first_order_date: String,
    last_order_date: String,
    #[serde(default)]
    last_order_date_online: Option<String>,
    #[serde(default)]
    last_order_date_offline: Option<String>,
    order_num_total_ever_online: String,
    order_num_total_ever_offline: String,
    customer_value_total_ever_offline: String,
    customer_value_total_ever_online: String,
    #[serde(default)]
    interested_in_categories_12: Option<String>,
}

/// Load customer aggregates from a CSV file.
pub fn load_csv(path: &Path) -> Result<Vec<RawCustomerAggregate>, LoadError> {
    let file = File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    read_csv(BufReader::new(file))
}

/// Read customer aggregates from any CSV source.
pub fn read_csv<R: Read>(reader: R) -> Result<Vec<RawCustomerAggregate>, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut population = Vec::new();
    for row in reader.deserialize::<CsvRow>() {
        let raw = convert_row(row?)?;
        raw.validate()?;
        population.push(raw);
    }
    Ok(population)
}

fn convert_row(row: CsvRow) -> Result<RawCustomerAggregate, DataError> {
    let customer_id = CustomerId::new(row.master_id);

    Ok(RawCustomerAggregate {
        first_order_date: parse_date(&customer_id, "first_order_date", &row.first_order_date)?,
        last_order_date: parse_date(&customer_id, "last_order_date", &row.last_order_date)?,
        last_order_date_online: parse_optional_date(
            &customer_id,
            "last_order_date_online",
            row.last_order_date_online.as_deref(),
        )?,
        last_order_date_offline: parse_optional_date(
            &customer_id,
            "last_order_date_offline",
            row.last_order_date_offline.as_deref(),
        )?,
        order_num_online: parse_count(
            &customer_id,
            "order_num_total_ever_online",
            &row.order_num_total_ever_online,
        )?,
        order_num_offline: parse_count(
            &customer_id,
            "order_num_total_ever_offline",
            &row.order_num_total_ever_offline,
        )?,
        value_online: parse_amount(
            &customer_id,
            "customer_value_total_ever_online",
            &row.customer_value_total_ever_online,
        )?,
        value_offline: parse_amount(
            &customer_id,
            "customer_value_total_ever_offline",
            &row.customer_value_total_ever_offline,
        )?,
        order_channel: non_empty(row.order_channel),
        last_order_channel: non_empty(row.last_order_channel),
        interested_in_categories: parse_categories(row.interested_in_categories_12.as_deref()),
        customer_id,
    })
}

fn invalid(customer_id: &CustomerId, field: &'static str, value: &str) -> DataError {
    DataError::InvalidField {
        customer_id: customer_id.clone(),
        field,
        value: value.to_string(),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Parse `YYYY-MM-DD`, ignoring a trailing ` HH:MM:SS` or `THH:MM:SS`.
fn parse_date(customer_id: &CustomerId, field: &'static str, value: &str) -> Result<NaiveDate, DataError> {
    let day = value.split([' ', 'T']).next().unwrap_or_default();
    NaiveDate::parse_from_str(day, "%Y-%m-%d").map_err(|_| invalid(customer_id, field, value))
}

fn parse_optional_date(
    customer_id: &CustomerId,
    field: &'static str,
    value: Option<&str>,
) -> Result<Option<NaiveDate>, DataError> {
    match value {
        None | Some("") => Ok(None),
        Some(v) => parse_date(customer_id, field, v).map(Some),
    }
}

fn parse_count(customer_id: &CustomerId, field: &'static str, value: &str) -> Result<u32, DataError> {
    let parsed: f64 = value.parse().map_err(|_| invalid(customer_id, field, value))?;
    if !parsed.is_finite() || parsed < 0.0 || parsed.fract() != 0.0 || parsed > u32::MAX as f64 {
        return Err(invalid(customer_id, field, value));
    }
    Ok(parsed as u32)
}

fn parse_amount(customer_id: &CustomerId, field: &'static str, value: &str) -> Result<f64, DataError> {
    let parsed: f64 = value.parse().map_err(|_| invalid(customer_id, field, value))?;
    if !parsed.is_finite() || parsed < 0.0 {
        return Err(invalid(customer_id, field, value));
    }
    Ok(parsed)
}

/// `[KADIN, ERKEK]` -> `["KADIN", "ERKEK"]`; empty brackets give no tags.
fn parse_categories(value: Option<&str>) -> Vec<String> {
    let Some(value) = value else {
        return Vec::new();
    };
    value
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .split(',')
        .map(|tag| tag.trim().trim_matches(|c: char| c == '\'' || c == '"'))
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}
