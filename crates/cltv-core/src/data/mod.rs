//! Customer data model.
//!
//! Three record types flow through a run:
//! - [`RawCustomerAggregate`]: one input row per customer, the only record
//!   mutated in place (by outlier suppression)
//! - [`CustomerFeatureRecord`]: recency/tenure/frequency/monetary features
//! - [`CltvResult`]: per-customer forecasts and the value segment

pub mod loader;

use chrono::NaiveDate;
use cltv_common::CustomerId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::segment::Segment;

pub use loader::{load_csv, read_csv, LoadError};

/// Data integrity violations. Fatal for the run.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("customer {customer_id}: invalid {field} value {value:?}")]
    InvalidField {
        customer_id: CustomerId,
        field: &'static str,
        value: String,
    },

    #[error("customer {customer_id}: first order {first} is after last order {last}")]
    OrderDatesReversed {
        customer_id: CustomerId,
        first: NaiveDate,
        last: NaiveDate,
    },

    #[error("analysis date {analysis_date} is before the latest last order {latest_order}")]
    AnalysisDateTooEarly {
        analysis_date: NaiveDate,
        latest_order: NaiveDate,
    },

    #[error("reference date {latest_order} + {offset_days} days is out of range")]
    ReferenceDateOutOfRange {
        latest_order: NaiveDate,
        offset_days: i64,
    },

    #[error("duplicate customer id {0}")]
    DuplicateCustomer(CustomerId),

    #[error("population is empty")]
    EmptyPopulation,
}

impl From<DataError> for cltv_common::Error {
    fn from(err: DataError) -> Self {
        match err {
            DataError::InvalidField {
                customer_id,
                field,
                value,
            } => cltv_common::Error::InvalidField {
                customer_id: customer_id.0,
                field: field.to_string(),
                value,
            },
            DataError::OrderDatesReversed {
                customer_id,
                first,
                last,
            } => cltv_common::Error::OrderDatesReversed {
                customer_id: customer_id.0,
                first: first.to_string(),
                last: last.to_string(),
            },
            DataError::EmptyPopulation => cltv_common::Error::EmptyPopulation,
            other => cltv_common::Error::DataIntegrity(other.to_string()),
        }
    }
}

/// One customer's historical aggregates, as loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCustomerAggregate {
    pub customer_id: CustomerId,

    /// Platform of the first order (Android, iOS, Desktop, Mobile, Offline).
    #[serde(default)]
    pub order_channel: Option<String>,

    /// Platform of the most recent order.
    #[serde(default)]
    pub last_order_channel: Option<String>,

    pub first_order_date: NaiveDate,
    pub last_order_date: NaiveDate,

    #[serde(default)]
    pub last_order_date_online: Option<NaiveDate>,
    #[serde(default)]
    pub last_order_date_offline: Option<NaiveDate>,

    pub order_num_online: u32,
    pub order_num_offline: u32,
    pub value_online: f64,
    pub value_offline: f64,

    /// Categories purchased in the trailing 12 months.
    #[serde(default)]
    pub interested_in_categories: Vec<String>,
}

impl RawCustomerAggregate {
    /// Check the record-level invariants: non-negative finite totals and
    /// `first_order_date <= last_order_date`.
    pub fn validate(&self) -> Result<(), DataError> {
        for (field, value) in [
            ("customer_value_total_ever_online", self.value_online),
            ("customer_value_total_ever_offline", self.value_offline),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(DataError::InvalidField {
                    customer_id: self.customer_id.clone(),
                    field,
                    value: value.to_string(),
                });
            }
        }
        if self.first_order_date > self.last_order_date {
            return Err(DataError::OrderDatesReversed {
                customer_id: self.customer_id.clone(),
                first: self.first_order_date,
                last: self.last_order_date,
            });
        }
        Ok(())
    }

    /// Combined online + offline order count.
    pub fn total_orders(&self) -> u32 {
        self.order_num_online.saturating_add(self.order_num_offline)
    }

    /// Combined online + offline monetary total.
    pub fn total_value(&self) -> f64 {
        self.value_online + self.value_offline
    }
}

/// Validate every record and reject duplicate ids.
pub fn validate_population(population: &[RawCustomerAggregate]) -> Result<(), DataError> {
    if population.is_empty() {
        return Err(DataError::EmptyPopulation);
    }
    let mut seen = std::collections::HashSet::with_capacity(population.len());
    for record in population {
        record.validate()?;
        if !seen.insert(&record.customer_id) {
            return Err(DataError::DuplicateCustomer(record.customer_id.clone()));
        }
    }
    Ok(())
}

/// Features derived for one customer, in weeks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerFeatureRecord {
    pub customer_id: CustomerId,
    /// Weeks between first and last order.
    pub recency_weeks: f64,
    /// Weeks between first order and the analysis reference date.
    pub tenure_weeks: f64,
    /// Combined order count.
    pub frequency: u32,
    /// Combined monetary total / frequency.
    pub monetary_avg: f64,
}

/// Forecast output for one qualifying customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CltvResult {
    pub customer_id: CustomerId,
    pub recency_weeks: f64,
    pub tenure_weeks: f64,
    pub frequency: u32,
    pub monetary_avg: f64,
    pub exp_sales_horizon1: f64,
    pub exp_sales_horizon2: f64,
    pub exp_average_value: f64,
    pub cltv: f64,
    /// Min-max scaled cltv in `[0, 1]`.
    pub scaled_cltv: f64,
    /// `None` when segmentation was degenerate.
    pub cltv_segment: Option<Segment>,
}
