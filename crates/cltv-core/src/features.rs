//! Feature derivation: recency, tenure, frequency and monetary average.
//!
//! Time deltas are whole-day differences divided by 7 (fractional weeks).
//! Online and offline activity is merged into one omnichannel frequency and
//! monetary total per customer.

use chrono::{NaiveDate, TimeDelta};
use cltv_common::CustomerId;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::data::{CustomerFeatureRecord, DataError, RawCustomerAggregate};

/// Why a customer left the modeling population.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// No orders at all; the monetary average is undefined.
    ZeroFrequency,
    /// A single order; the estimators need repeat purchases.
    SingleOrder,
    /// Repeat orders with no spend; the monetary model needs positive values.
    ZeroMonetary,
}

impl DropReason {
    pub const ALL: [DropReason; 3] = [
        DropReason::ZeroFrequency,
        DropReason::SingleOrder,
        DropReason::ZeroMonetary,
    ];
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DropReason::ZeroFrequency => write!(f, "zero_frequency"),
            DropReason::SingleOrder => write!(f, "single_order"),
            DropReason::ZeroMonetary => write!(f, "zero_monetary"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DroppedCustomer {
    pub customer_id: CustomerId,
    pub reason: DropReason,
}

/// Customers excluded from modeling, in input order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DropReport {
    pub dropped: Vec<DroppedCustomer>,
}

impl DropReport {
    pub fn count(&self, reason: DropReason) -> usize {
        self.dropped.iter().filter(|d| d.reason == reason).count()
    }

    pub fn total(&self) -> usize {
        self.dropped.len()
    }

    pub fn ids(&self, reason: DropReason) -> Vec<&CustomerId> {
        self.dropped
            .iter()
            .filter(|d| d.reason == reason)
            .map(|d| &d.customer_id)
            .collect()
    }

    pub fn merge(&mut self, other: DropReport) {
        self.dropped.extend(other.dropped);
    }
}

/// Reference date for tenure: latest last-order date plus `offset_days`, or
/// the explicit analysis date when given.
///
/// An explicit date before the latest last order would produce negative
/// recency-to-tenure gaps and is rejected.
pub fn analysis_reference_date(
    population: &[RawCustomerAggregate],
    offset_days: i64,
    explicit: Option<NaiveDate>,
) -> Result<NaiveDate, DataError> {
    let latest_order = population
        .iter()
        .map(|raw| raw.last_order_date)
        .max()
        .ok_or(DataError::EmptyPopulation)?;

    match explicit {
        Some(analysis_date) if analysis_date < latest_order => {
            Err(DataError::AnalysisDateTooEarly {
                analysis_date,
                latest_order,
            })
        }
        Some(analysis_date) => Ok(analysis_date),
        None => TimeDelta::try_days(offset_days)
            .and_then(|offset| latest_order.checked_add_signed(offset))
            .ok_or(DataError::ReferenceDateOutOfRange {
                latest_order,
                offset_days,
            }),
    }
}

fn weeks_between(from: NaiveDate, to: NaiveDate) -> f64 {
    (to - from).num_days() as f64 / 7.0
}

/// Derive one feature record per customer.
///
/// Customers without any order are dropped with [`DropReason::ZeroFrequency`].
/// Output preserves input order.
pub fn build_features(
    population: &[RawCustomerAggregate],
    reference: NaiveDate,
) -> (Vec<CustomerFeatureRecord>, DropReport) {
    let derived: Vec<Result<CustomerFeatureRecord, DroppedCustomer>> = population
        .par_iter()
        .map(|raw| {
            let frequency = raw.total_orders();
            if frequency == 0 {
                return Err(DroppedCustomer {
                    customer_id: raw.customer_id.clone(),
                    reason: DropReason::ZeroFrequency,
                });
            }
            Ok(CustomerFeatureRecord {
                customer_id: raw.customer_id.clone(),
                recency_weeks: weeks_between(raw.first_order_date, raw.last_order_date),
                tenure_weeks: weeks_between(raw.first_order_date, reference),
                frequency,
                monetary_avg: raw.total_value() / frequency as f64,
            })
        })
        .collect();

    let mut records = Vec::with_capacity(derived.len());
    let mut report = DropReport::default();
    for item in derived {
        match item {
            Ok(record) => records.push(record),
            Err(dropped) => report.dropped.push(dropped),
        }
    }
    (records, report)
}

/// Keep only repeat customers (`frequency > 1`) with a positive monetary
/// average.
pub fn qualify(records: Vec<CustomerFeatureRecord>) -> (Vec<CustomerFeatureRecord>, DropReport) {
    let mut report = DropReport::default();
    let kept = records
        .into_iter()
        .filter(|record| {
            let reason = if record.frequency <= 1 {
                DropReason::SingleOrder
            } else if record.monetary_avg <= 0.0 {
                DropReason::ZeroMonetary
            } else {
                return true;
            };
            report.dropped.push(DroppedCustomer {
                customer_id: record.customer_id.clone(),
                reason,
            });
            false
        })
        .collect();
    (kept, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::test_support::{date, make_raw};

    #[test]
    fn reference_date_is_latest_order_plus_offset() {
        let population = vec![
            make_raw("a", "2020-01-01", "2021-05-20", 2, 1, 10.0),
            make_raw("b", "2020-03-01", "2021-05-30", 2, 1, 10.0),
        ];
        assert_eq!(
            analysis_reference_date(&population, 2, None).unwrap(),
            date("2021-06-01")
        );
    }

    #[test]
    fn explicit_analysis_date_overrides_and_is_checked() {
        let population = vec![make_raw("a", "2020-01-01", "2021-05-30", 2, 1, 10.0)];
        assert_eq!(
            analysis_reference_date(&population, 2, Some(date("2021-07-01"))).unwrap(),
            date("2021-07-01")
        );
        assert!(matches!(
            analysis_reference_date(&population, 2, Some(date("2021-05-01"))),
            Err(DataError::AnalysisDateTooEarly { .. })
        ));
        assert!(matches!(
            analysis_reference_date(&[], 2, None),
            Err(DataError::EmptyPopulation)
        ));
    }

    #[test]
    fn reference_date_overflow_is_an_error() {
        let population = vec![make_raw("a", "2020-01-01", "2021-05-30", 2, 1, 10.0)];
        assert!(matches!(
            analysis_reference_date(&population, i64::MAX / 2, None),
            Err(DataError::ReferenceDateOutOfRange { .. })
        ));
        assert!(matches!(
            analysis_reference_date(&population, 400_000_000, None),
            Err(DataError::ReferenceDateOutOfRange { .. })
        ));
    }

    #[test]
    fn features_merge_channels_and_use_weeks() {
        let population = vec![make_raw("a", "2021-01-01", "2021-01-15", 3, 1, 400.0)];
        let (records, drops) = build_features(&population, date("2021-01-29"));
        assert_eq!(drops.total(), 0);
        let r = &records[0];
        assert_eq!(r.frequency, 4);
        assert_eq!(r.monetary_avg, 100.0);
        assert_eq!(r.recency_weeks, 2.0);
        assert_eq!(r.tenure_weeks, 4.0);
    }

    #[test]
    fn zero_frequency_is_dropped_not_divided() {
        let population = vec![
            make_raw("zero", "2021-01-01", "2021-01-15", 0, 0, 0.0),
            make_raw("ok", "2021-01-01", "2021-01-15", 1, 0, 50.0),
        ];
        let (records, drops) = build_features(&population, date("2021-02-01"));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].customer_id.as_str(), "ok");
        assert_eq!(drops.count(DropReason::ZeroFrequency), 1);
        assert_eq!(drops.ids(DropReason::ZeroFrequency)[0].as_str(), "zero");
    }

    #[test]
    fn qualify_drops_single_orders_in_order() {
        let population = vec![
            make_raw("a", "2021-01-01", "2021-01-15", 1, 0, 50.0),
            make_raw("b", "2021-01-01", "2021-01-15", 1, 1, 50.0),
            make_raw("c", "2021-01-01", "2021-01-15", 0, 1, 50.0),
        ];
        let (records, _) = build_features(&population, date("2021-02-01"));
        let (kept, drops) = qualify(records);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].customer_id.as_str(), "b");
        let ids: Vec<&str> = drops.ids(DropReason::SingleOrder).iter().map(|id| id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn qualify_drops_repeat_buyers_without_spend() {
        let population = vec![
            make_raw("paid", "2021-01-01", "2021-01-15", 2, 1, 90.0),
            make_raw("free", "2021-01-01", "2021-01-15", 2, 1, 0.0),
            make_raw("once", "2021-01-01", "2021-01-15", 1, 0, 0.0),
        ];
        let (records, _) = build_features(&population, date("2021-02-01"));
        let (kept, drops) = qualify(records);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].customer_id.as_str(), "paid");
        assert_eq!(drops.ids(DropReason::ZeroMonetary)[0].as_str(), "free");
        assert_eq!(drops.ids(DropReason::SingleOrder)[0].as_str(), "once");
        assert_eq!(drops.total(), 2);
    }
}
