//! Discounted lifetime value from the two fitted models.
//!
//! The forecast window of `time` months is split into monthly steps. Each
//! step contributes the purchases expected in that month, valued at the
//! customer's expected average transaction value and discounted at the
//! monthly rate.

use cltv_config::CltvSettings;

use crate::data::CustomerFeatureRecord;
use crate::model::{FittedFrequencyModel, FittedMonetaryModel};

/// Name reported when the combined value, rather than either model, is not
/// finite.
pub const SYNTHESIS_NAME: &str = "CLTV synthesis";

/// Lifetime value of one customer over `settings.time` months.
pub fn customer_lifetime_value<F, M>(
    frequency_model: &F,
    monetary_model: &M,
    record: &CustomerFeatureRecord,
    settings: &CltvSettings,
) -> f64
where
    F: FittedFrequencyModel + ?Sized,
    M: FittedMonetaryModel + ?Sized,
{
    let exp_average_value = monetary_model
        .conditional_expected_average_value(record.frequency as f64, record.monetary_avg);
    discounted_value(frequency_model, record, exp_average_value, settings)
}

/// Lifetime value given an already predicted average transaction value.
///
/// Month `i` covers `((i - 1) * factor, i * factor]` model periods, where
/// `factor` is the number of periods per month for `settings.freq`.
/// Monthly increments are floored at zero.
pub fn discounted_value<F>(
    frequency_model: &F,
    record: &CustomerFeatureRecord,
    exp_average_value: f64,
    settings: &CltvSettings,
) -> f64
where
    F: FittedFrequencyModel + ?Sized,
{
    let factor = settings.freq.periods_per_month();
    let frequency = record.frequency as f64;
    let expected_by = |periods: f64| {
        frequency_model.expected_purchases(
            periods,
            frequency,
            record.recency_weeks,
            record.tenure_weeks,
        )
    };

    let mut cltv = 0.0;
    let mut previous = 0.0;
    for month in 1..=settings.time {
        let cumulative = expected_by(month as f64 * factor);
        let purchases = (cumulative - previous).max(0.0);
        previous = cumulative;
        cltv += exp_average_value * purchases / (1.0 + settings.discount_rate).powi(month as i32);
    }
    cltv
}
