//! Outlier suppression for raw customer aggregates.
//!
//! Limits are `Q1 - k * IQR` and `Q3 + k * IQR`, where "Q1" and "Q3" are the
//! configured low/high quantiles (1st and 99th percentile by default) and
//! `IQR = Q3 - Q1`. Values beyond a limit are replaced by the limit rounded
//! half-to-even. Count columns are always rounded so frequencies stay
//! integral.

use cltv_config::SuppressionSettings;
use cltv_math::quantiles;
use serde::{Deserialize, Serialize};

use crate::data::{DataError, RawCustomerAggregate};

/// Suppressible aggregate columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    OrderNumOnline,
    OrderNumOffline,
    ValueOnline,
    ValueOffline,
}

impl Column {
    /// The four columns suppressed by a standard run.
    pub const ALL: [Column; 4] = [
        Column::OrderNumOnline,
        Column::OrderNumOffline,
        Column::ValueOffline,
        Column::ValueOnline,
    ];

    /// Input column name.
    pub fn name(self) -> &'static str {
        match self {
            Column::OrderNumOnline => "order_num_total_ever_online",
            Column::OrderNumOffline => "order_num_total_ever_offline",
            Column::ValueOnline => "customer_value_total_ever_online",
            Column::ValueOffline => "customer_value_total_ever_offline",
        }
    }

    pub fn is_count(self) -> bool {
        matches!(self, Column::OrderNumOnline | Column::OrderNumOffline)
    }

    fn get(self, raw: &RawCustomerAggregate) -> f64 {
        match self {
            Column::OrderNumOnline => raw.order_num_online as f64,
            Column::OrderNumOffline => raw.order_num_offline as f64,
            Column::ValueOnline => raw.value_online,
            Column::ValueOffline => raw.value_offline,
        }
    }

    fn set(self, raw: &mut RawCustomerAggregate, value: f64) {
        match self {
            // Replacement limits for counts are already rounded.
            Column::OrderNumOnline => raw.order_num_online = value.max(0.0) as u32,
            Column::OrderNumOffline => raw.order_num_offline = value.max(0.0) as u32,
            Column::ValueOnline => raw.value_online = value,
            Column::ValueOffline => raw.value_offline = value,
        }
    }
}

impl std::fmt::Display for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Low/high outlier limits for one column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutlierLimits {
    pub low: f64,
    pub up: f64,
}

/// Compute outlier limits for a column.
///
/// Returns NaN limits for an empty column.
pub fn outlier_thresholds(values: &[f64], settings: &SuppressionSettings) -> OutlierLimits {
    let q = quantiles(values, &[settings.lower_quantile, settings.upper_quantile]);
    let (q1, q3) = (q[0], q[1]);
    let iqr = q3 - q1;
    OutlierLimits {
        low: q1 - settings.iqr_multiplier * iqr,
        up: q3 + settings.iqr_multiplier * iqr,
    }
}

/// What suppression did to one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSuppression {
    pub column: Column,
    pub limits: OutlierLimits,
    /// Value written in place of low outliers.
    pub low_replacement: f64,
    /// Value written in place of high outliers.
    pub up_replacement: f64,
    pub replaced_low: usize,
    pub replaced_high: usize,
}

impl ColumnSuppression {
    pub fn replaced(&self) -> usize {
        self.replaced_low + self.replaced_high
    }
}

/// Per-column suppression outcome.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SuppressionReport {
    pub columns: Vec<ColumnSuppression>,
}

impl SuppressionReport {
    pub fn total_replaced(&self) -> usize {
        self.columns.iter().map(ColumnSuppression::replaced).sum()
    }

    pub fn column(&self, column: Column) -> Option<&ColumnSuppression> {
        self.columns.iter().find(|c| c.column == column)
    }
}

/// Replace outliers in place, column by column.
///
/// Each column's limits are computed from that column's values before any
/// replacement in it; columns are independent.
pub fn suppress(
    population: &mut [RawCustomerAggregate],
    columns: &[Column],
    settings: &SuppressionSettings,
) -> Result<SuppressionReport, DataError> {
    if population.is_empty() {
        return Err(DataError::EmptyPopulation);
    }

    let mut report = SuppressionReport::default();
    for &column in columns {
        let values: Vec<f64> = population.iter().map(|raw| column.get(raw)).collect();
        let limits = outlier_thresholds(&values, settings);

        let round = column.is_count() || settings.round_monetary_limits;
        let replacement = |limit: f64| if round { limit.round_ties_even() } else { limit };
        let low_replacement = replacement(limits.low);
        let up_replacement = replacement(limits.up);

        let mut replaced_low = 0;
        let mut replaced_high = 0;
        for (raw, value) in population.iter_mut().zip(values) {
            if value < limits.low {
                column.set(raw, low_replacement);
                replaced_low += 1;
            } else if value > limits.up {
                column.set(raw, up_replacement);
                replaced_high += 1;
            }
        }

        report.columns.push(ColumnSuppression {
            column,
            limits,
            low_replacement,
            up_replacement,
            replaced_low,
            replaced_high,
        });
    }
    Ok(report)
}
