//! Value tiers by cltv quartile.
//!
//! Customers are ranked by cltv (stable, ascending) and split into four
//! equal-count groups labelled D (lowest) to A (highest).

use cltv_math::{mean, quantiles};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::CltvResult;

/// Number of tiers.
pub const SEGMENT_COUNT: usize = 4;

/// A value tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Segment {
    D,
    C,
    B,
    A,
}

impl Segment {
    /// Tiers from lowest to highest value.
    pub const ASCENDING: [Segment; SEGMENT_COUNT] = [Segment::D, Segment::C, Segment::B, Segment::A];

    pub fn as_str(self) -> &'static str {
        match self {
            Segment::D => "D",
            Segment::C => "C",
            Segment::B => "B",
            Segment::A => "A",
        }
    }
}

impl std::fmt::Display for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SegmentError {
    #[error("need at least {required} distinct cltv values to segment, found {distinct}")]
    Degenerate { distinct: usize, required: usize },
}

impl From<SegmentError> for cltv_common::Error {
    fn from(err: SegmentError) -> Self {
        match err {
            SegmentError::Degenerate { distinct, required } => {
                cltv_common::Error::SegmentationDegenerate { distinct, required }
            }
        }
    }
}

fn distinct_count(values: &[f64]) -> usize {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted.dedup_by(|a, b| a.total_cmp(b).is_eq());
    sorted.len()
}

/// Assign a tier to each value, in input order.
///
/// Rank `i` of `n` (ascending, ties by input position) lands in group
/// `floor(4 i / n)`, so group sizes differ by at most one.
pub fn segment(values: &[f64]) -> Result<Vec<Segment>, SegmentError> {
    let distinct = distinct_count(values);
    if distinct < SEGMENT_COUNT {
        return Err(SegmentError::Degenerate {
            distinct,
            required: SEGMENT_COUNT,
        });
    }

    let n = values.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| values[i].total_cmp(&values[j]));

    let mut labels = vec![Segment::D; n];
    for (rank, &idx) in order.iter().enumerate() {
        labels[idx] = Segment::ASCENDING[SEGMENT_COUNT * rank / n];
    }
    Ok(labels)
}

/// Empirical quartiles of the cltv column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuartileBoundaries {
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
}

pub fn quartile_boundaries(values: &[f64]) -> QuartileBoundaries {
    let q = quantiles(values, &[0.25, 0.5, 0.75]);
    QuartileBoundaries {
        q1: q[0],
        median: q[1],
        q3: q[2],
    }
}

/// Per-tier profile used for action planning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentSummary {
    pub segment: Segment,
    pub count: usize,
    pub cltv_min: f64,
    pub cltv_mean: f64,
    pub cltv_max: f64,
    pub recency_weeks_mean: f64,
    pub tenure_weeks_mean: f64,
    pub frequency_mean: f64,
    pub monetary_avg_mean: f64,
    pub exp_sales_horizon1_mean: f64,
    pub exp_sales_horizon2_mean: f64,
}

/// Summaries for every populated tier, best tier first.
pub fn summarize(results: &[CltvResult]) -> Vec<SegmentSummary> {
    Segment::ASCENDING
        .iter()
        .rev()
        .filter_map(|&segment| {
            let members: Vec<&CltvResult> = results
                .iter()
                .filter(|r| r.cltv_segment == Some(segment))
                .collect();
            if members.is_empty() {
                return None;
            }
            let column = |f: fn(&CltvResult) -> f64| -> Vec<f64> { members.iter().map(|r| f(r)).collect() };
            let cltv = column(|r| r.cltv);
            Some(SegmentSummary {
                segment,
                count: members.len(),
                cltv_min: cltv.iter().copied().fold(f64::INFINITY, f64::min),
                cltv_mean: mean(&cltv),
                cltv_max: cltv.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                recency_weeks_mean: mean(&column(|r| r.recency_weeks)),
                tenure_weeks_mean: mean(&column(|r| r.tenure_weeks)),
                frequency_mean: mean(&column(|r| r.frequency as f64)),
                monetary_avg_mean: mean(&column(|r| r.monetary_avg)),
                exp_sales_horizon1_mean: mean(&column(|r| r.exp_sales_horizon1)),
                exp_sales_horizon2_mean: mean(&column(|r| r.exp_sales_horizon2)),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cltv_common::CustomerId;

    fn sizes(labels: &[Segment]) -> [usize; 4] {
        let mut out = [0; 4];
        for l in labels {
            out[*l as usize] += 1;
        }
        out
    }

    #[test]
    fn four_values_get_one_tier_each() {
        let labels = segment(&[30.0, 10.0, 40.0, 20.0]).unwrap();
        assert_eq!(labels, vec![Segment::B, Segment::D, Segment::A, Segment::C]);
    }

    #[test]
    fn uneven_sizes_differ_by_at_most_one() {
        for n in 4..40 {
            let values: Vec<f64> = (0..n).map(|i| ((i * 7919) % 101) as f64).collect();
            let labels = segment(&values).unwrap();
            let s = sizes(&labels);
            let (min, max) = (s.iter().min().unwrap(), s.iter().max().unwrap());
            assert!(*min >= 1 && max - min <= 1, "n={n} sizes={s:?}");
        }
    }

    #[test]
    fn top_tier_dominates_bottom_tier() {
        let values = [5.0, 1.0, 9.0, 3.0, 7.0, 2.0, 8.0, 4.0, 6.0];
        let labels = segment(&values).unwrap();
        let tier = |s: Segment| -> Vec<f64> {
            values
                .iter()
                .zip(&labels)
                .filter(|(_, l)| **l == s)
                .map(|(v, _)| *v)
                .collect()
        };
        let min_a = tier(Segment::A).into_iter().fold(f64::INFINITY, f64::min);
        let max_d = tier(Segment::D).into_iter().fold(f64::NEG_INFINITY, f64::max);
        assert!(min_a >= max_d);
    }

    #[test]
    fn ties_keep_input_order() {
        let labels = segment(&[1.0, 1.0, 2.0, 3.0, 4.0, 4.0, 4.0, 4.0]).unwrap();
        assert_eq!(&labels[..2], &[Segment::D, Segment::D]);
        assert_eq!(&labels[4..], &[Segment::B, Segment::B, Segment::A, Segment::A]);
    }

    #[test]
    fn too_few_distinct_values_is_degenerate() {
        let err = segment(&[1.0, 1.0, 2.0, 3.0, 3.0]).unwrap_err();
        assert_eq!(err, SegmentError::Degenerate { distinct: 3, required: 4 });
        let common: cltv_common::Error = err.into();
        assert!(common.is_recoverable());
        assert!(segment(&[]).is_err());
    }

    #[test]
    fn summaries_are_best_first() {
        let results: Vec<CltvResult> = [10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0]
            .iter()
            .enumerate()
            .map(|(i, &cltv)| CltvResult {
                customer_id: CustomerId::new(format!("c{i}")),
                recency_weeks: 10.0,
                tenure_weeks: 20.0,
                frequency: 2 + i as u32,
                monetary_avg: 50.0,
                exp_sales_horizon1: 0.5,
                exp_sales_horizon2: 0.9,
                exp_average_value: 55.0,
                cltv,
                scaled_cltv: 0.0,
                cltv_segment: None,
            })
            .collect();
        let labels = segment(&results.iter().map(|r| r.cltv).collect::<Vec<_>>()).unwrap();
        let results: Vec<CltvResult> = results
            .into_iter()
            .zip(labels)
            .map(|(mut r, l)| {
                r.cltv_segment = Some(l);
                r
            })
            .collect();

        let summaries = summarize(&results);
        let order: Vec<Segment> = summaries.iter().map(|s| s.segment).collect();
        assert_eq!(order, vec![Segment::A, Segment::B, Segment::C, Segment::D]);
        assert_eq!(summaries[0].count, 2);
        assert_eq!(summaries[0].cltv_min, 70.0);
        assert_eq!(summaries[0].cltv_mean, 75.0);
        assert_eq!(summaries[3].cltv_max, 20.0);
        assert_eq!(summaries[3].frequency_mean, 2.5);

        let q = quartile_boundaries(&results.iter().map(|r| r.cltv).collect::<Vec<_>>());
        assert!((q.median - 45.0).abs() < 1e-12);
        assert!(q.q1 < q.median && q.median < q.q3);
    }
}
