//! End-to-end pipeline tests over small CSV populations.
//!
//! These run the real BG/NBD and Gamma-Gamma estimators; no stubs.

use cltv_config::PipelineConfig;
use cltv_core::data::read_csv;
use cltv_core::features::DropReason;
use cltv_core::{CltvPipeline, CltvReport, Segment, SegmentationOutcome};

const HEADER: &str = "master_id,order_channel,last_order_channel,first_order_date,last_order_date,\
last_order_date_online,last_order_date_offline,order_num_total_ever_online,\
order_num_total_ever_offline,customer_value_total_ever_offline,customer_value_total_ever_online,\
interested_in_categories_12";

/// Five customers with combined frequencies 2, 3, 5, 1 and 10.
fn five_customers() -> String {
    let rows = [
        "c1,Android App,Offline,2020-01-05,2021-03-10,2021-03-10,2020-11-02,1,1,150.0,150.0,[KADIN]",
        "c2,Desktop,Desktop,2019-11-01,2020-06-20,2020-06-20,2020-02-11,2,1,180.0,300.0,\"[ERKEK, KADIN]\"",
        "c3,iOS App,iOS App,2020-03-15 00:00:00,2021-05-01 00:00:00,2021-05-01,2021-01-20,3,2,280.0,420.0,[AKTIFSPOR]",
        "c4,Mobile,Offline,2020-08-01,2020-08-01,,2020-08-01,1,0,0.0,90.0,[]",
        "c5,Ios App,Mobile,2019-06-01,2021-05-25,2021-05-25,2021-04-30,6,4,620.0,930.0,\"[KADIN, COCUK, ERKEK]\"",
    ];
    format!("{HEADER}\n{}\n", rows.join("\n"))
}

fn run(config: PipelineConfig, csv: &str) -> CltvReport {
    let population = read_csv(csv.as_bytes()).expect("fixture should load");
    CltvPipeline::new(config).run(population).expect("pipeline should succeed")
}

#[test]
fn single_order_customer_is_excluded() {
    let report = run(PipelineConfig::default(), &five_customers());
    assert_eq!(report.customers_loaded, 5);
    assert_eq!(report.results.len(), 4);
    assert_eq!(report.drops.count(DropReason::SingleOrder), 1);
    assert_eq!(report.drops.ids(DropReason::SingleOrder)[0].as_str(), "c4");
    assert!(report.results.iter().all(|r| r.customer_id.as_str() != "c4"));

    let frequencies: Vec<u32> = report.results.iter().map(|r| r.frequency).collect();
    assert_eq!(frequencies, vec![2, 3, 5, 10]);
}

#[test]
fn every_customer_gets_a_value_and_a_distinct_tier() {
    let report = run(PipelineConfig::default(), &five_customers());
    assert_eq!(
        report.reference_date,
        chrono::NaiveDate::from_ymd_opt(2021, 5, 27).unwrap()
    );

    for r in &report.results {
        assert!(r.cltv.is_finite() && r.cltv > 0.0, "{}: cltv {}", r.customer_id, r.cltv);
        assert!(r.tenure_weeks >= r.recency_weeks);
        assert!(r.exp_sales_horizon1 > 0.0);
        assert!(r.exp_sales_horizon2 >= r.exp_sales_horizon1);
        assert!(r.exp_average_value > 0.0);
    }

    let mut ranked: Vec<_> = report.results.iter().collect();
    ranked.sort_by(|a, b| b.cltv.total_cmp(&a.cltv));
    let labels: Vec<Option<Segment>> = ranked.iter().map(|r| r.cltv_segment).collect();
    assert_eq!(
        labels,
        vec![Some(Segment::A), Some(Segment::B), Some(Segment::C), Some(Segment::D)]
    );
    assert_eq!(ranked[0].scaled_cltv, 1.0);
    assert_eq!(ranked[3].scaled_cltv, 0.0);

    match &report.segmentation {
        SegmentationOutcome::Segmented { summaries, .. } => {
            assert_eq!(summaries.len(), 4);
            assert!(summaries.iter().all(|s| s.count == 1));
        }
        other => panic!("expected segmentation, got {other:?}"),
    }
}

#[test]
fn fitted_parameters_are_reported() {
    let report = run(PipelineConfig::default(), &five_customers());
    let names: Vec<&str> = report
        .frequency_model
        .parameters
        .iter()
        .map(|(name, _)| name.as_str())
        .collect();
    assert_eq!(names, vec!["r", "alpha", "a", "b"]);
    assert!(report.frequency_model.diagnostics.converged);
    assert_eq!(report.frequency_model.diagnostics.customers, 4);

    let q = report
        .monetary_model
        .parameters
        .iter()
        .find(|(name, _)| name == "q")
        .map(|(_, v)| *v)
        .unwrap();
    assert!(q > 1.0);
}

#[test]
fn removing_the_discount_raises_every_value() {
    let discounted = run(PipelineConfig::default(), &five_customers());
    let mut config = PipelineConfig::default();
    config.cltv.discount_rate = 0.0;
    let undiscounted = run(config, &five_customers());

    for (d, u) in discounted.results.iter().zip(&undiscounted.results) {
        assert_eq!(d.customer_id, u.customer_id);
        assert!(u.cltv > d.cltv, "{}: {} <= {}", d.customer_id, u.cltv, d.cltv);
    }
}

#[test]
fn longer_forecast_window_is_worth_more() {
    let six = run(PipelineConfig::default(), &five_customers());
    let mut config = PipelineConfig::default();
    config.cltv.time = 12;
    let twelve = run(config, &five_customers());

    for (a, b) in six.results.iter().zip(&twelve.results) {
        assert!(b.cltv > a.cltv);
    }
}

#[test]
fn explicit_analysis_date_moves_tenure() {
    let mut config = PipelineConfig::default();
    config.features.analysis_date = chrono::NaiveDate::from_ymd_opt(2021, 6, 1);
    let report = run(config, &five_customers());
    let default = run(PipelineConfig::default(), &five_customers());
    assert_eq!(report.reference_date.to_string(), "2021-06-01");
    for (a, b) in report.results.iter().zip(&default.results) {
        assert!((a.tenure_weeks - b.tenure_weeks - 5.0 / 7.0).abs() < 1e-12);
        assert_eq!(a.recency_weeks, b.recency_weeks);
    }
}

#[test]
fn reversed_dates_fail_the_load() {
    let csv = format!(
        "{HEADER}\nbad,Mobile,Mobile,2021-05-01,2021-01-01,,,2,1,10.0,10.0,[]\n"
    );
    let err = read_csv(csv.as_bytes()).unwrap_err();
    let common: cltv_common::Error = err.into();
    assert_eq!(common.code(), 22);
}
