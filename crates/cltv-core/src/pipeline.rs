//! End-to-end CLTV run over one population snapshot.
//!
//! Stages run strictly downstream: suppress, reference date, features,
//! qualify, fit both estimators, predict, synthesize, scale, segment.
//! Per-customer stages run on the rayon pool and preserve input order; the
//! two fits are whole-population barriers.

use chrono::NaiveDate;
use cltv_common::{CustomerId, RunId};
use cltv_config::{ConfigSnapshot, PipelineConfig};
use cltv_math::{min_max_scale, pearson_correlation};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::{
    validate_population, CltvResult, CustomerFeatureRecord, DataError, RawCustomerAggregate,
};
use crate::features::{analysis_reference_date, build_features, qualify, DropReason, DropReport};
use crate::logging::{event_names, LogContext, Stage};
use crate::model::{
    BgNbdEstimator, FittedFrequencyModel, FittedMonetaryModel, FrequencyEstimator,
    GammaGammaEstimator, ModelError, ModelSummary, MonetaryEstimator,
};
use crate::segment::{quartile_boundaries, segment, summarize, QuartileBoundaries, SegmentSummary};
use crate::suppress::{suppress, Column, SuppressionReport};
use crate::synthesize::{discounted_value, SYNTHESIS_NAME};

/// Above this absolute frequency/monetary correlation the Gamma-Gamma
/// independence assumption is suspect.
pub const CORRELATION_WARN_THRESHOLD: f64 = 0.3;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("failed to build worker pool: {0}")]
    ThreadPool(String),
}

impl From<PipelineError> for cltv_common::Error {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Data(e) => e.into(),
            PipelineError::Model(e) => e.into(),
            PipelineError::ThreadPool(msg) => cltv_common::Error::InvalidConfig(msg),
        }
    }
}

/// Segmentation result: tiers assigned, or the reason they were not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SegmentationOutcome {
    Segmented {
        summaries: Vec<SegmentSummary>,
        quartiles: QuartileBoundaries,
    },
    Degenerate {
        message: String,
    },
}

impl SegmentationOutcome {
    pub fn is_segmented(&self) -> bool {
        matches!(self, SegmentationOutcome::Segmented { .. })
    }
}

/// Everything a run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CltvReport {
    pub run_id: RunId,
    pub reference_date: NaiveDate,
    /// Rows in the input population, before any drops.
    pub customers_loaded: usize,
    /// One result per qualifying customer, in input order.
    pub results: Vec<CltvResult>,
    pub drops: DropReport,
    pub suppression: SuppressionReport,
    pub frequency_model: ModelSummary,
    pub monetary_model: ModelSummary,
    /// Pearson correlation of frequency and monetary average; `None` when
    /// undefined (constant column).
    pub frequency_monetary_correlation: Option<f64>,
    pub segmentation: SegmentationOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<ConfigSnapshot>,
}

/// The CLTV pipeline, generic over the two estimators.
pub struct CltvPipeline<F = BgNbdEstimator, M = GammaGammaEstimator> {
    config: PipelineConfig,
    frequency_estimator: F,
    monetary_estimator: M,
    ctx: LogContext,
}

impl CltvPipeline {
    /// Pipeline with the in-tree BG/NBD and Gamma-Gamma estimators.
    pub fn new(config: PipelineConfig) -> Self {
        let frequency_estimator = BgNbdEstimator::from(&config.frequency_model);
        let monetary_estimator = GammaGammaEstimator::from(&config.monetary_model);
        CltvPipeline::with_estimators(config, frequency_estimator, monetary_estimator)
    }
}

/// Per-customer model outputs before scaling and segmentation.
struct Prediction {
    exp_sales_horizon1: f64,
    exp_sales_horizon2: f64,
    exp_average_value: f64,
    cltv: f64,
}

impl<F, M> CltvPipeline<F, M>
where
    F: FrequencyEstimator + Sync,
    M: MonetaryEstimator + Sync,
{
    pub fn with_estimators(
        config: PipelineConfig,
        frequency_estimator: F,
        monetary_estimator: M,
    ) -> Self {
        CltvPipeline {
            config,
            frequency_estimator,
            monetary_estimator,
            ctx: LogContext::default(),
        }
    }

    /// Use an existing log context (run id) instead of a fresh one.
    pub fn with_context(mut self, ctx: LogContext) -> Self {
        self.ctx = ctx;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn context(&self) -> &LogContext {
        &self.ctx
    }

    /// Run on a population. `threads > 0` in the config runs the
    /// per-customer stages on a dedicated pool of that size.
    pub fn run(&self, population: Vec<RawCustomerAggregate>) -> Result<CltvReport, PipelineError> {
        if self.config.threads == 0 {
            return self.run_stages(population);
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.threads)
            .build()
            .map_err(|e| PipelineError::ThreadPool(e.to_string()))?;
        pool.install(|| self.run_stages(population))
    }

    fn run_stages(
        &self,
        mut population: Vec<RawCustomerAggregate>,
    ) -> Result<CltvReport, PipelineError> {
        let ctx = &self.ctx;
        let config = &self.config;

        validate_population(&population)?;
        let customers_loaded = population.len();
        crate::log_event!(
            ctx,
            INFO,
            event_names::RUN_STARTED,
            Stage::Init,
            "CLTV run started",
            customers = customers_loaded
        );

        let suppression = suppress(&mut population, &Column::ALL, &config.suppression)?;
        for column in &suppression.columns {
            crate::log_event!(
                ctx,
                INFO,
                event_names::SUPPRESS_COLUMN,
                Stage::Suppress,
                format!("{} outliers replaced", column.column.name()),
                column = column.column.name(),
                low_limit = column.limits.low,
                up_limit = column.limits.up,
                replaced_low = column.replaced_low,
                replaced_high = column.replaced_high
            );
        }

        let reference = analysis_reference_date(
            &population,
            config.features.reference_offset_days,
            config.features.analysis_date,
        )?;
        crate::log_event!(
            ctx,
            INFO,
            event_names::FEATURES_REFERENCE_DATE,
            Stage::Features,
            "analysis reference date fixed",
            reference_date = tracing::field::display(reference)
        );

        let (records, mut drops) = build_features(&population, reference);
        let (records, unqualified) = qualify(records);
        drops.merge(unqualified);
        self.log_drops(&drops, records.len());

        let frequency: Vec<f64> = records.iter().map(|r| r.frequency as f64).collect();
        let monetary: Vec<f64> = records.iter().map(|r| r.monetary_avg).collect();
        let correlation = frequency_monetary_correlation(&records);
        self.log_correlation(correlation);

        crate::log_event!(
            ctx,
            INFO,
            event_names::FIT_STARTED,
            Stage::Fit,
            "fitting frequency model",
            customers = records.len()
        );
        let frequency_model = self.frequency_estimator.fit(&records)?;
        let frequency_summary = frequency_model.summary();
        self.log_fit(&frequency_summary);

        crate::log_event!(
            ctx,
            INFO,
            event_names::FIT_STARTED,
            Stage::Fit,
            "fitting monetary model",
            customers = records.len()
        );
        let monetary_model = self.monetary_estimator.fit(&frequency, &monetary)?;
        let monetary_summary = monetary_model.summary();
        self.log_fit(&monetary_summary);

        let predictions = self.predict(
            (&frequency_model, &frequency_summary.diagnostics.model),
            (&monetary_model, &monetary_summary.diagnostics.model),
            &records,
        )?;
        crate::log_event!(
            ctx,
            INFO,
            event_names::SYNTHESIZE_FINISHED,
            Stage::Synthesize,
            "lifetime values computed",
            customers = predictions.len()
        );

        let cltv: Vec<f64> = predictions.iter().map(|p| p.cltv).collect();
        let scaled = min_max_scale(&cltv);
        let mut results: Vec<CltvResult> = records
            .into_iter()
            .zip(predictions)
            .zip(scaled)
            .map(|((record, p), scaled_cltv)| CltvResult {
                customer_id: record.customer_id,
                recency_weeks: record.recency_weeks,
                tenure_weeks: record.tenure_weeks,
                frequency: record.frequency,
                monetary_avg: record.monetary_avg,
                exp_sales_horizon1: p.exp_sales_horizon1,
                exp_sales_horizon2: p.exp_sales_horizon2,
                exp_average_value: p.exp_average_value,
                cltv: p.cltv,
                scaled_cltv,
                cltv_segment: None,
            })
            .collect();

        let segmentation = match segment(&cltv) {
            Ok(labels) => {
                for (result, label) in results.iter_mut().zip(labels) {
                    result.cltv_segment = Some(label);
                }
                let summaries = summarize(&results);
                crate::log_event!(
                    ctx,
                    INFO,
                    event_names::SEGMENT_FINISHED,
                    Stage::Segment,
                    "customers segmented",
                    segments = summaries.len()
                );
                SegmentationOutcome::Segmented {
                    summaries,
                    quartiles: quartile_boundaries(&cltv),
                }
            }
            Err(err) => {
                crate::log_event!(
                    ctx,
                    WARN,
                    event_names::SEGMENT_DEGENERATE,
                    Stage::Segment,
                    format!("segmentation skipped: {err}")
                );
                SegmentationOutcome::Degenerate {
                    message: err.to_string(),
                }
            }
        };

        crate::log_event!(
            ctx,
            INFO,
            event_names::RUN_FINISHED,
            Stage::Output,
            "CLTV run finished",
            customers = results.len(),
            dropped = drops.total()
        );

        Ok(CltvReport {
            run_id: ctx.run_id.clone(),
            reference_date: reference,
            customers_loaded,
            results,
            drops,
            suppression,
            frequency_model: frequency_summary,
            monetary_model: monetary_summary,
            frequency_monetary_correlation: correlation,
            segmentation,
            config: None,
        })
    }

    /// Per-customer predictions. Each fitted model comes with the name its
    /// summary reports, used to attribute non-finite outputs.
    fn predict(
        &self,
        (frequency_model, frequency_name): (&F::Fitted, &str),
        (monetary_model, monetary_name): (&M::Fitted, &str),
        records: &[CustomerFeatureRecord],
    ) -> Result<Vec<Prediction>, ModelError> {
        let horizon1 = self.config.forecast.horizon1_weeks();
        let horizon2 = self.config.forecast.horizon2_weeks();
        let cltv_settings = &self.config.cltv;

        let predictions = records
            .par_iter()
            .map(|record| {
                let frequency = record.frequency as f64;
                let sales = |horizon: f64| {
                    frequency_model.expected_purchases(
                        horizon,
                        frequency,
                        record.recency_weeks,
                        record.tenure_weeks,
                    )
                };
                let exp_sales_horizon1 = sales(horizon1);
                let exp_sales_horizon2 = sales(horizon2);
                if !exp_sales_horizon1.is_finite() || !exp_sales_horizon2.is_finite() {
                    return Err(non_finite(frequency_name, &record.customer_id));
                }

                let exp_average_value = monetary_model
                    .conditional_expected_average_value(frequency, record.monetary_avg);
                if !exp_average_value.is_finite() {
                    return Err(non_finite(monetary_name, &record.customer_id));
                }

                let cltv =
                    discounted_value(frequency_model, record, exp_average_value, cltv_settings);
                if !cltv.is_finite() {
                    return Err(non_finite(SYNTHESIS_NAME, &record.customer_id));
                }

                Ok(Prediction {
                    exp_sales_horizon1,
                    exp_sales_horizon2,
                    exp_average_value,
                    cltv,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        crate::log_event!(
            self.ctx,
            INFO,
            event_names::PREDICT_FINISHED,
            Stage::Predict,
            "per-customer predictions finished",
            customers = predictions.len(),
            horizon1_weeks = horizon1,
            horizon2_weeks = horizon2
        );
        Ok(predictions)
    }

    fn log_drops(&self, drops: &DropReport, kept: usize) {
        let ctx = &self.ctx;
        crate::log_event!(
            ctx,
            INFO,
            event_names::FEATURES_DROPPED,
            Stage::Features,
            format!("{} customers excluded from modeling", drops.total()),
            zero_frequency = drops.count(DropReason::ZeroFrequency),
            single_order = drops.count(DropReason::SingleOrder),
            zero_monetary = drops.count(DropReason::ZeroMonetary),
            kept = kept
        );
        for reason in DropReason::ALL {
            let ids = drops.ids(reason);
            if ids.is_empty() {
                continue;
            }
            let joined = ids
                .iter()
                .map(|id| id.as_str())
                .collect::<Vec<_>>()
                .join(",");
            crate::log_event!(
                ctx,
                DEBUG,
                event_names::FEATURES_DROPPED_IDS,
                Stage::Features,
                "dropped customer ids",
                reason = tracing::field::display(reason),
                customer_ids = joined.as_str()
            );
        }
    }

    fn log_correlation(&self, correlation: Option<f64>) {
        let ctx = &self.ctx;
        let Some(rho) = correlation else {
            return;
        };
        crate::log_event!(
            ctx,
            DEBUG,
            event_names::FEATURES_CORRELATION,
            Stage::Features,
            "frequency/monetary correlation",
            rho = rho
        );
        if rho.abs() > CORRELATION_WARN_THRESHOLD {
            crate::log_event!(
                ctx,
                WARN,
                event_names::FEATURES_CORRELATION,
                Stage::Features,
                format!(
                    "frequency and monetary average are correlated (rho = {rho:.3}); \
                     Gamma-Gamma assumes independence"
                ),
                rho = rho
            );
        }
    }

    fn log_fit(&self, summary: &ModelSummary) {
        let params = summary
            .parameters
            .iter()
            .map(|(name, value)| format!("{name}={value:.6}"))
            .collect::<Vec<_>>()
            .join(" ");
        let d = &summary.diagnostics;
        crate::log_event!(
            self.ctx,
            INFO,
            event_names::FIT_FINISHED,
            Stage::Fit,
            format!("{} fitted", d.model),
            model = d.model.as_str(),
            parameters = params.as_str(),
            iterations = d.iterations,
            evaluations = d.evaluations,
            objective = d.objective
        );
    }
}

fn non_finite(model: &str, customer_id: &CustomerId) -> ModelError {
    ModelError::NonFinitePrediction {
        model: model.to_string(),
        customer_id: customer_id.to_string(),
    }
}

/// Pearson correlation between frequency and monetary average, if defined.
pub fn frequency_monetary_correlation(records: &[CustomerFeatureRecord]) -> Option<f64> {
    let frequency: Vec<f64> = records.iter().map(|r| r.frequency as f64).collect();
    let monetary: Vec<f64> = records.iter().map(|r| r.monetary_avg).collect();
    let rho = pearson_correlation(&frequency, &monetary);
    rho.is_finite().then_some(rho)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::test_support::make_raw;
    use crate::model::{FitDiagnostics, ModelSummary};
    use crate::segment::Segment;

    /// Population with a spread of repeat buyers and a few drops.
    fn population() -> Vec<RawCustomerAggregate> {
        let mut population = Vec::new();
        for i in 0..24u32 {
            let first = format!("2020-{:02}-{:02}", 1 + i % 6, 1 + i % 27);
            let last = format!("2021-{:02}-{:02}", 1 + i % 5, 1 + (i * 3) % 27);
            let online = 1 + i % 5;
            let offline = 1 + (i * 7) % 4;
            let value = (online + offline) as f64 * (120.0 + ((i * 13) % 9) as f64 * 5.0);
            population.push(make_raw(&format!("c{i:02}"), &first, &last, online, offline, value));
        }
        population.push(make_raw("single", "2020-06-01", "2020-06-01", 1, 0, 80.0));
        population.push(make_raw("never", "2020-06-01", "2020-06-01", 0, 0, 0.0));
        population
    }

    fn stub_summary(model: &str) -> ModelSummary {
        ModelSummary {
            parameters: vec![("k".to_string(), 1.0)],
            diagnostics: FitDiagnostics {
                model: model.to_string(),
                customers: 0,
                iterations: 0,
                evaluations: 0,
                converged: true,
                objective: 0.0,
            },
        }
    }

    /// Stand-in frequency estimator: purchases proportional to history.
    struct Proportional;

    struct FittedProportional;

    impl FrequencyEstimator for Proportional {
        type Fitted = FittedProportional;

        fn fit(
            &self,
            observations: &[CustomerFeatureRecord],
        ) -> Result<FittedProportional, ModelError> {
            assert!(observations
                .iter()
                .all(|o| o.frequency > 1 && o.monetary_avg > 0.0));
            Ok(FittedProportional)
        }
    }

    impl FittedFrequencyModel for FittedProportional {
        fn expected_purchases(&self, horizon: f64, frequency: f64, _: f64, tenure: f64) -> f64 {
            horizon * frequency / tenure
        }

        fn summary(&self) -> ModelSummary {
            stub_summary("proportional")
        }
    }

    /// Stand-in frequency estimator: one purchase per week for everybody.
    struct Weekly;

    impl FrequencyEstimator for Weekly {
        type Fitted = Weekly;

        fn fit(&self, _: &[CustomerFeatureRecord]) -> Result<Weekly, ModelError> {
            Ok(Weekly)
        }
    }

    impl FittedFrequencyModel for Weekly {
        fn expected_purchases(&self, horizon: f64, _: f64, _: f64, _: f64) -> f64 {
            horizon
        }

        fn summary(&self) -> ModelSummary {
            stub_summary("weekly")
        }
    }

    /// Stand-in monetary estimator that returns a constant.
    struct Flat(f64);

    impl MonetaryEstimator for Flat {
        type Fitted = Flat;

        fn fit(&self, _: &[f64], monetary_avg: &[f64]) -> Result<Flat, ModelError> {
            assert!(monetary_avg.iter().all(|&m| m > 0.0));
            Ok(Flat(self.0))
        }
    }

    impl FittedMonetaryModel for Flat {
        fn conditional_expected_average_value(&self, _: f64, _: f64) -> f64 {
            self.0
        }

        fn summary(&self) -> ModelSummary {
            stub_summary("flat")
        }
    }

    fn stub_pipeline(value: f64) -> CltvPipeline<Proportional, Flat> {
        CltvPipeline::with_estimators(PipelineConfig::default(), Proportional, Flat(value))
    }

    #[test]
    fn stub_estimators_flow_through_every_stage() {
        let report = stub_pipeline(50.0).run(population()).unwrap();

        assert_eq!(report.customers_loaded, 26);
        assert_eq!(report.results.len(), 24);
        assert_eq!(report.drops.count(DropReason::SingleOrder), 1);
        assert_eq!(report.drops.count(DropReason::ZeroFrequency), 1);
        assert_eq!(report.reference_date, NaiveDate::from_ymd_opt(2021, 5, 18).unwrap());
        assert_eq!(report.suppression.columns.len(), 4);
        assert!(report.segmentation.is_segmented());

        for r in &report.results {
            assert!(r.tenure_weeks >= r.recency_weeks);
            assert!(r.exp_sales_horizon2 >= r.exp_sales_horizon1);
            assert_eq!(r.exp_average_value, 50.0);
            assert!(r.cltv > 0.0);
            assert!((0.0..=1.0).contains(&r.scaled_cltv));
            assert!(r.cltv_segment.is_some());
        }
        let max = report
            .results
            .iter()
            .map(|r| r.cltv)
            .fold(f64::NEG_INFINITY, f64::max);
        let top = report.results.iter().find(|r| r.cltv == max).unwrap();
        assert_eq!(top.scaled_cltv, 1.0);
        assert_eq!(top.cltv_segment, Some(Segment::A));
    }

    #[test]
    fn zero_spend_repeat_buyer_is_dropped_not_fatal() {
        let mut population = population();
        population.push(make_raw("free", "2020-03-01", "2021-02-01", 2, 1, 0.0));

        let report = stub_pipeline(50.0).run(population.clone()).unwrap();
        assert_eq!(report.results.len(), 24);
        assert_eq!(report.drops.count(DropReason::ZeroMonetary), 1);
        assert_eq!(report.drops.ids(DropReason::ZeroMonetary)[0].as_str(), "free");
        assert!(report.results.iter().all(|r| r.customer_id.as_str() != "free"));

        let report = CltvPipeline::new(PipelineConfig::default())
            .run(population)
            .unwrap();
        assert_eq!(report.drops.count(DropReason::ZeroMonetary), 1);
        assert!(report.results.iter().all(|r| r.cltv.is_finite()));
    }

    #[test]
    fn dedicated_thread_pool_gives_same_results() {
        let default_pool = stub_pipeline(50.0).run(population()).unwrap();
        let config = PipelineConfig {
            threads: 2,
            ..PipelineConfig::default()
        };
        let two_threads = CltvPipeline::with_estimators(config, Proportional, Flat(50.0))
            .run(population())
            .unwrap();
        assert_eq!(default_pool.results, two_threads.results);
    }

    #[test]
    fn degenerate_segmentation_keeps_results() {
        // Identical customers give identical cltv.
        let population: Vec<RawCustomerAggregate> = (0..6)
            .map(|i| make_raw(&format!("c{i}"), "2020-01-01", "2021-01-01", 2, 2, 400.0))
            .collect();
        let report = stub_pipeline(50.0).run(population).unwrap();
        assert_eq!(report.results.len(), 6);
        assert!(report
            .results
            .iter()
            .all(|r| r.cltv_segment.is_none() && r.scaled_cltv == 0.0));
        assert!(matches!(report.segmentation, SegmentationOutcome::Degenerate { .. }));
        assert!(report.frequency_monetary_correlation.is_none());
    }

    #[test]
    fn non_finite_value_is_attributed_to_the_monetary_model() {
        let err = stub_pipeline(f64::NAN).run(population()).unwrap_err();
        match err {
            PipelineError::Model(ModelError::NonFinitePrediction { model, .. }) => {
                assert_eq!(model, "flat")
            }
            other => panic!("expected NonFinitePrediction, got {:?}", other),
        }
    }

    #[test]
    fn overflowing_lifetime_value_is_attributed_to_synthesis() {
        // Horizon predictions and the average value are finite; their
        // discounted product is not.
        let err = CltvPipeline::with_estimators(PipelineConfig::default(), Weekly, Flat(f64::MAX))
            .run(population())
            .unwrap_err();
        match err {
            PipelineError::Model(ModelError::NonFinitePrediction { model, .. }) => {
                assert_eq!(model, SYNTHESIS_NAME)
            }
            other => panic!("expected NonFinitePrediction, got {:?}", other),
        }
    }

    #[test]
    fn oversized_reference_offset_is_a_data_error() {
        let mut config = PipelineConfig::default();
        config.features.reference_offset_days = i64::MAX / 2;
        let err = CltvPipeline::with_estimators(config, Proportional, Flat(50.0))
            .run(population())
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Data(DataError::ReferenceDateOutOfRange { .. })
        ));
        let common: cltv_common::Error = err.into();
        assert_eq!(common.category(), cltv_common::ErrorCategory::Data);
    }

    #[test]
    fn empty_population_is_a_data_error() {
        let err = CltvPipeline::new(PipelineConfig::default())
            .run(Vec::new())
            .unwrap_err();
        let common: cltv_common::Error = err.into();
        assert_eq!(common.code(), 23);
    }

    #[test]
    fn too_few_repeat_buyers_fails_the_fit() {
        let population = vec![
            make_raw("a", "2020-01-01", "2021-01-01", 2, 1, 300.0),
            make_raw("b", "2020-01-01", "2021-01-01", 1, 0, 100.0),
        ];
        let err = CltvPipeline::new(PipelineConfig::default())
            .run(population)
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Model(ModelError::InsufficientData { actual: 1, .. })
        ));
    }
}
