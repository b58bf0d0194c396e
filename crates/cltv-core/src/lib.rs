//! CLTV Core Library
//!
//! This library provides the customer lifetime value pipeline:
//! - Customer data model and CSV loading
//! - Outlier suppression and feature derivation
//! - BG/NBD and Gamma-Gamma estimators behind fit/predict traits
//! - Lifetime value synthesis and value segmentation
//! - Configuration loading, structured logging, output rendering
//! - Exit codes for CLI operations
//!
//! The binary entry point is in `main.rs`.

pub mod config;
pub mod data;
pub mod exit_codes;
pub mod features;
pub mod logging;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod segment;
pub mod suppress;
pub mod synthesize;

pub use data::{CltvResult, CustomerFeatureRecord, RawCustomerAggregate};
pub use pipeline::{CltvPipeline, CltvReport, PipelineError, SegmentationOutcome};
pub use segment::Segment;
