//! Rendering a [`CltvReport`] for stdout or a file.
//!
//! JSON carries the whole report; JSONL and CSV carry the result table only;
//! the summary is for people. Results keep pipeline order in the machine
//! formats. Only the summary sorts, by cltv descending.

use std::io::Write;

use cltv_common::{OutputFormat, Result};

use crate::data::CltvResult;
use crate::features::DropReason;
use crate::model::ModelSummary;
use crate::pipeline::{CltvReport, SegmentationOutcome};

/// Default number of customers in the summary's top list.
pub const DEFAULT_TOP: usize = 10;

/// Write `report` to `out` in `format`.
///
/// `top` limits the customer list of [`OutputFormat::Summary`] and is
/// ignored otherwise.
pub fn write_report<W: Write>(report: &CltvReport, format: OutputFormat, top: usize, out: &mut W) -> Result<()> {
    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, report)?;
            writeln!(out)?;
        }
        OutputFormat::Jsonl => {
            for result in &report.results {
                serde_json::to_writer(&mut *out, result)?;
                writeln!(out)?;
            }
        }
        OutputFormat::Csv => write_csv(&report.results, out)?,
        OutputFormat::Summary => write_summary(report, top, out)?,
    }
    out.flush()?;
    Ok(())
}

fn write_csv<W: Write>(results: &[CltvResult], out: &mut W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    for result in results {
        writer.serialize(result)?;
    }
    writer.flush()?;
    Ok(())
}

/// Results ordered by cltv, highest first; ties keep pipeline order.
pub fn top_customers(results: &[CltvResult], n: usize) -> Vec<&CltvResult> {
    let mut sorted: Vec<&CltvResult> = results.iter().collect();
    sorted.sort_by(|a, b| b.cltv.total_cmp(&a.cltv));
    sorted.truncate(n);
    sorted
}

fn format_parameters(summary: &ModelSummary) -> String {
    summary
        .parameters
        .iter()
        .map(|(name, value)| format!("{name}={value:.4}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn write_summary<W: Write>(report: &CltvReport, top: usize, out: &mut W) -> Result<()> {
    writeln!(out, "CLTV run {}", report.run_id)?;
    writeln!(out, "  Reference date: {}", report.reference_date)?;
    writeln!(
        out,
        "  Customers: {} loaded, {} modeled, {} dropped \
         ({} zero frequency, {} single order, {} zero spend)",
        report.customers_loaded,
        report.results.len(),
        report.drops.total(),
        report.drops.count(DropReason::ZeroFrequency),
        report.drops.count(DropReason::SingleOrder),
        report.drops.count(DropReason::ZeroMonetary),
    )?;
    writeln!(out, "  Outliers replaced: {}", report.suppression.total_replaced())?;
    writeln!(out)?;

    writeln!(out, "Models")?;
    for summary in [&report.frequency_model, &report.monetary_model] {
        writeln!(
            out,
            "  {:<12} {}  ({} iterations)",
            summary.diagnostics.model,
            format_parameters(summary),
            summary.diagnostics.iterations,
        )?;
    }
    if let Some(rho) = report.frequency_monetary_correlation {
        writeln!(out, "  Frequency/monetary correlation: {rho:.3}")?;
    }
    writeln!(out)?;

    match &report.segmentation {
        SegmentationOutcome::Segmented { summaries, quartiles } => {
            writeln!(
                out,
                "Segments (quartiles {:.2} / {:.2} / {:.2})",
                quartiles.q1, quartiles.median, quartiles.q3
            )?;
            writeln!(
                out,
                "  {:<3} {:>6} {:>12} {:>12} {:>12} {:>9} {:>10}",
                "", "count", "cltv min", "cltv mean", "cltv max", "freq", "monetary"
            )?;
            for s in summaries {
                writeln!(
                    out,
                    "  {:<3} {:>6} {:>12.2} {:>12.2} {:>12.2} {:>9.2} {:>10.2}",
                    s.segment.as_str(),
                    s.count,
                    s.cltv_min,
                    s.cltv_mean,
                    s.cltv_max,
                    s.frequency_mean,
                    s.monetary_avg_mean,
                )?;
            }
        }
        SegmentationOutcome::Degenerate { message } => {
            writeln!(out, "Segments: not assigned ({message})")?;
        }
    }
    writeln!(out)?;

    let leaders = top_customers(&report.results, top);
    writeln!(out, "Top {} customers by cltv", leaders.len())?;
    for r in leaders {
        writeln!(
            out,
            "  {:<40} {:>12.2}  {}  freq={} exp_avg={:.2}",
            r.customer_id.as_str(),
            r.cltv,
            r.cltv_segment.map(|s| s.as_str()).unwrap_or("-"),
            r.frequency,
            r.exp_average_value,
        )?;
    }
    Ok(())
}
