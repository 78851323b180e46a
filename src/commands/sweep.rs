use std::io::{self, Write};

use anyhow::{Result, bail};
use tracing::{info, warn};

use crate::cli::SweepArgs;
use crate::commands::output::{DEFAULT_TABLE_METRICS, format_interval, write_json_stdout};
use crate::harness::{
    ComparisonReport, ConditionStats, SampleSource, SweepResults, TrialRunner, compare, sweep,
};
use crate::model::sweep_points;
use crate::report::{Metric, ReportParser};
use crate::util::{format_decimal, now_utc_string, write_json_pretty};

pub fn run(args: SweepArgs) -> Result<()> {
    if args.left == args.right {
        bail!("--left and --right must name different protocol variants");
    }
    if args.rates.is_empty() {
        bail!("--rates must list at least one value");
    }

    let points = sweep_points(args.axis, &args.rates, args.baseline);
    let variants = [args.left, args.right];
    let params = args.simulator.params();

    info!(
        axis = args.axis.as_str(),
        points = points.len(),
        precomputed = args.precomputed_dir.is_some(),
        "starting sweep"
    );

    let results: SweepResults = match &args.precomputed_dir {
        Some(directory) => {
            let parser = ReportParser::new()?;
            let source = SampleSource::Precomputed {
                parser: &parser,
                directory,
            };
            sweep(&points, &variants, params, &source, args.confidence)?
        }
        None => {
            let seeds = args.simulator.seeds();
            if seeds.is_empty() {
                bail!("--trials must be at least 1");
            }
            let runner =
                TrialRunner::new(args.simulator.command(), args.simulator.work_dir.clone())?;
            let source = SampleSource::Simulated {
                runner: &runner,
                seeds: &seeds,
            };
            sweep(&points, &variants, params, &source, args.confidence)?
        }
    };

    info!(
        pairs_with_data = results.len(),
        pairs_requested = points.len() * variants.len(),
        "sweep finished"
    );
    if results.is_empty() {
        warn!("no sweep point produced data");
    }

    let report = ComparisonReport {
        generated_at: now_utc_string(),
        axis: args.axis,
        confidence_level: args.confidence.value(),
        left_variant: args.left,
        right_variant: args.right,
        rows: compare(
            &results.for_variant(args.left),
            &results.for_variant(args.right),
            &points,
        ),
    };

    if let Some(path) = &args.output {
        write_json_pretty(path, &report)?;
        info!(path = %path.display(), "wrote comparison report");
    }

    if args.json {
        return write_json_stdout(&report, "sweep");
    }

    let metrics: &[Metric] = if args.metrics.is_empty() {
        &DEFAULT_TABLE_METRICS
    } else {
        &args.metrics
    };
    write_text_comparison(&report, metrics)
}

fn write_text_comparison(report: &ComparisonReport, metrics: &[Metric]) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());

    writeln!(
        output,
        "Sweep: axis={} left={} right={} confidence={:.0}%",
        report.axis.as_str(),
        report.left_variant,
        report.right_variant,
        report.confidence_level * 100.0
    )?;
    writeln!(output, "Rows: {}", report.rows.len())?;

    for row in &report.rows {
        writeln!(
            output,
            "{}={}\tloss={} corruption={}",
            report.axis.as_str(),
            format_decimal(row.point.rate),
            format_decimal(row.point.loss),
            format_decimal(row.point.corruption)
        )?;
        write_side(&mut output, report.left_variant.short_name(), row.left.as_ref())?;
        write_side(&mut output, report.right_variant.short_name(), row.right.as_ref())?;
        for metric in metrics {
            let side = |stats: Option<&ConditionStats>| {
                stats
                    .and_then(|stats| stats.interval(*metric))
                    .map(format_interval)
                    .unwrap_or_else(|| "no data".to_string())
            };
            write!(
                output,
                "\t{:<18} {:<32} {:<32}",
                metric.as_str(),
                side(row.left.as_ref()),
                side(row.right.as_ref())
            )?;
            match row.mean_delta(*metric) {
                Some(delta) => writeln!(output, " delta={delta:+.4}")?,
                None => writeln!(output)?,
            }
        }
    }

    output.flush()?;
    Ok(())
}

fn write_side(
    output: &mut impl Write,
    label: &str,
    stats: Option<&ConditionStats>,
) -> io::Result<()> {
    match stats {
        Some(stats) => writeln!(
            output,
            "\t{label}: {} of {} trials",
            stats.sample_size, stats.attempted_trials
        ),
        None => writeln!(output, "\t{label}: no data"),
    }
}
