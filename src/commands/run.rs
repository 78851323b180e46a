use std::collections::BTreeMap;
use std::io::{self, Write};

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::commands::output::{format_interval, write_json_stdout};
use crate::harness::{TrialFailure, TrialRunner, reduce_metrics};
use crate::model::Condition;
use crate::report::Metric;
use crate::stats::ConfidenceInterval;

#[derive(Debug, Serialize)]
struct RunSummary {
    condition: Condition,
    seeds: Vec<u64>,
    attempted_trials: usize,
    sample_size: usize,
    failures: Vec<TrialFailure>,
    metrics: BTreeMap<Metric, ConfidenceInterval>,
}

pub fn run(args: RunArgs) -> Result<()> {
    let condition = Condition::new(
        args.variant,
        args.loss,
        args.corruption,
        args.simulator.params(),
    )?;
    let seeds = args.simulator.seeds();
    if seeds.is_empty() {
        bail!("--trials must be at least 1");
    }

    let runner = TrialRunner::new(args.simulator.command(), args.simulator.work_dir.clone())?;
    let sample = runner
        .run_trials(&condition, &seeds)
        .with_context(|| format!("trial run aborted for {}", condition.variant))?;

    info!(
        variant = %condition.variant,
        "{} of {} trials succeeded",
        sample.len(),
        sample.attempted
    );
    if sample.len() < 2 {
        warn!(
            sample_size = sample.len(),
            "fewer than two observations, intervals are degenerate"
        );
    }

    let summary = RunSummary {
        condition,
        seeds,
        attempted_trials: sample.attempted,
        sample_size: sample.len(),
        metrics: reduce_metrics(&sample, args.confidence),
        failures: sample.failures,
    };

    if args.json {
        write_json_stdout(&summary, "run")
    } else {
        write_text_summary(&summary, args.confidence.value())
    }
}

fn write_text_summary(summary: &RunSummary, confidence_level: f64) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());
    let condition = &summary.condition;

    writeln!(
        output,
        "Condition: variant={} loss={} corruption={} window={} packets={}",
        condition.variant,
        condition.loss,
        condition.corruption,
        condition.window_size(),
        condition.params.packet_count,
    )?;
    writeln!(
        output,
        "Trials: {} of {} succeeded, confidence={:.0}%",
        summary.sample_size,
        summary.attempted_trials,
        confidence_level * 100.0
    )?;
    for (metric, interval) in &summary.metrics {
        writeln!(output, "\t{:<18} {}", metric.as_str(), format_interval(interval))?;
    }
    for failure in &summary.failures {
        writeln!(output, "\tfailed seed {}: {}", failure.seed, failure.reason)?;
    }

    output.flush()?;
    Ok(())
}
