use std::io::{self, Write};

use anyhow::Result;
use serde::Serialize;
use tracing::{info, warn};

use crate::cli::InspectArgs;
use crate::commands::output::{format_metric_value, write_json_stdout};
use crate::report::{Behavior, MetricsRecord, ReportParser, detect_behaviors, read_report};

#[derive(Debug, Serialize)]
struct InspectedReport {
    path: String,
    observed_metrics: usize,
    metrics: MetricsRecord,
    behaviors: Vec<Behavior>,
}

pub fn run(args: InspectArgs) -> Result<()> {
    let parser = ReportParser::new()?;
    let mut inspected = Vec::with_capacity(args.reports.len());

    for path in &args.reports {
        let Some(text) = read_report(path)? else {
            warn!(path = %path.display(), "report missing");
            continue;
        };
        let metrics = parser.parse(&text);
        inspected.push(InspectedReport {
            path: path.display().to_string(),
            observed_metrics: metrics.observed_count(),
            metrics,
            behaviors: detect_behaviors(&text),
        });
    }

    info!(
        requested = args.reports.len(),
        inspected = inspected.len(),
        "inspection complete"
    );

    if args.json {
        return write_json_stdout(&inspected, "inspect");
    }

    let mut output = io::BufWriter::new(io::stdout().lock());
    for report in &inspected {
        writeln!(
            output,
            "{} ({} of {} metrics found)",
            report.path,
            report.observed_metrics,
            crate::report::METRIC_COUNT
        )?;
        for (metric, value) in report.metrics.iter() {
            writeln!(
                output,
                "\t{:<18} {}",
                metric.as_str(),
                format_metric_value(metric, value)
            )?;
        }
        for behavior in &report.behaviors {
            writeln!(output, "\tdetected: {}", behavior.description())?;
        }
    }
    output.flush()?;
    Ok(())
}
