use std::io::{self, Write};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::report::Metric;
use crate::stats::ConfidenceInterval;

/// Metrics shown in text tables when none are requested.
pub const DEFAULT_TABLE_METRICS: [Metric; 4] = [
    Metric::AvgCommTime,
    Metric::AvgRtt,
    Metric::Throughput,
    Metric::Goodput,
];

pub fn write_json_stdout<T: Serialize>(value: &T, label: &str) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());
    serde_json::to_writer_pretty(&mut output, value)
        .with_context(|| format!("failed to serialize {label} json output"))?;
    writeln!(output)?;
    output.flush()?;
    Ok(())
}

pub fn format_interval(interval: &ConfidenceInterval) -> String {
    format!(
        "{:.4} ±{:.4} [{:.4}, {:.4}]",
        interval.mean,
        interval.half_width(),
        interval.lower,
        interval.upper
    )
}

/// Counters print as integers, everything else with four decimals.
pub fn format_metric_value(metric: Metric, value: f64) -> String {
    match metric {
        Metric::OriginalPackets
        | Metric::Retransmissions
        | Metric::Delivered
        | Metric::AcksSent
        | Metric::Corrupted => format!("{value:.0}"),
        _ => format!("{value:.4}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_metric_value_rounds_counters() {
        assert_eq!(format_metric_value(Metric::Retransmissions, 277.0), "277");
        assert_eq!(format_metric_value(Metric::AvgRtt, 11.1112), "11.1112");
    }

    #[test]
    fn format_interval_prints_bounds() {
        let interval = ConfidenceInterval {
            mean: 11.0,
            lower: 10.5,
            upper: 11.5,
            confidence_level: 0.9,
        };
        assert_eq!(format_interval(&interval), "11.0000 ±0.5000 [10.5000, 11.5000]");
    }
}
