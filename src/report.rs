use std::fs;
use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use clap::ValueEnum;
use regex::Regex;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

pub const METRIC_COUNT: usize = 12;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    OriginalPackets,
    Retransmissions,
    Delivered,
    AcksSent,
    Corrupted,
    LossRatio,
    CorruptRatio,
    AvgRtt,
    AvgCommTime,
    Throughput,
    Goodput,
    AvgPacketDelay,
}

impl Metric {
    pub const ALL: [Metric; METRIC_COUNT] = [
        Self::OriginalPackets,
        Self::Retransmissions,
        Self::Delivered,
        Self::AcksSent,
        Self::Corrupted,
        Self::LossRatio,
        Self::CorruptRatio,
        Self::AvgRtt,
        Self::AvgCommTime,
        Self::Throughput,
        Self::Goodput,
        Self::AvgPacketDelay,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::OriginalPackets => "original_packets",
            Self::Retransmissions => "retransmissions",
            Self::Delivered => "delivered",
            Self::AcksSent => "acks_sent",
            Self::Corrupted => "corrupted",
            Self::LossRatio => "loss_ratio",
            Self::CorruptRatio => "corrupt_ratio",
            Self::AvgRtt => "avg_rtt",
            Self::AvgCommTime => "avg_comm_time",
            Self::Throughput => "throughput",
            Self::Goodput => "goodput",
            Self::AvgPacketDelay => "avg_packet_delay",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

const INTEGER: &str = r"(\d+)";
const DECIMAL: &str = r"([\d.]+)";

/// Label contract with the simulator's statistics block. A reworded label
/// silently reads as absent.
const METRIC_LABELS: [(Metric, &str, &str); METRIC_COUNT] = [
    (
        Metric::OriginalPackets,
        "Number of original packets transmitted by A:",
        INTEGER,
    ),
    (Metric::Retransmissions, "Number of retransmissions by A:", INTEGER),
    (
        Metric::Delivered,
        "Number of data packets delivered to layer 5 at B:",
        INTEGER,
    ),
    (Metric::AcksSent, "Number of ACK packets sent by B:", INTEGER),
    (Metric::Corrupted, "Number of corrupted packets:", INTEGER),
    (Metric::LossRatio, "Ratio of lost packets:", DECIMAL),
    (Metric::CorruptRatio, "Ratio of corrupted packets:", DECIMAL),
    (Metric::AvgRtt, "Average RTT:", DECIMAL),
    (Metric::AvgCommTime, "Average communication time:", DECIMAL),
    (Metric::Throughput, "Throughput:", DECIMAL),
    (Metric::Goodput, "Goodput:", DECIMAL),
    (Metric::AvgPacketDelay, "Average packet delay:", DECIMAL),
];

/// One value slot per known metric. `None` marks a label that was absent or
/// whose value did not convert; `value` reads those as zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsRecord {
    values: [Option<f64>; METRIC_COUNT],
}

impl MetricsRecord {
    pub fn value(&self, metric: Metric) -> f64 {
        self.observed(metric).unwrap_or(0.0)
    }

    pub fn observed(&self, metric: Metric) -> Option<f64> {
        self.values[metric.index()]
    }

    pub fn observed_count(&self) -> usize {
        self.values.iter().filter(|value| value.is_some()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Metric, f64)> + '_ {
        Metric::ALL
            .iter()
            .map(move |metric| (*metric, self.value(*metric)))
    }

    #[cfg(test)]
    pub fn with_value(mut self, metric: Metric, value: f64) -> Self {
        self.values[metric.index()] = Some(value);
        self
    }
}

impl Serialize for MetricsRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(METRIC_COUNT))?;
        for (metric, value) in self.iter() {
            map.serialize_entry(metric.as_str(), &value)?;
        }
        map.end()
    }
}

pub struct ReportParser {
    patterns: Vec<(Metric, Regex)>,
}

impl ReportParser {
    pub fn new() -> Result<Self> {
        let mut patterns = Vec::with_capacity(METRIC_COUNT);
        for (metric, label, value) in METRIC_LABELS {
            let pattern = format!(r"{}\s*{}", regex::escape(label), value);
            let regex = Regex::new(&pattern)
                .with_context(|| format!("failed to compile pattern for {}", metric.as_str()))?;
            patterns.push((metric, regex));
        }
        Ok(Self { patterns })
    }

    /// Total over any input: unknown or malformed text yields zeroed fields.
    pub fn parse(&self, report: &str) -> MetricsRecord {
        let mut record = MetricsRecord::default();
        for (metric, regex) in &self.patterns {
            record.values[metric.index()] = regex
                .captures(report)
                .and_then(|captures| captures.get(1))
                .and_then(|value| value.as_str().parse::<f64>().ok());
        }
        record
    }

    /// Returns `Ok(None)` when the report file does not exist.
    pub fn parse_file(&self, path: &Path) -> Result<Option<MetricsRecord>> {
        match read_report(path)? {
            Some(text) => Ok(Some(self.parse(&text))),
            None => Ok(None),
        }
    }
}

pub fn read_report(path: &Path) -> Result<Option<String>> {
    match fs::read(path) {
        Ok(raw) => Ok(Some(String::from_utf8_lossy(&raw).into_owned())),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => {
            Err(err).with_context(|| format!("failed to read report: {}", path.display()))
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Behavior {
    DuplicateAck,
    TimeoutRetransmission,
    CumulativeAckWindowMove,
}

impl Behavior {
    pub fn description(self) -> &'static str {
        match self {
            Self::DuplicateAck => "duplicate ACK handling",
            Self::TimeoutRetransmission => "timeout retransmission",
            Self::CumulativeAckWindowMove => "cumulative ACK window movement",
        }
    }
}

/// Protocol behaviors visible in a trace-enabled report.
pub fn detect_behaviors(report: &str) -> Vec<Behavior> {
    let mut behaviors = Vec::new();
    if report.contains("duplicate ACK") {
        behaviors.push(Behavior::DuplicateAck);
    }
    if report.contains("timeout") || report.contains("timerinterrupt") {
        behaviors.push(Behavior::TimeoutRetransmission);
    }
    if report.contains("cumulative ACK moved window") {
        behaviors.push(Behavior::CumulativeAckWindowMove);
    }
    behaviors
}
