use std::fmt;

use anyhow::{Result, bail};
use clap::ValueEnum;
use serde::Serialize;

use crate::util::format_decimal;

pub const DEFAULT_BASE_SEED: u64 = 1234;
pub const DEFAULT_SEED_COUNT: usize = 10;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ProtocolVariant {
    #[value(name = "selective-repeat", alias = "sr")]
    SelectiveRepeat,
    #[value(name = "go-back-n-sack", alias = "gbn")]
    GoBackNSack,
}

impl ProtocolVariant {
    #[cfg(test)]
    pub const ALL: [ProtocolVariant; 2] = [Self::SelectiveRepeat, Self::GoBackNSack];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SelectiveRepeat => "selective-repeat",
            Self::GoBackNSack => "go-back-n-sack",
        }
    }

    /// Selector handed to the simulator and used in report file names.
    pub fn short_name(self) -> &'static str {
        match self {
            Self::SelectiveRepeat => "sr",
            Self::GoBackNSack => "gbn",
        }
    }

    /// The simulator switches to go-back-n with SACK when it sees a window of 16.
    pub fn default_window_size(self) -> u32 {
        match self {
            Self::SelectiveRepeat => 8,
            Self::GoBackNSack => 16,
        }
    }
}

impl fmt::Display for ProtocolVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Simulator settings held constant across a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SimulatorParams {
    pub packet_count: u32,
    pub mean_interarrival: f64,
    pub window_size: Option<u32>,
    pub retransmit_timeout: f64,
    pub trace_level: u32,
}

impl Default for SimulatorParams {
    fn default() -> Self {
        Self {
            packet_count: 20,
            mean_interarrival: 100.0,
            window_size: None,
            retransmit_timeout: 30.0,
            trace_level: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Condition {
    pub variant: ProtocolVariant,
    pub loss: f64,
    pub corruption: f64,
    pub params: SimulatorParams,
}

impl Condition {
    pub fn new(
        variant: ProtocolVariant,
        loss: f64,
        corruption: f64,
        params: SimulatorParams,
    ) -> Result<Self> {
        ensure_probability("loss", loss)?;
        ensure_probability("corruption", corruption)?;
        Ok(Self {
            variant,
            loss,
            corruption,
            params,
        })
    }

    pub fn window_size(&self) -> u32 {
        self.params
            .window_size
            .unwrap_or_else(|| self.variant.default_window_size())
    }

    /// Serializes the simulator input: one parameter per line, fixed order.
    pub fn simulator_input(&self, seed: u64) -> String {
        let params = &self.params;
        format!(
            "{}\n{}\n{}\n{}\n{}\n{}\n{}\n{}\n",
            params.packet_count,
            format_decimal(self.loss),
            format_decimal(self.corruption),
            format_decimal(params.mean_interarrival),
            self.window_size(),
            format_decimal(params.retransmit_timeout),
            params.trace_level,
            seed
        )
    }
}

fn ensure_probability(label: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        bail!("{label} probability must be within [0, 1], got {value}");
    }
    Ok(())
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SweepAxis {
    Loss,
    #[value(alias = "corrupt")]
    Corruption,
}

impl SweepAxis {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Loss => "loss",
            Self::Corruption => "corruption",
        }
    }

    /// Axis token used in precomputed report file names.
    pub fn file_token(self) -> &'static str {
        match self {
            Self::Loss => "loss",
            Self::Corruption => "corrupt",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SweepPoint {
    pub axis: SweepAxis,
    pub rate: f64,
    pub loss: f64,
    pub corruption: f64,
}

impl SweepPoint {
    pub fn condition(&self, variant: ProtocolVariant, params: SimulatorParams) -> Result<Condition> {
        Condition::new(variant, self.loss, self.corruption, params)
    }

    pub fn precomputed_file_name(&self, variant: ProtocolVariant) -> String {
        format!(
            "perf_{}_{}_{}.txt",
            variant.short_name(),
            self.axis.file_token(),
            format_decimal(self.rate)
        )
    }
}

/// Builds the ordered points of a one-dimensional sweep. The probability that
/// is not swept stays at `baseline`.
pub fn sweep_points(axis: SweepAxis, rates: &[f64], baseline: f64) -> Vec<SweepPoint> {
    rates
        .iter()
        .map(|&rate| {
            let (loss, corruption) = match axis {
                SweepAxis::Loss => (rate, baseline),
                SweepAxis::Corruption => (baseline, rate),
            };
            SweepPoint {
                axis,
                rate,
                loss,
                corruption,
            }
        })
        .collect()
}

/// Contiguous seed block anchored at `base`.
pub fn seed_block(base: u64, count: usize) -> Vec<u64> {
    (0..count as u64).map(|offset| base + offset).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulator_input_keeps_fixed_line_order() {
        let condition = Condition::new(
            ProtocolVariant::SelectiveRepeat,
            0.1,
            0.0,
            SimulatorParams::default(),
        )
        .expect("valid condition");

        assert_eq!(
            condition.simulator_input(1234),
            "20\n0.1\n0.0\n100.0\n8\n30.0\n0\n1234\n"
        );
    }

    #[test]
    fn go_back_n_uses_its_own_window_unless_overridden() {
        let mut params = SimulatorParams::default();
        let condition = Condition::new(ProtocolVariant::GoBackNSack, 0.0, 0.2, params)
            .expect("valid condition");
        assert_eq!(condition.window_size(), 16);

        params.window_size = Some(4);
        let condition = Condition::new(ProtocolVariant::GoBackNSack, 0.0, 0.2, params)
            .expect("valid condition");
        assert_eq!(condition.window_size(), 4);
        assert!(condition.simulator_input(7).contains("\n4\n"));
    }

    #[test]
    fn condition_rejects_out_of_range_probabilities() {
        let params = SimulatorParams::default();
        assert!(Condition::new(ProtocolVariant::SelectiveRepeat, 1.5, 0.0, params).is_err());
        assert!(Condition::new(ProtocolVariant::SelectiveRepeat, 0.0, -0.1, params).is_err());
        assert!(Condition::new(ProtocolVariant::SelectiveRepeat, 1.0, 0.0, params).is_ok());
    }

    #[test]
    fn sweep_points_hold_the_other_probability_at_baseline() {
        let points = sweep_points(SweepAxis::Corruption, &[0.0, 0.1], 0.05);
        assert_eq!(points.len(), 2);
        assert_eq!(points[1].corruption, 0.1);
        assert_eq!(points[1].loss, 0.05);
        assert_eq!(
            points[1].precomputed_file_name(ProtocolVariant::GoBackNSack),
            "perf_gbn_corrupt_0.1.txt"
        );
    }

    #[test]
    fn seed_block_is_contiguous() {
        assert_eq!(seed_block(1234, 5), vec![1234, 1235, 1236, 1237, 1238]);
        assert!(seed_block(1234, 0).is_empty());
    }
}
