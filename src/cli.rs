use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::harness::SimulatorCommand;
use crate::model::{
    DEFAULT_BASE_SEED, DEFAULT_SEED_COUNT, ProtocolVariant, SimulatorParams, SweepAxis, seed_block,
};
use crate::report::Metric;
use crate::stats::ConfidenceLevel;

#[derive(Parser, Debug)]
#[command(
    name = "rdt-bench",
    version,
    about = "Experiment harness for selective-repeat and go-back-n-SACK simulator runs"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run seeded trials for a single condition.
    Run(RunArgs),
    /// Sweep loss or corruption rates and compare both protocol variants.
    Sweep(SweepArgs),
    /// Extract metrics from existing simulator reports.
    Inspect(InspectArgs),
}

#[derive(Args, Debug, Clone)]
pub struct SimulatorArgs {
    #[arg(long, default_value = "java")]
    pub simulator: String,

    /// Simulator argument; `{protocol}` expands to the variant selector.
    #[arg(
        long = "simulator-arg",
        allow_hyphen_values = true,
        default_values = ["-Dprotocol={protocol}", "Project"]
    )]
    pub simulator_args: Vec<String>,

    #[arg(long, default_value = ".rdt-bench")]
    pub work_dir: PathBuf,

    #[arg(long, default_value_t = 20)]
    pub packets: u32,

    #[arg(long, default_value_t = 100.0)]
    pub mean_interarrival: f64,

    /// Defaults to 8 for selective repeat and 16 for go-back-n-SACK.
    #[arg(long)]
    pub window_size: Option<u32>,

    #[arg(long, default_value_t = 30.0)]
    pub timeout: f64,

    #[arg(long, default_value_t = 0)]
    pub trace: u32,

    #[arg(long, default_value_t = DEFAULT_BASE_SEED)]
    pub base_seed: u64,

    #[arg(long, default_value_t = DEFAULT_SEED_COUNT)]
    pub trials: usize,
}

impl SimulatorArgs {
    pub fn params(&self) -> SimulatorParams {
        SimulatorParams {
            packet_count: self.packets,
            mean_interarrival: self.mean_interarrival,
            window_size: self.window_size,
            retransmit_timeout: self.timeout,
            trace_level: self.trace,
        }
    }

    pub fn command(&self) -> SimulatorCommand {
        SimulatorCommand {
            program: self.simulator.clone(),
            args: self.simulator_args.clone(),
        }
    }

    pub fn seeds(&self) -> Vec<u64> {
        seed_block(self.base_seed, self.trials)
    }
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[arg(long, value_enum, default_value_t = ProtocolVariant::SelectiveRepeat)]
    pub variant: ProtocolVariant,

    #[arg(long, default_value_t = 0.0)]
    pub loss: f64,

    #[arg(long, default_value_t = 0.0)]
    pub corruption: f64,

    #[arg(long, default_value = "0.9")]
    pub confidence: ConfidenceLevel,

    #[arg(long, default_value_t = false)]
    pub json: bool,

    #[command(flatten)]
    pub simulator: SimulatorArgs,
}

#[derive(Args, Debug, Clone)]
pub struct SweepArgs {
    #[arg(long, value_enum, default_value_t = SweepAxis::Loss)]
    pub axis: SweepAxis,

    #[arg(
        long,
        value_delimiter = ',',
        default_values_t = [0.0, 0.05, 0.1, 0.15, 0.2, 0.25, 0.3]
    )]
    pub rates: Vec<f64>,

    /// Probability held fixed on the axis that is not swept.
    #[arg(long, default_value_t = 0.0)]
    pub baseline: f64,

    #[arg(long, value_enum, default_value_t = ProtocolVariant::SelectiveRepeat)]
    pub left: ProtocolVariant,

    #[arg(long, value_enum, default_value_t = ProtocolVariant::GoBackNSack)]
    pub right: ProtocolVariant,

    /// Read `perf_<variant>_<axis>_<rate>.txt` reports instead of running trials.
    #[arg(long)]
    pub precomputed_dir: Option<PathBuf>,

    /// Metrics shown in the text table; all metrics are kept in JSON output.
    #[arg(long = "metric", value_enum)]
    pub metrics: Vec<Metric>,

    #[arg(long, default_value = "0.9")]
    pub confidence: ConfidenceLevel,

    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Also write the comparison as pretty JSON to this path.
    #[arg(long)]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub simulator: SimulatorArgs,
}

#[derive(Args, Debug, Clone)]
pub struct InspectArgs {
    #[arg(required = true)]
    pub reports: Vec<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}
