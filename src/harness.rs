mod compare;
mod sweep;
mod trials;

pub use compare::{ComparisonReport, compare};
pub use sweep::{ConditionStats, SampleSource, SweepResults, reduce_metrics, sweep};
pub use trials::{SimulatorCommand, TrialFailure, TrialRunner};
