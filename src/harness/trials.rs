use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::model::{Condition, ProtocolVariant};
use crate::report::{Metric, MetricsRecord, ReportParser};

pub const PROTOCOL_PLACEHOLDER: &str = "{protocol}";
pub const PROTOCOL_ENV: &str = "RDT_PROTOCOL";
const SCRATCH_INPUT_NAME: &str = "sim_input.txt";

#[derive(Debug, Error)]
pub enum TrialError {
    #[error("failed to launch simulator `{program}` for seed {seed}")]
    Launch {
        program: String,
        seed: u64,
        #[source]
        source: io::Error,
    },
    #[error("{action}: {}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl TrialError {
    fn io(action: &'static str, path: &Path) -> impl FnOnce(io::Error) -> Self {
        move |source| Self::Io {
            action,
            path: path.to_path_buf(),
            source,
        }
    }
}

/// External simulator invocation. `{protocol}` inside an argument is replaced
/// by the variant's short name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimulatorCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl Default for SimulatorCommand {
    fn default() -> Self {
        Self {
            program: "java".to_string(),
            args: vec![format!("-Dprotocol={PROTOCOL_PLACEHOLDER}"), "Project".to_string()],
        }
    }
}

impl SimulatorCommand {
    fn command(&self, variant: ProtocolVariant) -> Command {
        let mut command = Command::new(&self.program);
        for arg in &self.args {
            command.arg(arg.replace(PROTOCOL_PLACEHOLDER, variant.short_name()));
        }
        command.env(PROTOCOL_ENV, variant.short_name());
        command
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TrialFailure {
    pub seed: u64,
    pub reason: String,
}

/// Records from runs sharing one condition, in seed order.
#[derive(Debug, Clone, Serialize)]
pub struct TrialSample {
    pub condition: Condition,
    pub records: Vec<MetricsRecord>,
    pub failures: Vec<TrialFailure>,
    pub attempted: usize,
}

impl TrialSample {
    pub fn new(condition: Condition) -> Self {
        Self {
            condition,
            records: Vec::new(),
            failures: Vec::new(),
            attempted: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn values(&self, metric: Metric) -> Vec<f64> {
        self.records
            .iter()
            .map(|record| record.value(metric))
            .collect()
    }
}

/// Removes its file when dropped; a file that was never created is skipped.
struct ScopedFile {
    path: PathBuf,
}

impl ScopedFile {
    fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScopedFile {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "removed transient file"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => warn!(
                path = %self.path.display(),
                error = %err,
                "failed to remove transient file"
            ),
        }
    }
}

enum TrialOutcome {
    Completed(MetricsRecord),
    Failed(String),
}

pub struct TrialRunner {
    simulator: SimulatorCommand,
    work_dir: PathBuf,
    parser: ReportParser,
}

impl TrialRunner {
    pub fn new(simulator: SimulatorCommand, work_dir: PathBuf) -> anyhow::Result<Self> {
        Ok(Self {
            simulator,
            work_dir,
            parser: ReportParser::new()?,
        })
    }

    pub fn scratch_input_path(&self) -> PathBuf {
        self.work_dir.join(SCRATCH_INPUT_NAME)
    }

    pub fn trial_report_path(&self, variant: ProtocolVariant, seed: u64) -> PathBuf {
        self.work_dir
            .join(format!("trial_{}_{}.txt", variant.short_name(), seed))
    }

    /// Runs one blocking simulator process per seed, in order. Trials that
    /// exit unsuccessfully are recorded as failures; a simulator that cannot
    /// be launched aborts the run.
    pub fn run_trials(&self, condition: &Condition, seeds: &[u64]) -> Result<TrialSample, TrialError> {
        fs::create_dir_all(&self.work_dir)
            .map_err(TrialError::io("failed to create work directory", &self.work_dir))?;

        info!(
            variant = %condition.variant,
            loss = condition.loss,
            corruption = condition.corruption,
            trials = seeds.len(),
            "running trials"
        );

        let scratch = ScopedFile::new(self.scratch_input_path());
        let mut sample = TrialSample::new(*condition);

        for &seed in seeds {
            fs::write(scratch.path(), condition.simulator_input(seed))
                .map_err(TrialError::io("failed to write simulator input", scratch.path()))?;

            sample.attempted += 1;
            match self.run_trial(condition, seed, scratch.path())? {
                TrialOutcome::Completed(record) => {
                    if record.observed_count() == 0 {
                        warn!(seed, "report contained no recognised metrics");
                    }
                    sample.records.push(record);
                }
                TrialOutcome::Failed(reason) => {
                    warn!(seed, reason = %reason, "trial produced no data");
                    sample.failures.push(TrialFailure { seed, reason });
                }
            }
        }

        info!(
            variant = %condition.variant,
            succeeded = sample.len(),
            attempted = sample.attempted,
            "trials finished"
        );

        Ok(sample)
    }

    fn run_trial(&self, condition: &Condition, seed: u64, input: &Path) -> Result<TrialOutcome, TrialError> {
        let report = ScopedFile::new(self.trial_report_path(condition.variant, seed));

        let stdout = File::create(report.path())
            .map_err(TrialError::io("failed to create trial report", report.path()))?;
        let stderr = stdout
            .try_clone()
            .map_err(TrialError::io("failed to share trial report handle", report.path()))?;
        let stdin =
            File::open(input).map_err(TrialError::io("failed to open simulator input", input))?;

        debug!(seed, report = %report.path().display(), "starting simulator");
        let status = self
            .simulator
            .command(condition.variant)
            .stdin(Stdio::from(stdin))
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .status()
            .map_err(|source| TrialError::Launch {
                program: self.simulator.program.clone(),
                seed,
                source,
            })?;

        if !status.success() {
            return Ok(TrialOutcome::Failed(describe_exit(status)));
        }

        let raw = match fs::read(report.path()) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Ok(TrialOutcome::Failed(
                    "simulator removed its report before it was read".to_string(),
                ));
            }
            Err(source) => {
                return Err(TrialError::Io {
                    action: "failed to read trial report",
                    path: report.path().to_path_buf(),
                    source,
                });
            }
        };

        Ok(TrialOutcome::Completed(
            self.parser.parse(&String::from_utf8_lossy(&raw)),
        ))
    }
}

fn describe_exit(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("simulator exited with status {code}"),
        None => "simulator terminated without an exit status".to_string(),
    }
}
