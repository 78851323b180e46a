use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;
use serde::Serialize;
use tracing::{info, warn};

use crate::model::{Condition, ProtocolVariant, SimulatorParams, SweepPoint};
use crate::report::{Metric, ReportParser};
use crate::stats::{ConfidenceInterval, ConfidenceLevel, estimate};

use super::trials::{TrialRunner, TrialSample};

/// Where a sweep gets the sample for one (variant, point) pair.
pub enum SampleSource<'a> {
    Simulated {
        runner: &'a TrialRunner,
        seeds: &'a [u64],
    },
    Precomputed {
        parser: &'a ReportParser,
        directory: &'a Path,
    },
}

impl SampleSource<'_> {
    fn collect(&self, condition: &Condition, point: &SweepPoint) -> Result<Option<TrialSample>> {
        match self {
            Self::Simulated { runner, seeds } => {
                let sample = runner.run_trials(condition, seeds)?;
                if sample.is_empty() {
                    return Ok(None);
                }
                Ok(Some(sample))
            }
            Self::Precomputed { parser, directory } => {
                let path = directory.join(point.precomputed_file_name(condition.variant));
                let Some(record) = parser.parse_file(&path)? else {
                    warn!(path = %path.display(), "precomputed report missing");
                    return Ok(None);
                };
                let mut sample = TrialSample::new(*condition);
                sample.records.push(record);
                sample.attempted = 1;
                Ok(Some(sample))
            }
        }
    }

    fn summarize(
        &self,
        sample: &TrialSample,
        point: SweepPoint,
        level: ConfidenceLevel,
    ) -> ConditionStats {
        match self {
            Self::Simulated { .. } => summarize(sample, point, level),
            Self::Precomputed { .. } => summarize_report(sample, point, level),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConditionStats {
    pub variant: ProtocolVariant,
    pub point: SweepPoint,
    pub condition: Condition,
    pub sample_size: usize,
    pub attempted_trials: usize,
    pub failed_trials: usize,
    pub metrics: BTreeMap<Metric, ConfidenceInterval>,
}

impl ConditionStats {
    pub fn interval(&self, metric: Metric) -> Option<&ConfidenceInterval> {
        self.metrics.get(&metric)
    }
}

/// Reduces every metric of `sample` with the t-interval estimator.
pub fn reduce_metrics(
    sample: &TrialSample,
    level: ConfidenceLevel,
) -> BTreeMap<Metric, ConfidenceInterval> {
    Metric::ALL
        .iter()
        .map(|metric| (*metric, estimate(&sample.values(*metric), level)))
        .collect()
}

pub fn summarize(
    sample: &TrialSample,
    point: SweepPoint,
    level: ConfidenceLevel,
) -> ConditionStats {
    condition_stats(sample, point, reduce_metrics(sample, level))
}

/// A precomputed report is one observation per metric, reported as a
/// zero-width interval at its value.
fn summarize_report(
    sample: &TrialSample,
    point: SweepPoint,
    level: ConfidenceLevel,
) -> ConditionStats {
    let metrics = Metric::ALL
        .iter()
        .map(|metric| {
            let values = sample.values(*metric);
            let interval = match values.as_slice() {
                [single] => ConfidenceInterval::point(*single, level),
                _ => estimate(&values, level),
            };
            (*metric, interval)
        })
        .collect();
    condition_stats(sample, point, metrics)
}

fn condition_stats(
    sample: &TrialSample,
    point: SweepPoint,
    metrics: BTreeMap<Metric, ConfidenceInterval>,
) -> ConditionStats {
    ConditionStats {
        variant: sample.condition.variant,
        point,
        condition: sample.condition,
        sample_size: sample.len(),
        attempted_trials: sample.attempted,
        failed_trials: sample.failures.len(),
        metrics,
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepResults {
    pub entries: Vec<ConditionStats>,
}

impl SweepResults {
    #[cfg(test)]
    pub fn get(&self, variant: ProtocolVariant, point: &SweepPoint) -> Option<&ConditionStats> {
        self.entries
            .iter()
            .find(|entry| entry.variant == variant && same_point(&entry.point, point))
    }

    pub fn for_variant(&self, variant: ProtocolVariant) -> VariantStats {
        VariantStats {
            variant,
            entries: self
                .entries
                .iter()
                .filter(|entry| entry.variant == variant)
                .cloned()
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VariantStats {
    pub variant: ProtocolVariant,
    pub entries: Vec<ConditionStats>,
}

impl VariantStats {
    pub fn at(&self, point: &SweepPoint) -> Option<&ConditionStats> {
        self.entries
            .iter()
            .find(|entry| same_point(&entry.point, point))
    }
}

pub(crate) fn same_point(left: &SweepPoint, right: &SweepPoint) -> bool {
    left.axis == right.axis && left.rate == right.rate
}

/// Visits points in order and variants in order for each point. Pairs with
/// no data are left out of the result.
pub fn sweep(
    points: &[SweepPoint],
    variants: &[ProtocolVariant],
    params: SimulatorParams,
    source: &SampleSource<'_>,
    level: ConfidenceLevel,
) -> Result<SweepResults> {
    let mut results = SweepResults::default();

    for point in points {
        for &variant in variants {
            let condition = point.condition(variant, params)?;
            let Some(sample) = source.collect(&condition, point)? else {
                info!(
                    variant = %variant,
                    axis = point.axis.as_str(),
                    rate = point.rate,
                    "no data for sweep point"
                );
                continue;
            };

            info!(
                variant = %variant,
                axis = point.axis.as_str(),
                rate = point.rate,
                "{} of {} trials succeeded",
                sample.len(),
                sample.attempted
            );
            results.entries.push(source.summarize(&sample, *point, level));
        }
    }

    Ok(results)
}
