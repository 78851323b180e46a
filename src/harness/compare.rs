use serde::Serialize;

use crate::model::{ProtocolVariant, SweepAxis, SweepPoint};
use crate::report::Metric;

use super::sweep::{ConditionStats, VariantStats};

#[derive(Debug, Clone, Serialize)]
pub struct ComparisonRow {
    pub point: SweepPoint,
    pub left: Option<ConditionStats>,
    pub right: Option<ConditionStats>,
}

impl ComparisonRow {
    /// Right mean minus left mean, when both sides have data.
    pub fn mean_delta(&self, metric: Metric) -> Option<f64> {
        let left = self.left.as_ref()?.interval(metric)?;
        let right = self.right.as_ref()?.interval(metric)?;
        Some(right.mean - left.mean)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    pub generated_at: String,
    pub axis: SweepAxis,
    pub confidence_level: f64,
    pub left_variant: ProtocolVariant,
    pub right_variant: ProtocolVariant,
    pub rows: Vec<ComparisonRow>,
}

/// Joins two variants' statistics point by point. A row is emitted when at
/// least one side has data; the missing side stays `None`.
pub fn compare(left: &VariantStats, right: &VariantStats, points: &[SweepPoint]) -> Vec<ComparisonRow> {
    points
        .iter()
        .filter_map(|point| {
            let left_stats = left.at(point).cloned();
            let right_stats = right.at(point).cloned();
            if left_stats.is_none() && right_stats.is_none() {
                return None;
            }
            Some(ComparisonRow {
                point: *point,
                left: left_stats,
                right: right_stats,
            })
        })
        .collect()
}
