use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, StudentsT};
use statrs::statistics::Statistics;

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct ConfidenceLevel(f64);

impl ConfidenceLevel {
    pub fn new(value: f64) -> Result<Self> {
        if !(value > 0.0 && value < 1.0) {
            bail!("confidence level must be strictly between 0 and 1, got {value}");
        }
        Ok(Self(value))
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl Default for ConfidenceLevel {
    fn default() -> Self {
        Self(0.90)
    }
}

impl FromStr for ConfidenceLevel {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        let value = raw
            .trim()
            .parse::<f64>()
            .with_context(|| format!("invalid confidence level: {raw}"))?;
        Self::new(value)
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConfidenceInterval {
    pub mean: f64,
    pub lower: f64,
    pub upper: f64,
    pub confidence_level: f64,
}

impl ConfidenceInterval {
    fn degenerate(level: ConfidenceLevel) -> Self {
        Self {
            mean: 0.0,
            lower: 0.0,
            upper: 0.0,
            confidence_level: level.value(),
        }
    }

    /// Zero-width interval around a single observation.
    pub fn point(value: f64, level: ConfidenceLevel) -> Self {
        Self {
            mean: value,
            lower: value,
            upper: value,
            confidence_level: level.value(),
        }
    }

    pub fn half_width(&self) -> f64 {
        (self.upper - self.lower) / 2.0
    }
}

/// Two-sided Student-t interval for the mean. Fewer than two observations
/// yield `(0, 0, 0)`.
pub fn estimate(sample: &[f64], level: ConfidenceLevel) -> ConfidenceInterval {
    if sample.len() < 2 {
        return ConfidenceInterval::degenerate(level);
    }

    let mean = sample.mean();
    let standard_error = sample.std_dev() / (sample.len() as f64).sqrt();
    let degrees_of_freedom = (sample.len() - 1) as f64;
    let half_width = standard_error * t_critical(level, degrees_of_freedom);

    ConfidenceInterval {
        mean,
        lower: mean - half_width,
        upper: mean + half_width,
        confidence_level: level.value(),
    }
}

fn t_critical(level: ConfidenceLevel, degrees_of_freedom: f64) -> f64 {
    let probability = (1.0 + level.value()) / 2.0;
    StudentsT::new(0.0, 1.0, degrees_of_freedom)
        .map(|distribution| distribution.inverse_cdf(probability))
        .unwrap_or(f64::NAN)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-4,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn estimate_is_degenerate_below_two_observations() {
        let level = ConfidenceLevel::default();
        for sample in [&[][..], &[42.0][..]] {
            let interval = estimate(sample, level);
            assert_eq!(
                (interval.mean, interval.lower, interval.upper),
                (0.0, 0.0, 0.0)
            );
        }
    }

    #[test]
    fn estimate_zero_variance_has_zero_width() {
        let interval = estimate(&[10.0, 10.0, 10.0, 10.0], ConfidenceLevel::default());
        assert_eq!(
            (interval.mean, interval.lower, interval.upper),
            (10.0, 10.0, 10.0)
        );
    }

    #[test]
    fn estimate_matches_reference_t_interval() {
        // mean 3, sem sqrt(2.5 / 5), t(0.95, 4) = 2.131846786
        let interval = estimate(&[1.0, 2.0, 3.0, 4.0, 5.0], ConfidenceLevel::default());
        let half_width = (2.5_f64 / 5.0).sqrt() * 2.131_846_786;
        assert_close(interval.mean, 3.0);
        assert_close(interval.lower, 3.0 - half_width);
        assert_close(interval.upper, 3.0 + half_width);
    }

    #[test]
    fn estimate_two_observations_uses_one_degree_of_freedom() {
        // t(0.975, 1) = 12.70620474
        let level = ConfidenceLevel::new(0.95).expect("valid level");
        let interval = estimate(&[1.0, 3.0], level);
        assert_close(interval.mean, 2.0);
        assert_close(interval.half_width(), 12.706_204_74);
    }

    #[test]
    fn estimate_contains_the_mean() {
        let samples: [&[f64]; 4] = [
            &[18.2, 17.3, 28.6],
            &[0.0, 1e6],
            &[-3.0, 4.5, 2.25, 9.0, 11.0, 0.5],
            &[10.762, 11.111, 11.108, 11.098, 11.305, 13.125],
        ];
        for sample in samples {
            let interval = estimate(sample, ConfidenceLevel::default());
            assert!(interval.lower <= interval.mean);
            assert!(interval.mean <= interval.upper);
        }
    }

    #[test]
    fn wider_confidence_gives_wider_interval() {
        let sample = [4.0, 6.0, 5.5, 4.5];
        let narrow = estimate(&sample, ConfidenceLevel::new(0.80).expect("valid"));
        let wide = estimate(&sample, ConfidenceLevel::new(0.99).expect("valid"));
        assert!(wide.half_width() > narrow.half_width());
    }

    #[test]
    fn confidence_level_rejects_out_of_range_values() {
        assert!("0.9".parse::<ConfidenceLevel>().is_ok());
        assert!("1.0".parse::<ConfidenceLevel>().is_err());
        assert!("0".parse::<ConfidenceLevel>().is_err());
        assert!("ninety".parse::<ConfidenceLevel>().is_err());
    }
}
