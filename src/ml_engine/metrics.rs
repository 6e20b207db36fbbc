//! Goodness-of-fit metrics

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::BTreeMap;

/// Fit quality on one partition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PartitionMetrics {
    /// Coefficient of determination.
    pub r2: f64,
    /// Mean squared error.
    pub mse: f64,
    pub rows: usize,
}

impl PartitionMetrics {
    /// Score `predicted` against `actual`.
    ///
    /// A constant target gives R² = 1 for a perfect fit and 0 otherwise,
    /// never NaN.
    pub fn score(actual: &[f64], predicted: &[f64]) -> Self {
        let n = actual.len().min(predicted.len());
        if n == 0 {
            return Self {
                r2: 0.0,
                mse: 0.0,
                rows: 0,
            };
        }
        let mean = actual[..n].iter().sum::<f64>() / n as f64;
        let ss_res: f64 = actual
            .iter()
            .zip(predicted)
            .map(|(a, p)| (a - p).powi(2))
            .sum();
        let ss_tot: f64 = actual[..n].iter().map(|a| (a - mean).powi(2)).sum();

        let r2 = if ss_tot > 0.0 {
            1.0 - ss_res / ss_tot
        } else if ss_res == 0.0 {
            1.0
        } else {
            0.0
        };

        Self {
            r2,
            mse: ss_res / n as f64,
            rows: n,
        }
    }
}

/// Train and test metrics for one fitted model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub train: PartitionMetrics,
    pub test: PartitionMetrics,
}

impl Metrics {
    /// Train R² minus test R²; large positive values indicate overfitting.
    pub fn r2_gap(&self) -> f64 {
        self.train.r2 - self.test.r2
    }

    /// Flat `partition.metric` mapping.
    pub fn as_mapping(&self) -> BTreeMap<String, f64> {
        let mut map = BTreeMap::new();
        for (name, m) in [("train", &self.train), ("test", &self.test)] {
            map.insert(format!("{name}.r2"), m.r2);
            map.insert(format!("{name}.mse"), m.mse);
        }
        map
    }
}

/// Location and spread of held-out residuals (observed minus predicted).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResidualStats {
    pub mean: f64,
    /// Sample standard deviation; 0 when fewer than two residuals.
    pub std_dev: f64,
    pub count: usize,
}

impl ResidualStats {
    pub fn from_residuals(residuals: &[f64]) -> Self {
        let count = residuals.len();
        let mean = if count == 0 { 0.0 } else { residuals.mean() };
        let std_dev = if count < 2 { 0.0 } else { residuals.std_dev() };
        Self {
            mean,
            std_dev,
            count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_fit_scores_one() {
        let y = [1.0, 2.0, 3.0, 4.0];
        let m = PartitionMetrics::score(&y, &y);
        assert_eq!(m.r2, 1.0);
        assert_eq!(m.mse, 0.0);
        assert_eq!(m.rows, 4);
    }

    #[test]
    fn test_mean_prediction_scores_zero() {
        let y = [1.0, 2.0, 3.0, 4.0];
        let m = PartitionMetrics::score(&y, &[2.5; 4]);
        assert!(m.r2.abs() < 1e-12);
        assert!((m.mse - 1.25).abs() < 1e-12);
    }

    #[test]
    fn test_constant_target_is_not_nan() {
        let m = PartitionMetrics::score(&[5.0; 3], &[4.0; 3]);
        assert_eq!(m.r2, 0.0);
    }

    #[test]
    fn test_gap_and_mapping() {
        let metrics = Metrics {
            train: PartitionMetrics {
                r2: 0.95,
                mse: 1.0,
                rows: 80,
            },
            test: PartitionMetrics {
                r2: 0.70,
                mse: 4.0,
                rows: 20,
            },
        };
        assert!((metrics.r2_gap() - 0.25).abs() < 1e-12);
        let map = metrics.as_mapping();
        assert_eq!(map["test.mse"], 4.0);
        assert_eq!(map.len(), 4);
    }

    #[test]
    fn test_residual_stats() {
        let stats = ResidualStats::from_residuals(&[1.0, -1.0, 1.0, -1.0]);
        assert_eq!(stats.mean, 0.0);
        assert!((stats.std_dev - (4.0f64 / 3.0).sqrt()).abs() < 1e-12);
        assert_eq!(ResidualStats::from_residuals(&[3.0]).std_dev, 0.0);
    }
}
