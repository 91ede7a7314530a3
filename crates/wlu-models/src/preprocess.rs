//! Z-score standardisation fitted on training rows.

use serde::{Deserialize, Serialize};

/// Per-column affine transform learned from training data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Standardizer {
    x_mean: Vec<f64>,
    x_std: Vec<f64>,
    y_mean: f64,
    y_std: f64,
    standardize_y: bool,
}

fn mean_std(values: impl Iterator<Item = f64> + Clone) -> (f64, f64) {
    let n = values.clone().count().max(1) as f64;
    let mean = values.clone().sum::<f64>() / n;
    let var = values.map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let std = var.sqrt();
    // Constant columns keep their scale.
    (mean, if std > 0.0 { std } else { 1.0 })
}

impl Standardizer {
    /// Fits the transform on a feature matrix and targets.
    pub fn fit(x: &[Vec<f64>], y: &[f64], standardize_y: bool) -> Self {
        let p = x.first().map_or(0, Vec::len);
        let (x_mean, x_std): (Vec<f64>, Vec<f64>) = (0..p)
            .map(|j| mean_std(x.iter().map(move |row| row[j])))
            .unzip();
        let (y_mean, y_std) = if standardize_y {
            mean_std(y.iter().copied())
        } else {
            (0.0, 1.0)
        };
        Self {
            x_mean,
            x_std,
            y_mean,
            y_std,
            standardize_y,
        }
    }

    /// Transforms feature rows.
    pub fn transform_x(&self, x: &[Vec<f64>]) -> Vec<Vec<f64>> {
        x.iter()
            .map(|row| {
                row.iter()
                    .zip(self.x_mean.iter().zip(&self.x_std))
                    .map(|(v, (m, s))| (v - m) / s)
                    .collect()
            })
            .collect()
    }

    /// Transforms targets.
    pub fn transform_y(&self, y: &[f64]) -> Vec<f64> {
        y.iter().map(|v| (v - self.y_mean) / self.y_std).collect()
    }

    /// Maps standardised predictions back to the original scale.
    pub fn inverse_y(&self, y: Vec<f64>) -> Vec<f64> {
        if !self.standardize_y {
            return y;
        }
        y.into_iter().map(|v| v * self.y_std + self.y_mean).collect()
    }
}
