use serde::{Deserialize, Serialize};

/// Ordinary least squares on a single predictor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub(crate) struct LinearRegressor {
    pub(crate) intercept: f64,
    pub(crate) slope: f64,
}

impl LinearRegressor {
    /// With no spread in `xs` the fit degenerates to the mean of `ys`.
    pub(crate) fn fit(xs: &[f64], ys: &[f64]) -> Self {
        let n = xs.len().min(ys.len());
        if n == 0 {
            return Self {
                intercept: 0.0,
                slope: 0.0,
            };
        }

        let mean_x = xs[..n].iter().sum::<f64>() / n as f64;
        let mean_y = ys[..n].iter().sum::<f64>() / n as f64;

        let (sxx, sxy) = xs[..n]
            .iter()
            .zip(&ys[..n])
            .fold((0.0, 0.0), |(sxx, sxy), (x, y)| {
                let dx = x - mean_x;
                (sxx + dx * dx, sxy + dx * (y - mean_y))
            });

        if sxx.abs() < f64::EPSILON {
            return Self {
                intercept: mean_y,
                slope: 0.0,
            };
        }

        let slope = sxy / sxx;
        Self {
            intercept: mean_y - slope * mean_x,
            slope,
        }
    }

    pub(crate) fn predict(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

/// One independent regressor per category, all driven by the month's total
/// budget. Output order is the order the regressors were fitted in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct BudgetModel {
    pub(crate) regressors: Vec<LinearRegressor>,
}

impl BudgetModel {
    /// `targets[j]` holds category `j`'s amount for every sample in `xs`.
    pub(crate) fn fit(xs: &[f64], targets: &[Vec<f64>]) -> Self {
        Self {
            regressors: targets
                .iter()
                .map(|ys| LinearRegressor::fit(xs, ys))
                .collect(),
        }
    }

    pub(crate) fn predict(&self, total_budget: f64) -> Vec<f64> {
        self.regressors
            .iter()
            .map(|r| r.predict(total_budget))
            .collect()
    }

    pub(crate) fn output_len(&self) -> usize {
        self.regressors.len()
    }
}
