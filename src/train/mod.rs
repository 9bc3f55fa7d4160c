mod metrics;
mod pipeline;
mod regression;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::aggregate::MonthlyAggregates;
use crate::artifacts::Artifacts;
use crate::models::CategoryRatios;

use metrics::EvaluationReport;
pub(crate) use pipeline::{run_training, TrainingSummary};
pub(crate) use regression::BudgetModel;

/// Below this many monthly rows no model is fitted.
pub(crate) const MIN_MONTHLY_ROWS: usize = 2;
pub(crate) const HOLDOUT_FRACTION: f64 = 0.1;
pub(crate) const SPLIT_SEED: u64 = 14;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TrainingOutcome {
    Fitted {
        model: BudgetModel,
        categories: Vec<String>,
        report: EvaluationReport,
    },
    /// Not enough monthly history; only the static default split is published.
    StaticDefault {
        categories: Vec<String>,
        monthly_rows: usize,
    },
}

impl TrainingOutcome {
    /// The artifact set to publish. The global-ratio artifact is always the
    /// static default split, whether or not a model was fitted.
    pub(crate) fn into_artifacts(self) -> Artifacts {
        match self {
            Self::Fitted {
                model, categories, ..
            } => Artifacts::new(
                Some(model),
                categories,
                Some(CategoryRatios::default_split()),
            ),
            Self::StaticDefault { categories, .. } => {
                Artifacts::new(None, categories, Some(CategoryRatios::default_split()))
            }
        }
    }
}

pub(crate) struct ModelTrainer {
    min_rows: usize,
    holdout_fraction: f64,
    seed: u64,
}

impl Default for ModelTrainer {
    fn default() -> Self {
        Self {
            min_rows: MIN_MONTHLY_ROWS,
            holdout_fraction: HOLDOUT_FRACTION,
            seed: SPLIT_SEED,
        }
    }
}

impl ModelTrainer {
    pub(crate) fn train(&self, aggregates: &MonthlyAggregates) -> TrainingOutcome {
        let categories = aggregates.categories().to_vec();
        if aggregates.len() < self.min_rows {
            info!(
                monthly_rows = aggregates.len(),
                "not enough monthly data, using default split"
            );
            return TrainingOutcome::StaticDefault {
                categories,
                monthly_rows: aggregates.len(),
            };
        }

        if let (Some(first), Some(last)) = (aggregates.rows().first(), aggregates.rows().last()) {
            debug!(
                from = %first.month,
                to = %last.month,
                categories = categories.len(),
                "fitting budget model"
            );
        }

        let xs: Vec<f64> = aggregates
            .rows()
            .iter()
            .map(|r| to_f64(r.total_budget))
            .collect();
        let ys: Vec<Vec<f64>> = aggregates
            .rows()
            .iter()
            .map(|r| r.amounts.iter().copied().map(to_f64).collect())
            .collect();

        let (train_idx, holdout_idx) = split_indices(xs.len(), self.holdout_fraction, self.seed);

        let train_xs: Vec<f64> = train_idx.iter().map(|&i| xs[i]).collect();
        let targets: Vec<Vec<f64>> = (0..categories.len())
            .map(|j| train_idx.iter().map(|&i| ys[i][j]).collect())
            .collect();
        let model = BudgetModel::fit(&train_xs, &targets);

        let actual: Vec<Vec<f64>> = holdout_idx.iter().map(|&i| ys[i].clone()).collect();
        let predicted: Vec<Vec<f64>> = holdout_idx.iter().map(|&i| model.predict(xs[i])).collect();
        let report = metrics::evaluate(&actual, &predicted, train_idx.len());

        info!(
            r2 = report.r2,
            accuracy_percent = report.accuracy_percent,
            mae = report.mae,
            rmse = report.rmse,
            "model evaluated on holdout"
        );

        TrainingOutcome::Fitted {
            model,
            categories,
            report,
        }
    }
}

/// Seeded shuffle, then the first `ceil(n * fraction)` indices are held out.
/// At least one row is always left for training.
pub(crate) fn split_indices(n: usize, holdout_fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut StdRng::seed_from_u64(seed));

    let holdout = ((n as f64) * holdout_fraction).ceil() as usize;
    let holdout = holdout.min(n.saturating_sub(1));
    let train = indices.split_off(holdout);
    (train, indices)
}

fn to_f64(d: Decimal) -> f64 {
    d.to_f64().unwrap_or(0.0)
}
