/// Holdout scores. Informational only; they never block publishing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct EvaluationReport {
    /// Coefficient of determination, averaged uniformly over categories.
    pub(crate) r2: f64,
    pub(crate) accuracy_percent: f64,
    pub(crate) mae: f64,
    pub(crate) rmse: f64,
    pub(crate) training_rows: usize,
    pub(crate) holdout_rows: usize,
}

/// `actual[i][j]` / `predicted[i][j]`: sample `i`, category `j`.
pub(crate) fn evaluate(
    actual: &[Vec<f64>],
    predicted: &[Vec<f64>],
    training_rows: usize,
) -> EvaluationReport {
    let r2 = r2_score(actual, predicted);
    let (abs_sum, sq_sum, count) = actual
        .iter()
        .zip(predicted)
        .flat_map(|(a, p)| a.iter().zip(p))
        .fold((0.0, 0.0, 0usize), |(abs_sum, sq_sum, n), (a, p)| {
            let err = a - p;
            (abs_sum + err.abs(), sq_sum + err * err, n + 1)
        });

    let (mae, mse) = if count == 0 {
        (0.0, 0.0)
    } else {
        (abs_sum / count as f64, sq_sum / count as f64)
    };

    EvaluationReport {
        r2,
        accuracy_percent: r2.clamp(0.0, 1.0) * 100.0,
        mae,
        rmse: mse.sqrt(),
        training_rows,
        holdout_rows: actual.len(),
    }
}

/// An output with no variance in `actual` scores 1.0 when predicted exactly
/// and 0.0 otherwise.
pub(crate) fn r2_score(actual: &[Vec<f64>], predicted: &[Vec<f64>]) -> f64 {
    let outputs = actual.first().map_or(0, Vec::len);
    if actual.is_empty() || outputs == 0 {
        return 0.0;
    }

    let n = actual.len() as f64;
    let per_output: Vec<f64> = (0..outputs)
        .map(|j| {
            let mean = actual.iter().map(|row| row[j]).sum::<f64>() / n;
            let (ss_res, ss_tot) = actual.iter().zip(predicted).fold(
                (0.0, 0.0),
                |(ss_res, ss_tot), (a, p)| {
                    let res = a[j] - p.get(j).copied().unwrap_or(0.0);
                    let dev = a[j] - mean;
                    (ss_res + res * res, ss_tot + dev * dev)
                },
            );
            if ss_tot == 0.0 {
                if ss_res == 0.0 {
                    1.0
                } else {
                    0.0
                }
            } else {
                1.0 - ss_res / ss_tot
            }
        })
        .collect();

    per_output.iter().sum::<f64>() / outputs as f64
}
