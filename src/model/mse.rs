use crate::error::{Result, TrainError};
use crate::model::traits::LossOutput;

/// Mean-squared error over a batch, averaged over samples and outputs.
///
/// Returns the scalar loss together with `∂L/∂y` for each output row, which is
/// exactly what `LinearModel::backward` consumes.
pub fn mse_loss(
    predicted: &[Vec<f64>],
    expected: &[Vec<f64>],
) -> Result<LossOutput<Vec<Vec<f64>>>> {
    if predicted.len() != expected.len() {
        return Err(TrainError::computation(format!(
            "{} predictions for {} targets",
            predicted.len(),
            expected.len()
        )));
    }
    let count: usize = predicted.iter().map(Vec::len).sum();
    if count == 0 {
        return Err(TrainError::computation("mse over an empty batch"));
    }
    let n = count as f64;

    let mut total = 0.0;
    let mut grad = Vec::with_capacity(predicted.len());
    for (p, y) in predicted.iter().zip(expected) {
        if p.len() != y.len() {
            return Err(TrainError::computation("prediction and target widths differ"));
        }
        total += p.iter().zip(y).map(|(a, b)| (a - b).powi(2)).sum::<f64>();
        grad.push(p.iter().zip(y).map(|(a, b)| 2.0 * (a - b) / n).collect());
    }

    Ok(LossOutput::new(total / n, grad))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn mse_matches_hand_computation() {
        let predicted = [vec![1.0, 2.0], vec![3.0, 0.0]];
        let expected = [vec![0.0, 2.0], vec![1.0, 0.0]];
        let out = mse_loss(&predicted, &expected).unwrap();
        // (1 + 0 + 4 + 0) / 4
        assert_abs_diff_eq!(out.value, 1.25);
        assert_eq!(out.grad, vec![vec![0.5, 0.0], vec![1.0, 0.0]]);
    }

    #[test]
    fn mse_rejects_mismatched_batches() {
        assert!(mse_loss(&[vec![1.0]], &[]).is_err());
        assert!(mse_loss(&[], &[]).is_err());
    }
}
