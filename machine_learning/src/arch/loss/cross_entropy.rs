use ndarray::{Array2, ArrayView2, Axis};

use super::LossFn;

/// Softmax followed by the negative log likelihood, `y` holds one-hot (or probability) rows.
///
/// The model is expected to output raw logits.
#[derive(Debug, Default, Clone, Copy)]
pub struct CrossEntropy;

impl CrossEntropy {
    /// Returns a new `CrossEntropy`.
    pub fn new() -> Self {
        Self
    }

    fn softmax(logits: ArrayView2<f32>) -> Array2<f32> {
        let mut out = logits.to_owned();

        for mut row in out.axis_iter_mut(Axis(0)) {
            let max = row.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
            row.mapv_inplace(|v| (v - max).exp());
            let sum = row.sum();
            row.mapv_inplace(|v| v / sum);
        }

        out
    }
}

impl LossFn for CrossEntropy {
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> f32 {
        let rows = y_pred.nrows();
        if rows == 0 {
            return 0.0;
        }

        let probs = Self::softmax(y_pred);
        let total: f32 = probs
            .iter()
            .zip(y.iter())
            .map(|(&p, &t)| -t * p.max(f32::MIN_POSITIVE).ln())
            .sum();

        total / rows as f32
    }

    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Array2<f32> {
        let rows = y_pred.nrows().max(1) as f32;
        (Self::softmax(y_pred) - &y) / rows
    }
}

#[cfg(test)]
mod tests {
    use ndarray::arr2;

    use super::*;

    #[test]
    fn test_uniform_logits_give_ln_classes() {
        let logits = arr2(&[[0.0, 0.0], [5.0, 5.0]]);
        let y = arr2(&[[1.0, 0.0], [0.0, 1.0]]);

        let loss = CrossEntropy.loss(logits.view(), y.view());
        assert!((loss - 2f32.ln()).abs() < 1e-6);
    }

    #[test]
    fn test_prime_rows_sum_to_zero() {
        let logits = arr2(&[[2.0, -1.0, 0.5]]);
        let y = arr2(&[[0.0, 1.0, 0.0]]);

        let d = CrossEntropy.loss_prime(logits.view(), y.view());
        assert!(d.sum().abs() < 1e-6);
        assert!(d[[0, 1]] < 0.0);
    }
}
