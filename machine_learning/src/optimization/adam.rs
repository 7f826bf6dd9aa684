use super::Optimizer;
use crate::{ParamSet, Result};

/// The Adam optimizer, it keeps a first and second moment estimate per parameter tensor.
#[derive(Debug, Clone)]
pub struct Adam {
    learning_rate: f32,
    beta1: f32,
    beta2: f32,
    beta1_t: f32,
    beta2_t: f32,
    v: ParamSet,
    s: ParamSet,
    epsilon: f32,
}

impl Adam {
    /// Creates a new `Adam` optimizer.
    ///
    /// # Arguments
    /// * `params` - The parameters this instance is going to update, only their shapes are used.
    /// * `learning_rate` - The small coefficient that modulates the amount of training per update.
    /// * `beta1`, `beta2`, `epsilon` - Hyperparameters to the optimization algorithm.
    ///
    /// # Returns
    /// A new `Adam` instance.
    pub fn new(params: &ParamSet, learning_rate: f32, beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Self {
            learning_rate,
            beta1,
            beta2,
            beta1_t: 1.,
            beta2_t: 1.,
            v: params.zeros_like(),
            s: params.zeros_like(),
            epsilon,
        }
    }

    /// Creates a new `Adam` optimizer with the usual hyperparameters (`0.9`, `0.999`, `1e-8`).
    pub fn with_defaults(params: &ParamSet, learning_rate: f32) -> Self {
        Self::new(params, learning_rate, 0.9, 0.999, 1e-8)
    }
}

impl Optimizer for Adam {
    fn step(&mut self, params: &mut ParamSet, grads: &ParamSet) -> Result<()> {
        params.check_compatible(grads)?;
        params.check_compatible(&self.v)?;

        let Self {
            learning_rate: lr,
            beta1: b1,
            beta2: b2,
            epsilon: eps,
            ..
        } = *self;

        self.beta1_t *= b1;
        self.beta2_t *= b2;

        let bc1 = 1. - self.beta1_t;
        let bc2 = 1. - self.beta2_t;
        let step_size = lr * (bc2.sqrt() / bc1);

        let moments = self.v.iter_mut().zip(self.s.iter_mut());
        let tensors = params.iter_mut().zip(grads.iter());

        for (((_, p), (_, g)), ((_, v), (_, s))) in tensors.zip(moments) {
            ndarray::Zip::from(p)
                .and(g)
                .and(v)
                .and(s)
                .for_each(|p, &g, v, s| {
                    *v = b1 * *v + (1. - b1) * g;
                    *s = b2 * *s + (1. - b2) * g.powi(2);
                    *p -= step_size * *v / (s.sqrt() + eps);
                });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use ndarray::arr1;

    use super::*;
    use crate::MlErr;

    fn single(values: &[f32]) -> ParamSet {
        let mut p = ParamSet::new();
        p.insert("w", arr1(values));
        p
    }

    #[test]
    fn test_first_step_moves_by_learning_rate() {
        let mut params = single(&[1.0, 1.0]);
        let grads = single(&[4.0, -0.5]);
        let mut adam = Adam::with_defaults(&params, 0.1);

        adam.step(&mut params, &grads).unwrap();

        // The first bias-corrected step has magnitude `lr` regardless of the gradient's scale.
        let w = params.vector("w").unwrap();
        assert!((w[0] - 0.9).abs() < 1e-4);
        assert!((w[1] - 1.1).abs() < 1e-4);
    }

    #[test]
    fn test_rejects_foreign_gradient() {
        let mut params = single(&[1.0]);
        let mut adam = Adam::with_defaults(&params, 0.1);
        let grads = single(&[1.0, 1.0]);

        let err = adam.step(&mut params, &grads).unwrap_err();
        assert!(matches!(err, MlErr::ShapeMismatch { .. }));
        assert_eq!(params, single(&[1.0]));
    }
}
