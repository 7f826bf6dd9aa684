use super::Optimizer;
use crate::{ParamSet, Result};

/// Gradient descent optimization algorithm.
#[derive(Debug, Clone, Copy)]
pub struct GradientDescent {
    learning_rate: f32,
}

impl GradientDescent {
    /// Returns a new `GradientDescent`.
    ///
    /// # Arguments
    /// * `learning_rate` - The *length* of the steps taken on `step`.
    pub fn new(learning_rate: f32) -> Self {
        Self { learning_rate }
    }
}

impl Optimizer for GradientDescent {
    /// Makes a step in the opposite direction of the gradient, with a length of `learning_rate`.
    fn step(&mut self, params: &mut ParamSet, grads: &ParamSet) -> Result<()> {
        params.scaled_add(-self.learning_rate, grads)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::arr1;

    use super::*;

    #[test]
    fn test_step_against_gradient() {
        let mut params = ParamSet::new();
        params.insert("w", arr1(&[1.0, 2.0]));
        let mut grads = ParamSet::new();
        grads.insert("w", arr1(&[10.0, -10.0]));

        GradientDescent::new(0.1).step(&mut params, &grads).unwrap();
        assert_eq!(params.vector("w").unwrap(), arr1(&[0.0, 3.0]));
    }
}
