use crate::{ParamSet, Result};

/// Defines the strategy for updating model parameters based on calculated gradients.
pub trait Optimizer {
    /// Updates `params` in place using the gradient of the current batch.
    ///
    /// # Arguments
    /// * `params` - The parameters to update.
    /// * `grads` - A gradient set compatible with `params`.
    ///
    /// # Returns
    /// A `ShapeMismatch` if `grads` doesn't fit `params`, which are left untouched in that case.
    fn step(&mut self, params: &mut ParamSet, grads: &ParamSet) -> Result<()>;
}
