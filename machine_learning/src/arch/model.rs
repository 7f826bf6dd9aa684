use ndarray::{Array2, ArrayView2};

use crate::{ParamSet, Result, arch::loss::LossFn};

/// A trainable architecture. It holds no parameters itself, they live in a `ParamSet`
/// so that many clients can train the same architecture from different states.
pub trait Model {
    /// Returns the key and shape of every parameter tensor the model expects.
    fn shapes(&self) -> Vec<(String, Vec<usize>)>;

    /// Returns the amount of scalar parameters in the model.
    fn size(&self) -> usize {
        self.shapes()
            .iter()
            .map(|(_, shape)| shape.iter().product::<usize>())
            .sum()
    }

    /// Makes a forward pass.
    ///
    /// # Arguments
    /// * `params` - The model's parameters.
    /// * `x` - The input batch, one sample per row.
    ///
    /// # Returns
    /// The prediction or a `ShapeMismatch` if `params` doesn't fit the architecture.
    fn forward(&self, params: &ParamSet, x: ArrayView2<f32>) -> Result<Array2<f32>>;

    /// Computes the loss of a batch and its gradient with respect to every parameter.
    ///
    /// # Arguments
    /// * `params` - The model's parameters.
    /// * `x` - The input batch.
    /// * `y` - The expected output batch.
    /// * `loss_fn` - The loss function.
    ///
    /// # Returns
    /// The batch loss together with a gradient set compatible with `params`.
    fn backprop<L: LossFn>(
        &self,
        params: &ParamSet,
        x: ArrayView2<f32>,
        y: ArrayView2<f32>,
        loss_fn: &L,
    ) -> Result<(f32, ParamSet)>;
}
