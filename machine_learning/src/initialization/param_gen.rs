use ndarray::ArrayD;

use crate::{ParamSet, Result, arch::Model};

/// A `ParamGen` generates values for the initial state of the model's parameters.
pub trait ParamGen {
    /// Generates the initial tensor for a single parameter.
    ///
    /// # Arguments
    /// * `key` - The parameter's name, as reported by `Model::shapes`.
    /// * `shape` - The tensor's shape.
    ///
    /// # Returns
    /// The tensor or an `InvalidInitRange` if no value range could be derived for it.
    fn sample(&mut self, key: &str, shape: &[usize]) -> Result<ArrayD<f32>>;
}

/// Builds the initial `ParamSet` of a model.
///
/// # Arguments
/// * `model` - The architecture to initialize.
/// * `param_gen` - The generator used for every tensor, in `Model::shapes` order.
///
/// # Returns
/// A parameter set holding every key the model expects.
pub fn init_params<M, G>(model: &M, param_gen: &mut G) -> Result<ParamSet>
where
    M: Model,
    G: ParamGen + ?Sized,
{
    model
        .shapes()
        .into_iter()
        .map(|(key, shape)| {
            let tensor = param_gen.sample(&key, &shape)?;
            Ok((key, tensor))
        })
        .collect()
}
