use ndarray::{ArrayD, IxDyn};

use super::ParamGen;
use crate::Result;

/// A parameter generator that always generates the same value.
#[derive(Debug, Clone, Copy)]
pub struct ConstParamGen {
    value: f32,
}

impl ConstParamGen {
    /// Creates a new `ConstParamGen` parameter generator.
    ///
    /// # Arguments
    /// * `value` - The value to always generate.
    ///
    /// # Returns
    /// A new `ConstParamGen` instance.
    pub fn new(value: f32) -> Self {
        Self { value }
    }
}

impl ParamGen for ConstParamGen {
    fn sample(&mut self, _key: &str, shape: &[usize]) -> Result<ArrayD<f32>> {
        Ok(ArrayD::from_elem(IxDyn(shape), self.value))
    }
}
