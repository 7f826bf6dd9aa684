use ndarray::{ArrayD, IxDyn};
use rand::{Rng, SeedableRng, rngs::StdRng};
use rand_distr::{Distribution, Uniform};

use super::ParamGen;
use crate::{MlErr, Result};

/// A parameter generator using Xavier uniform initialization for weight matrices and zeros for
/// every other tensor (biases).
#[derive(Debug, Clone)]
pub struct RandParamGen<R: Rng> {
    rng: R,
}

impl<R: Rng> RandParamGen<R> {
    /// Creates a new `RandParamGen` parameter generator.
    ///
    /// # Arguments
    /// * `rng` - A random number generator.
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl RandParamGen<StdRng> {
    /// Creates a new reproducible `RandParamGen` out of a seed.
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> ParamGen for RandParamGen<R> {
    fn sample(&mut self, key: &str, shape: &[usize]) -> Result<ArrayD<f32>> {
        let &[fan_in, fan_out] = shape else {
            return Ok(ArrayD::zeros(IxDyn(shape)));
        };

        let range = (6. / (fan_in + fan_out) as f32).sqrt();
        let distribution = Uniform::new(-range, range).map_err(|_| MlErr::InvalidInitRange {
            key: key.to_string(),
        })?;

        let values = (0..fan_in * fan_out)
            .map(|_| distribution.sample(&mut self.rng))
            .collect();

        ArrayD::from_shape_vec(IxDyn(shape), values).map_err(|_| MlErr::SizeMismatch {
            what: "initial parameters",
            got: fan_in * fan_out,
            expected: shape.iter().product(),
        })
    }
}
