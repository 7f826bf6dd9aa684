use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

use crate::arch::activations::ActFn;

/// A fully connected layer: `a = act_fn(x · w + b)`.
///
/// The layer holds no parameters, `w` has shape `(dim.0, dim.1)` and `b` has shape `(dim.1)`.
#[derive(Debug, Clone, Copy)]
pub struct Dense {
    dim: (usize, usize),
    act_fn: Option<ActFn>,
}

/// What a forward pass leaves behind for the backward pass.
#[derive(Debug)]
pub struct DenseCache {
    pub x: Array2<f32>,
    pub z: Array2<f32>,
}

impl Dense {
    /// Creates a new `Dense` layer.
    ///
    /// # Arguments
    /// * `dim` - The input and output sizes.
    /// * `act_fn` - An optional activation applied to the output.
    pub fn new(dim: (usize, usize), act_fn: Option<ActFn>) -> Self {
        Self { dim, act_fn }
    }

    pub fn dim(&self) -> (usize, usize) {
        self.dim
    }

    /// Returns the amount of parameters this layer has.
    pub fn size(&self) -> usize {
        (self.dim.0 + 1) * self.dim.1
    }

    /// Computes the layer's output.
    ///
    /// # Returns
    /// The activated output and the cache needed by `backward`.
    pub fn forward(
        &self,
        w: ArrayView2<f32>,
        b: ArrayView1<f32>,
        x: ArrayView2<f32>,
    ) -> (Array2<f32>, DenseCache) {
        let z = x.dot(&w) + &b;

        let a = match &self.act_fn {
            Some(act_fn) => z.mapv(|v| act_fn.f(v)),
            None => z.clone(),
        };

        let cache = DenseCache { x: x.to_owned(), z };
        (a, cache)
    }

    /// Propagates `d` (the loss derivative w.r.t. this layer's output) backwards.
    ///
    /// # Returns
    /// The weight gradient, the bias gradient and the derivative w.r.t. the layer's input.
    pub fn backward(
        &self,
        w: ArrayView2<f32>,
        cache: &DenseCache,
        mut d: Array2<f32>,
    ) -> (Array2<f32>, Array1<f32>, Array2<f32>) {
        if let Some(act_fn) = &self.act_fn {
            d.zip_mut_with(&cache.z, |d, &z| *d *= act_fn.df(z));
        }

        let dw = cache.x.t().dot(&d);
        let db = d.sum_axis(Axis(0));
        let d_prev = d.dot(&w.t());

        (dw, db, d_prev)
    }
}
