use ndarray::{Array2, ArrayView2};

use super::{
    Model,
    layers::{Dense, Layer},
    loss::LossFn,
};
use crate::{MlErr, ParamSet, Result};

/// A sequential model: information flows forward when computing an output and backward when
/// computing the *deltas* of its layers.
///
/// The parameters of the `i`-th layer are stored under `"{i}.weight"` and `"{i}.bias"`.
#[derive(Debug, Clone)]
pub struct Sequential {
    layers: Vec<Layer>,
}

impl Sequential {
    /// Creates a new `Sequential`.
    ///
    /// # Arguments
    /// * `layers` - The layers the sequential is composed of.
    ///
    /// # Returns
    /// A new `Sequential` instance.
    pub fn new<I>(layers: I) -> Self
    where
        I: IntoIterator<Item = Layer>,
    {
        Self {
            layers: layers.into_iter().collect(),
        }
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn weight_key(i: usize) -> String {
        format!("{i}.weight")
    }

    pub fn bias_key(i: usize) -> String {
        format!("{i}.bias")
    }

    /// Checks that `layer`'s parameters exist in `params` with the expected shapes.
    fn check_layer(params: &ParamSet, i: usize, layer: &Dense) -> Result<()> {
        let (n, m) = layer.dim();
        let w_key = Self::weight_key(i);
        let b_key = Self::bias_key(i);

        let w = params.matrix(&w_key)?;
        if w.dim() != (n, m) {
            return Err(MlErr::shape(&w_key, w.shape(), &[n, m]));
        }

        let b = params.vector(&b_key)?;
        if b.len() != m {
            return Err(MlErr::shape(&b_key, b.shape(), &[m]));
        }

        Ok(())
    }
}

impl Model for Sequential {
    fn shapes(&self) -> Vec<(String, Vec<usize>)> {
        self.layers
            .iter()
            .enumerate()
            .flat_map(|(i, layer)| match layer {
                Layer::Dense(l) => {
                    let (n, m) = l.dim();
                    [
                        (Self::weight_key(i), vec![n, m]),
                        (Self::bias_key(i), vec![m]),
                    ]
                }
            })
            .collect()
    }

    fn forward(&self, params: &ParamSet, x: ArrayView2<f32>) -> Result<Array2<f32>> {
        let mut a = x.to_owned();

        for (i, layer) in self.layers.iter().enumerate() {
            let Layer::Dense(l) = layer;
            Self::check_layer(params, i, l)?;

            let w = params.matrix(&Self::weight_key(i))?;
            let b = params.vector(&Self::bias_key(i))?;
            let (out, _) = l.forward(w, b, a.view());
            a = out;
        }

        Ok(a)
    }

    fn backprop<L: LossFn>(
        &self,
        params: &ParamSet,
        x: ArrayView2<f32>,
        y: ArrayView2<f32>,
        loss_fn: &L,
    ) -> Result<(f32, ParamSet)> {
        if x.nrows() != y.nrows() {
            return Err(MlErr::SizeMismatch {
                what: "batch rows",
                got: y.nrows(),
                expected: x.nrows(),
            });
        }

        let mut caches = Vec::with_capacity(self.layers.len());
        let mut a = x.to_owned();

        for (i, layer) in self.layers.iter().enumerate() {
            let Layer::Dense(l) = layer;
            Self::check_layer(params, i, l)?;

            let w = params.matrix(&Self::weight_key(i))?;
            let b = params.vector(&Self::bias_key(i))?;
            let (out, cache) = l.forward(w, b, a.view());
            caches.push(cache);
            a = out;
        }

        if a.dim() != y.dim() {
            return Err(MlErr::SizeMismatch {
                what: "output columns",
                got: y.ncols(),
                expected: a.ncols(),
            });
        }

        let loss = loss_fn.loss(a.view(), y);
        let mut d = loss_fn.loss_prime(a.view(), y);
        let mut grads = ParamSet::new();

        for (i, (layer, cache)) in self.layers.iter().zip(&caches).enumerate().rev() {
            let Layer::Dense(l) = layer;
            let w = params.matrix(&Self::weight_key(i))?;
            let (dw, db, d_prev) = l.backward(w, cache, d);

            grads.insert(Self::weight_key(i), dw);
            grads.insert(Self::bias_key(i), db);
            d = d_prev;
        }

        Ok((loss, grads))
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{arr1, arr2};

    use super::*;
    use crate::arch::{activations::ActFn, loss::Mse};

    fn linear() -> (Sequential, ParamSet) {
        let model = Sequential::new([Layer::dense((1, 1), None)]);
        let mut params = ParamSet::new();
        params.insert("0.weight", arr2(&[[2.0]]));
        params.insert("0.bias", arr1(&[1.0]));
        (model, params)
    }

    #[test]
    fn test_shapes_follow_layers() {
        let model = Sequential::new([
            Layer::dense((4, 3), Some(ActFn::relu())),
            Layer::dense((3, 2), None),
        ]);

        let shapes = model.shapes();
        assert_eq!(shapes[0], ("0.weight".to_string(), vec![4, 3]));
        assert_eq!(shapes[1], ("0.bias".to_string(), vec![3]));
        assert_eq!(shapes[3], ("1.bias".to_string(), vec![2]));
        assert_eq!(model.size(), 4 * 3 + 3 + 3 * 2 + 2);
    }

    #[test]
    fn test_forward_linear() {
        let (model, params) = linear();
        let x = arr2(&[[1.0], [2.0]]);

        let y = model.forward(&params, x.view()).unwrap();
        assert_eq!(y, arr2(&[[3.0], [5.0]]));
    }

    #[test]
    fn test_backprop_linear_gradient() {
        let (model, params) = linear();
        let x = arr2(&[[1.0], [2.0]]);
        let y = arr2(&[[3.0], [3.0]]);

        // y_pred = [3, 5], error = [0, 2], loss = (0 + 4) / 2
        let (loss, grads) = model.backprop(&params, x.view(), y.view(), &Mse).unwrap();

        assert_eq!(loss, 2.0);
        params.check_compatible(&grads).unwrap();
        // d = 2 / 2 * [0, 2] = [0, 2], dw = x^T d = 4, db = 2
        assert_eq!(grads.matrix("0.weight").unwrap(), arr2(&[[4.0]]));
        assert_eq!(grads.vector("0.bias").unwrap(), arr1(&[2.0]));
    }

    #[test]
    fn test_forward_rejects_foreign_params() {
        let (model, _) = linear();
        let mut params = ParamSet::new();
        params.insert("0.weight", arr2(&[[1.0, 1.0]]));
        params.insert("0.bias", arr1(&[1.0]));

        let err = model.forward(&params, arr2(&[[1.0]]).view()).unwrap_err();
        assert_eq!(err, MlErr::shape("0.weight", &[1, 2], &[1, 1]));
    }
}
