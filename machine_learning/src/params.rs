use std::collections::{BTreeMap, btree_map};

use ndarray::{ArrayD, ArrayView1, ArrayView2, Ix1, Ix2};

use crate::{MlErr, Result};

/// A named collection of tensors holding the state of a model.
///
/// Keys are kept ordered so iterating two compatible sets visits the same
/// tensors in the same order. `Clone` is a deep copy: no storage is shared.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamSet {
    tensors: BTreeMap<String, ArrayD<f32>>,
}

impl ParamSet {
    /// Creates an empty `ParamSet`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts (or replaces) the tensor stored under `key`.
    ///
    /// # Arguments
    /// * `key` - The parameter's name.
    /// * `tensor` - Any owned array, it gets stored with a dynamic dimension.
    pub fn insert<K, D>(&mut self, key: K, tensor: ndarray::Array<f32, D>)
    where
        K: Into<String>,
        D: ndarray::Dimension,
    {
        self.tensors.insert(key.into(), tensor.into_dyn());
    }

    pub fn get(&self, key: &str) -> Option<&ArrayD<f32>> {
        self.tensors.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut ArrayD<f32>> {
        self.tensors.get_mut(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.tensors.keys().map(String::as_str)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, ArrayD<f32>> {
        self.tensors.iter()
    }

    pub fn iter_mut(&mut self) -> btree_map::IterMut<'_, String, ArrayD<f32>> {
        self.tensors.iter_mut()
    }

    /// Returns the amount of tensors in the set.
    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    /// Returns the total amount of scalar values across all tensors.
    pub fn num_values(&self) -> usize {
        self.tensors.values().map(|t| t.len()).sum()
    }

    /// Returns a set with the same keys and shapes, filled with zeros.
    pub fn zeros_like(&self) -> Self {
        let tensors = self
            .tensors
            .iter()
            .map(|(k, t)| (k.clone(), ArrayD::zeros(t.raw_dim())))
            .collect();

        Self { tensors }
    }

    /// Checks that `other` has exactly the same keys and per-key shapes as `self`.
    ///
    /// # Returns
    /// A `ShapeMismatch` naming the first offending key.
    pub fn check_compatible(&self, other: &ParamSet) -> Result<()> {
        for (key, tensor) in &self.tensors {
            match other.tensors.get(key) {
                Some(o) if o.shape() == tensor.shape() => {}
                Some(o) => return Err(MlErr::shape(key, o.shape(), tensor.shape())),
                None => return Err(MlErr::missing_key(key, None, Some(tensor.shape()))),
            }
        }

        if let Some((key, o)) = other
            .tensors
            .iter()
            .find(|(k, _)| !self.tensors.contains_key(*k))
        {
            return Err(MlErr::missing_key(key, Some(o.shape()), None));
        }

        Ok(())
    }

    /// Key-wise `self - other` into a new set.
    ///
    /// # Returns
    /// A `ShapeMismatch` if the sets aren't compatible.
    pub fn subtract(&self, other: &ParamSet) -> Result<ParamSet> {
        self.check_compatible(other)?;

        let tensors = self
            .tensors
            .iter()
            .zip(other.tensors.values())
            .map(|((k, a), b)| (k.clone(), a - b))
            .collect();

        Ok(Self { tensors })
    }

    /// Key-wise `self += delta`.
    ///
    /// # Returns
    /// A `ShapeMismatch` if the sets aren't compatible, `self` is left untouched in that case.
    pub fn add_in_place(&mut self, delta: &ParamSet) -> Result<()> {
        self.scaled_add(1.0, delta)
    }

    /// Key-wise `self += alpha * other`.
    ///
    /// # Returns
    /// A `ShapeMismatch` if the sets aren't compatible, `self` is left untouched in that case.
    pub fn scaled_add(&mut self, alpha: f32, other: &ParamSet) -> Result<()> {
        self.check_compatible(other)?;

        for (a, b) in self.tensors.values_mut().zip(other.tensors.values()) {
            a.scaled_add(alpha, b);
        }

        Ok(())
    }

    /// Multiplies every value by `factor`.
    pub fn scale(&mut self, factor: f32) {
        self.tensors
            .values_mut()
            .for_each(|t| t.mapv_inplace(|v| v * factor));
    }

    /// Views the tensor under `key` as a matrix.
    ///
    /// # Returns
    /// A `ShapeMismatch` if the key is missing or the tensor isn't 2-dimensional.
    pub fn matrix(&self, key: &str) -> Result<ArrayView2<'_, f32>> {
        let tensor = self
            .tensors
            .get(key)
            .ok_or_else(|| MlErr::missing_key(key, None, Some(&[0, 0][..])))?;

        tensor
            .view()
            .into_dimensionality::<Ix2>()
            .map_err(|_| MlErr::shape(key, tensor.shape(), &[0, 0]))
    }

    /// Views the tensor under `key` as a vector.
    ///
    /// # Returns
    /// A `ShapeMismatch` if the key is missing or the tensor isn't 1-dimensional.
    pub fn vector(&self, key: &str) -> Result<ArrayView1<'_, f32>> {
        let tensor = self
            .tensors
            .get(key)
            .ok_or_else(|| MlErr::missing_key(key, None, Some(&[0][..])))?;

        tensor
            .view()
            .into_dimensionality::<Ix1>()
            .map_err(|_| MlErr::shape(key, tensor.shape(), &[0]))
    }
}

impl FromIterator<(String, ArrayD<f32>)> for ParamSet {
    fn from_iter<I: IntoIterator<Item = (String, ArrayD<f32>)>>(iter: I) -> Self {
        Self {
            tensors: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a ParamSet {
    type Item = (&'a String, &'a ArrayD<f32>);
    type IntoIter = btree_map::Iter<'a, String, ArrayD<f32>>;

    fn into_iter(self) -> Self::IntoIter {
        self.tensors.iter()
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{arr1, arr2};

    use super::*;

    fn set(w: f32, b: f32) -> ParamSet {
        let mut p = ParamSet::new();
        p.insert("0.weight", arr2(&[[w, w], [w, w]]));
        p.insert("0.bias", arr1(&[b, b]));
        p
    }

    #[test]
    fn test_subtract_is_key_wise() {
        let delta = set(3.0, 1.0).subtract(&set(1.0, 0.5)).unwrap();

        assert_eq!(delta.matrix("0.weight").unwrap(), arr2(&[[2.0, 2.0], [2.0, 2.0]]));
        assert_eq!(delta.vector("0.bias").unwrap(), arr1(&[0.5, 0.5]));
    }

    #[test]
    fn test_add_in_place_mutates_target_only() {
        let mut target = set(1.0, 1.0);
        let delta = set(0.5, -1.0);

        target.add_in_place(&delta).unwrap();

        assert_eq!(target, set(1.5, 0.0));
        assert_eq!(delta, set(0.5, -1.0));
    }

    #[test]
    fn test_clone_shares_no_storage() {
        let original = set(1.0, 1.0);
        let mut copy = original.clone();
        copy.scale(10.0);

        assert_eq!(original, set(1.0, 1.0));
        assert_eq!(copy, set(10.0, 10.0));
    }

    #[test]
    fn test_shape_mismatch_on_different_shapes() {
        let mut other = set(1.0, 1.0);
        other.insert("0.bias", arr1(&[1.0, 1.0, 1.0]));

        let err = set(1.0, 1.0).subtract(&other).unwrap_err();
        assert_eq!(err, MlErr::shape("0.bias", &[3], &[2]));
    }

    #[test]
    fn test_shape_mismatch_on_different_keys() {
        let mut target = set(1.0, 1.0);
        let mut other = set(1.0, 1.0);
        other.insert("1.bias", arr1(&[1.0]));

        let err = target.add_in_place(&other).unwrap_err();
        assert!(matches!(err, MlErr::ShapeMismatch { ref key, got: Some(_), expected: None } if key == "1.bias"));
        assert_eq!(target, set(1.0, 1.0));
    }

    #[test]
    fn test_zeros_like_and_num_values() {
        let zeros = set(4.0, 2.0).zeros_like();

        assert_eq!(zeros, set(0.0, 0.0));
        assert_eq!(zeros.num_values(), 6);
        assert_eq!(zeros.len(), 2);
    }

    #[test]
    fn test_typed_views_reject_wrong_rank() {
        let p = set(1.0, 1.0);

        assert!(p.matrix("0.bias").is_err());
        assert!(p.vector("0.weight").is_err());
        assert!(p.vector("missing").is_err());
    }
}
