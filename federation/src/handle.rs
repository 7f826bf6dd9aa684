use std::sync::Arc;

use machine_learning::ParamSet;
use parking_lot::RwLock;

/// A shared handle to a model's parameters.
///
/// The simulation reads its starting state from the handle and loads the final global state back
/// into it once every round has completed. Clones share the same parameters.
#[derive(Debug, Clone, Default)]
pub struct ModelHandle {
    params: Arc<RwLock<ParamSet>>,
}

impl ModelHandle {
    pub fn new(params: ParamSet) -> Self {
        Self {
            params: Arc::new(RwLock::new(params)),
        }
    }

    /// Returns a deep copy of the current parameters.
    pub fn snapshot(&self) -> ParamSet {
        self.params.read().clone()
    }

    /// Replaces the parameters.
    pub fn load(&self, params: ParamSet) {
        *self.params.write() = params;
    }
}

#[cfg(test)]
mod tests {
    use ndarray::arr1;

    use super::*;

    #[test]
    fn test_clones_share_parameters() {
        let handle = ModelHandle::default();
        let other = handle.clone();

        let mut params = ParamSet::new();
        params.insert("w", arr1(&[1.0]));
        other.load(params.clone());

        assert_eq!(handle.snapshot(), params);
    }
}
