use ndarray::{CowArray, Ix2};
use parking_lot::Mutex;
use rand::{SeedableRng, rngs::StdRng};

use crate::dataset::Dataset;

/// A batch matrix, borrowed from the provider's storage or owned when the provider had to build it.
pub type Batch<'a> = CowArray<'a, f32, Ix2>;

/// A boxed iterator over `(x, y)` batches.
pub type Batches<'a> = Box<dyn Iterator<Item = (Batch<'a>, Batch<'a>)> + 'a>;

/// A re-iterable source of training batches: every call to `batches` starts a new pass.
pub trait SampleProvider {
    fn batches(&self) -> Batches<'_>;
}

/// Serves a dataset in fixed size batches.
///
/// By default rows come in dataset order. A shuffling loader draws a new row order for every pass.
#[derive(Debug)]
pub struct DataLoader {
    dataset: Dataset,
    batch_size: usize,
    shuffle: Option<Mutex<StdRng>>,
}

impl DataLoader {
    /// Creates a new `DataLoader`.
    ///
    /// # Arguments
    /// * `dataset` - The dataset to serve.
    /// * `batch_size` - The maximum amount of rows per batch, the last batch may be smaller.
    pub fn new(dataset: Dataset, batch_size: usize) -> Self {
        Self {
            dataset,
            batch_size,
            shuffle: None,
        }
    }

    /// Shuffles the rows at the start of every pass, the sequence of orders is fixed by `seed`.
    pub fn shuffled(mut self, seed: u64) -> Self {
        self.shuffle = Some(Mutex::new(StdRng::seed_from_u64(seed)));
        self
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn is_shuffled(&self) -> bool {
        self.shuffle.is_some()
    }
}

impl SampleProvider for DataLoader {
    fn batches(&self) -> Batches<'_> {
        let Some(rng) = &self.shuffle else {
            return Box::new(
                self.dataset
                    .batches(self.batch_size)
                    .map(|(x, y)| (Batch::from(x), Batch::from(y))),
            );
        };

        let mut pass = self.dataset.clone();
        pass.shuffle(&mut *rng.lock());

        let batches: Vec<_> = pass
            .batches(self.batch_size)
            .map(|(x, y)| (Batch::from(x.to_owned()), Batch::from(y.to_owned())))
            .collect();

        Box::new(batches.into_iter())
    }
}

impl<P: SampleProvider + ?Sized> SampleProvider for &P {
    fn batches(&self) -> Batches<'_> {
        (**self).batches()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(loader: &DataLoader) -> Vec<f32> {
        loader.batches().flat_map(|(x, _)| x.iter().copied().collect::<Vec<_>>()).collect()
    }

    fn dataset() -> Dataset {
        // x is the row index and y is twice that, so pairs survive a shuffle intact.
        Dataset::new((0..20).flat_map(|i| [i as f32, 2. * i as f32]).collect(), 1, 1).unwrap()
    }

    #[test]
    fn test_every_call_is_a_new_pass() {
        let dataset = Dataset::new((0..10).map(|i| i as f32).collect(), 1, 1).unwrap();
        let loader = DataLoader::new(dataset, 2);

        assert_eq!(loader.batches().count(), 3);
        assert_eq!(loader.batches().count(), 3);
    }

    #[test]
    fn test_unshuffled_keeps_dataset_order() {
        let loader = DataLoader::new(dataset(), 3);

        assert!(!loader.is_shuffled());
        assert_eq!(rows(&loader), (0..20).map(|i| i as f32).collect::<Vec<_>>());
    }

    #[test]
    fn test_shuffled_passes_are_permutations_in_new_orders() {
        let loader = DataLoader::new(dataset(), 3).shuffled(7);

        let first = rows(&loader);
        let second = rows(&loader);
        assert_ne!(first, second);

        for pass in [first, second] {
            let mut sorted = pass.clone();
            sorted.sort_by(f32::total_cmp);
            assert_eq!(sorted, (0..20).map(|i| i as f32).collect::<Vec<_>>());
        }

        for (x, y) in loader.batches() {
            assert_eq!(x.mapv(|v| 2. * v), y);
            assert!(x.nrows() <= 3);
        }
    }

    #[test]
    fn test_same_seed_same_orders() {
        let a = DataLoader::new(dataset(), 4).shuffled(1);
        let b = DataLoader::new(dataset(), 4).shuffled(1);

        assert_eq!(rows(&a), rows(&b));
        assert_eq!(rows(&a), rows(&b));
    }
}
