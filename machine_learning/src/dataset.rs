use ndarray::{ArrayView2, Axis, s};
use rand::{Rng, seq::SliceRandom};

use crate::{MlErr, Result};

/// An in-memory supervised dataset.
///
/// Rows are stored contiguously in row-major order, each one being `x_size` features followed
/// by `y_size` targets.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    data: Vec<f32>,
    x_size: usize,
    y_size: usize,
}

impl Dataset {
    /// Creates a new `Dataset`.
    ///
    /// # Arguments
    /// * `data` - The raw rows, `x | y` one after the other.
    /// * `x_size` - The amount of features per row.
    /// * `y_size` - The amount of targets per row.
    ///
    /// # Returns
    /// An `InvalidDataset` if a size is zero or `data` doesn't hold a whole amount of rows.
    pub fn new(data: Vec<f32>, x_size: usize, y_size: usize) -> Result<Self> {
        if x_size == 0 || y_size == 0 {
            return Err(MlErr::InvalidDataset("feature and target sizes must be positive"));
        }

        if data.len() % (x_size + y_size) != 0 {
            return Err(MlErr::InvalidDataset("data doesn't hold a whole amount of rows"));
        }

        Ok(Self {
            data,
            x_size,
            y_size,
        })
    }

    /// Returns the amount of rows.
    pub fn len(&self) -> usize {
        self.data.len() / self.row_size()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn x_size(&self) -> usize {
        self.x_size
    }

    pub fn y_size(&self) -> usize {
        self.y_size
    }

    fn row_size(&self) -> usize {
        self.x_size + self.y_size
    }

    fn row(&self, i: usize) -> &[f32] {
        let size = self.row_size();
        &self.data[i * size..(i + 1) * size]
    }

    /// Views the whole dataset as a `(len, x_size + y_size)` matrix.
    fn view(&self) -> ArrayView2<'_, f32> {
        ArrayView2::from_shape((self.len(), self.row_size()), &self.data)
            .unwrap_or_else(|_| unreachable!("the constructor checks the data holds whole rows"))
    }

    /// Iterates the dataset in order, in batches of at most `batch_size` rows.
    ///
    /// A `batch_size` of zero is treated as one.
    pub fn batches(&self, batch_size: usize) -> BatchIter<'_> {
        BatchIter {
            view: self.view(),
            x_size: self.x_size,
            batch_size: batch_size.max(1),
            offset: 0,
        }
    }

    /// Shuffles the rows in place.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let mut order: Vec<_> = (0..self.len()).collect();
        order.shuffle(rng);
        self.data = self.gather(&order);
    }

    /// Splits the dataset into `parts` random, disjoint subsets (IID partitioning).
    ///
    /// Every part gets `len / parts` rows and the first `len % parts` parts get one extra row.
    ///
    /// # Arguments
    /// * `parts` - The amount of subsets.
    /// * `rng` - The source of randomness for the split.
    ///
    /// # Returns
    /// The subsets or an `InvalidPartition` if `parts` is zero.
    pub fn partition<R: Rng + ?Sized>(&self, parts: usize, rng: &mut R) -> Result<Vec<Dataset>> {
        let len = self.len();
        if parts == 0 {
            return Err(MlErr::InvalidPartition { parts, len });
        }

        let mut order: Vec<_> = (0..len).collect();
        order.shuffle(rng);

        let base = len / parts;
        let remainder = len % parts;
        let mut start = 0;

        let subsets = (0..parts)
            .map(|i| {
                let size = base + usize::from(i < remainder);
                let rows = &order[start..start + size];
                start += size;

                Dataset {
                    data: self.gather(rows),
                    x_size: self.x_size,
                    y_size: self.y_size,
                }
            })
            .collect();

        Ok(subsets)
    }

    fn gather(&self, rows: &[usize]) -> Vec<f32> {
        rows.iter().flat_map(|&i| self.row(i)).copied().collect()
    }
}

/// Iterates over a dataset's batches as `(x, y)` views.
#[derive(Debug, Clone)]
pub struct BatchIter<'a> {
    view: ArrayView2<'a, f32>,
    x_size: usize,
    batch_size: usize,
    offset: usize,
}

impl<'a> Iterator for BatchIter<'a> {
    type Item = (ArrayView2<'a, f32>, ArrayView2<'a, f32>);

    fn next(&mut self) -> Option<Self::Item> {
        let rows = self.view.nrows();
        if self.offset >= rows {
            return None;
        }

        let end = (self.offset + self.batch_size).min(rows);
        let batch = self.view.clone().slice_move(s![self.offset..end, ..]);
        self.offset = end;

        Some(batch.split_at(Axis(1), self.x_size))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.view.nrows().saturating_sub(self.offset).div_ceil(self.batch_size);
        (left, Some(left))
    }
}

impl ExactSizeIterator for BatchIter<'_> {}
