use log::debug;
use machine_learning::ParamSet;

use super::{Aggregator, ClientUpdate};
use crate::{FedErr, Result};

/// Computes the element-wise mean of `deltas`, every delta weighing the same.
///
/// # Returns
/// The mean delta, an `EmptyAggregation` error if `deltas` is empty or a `ShapeMismatch` if any
/// delta disagrees with the first one on its keys or shapes.
pub fn aggregate<'a, I>(deltas: I) -> Result<ParamSet>
where
    I: IntoIterator<Item = &'a ParamSet>,
{
    let mut deltas = deltas.into_iter();
    let mut total = deltas.next().ok_or(FedErr::EmptyAggregation)?.clone();
    let mut count = 1;

    for delta in deltas {
        total.add_in_place(delta)?;
        count += 1;
    }

    total.scale(1. / count as f32);
    debug!(deltas = count; "aggregated client deltas");
    Ok(total)
}

/// Averages the client deltas with equal weights, regardless of how much data each client saw.
#[derive(Debug, Clone, Copy, Default)]
pub struct MeanAggregator;

impl MeanAggregator {
    pub fn new() -> Self {
        Self
    }
}

impl Aggregator for MeanAggregator {
    fn aggregate(&self, updates: &[ClientUpdate]) -> Result<ParamSet> {
        aggregate(updates.iter().map(|u| &u.delta))
    }
}

#[cfg(test)]
mod tests {
    use machine_learning::MlErr;
    use ndarray::arr1;

    use super::*;

    fn single(w: &[f32]) -> ParamSet {
        let mut p = ParamSet::new();
        p.insert("w", arr1(w));
        p
    }

    #[test]
    fn test_mean_of_two() {
        let mean = aggregate([&single(&[2.0]), &single(&[4.0])]).unwrap();
        assert_eq!(mean, single(&[3.0]));
    }

    #[test]
    fn test_mean_is_per_element() {
        let deltas = [single(&[1.0, -3.0]), single(&[2.0, 0.0]), single(&[3.0, 0.0])];
        let mean = aggregate(&deltas).unwrap();

        assert_eq!(mean, single(&[2.0, -1.0]));
    }

    #[test]
    fn test_single_delta_is_returned_as_is() {
        let mean = aggregate([&single(&[0.5, 0.25])]).unwrap();
        assert_eq!(mean, single(&[0.5, 0.25]));
    }

    #[test]
    fn test_empty_is_rejected() {
        let err = aggregate(&[]).unwrap_err();
        assert!(matches!(err, FedErr::EmptyAggregation));
    }

    #[test]
    fn test_incompatible_deltas_are_rejected() {
        let err = aggregate([&single(&[1.0]), &single(&[1.0, 2.0])]).unwrap_err();
        assert!(matches!(err, FedErr::ShapeMismatch(MlErr::ShapeMismatch { .. })));
    }

    #[test]
    fn test_aggregator_ignores_sample_counts() {
        let updates = [
            ClientUpdate {
                client: 0,
                delta: single(&[0.0]),
                loss: 0.0,
                samples: 1000,
                batches: 10,
            },
            ClientUpdate {
                client: 1,
                delta: single(&[1.0]),
                loss: 0.0,
                samples: 1,
                batches: 1,
            },
        ];

        assert_eq!(MeanAggregator.aggregate(&updates).unwrap(), single(&[0.5]));
    }
}
