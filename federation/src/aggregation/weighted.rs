use log::debug;
use machine_learning::ParamSet;

use super::{Aggregator, ClientUpdate, aggregate};
use crate::{FedErr, Result};

/// Averages the client deltas weighting each one by the amount of samples the client trained on.
///
/// If no client saw any sample it falls back to the plain mean.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeightedAggregator;

impl WeightedAggregator {
    pub fn new() -> Self {
        Self
    }
}

impl Aggregator for WeightedAggregator {
    fn aggregate(&self, updates: &[ClientUpdate]) -> Result<ParamSet> {
        let (first, rest) = updates.split_first().ok_or(FedErr::EmptyAggregation)?;

        let total_samples: usize = updates.iter().map(|u| u.samples).sum();
        if total_samples == 0 {
            return aggregate(updates.iter().map(|u| &u.delta));
        }

        let weight = |u: &ClientUpdate| u.samples as f32 / total_samples as f32;

        let mut total = first.delta.clone();
        total.scale(weight(first));

        for update in rest {
            total.scaled_add(weight(update), &update.delta)?;
        }

        debug!(deltas = updates.len(), samples = total_samples; "aggregated weighted client deltas");
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::arr1;

    use super::*;

    fn update(client: usize, w: f32, samples: usize) -> ClientUpdate {
        let mut delta = ParamSet::new();
        delta.insert("w", arr1(&[w]));

        ClientUpdate {
            client,
            delta,
            loss: 0.0,
            samples,
            batches: samples,
        }
    }

    #[test]
    fn test_weights_follow_sample_counts() {
        let updates = [update(0, 4.0, 3), update(1, 0.0, 1)];
        let mean = WeightedAggregator.aggregate(&updates).unwrap();

        assert_eq!(mean.vector("w").unwrap()[0], 3.0);
    }

    #[test]
    fn test_all_empty_clients_fall_back_to_mean() {
        let updates = [update(0, 4.0, 0), update(1, 0.0, 0)];
        let mean = WeightedAggregator.aggregate(&updates).unwrap();

        assert_eq!(mean.vector("w").unwrap()[0], 2.0);
    }

    #[test]
    fn test_empty_is_rejected() {
        assert!(matches!(
            WeightedAggregator.aggregate(&[]),
            Err(FedErr::EmptyAggregation)
        ));
    }
}
