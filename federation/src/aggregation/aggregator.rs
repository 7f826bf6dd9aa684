use machine_learning::ParamSet;

use crate::Result;

/// What a client sends back at the end of its local training.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientUpdate {
    pub client: usize,
    /// `trained - global_at_round_start`.
    pub delta: ParamSet,
    pub loss: f32,
    pub samples: usize,
    pub batches: usize,
}

/// Combines the updates of a round into the single delta applied to the global model.
pub trait Aggregator: Send + Sync {
    /// Aggregates the updates of a round.
    ///
    /// # Arguments
    /// * `updates` - The round's client updates, in client order.
    ///
    /// # Returns
    /// The aggregated delta, an `EmptyAggregation` error if `updates` is empty or a
    /// `ShapeMismatch` if the deltas aren't compatible.
    fn aggregate(&self, updates: &[ClientUpdate]) -> Result<ParamSet>;
}
