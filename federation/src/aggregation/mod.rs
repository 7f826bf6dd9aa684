mod aggregator;
mod mean;
mod weighted;

pub use aggregator::{Aggregator, ClientUpdate};
pub use mean::{MeanAggregator, aggregate};
pub use weighted::WeightedAggregator;
