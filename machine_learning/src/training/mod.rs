mod local_trainer;

pub use local_trainer::{EpochOutcome, LocalTrainer};
