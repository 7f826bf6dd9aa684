pub mod aggregation;
pub mod config;
pub mod error;
pub mod handle;
pub mod record;
pub mod simulation;

pub use config::{AggregationKind, ClientSelection, RewardConfig, SimulationConfig};
pub use error::{FedErr, RecordStoreErr, Result};
pub use handle::ModelHandle;
pub use record::{
    InMemoryRecordStore, JsonLinesRecordStore, RecordStore, SimulationRecord, SimulationStatus,
    StoredRecord,
};
pub use simulation::{
    RoundResult, SampleSource, SharedProvider, Simulation, SimulationBuilder, SimulationEvent,
};
