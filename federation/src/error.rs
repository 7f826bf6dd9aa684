use std::{
    error::Error,
    fmt::{self, Display},
    io,
};

use machine_learning::MlErr;

/// The result type used across the federation crate.
pub type Result<T> = std::result::Result<T, FedErr>;

/// All errors that can occur while running a simulation.
#[derive(Debug)]
pub enum FedErr {
    /// Two parameter sets disagree on keys or shapes, or the model rejected its parameters.
    ShapeMismatch(MlErr),
    /// An aggregation was requested over no client updates.
    EmptyAggregation,
    /// Invalid configuration, caught before the first round.
    InvalidConfig(String),
    /// The simulation record couldn't be persisted, the run itself did complete.
    Persistence(RecordStoreErr),
}

impl Display for FedErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShapeMismatch(e) => write!(f, "{e}"),
            Self::EmptyAggregation => write!(f, "cannot aggregate an empty set of client updates"),
            Self::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            Self::Persistence(e) => write!(f, "persistence error: {e}"),
        }
    }
}

impl Error for FedErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::ShapeMismatch(e) => Some(e),
            Self::Persistence(e) => Some(e),
            _ => None,
        }
    }
}

impl From<MlErr> for FedErr {
    fn from(e: MlErr) -> Self {
        Self::ShapeMismatch(e)
    }
}

impl From<RecordStoreErr> for FedErr {
    fn from(e: RecordStoreErr) -> Self {
        Self::Persistence(e)
    }
}

/// Errors raised by a `RecordStore`.
#[derive(Debug)]
pub enum RecordStoreErr {
    Io(io::Error),
    Serialization(serde_json::Error),
}

impl Display for RecordStoreErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io error: {e}"),
            Self::Serialization(e) => write!(f, "serialization error: {e}"),
        }
    }
}

impl Error for RecordStoreErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Serialization(e) => Some(e),
        }
    }
}

impl From<io::Error> for RecordStoreErr {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for RecordStoreErr {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e)
    }
}
