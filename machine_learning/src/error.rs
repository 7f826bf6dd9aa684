use std::{
    error::Error,
    fmt::{self, Display},
};

/// The result type used in the entire machine learning module.
pub type Result<T> = std::result::Result<T, MlErr>;

/// The machine learning module's error type.
#[derive(Debug, Clone, PartialEq)]
pub enum MlErr {
    /// Two parameter sets (or a parameter set and a model) disagree on a key or on its shape.
    ///
    /// A `None` shape means the key is absent on that side.
    ShapeMismatch {
        key: String,
        got: Option<Vec<usize>>,
        expected: Option<Vec<usize>>,
    },
    SizeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    InvalidDataset(&'static str),
    InvalidPartition {
        parts: usize,
        len: usize,
    },
    InvalidInitRange {
        key: String,
    },
}

impl MlErr {
    /// Builds a `ShapeMismatch` for two present tensors.
    pub fn shape(key: &str, got: &[usize], expected: &[usize]) -> Self {
        MlErr::ShapeMismatch {
            key: key.to_string(),
            got: Some(got.to_vec()),
            expected: Some(expected.to_vec()),
        }
    }

    /// Builds a `ShapeMismatch` for a key that only one side has.
    pub fn missing_key(key: &str, got: Option<&[usize]>, expected: Option<&[usize]>) -> Self {
        MlErr::ShapeMismatch {
            key: key.to_string(),
            got: got.map(<[usize]>::to_vec),
            expected: expected.map(<[usize]>::to_vec),
        }
    }
}

fn fmt_shape(shape: &Option<Vec<usize>>) -> String {
    match shape {
        Some(dims) => format!("{dims:?}"),
        None => "<missing>".to_string(),
    }
}

impl Display for MlErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MlErr::ShapeMismatch { key, got, expected } => format!(
                "Shape mismatch for parameter '{key}', got {} and expected {}",
                fmt_shape(got),
                fmt_shape(expected)
            ),
            MlErr::SizeMismatch {
                what,
                got,
                expected,
            } => {
                format!("There's a size mismatch in {what}, got {got} and expected {expected}")
            }
            MlErr::InvalidDataset(reason) => format!("Invalid dataset: {reason}"),
            MlErr::InvalidPartition { parts, len } => {
                format!("Cannot split a dataset of {len} rows into {parts} partitions")
            }
            MlErr::InvalidInitRange { key } => {
                format!("Failed to build an initialization range for parameter '{key}'")
            }
        };

        write!(f, "{s}")
    }
}

impl Error for MlErr {}
