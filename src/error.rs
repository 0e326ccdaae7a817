use thiserror::Error;

/// Error taxonomy surfaced by the tensor store, layer protocol, and
/// network composition engine. Every variant is raised immediately at
/// the call site that detects it; none are retried internally.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NnError {
    #[error("shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("missing key '{0}' in bag '{1}'")]
    MissingKey(String, String),

    #[error("duplicate key '{0}' in bag '{1}'")]
    DuplicateKey(String, String),

    #[error("index {index} out of range (size {size})")]
    OutOfRange { index: usize, size: usize },

    #[error("{0}")]
    IllegalOperation(&'static str),

    #[error("unrecognized layer type tag '{0}'")]
    UnknownType(String),

    #[error("I/O failure: {0}")]
    IoFailure(String),

    #[error("non-finite value encountered")]
    Numerical,
}
