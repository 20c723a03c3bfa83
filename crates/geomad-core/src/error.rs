use thiserror::Error;

#[derive(Error, Debug)]
pub enum GeomadError {
    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("Invalid array rank: expected {expected}, got {actual}")]
    InvalidRank { expected: usize, actual: usize },

    #[error("Input has no spectral bands")]
    EmptyBands,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, GeomadError>;
