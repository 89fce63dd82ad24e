use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Person not found: {0}")]
    PersonNotFound(String),

    #[error("Face not found: {0}")]
    FaceNotFound(String),

    #[error("Image not found: {0}")]
    ImageNotFound(String),

    #[error("Invalid similarity threshold: {0} (must be within 0.0..=1.0)")]
    InvalidThreshold(f32),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid embedding dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    #[error("Zero-norm embedding on face: {0}")]
    ZeroNormEmbedding(String),

    #[error("A face scan is already running")]
    ScanInProgress,

    #[error("Detection error: {0}")]
    Detection(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}
