use aam_core::{FrameError, PcaError, TransformError};

/// Coarse classification of [`AamError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad level, bad weights, inconsistent model data or mismatched geometry.
    InvalidArgument,
    /// The variant does not implement the requested operation.
    UnsupportedOperation,
    /// Reading, writing or decoding a persisted model.
    Persistence,
}

/// Errors returned by AAM construction, synthesis and persistence.
#[derive(thiserror::Error, Debug)]
pub enum AamError {
    #[error("level {level} out of range for a model with {n_levels} levels")]
    LevelOutOfRange { level: isize, n_levels: usize },
    #[error("{given} weights given, only {available} eigenvalues retained")]
    TooManyWeights { given: usize, available: usize },
    #[error("geometry mismatch: {0}")]
    GeometryMismatch(String),
    #[error("inconsistent model: {0}")]
    InconsistentModel(String),
    #[error("{operation} is not supported by the {variant} variant")]
    UnsupportedOperation {
        operation: &'static str,
        variant: &'static str,
    },
    #[error("no callable named `{name}` in modules {modules:?}")]
    UnknownCallable { name: String, modules: Vec<String> },
    #[error(transparent)]
    Pca(#[from] PcaError),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Transform(#[from] TransformError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl AamError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AamError::UnsupportedOperation { .. } => ErrorKind::UnsupportedOperation,
            AamError::UnknownCallable { .. } | AamError::Io(_) | AamError::Json(_) => {
                ErrorKind::Persistence
            }
            AamError::LevelOutOfRange { .. }
            | AamError::TooManyWeights { .. }
            | AamError::GeometryMismatch(_)
            | AamError::InconsistentModel(_)
            | AamError::Pca(_)
            | AamError::Frame(_)
            | AamError::Transform(_) => ErrorKind::InvalidArgument,
        }
    }
}

pub type Result<T> = std::result::Result<T, AamError>;
