use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TabError {
    /// A tensor did not have the shape a pipeline stage requires.
    #[error("shape mismatch: expected {expected}, got {actual:?}")]
    Shape { expected: String, actual: Vec<usize> },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read WAV data: {0}")]
    Wav(#[from] hound::Error),

    #[error("resampling failed: {0}")]
    Resample(String),

    #[error("invalid annotation file {path}: {reason}")]
    Annotation { path: PathBuf, reason: String },

    #[error("failed to parse MIDI: {0}")]
    Midi(#[from] midly::Error),

    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("model error: {0}")]
    Model(#[from] ort::Error),

    #[error("failed to persist corpus: {0}")]
    Persist(#[from] bincode::Error),

    #[error("array error: {0}")]
    Array(#[from] ndarray::ShapeError),
}

impl TabError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TabError::Io { path: path.into(), source }
    }

    pub fn annotation(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        TabError::Annotation { path: path.into(), reason: reason.into() }
    }
}

pub type Result<T> = std::result::Result<T, TabError>;
