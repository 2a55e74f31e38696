use std::path::PathBuf;

use spksim_audio::AudioError;
use spksim_onnx::OnnxError;
use thiserror::Error;

/// Errors returned by voiceprint operations.
///
/// `Configuration`, `UnknownModel`, `NotFound` and `Hub` are raised while
/// resolving a model and are fatal to a run. `Decode`, `Inference`, `AudioTooShort`,
/// `DimensionMismatch` and `Embedding` are raised per audio file.
#[derive(Debug, Error)]
pub enum VoiceprintError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("unknown model name {name:?}; known models: {}", .known.join(", "))]
    UnknownModel { name: String, known: Vec<String> },

    #[error("not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("hub: fetch {repo_id}/{filename}: {message}")]
    Hub {
        repo_id: String,
        filename: String,
        message: String,
    },

    #[error("decode error: {0}")]
    Decode(#[from] AudioError),

    #[error("inference error: {0}")]
    Inference(#[from] OnnxError),

    #[error("audio too short: need at least {min_samples} samples, got {got_samples}")]
    AudioTooShort { min_samples: usize, got_samples: usize },

    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("embedding error: {0}")]
    Embedding(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl VoiceprintError {
    /// True for errors raised while resolving or loading a model.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            VoiceprintError::Configuration(_) | VoiceprintError::UnknownModel { .. }
        )
    }
}
