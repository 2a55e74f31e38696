use thiserror::Error;

/// Errors returned by audio loading and feature extraction.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("audio: {0}")]
    Io(#[from] std::io::Error),

    #[error("audio: decode: {0}")]
    Decode(String),

    #[error("audio: no decodable audio track")]
    NoTrack,

    #[error("audio: unknown sample rate")]
    UnknownSampleRate,

    #[error("audio: resample: {0}")]
    Resample(String),

    #[error("audio: too short: need at least {need} samples, got {got}")]
    TooShort { need: usize, got: usize },
}

impl From<symphonia::core::errors::Error> for AudioError {
    fn from(e: symphonia::core::errors::Error) -> Self {
        AudioError::Decode(e.to_string())
    }
}

impl From<rubato::ResamplerConstructionError> for AudioError {
    fn from(e: rubato::ResamplerConstructionError) -> Self {
        AudioError::Resample(e.to_string())
    }
}

impl From<rubato::ResampleError> for AudioError {
    fn from(e: rubato::ResampleError) -> Self {
        AudioError::Resample(e.to_string())
    }
}
