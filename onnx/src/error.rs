use std::path::PathBuf;

use thiserror::Error;

/// Errors returned by ONNX Runtime operations.
#[derive(Debug, Error)]
pub enum OnnxError {
    #[error("onnx: {0}")]
    Runtime(String),

    #[error("onnx: model file not found: {}", .0.display())]
    ModelNotFound(PathBuf),

    #[error("onnx: output {0:?} not produced by graph")]
    MissingOutput(String),

    #[error("onnx: bad tensor: {0}")]
    Shape(String),

    #[error("onnx: empty data")]
    EmptyData,
}

/// Wraps any ort error (whose type varies by builder stage) as a runtime error.
pub(crate) fn runtime_err<E: std::fmt::Display>(e: E) -> OnnxError {
    OnnxError::Runtime(e.to_string())
}
