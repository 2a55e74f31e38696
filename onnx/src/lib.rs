//! Safe wrapper over ONNX Runtime for speaker embedding graphs.
//!
//! Embedding graphs take one or more named tensors (f32 features, sometimes
//! an i64 attention mask) and produce an f32 embedding. This crate exposes
//! exactly that: an [`Env`] per process, a [`Session`] per loaded graph with
//! its declared input and output names, and an owned host [`Tensor`].
//!
//! # Usage
//!
//! ```no_run
//! use spksim_onnx::{Env, SessionOptions, Tensor};
//!
//! let env = Env::new("spksim").unwrap();
//! let session = env.new_session("voxceleb_resnet34.onnx".as_ref(), &SessionOptions::default()).unwrap();
//!
//! let input = Tensor::new(&[1, 100, 80], &vec![0.0; 8000]).unwrap();
//! let outputs = session.run(&["feats"], &[&input], &["embs"]).unwrap();
//! let embedding = outputs[0].float_data().unwrap();
//! ```
//!
//! # Runtime
//!
//! The ONNX Runtime shared library is provided by the `ort` crate's
//! prebuilt binaries; inference runs on the CPU execution provider.

mod error;
mod onnx;

pub use error::OnnxError;
pub use onnx::{Env, Session, SessionOptions, Tensor, TensorData};
