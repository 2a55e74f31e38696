//! Speaker similarity via neural speaker embeddings.
//!
//! # Architecture
//!
//! Scoring a pair of recordings runs in three stages:
//!
//! 1. [`SpeakerModel::extract_features`]: audio file -> named input tensors
//!    ([`FeatureSet`]), using the front end of the model's [`Family`]
//! 2. [`SpeakerModel::infer`]: tensors -> embedding vector via ONNX Runtime
//! 3. [`SpeakerModel::compute_similarity`]: two embeddings -> cosine score
//!
//! # Families
//!
//! | Family | Front end | Models |
//! |--------|-----------|--------|
//! | `wavlm` | normalized raw waveform (+ attention mask) | `wavlm-base-plus-sv` |
//! | `wespeaker` | 80-bin Kaldi fbank with CMN | ResNet, CAM++, ECAPA-TDNN |
//! | `resemblyzer` | 40-bin mel spectrogram | `resemblyzer` |
//!
//! # Loading models
//!
//! ```no_run
//! use std::path::Path;
//! use spksim_voiceprint::{ModelSelection, Registry, SpeakerModel};
//!
//! let registry = Registry::new("/tmp/spksim-cache").unwrap();
//! let model = registry
//!     .load(&ModelSelection::Named("wespeaker-resnet34".into()))
//!     .unwrap();
//!
//! let a = model.embed(Path::new("a.wav")).unwrap();
//! let b = model.embed(Path::new("b.wav")).unwrap();
//! println!("{:.4}", model.compute_similarity(&a, &b).unwrap());
//! ```

mod error;
mod frontend;
mod hub;
mod model;
pub mod preprocessor;
mod registry;
mod similarity;

pub use error::VoiceprintError;
pub use frontend::FrontEnd;
pub use hub::{HfHub, ModelHub};
pub use model::{EmbeddingModel, FeatureSet, SpeakerModel};
pub use preprocessor::PreprocessorConfig;
pub use registry::{
    builtin_models, check_selection, ExtractorSource, Family, ModelDescriptor, ModelSelection, Registry, ResolvedModel,
    WeightsSource, SPKSIM_MODELS_REPO,
};
pub use similarity::{cosine_similarity, l2_normalize};
pub use spksim_onnx::{SessionOptions, Tensor};
