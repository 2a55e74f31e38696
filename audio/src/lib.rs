//! Audio front end for speaker embedding models.
//!
//! This crate turns audio files into the numeric inputs that speaker
//! embedding networks expect:
//!
//! - [`decode`]: reads any container/codec symphonia understands into
//!   per-channel f32 samples in `[-1, 1]`
//! - [`resampler`]: whole-buffer sample rate conversion via rubato
//! - [`fbank`]: Kaldi-compatible log mel filterbank (WeSpeaker front end)
//! - [`melspec`]: librosa-compatible power mel spectrogram (Resemblyzer
//!   front end)
//!
//! # Example
//!
//! ```no_run
//! use spksim_audio::{fbank, load};
//!
//! let samples = load("speech.wav").unwrap().to_mono_at(16000).unwrap();
//! let extractor = fbank::Extractor::new(fbank::Config::default());
//! let mut feats = extractor.extract(&samples);
//! fbank::cmn(&mut feats);
//! ```

pub mod decode;
mod error;
pub mod fbank;
pub mod melspec;
pub mod resampler;

pub use decode::{load, Waveform};
pub use error::AudioError;
