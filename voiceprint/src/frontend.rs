//! Per-family audio front ends.
//!
//! Each model family expects differently shaped input:
//!
//! | Family | Audio | Features | Tensor |
//! |--------|-------|----------|--------|
//! | WavLM | mono, config rate | normalized waveform (+ mask) | `[1, N]` |
//! | WeSpeaker | first channel, native rate, x 2^15 | Kaldi fbank 80, CMN | `[1, T, 80]` |
//! | Resemblyzer | mono, 16 kHz | mel spectrogram 40 | `[1, T, 40]` |

use std::path::Path;

use spksim_audio::{fbank, melspec, Waveform};
use spksim_onnx::Tensor;
use tracing::debug;

use crate::error::VoiceprintError;
use crate::model::FeatureSet;
use crate::preprocessor::{PreprocessorConfig, ATTENTION_MASK};
use crate::registry::Family;

/// Amplitude scale applied before the Kaldi fbank (16-bit PCM range).
const WESPEAKER_WAV_SCALE: f32 = 32768.0;

/// Feature extraction strategy for one model family.
pub enum FrontEnd {
    WavLm(PreprocessorConfig),
    WeSpeaker,
    Resemblyzer(melspec::MelSpectrogram),
}

impl FrontEnd {
    /// Front end for the given family. WavLM needs its preprocessor config.
    pub fn for_family(
        family: Family,
        preprocessor: Option<PreprocessorConfig>,
    ) -> Result<Self, VoiceprintError> {
        match family {
            Family::WavLm => preprocessor.map(FrontEnd::WavLm).ok_or_else(|| {
                VoiceprintError::Configuration(
                    "wavlm models require a feature extractor config".into(),
                )
            }),
            Family::WeSpeaker => Ok(FrontEnd::WeSpeaker),
            Family::Resemblyzer => Ok(FrontEnd::Resemblyzer(melspec::MelSpectrogram::new(
                melspec::Config::default(),
            ))),
        }
    }

    pub fn family(&self) -> Family {
        match self {
            FrontEnd::WavLm(_) => Family::WavLm,
            FrontEnd::WeSpeaker => Family::WeSpeaker,
            FrontEnd::Resemblyzer(_) => Family::Resemblyzer,
        }
    }

    /// Decodes an audio file and builds the graph inputs for it.
    pub fn extract(&self, path: &Path, input_names: &[String]) -> Result<FeatureSet, VoiceprintError> {
        let wav = spksim_audio::load(path)?;
        debug!(
            path = %path.display(),
            sample_rate = wav.sample_rate,
            channels = wav.channels.len(),
            samples = wav.len(),
            "decoded audio"
        );
        self.features(&wav, input_names)
    }

    /// Builds the graph inputs for an already decoded waveform.
    pub fn features(&self, wav: &Waveform, input_names: &[String]) -> Result<FeatureSet, VoiceprintError> {
        match self {
            FrontEnd::WavLm(cfg) => wavlm_features(cfg, wav, input_names),
            FrontEnd::WeSpeaker => wespeaker_features(wav, input_names),
            FrontEnd::Resemblyzer(mel) => resemblyzer_features(mel, wav, input_names),
        }
    }
}

fn wavlm_features(
    cfg: &PreprocessorConfig,
    wav: &Waveform,
    input_names: &[String],
) -> Result<FeatureSet, VoiceprintError> {
    let samples = wav.to_mono_at(cfg.sampling_rate)?;
    let mut set = FeatureSet::new();
    for (name, tensor) in cfg.process(&samples)? {
        if !input_names.iter().any(|n| *n == name) {
            debug!(name = %name, "graph does not declare input, dropping");
            continue;
        }
        let tensor = if name == ATTENTION_MASK { tensor.to_i64() } else { tensor };
        set.insert(name, tensor);
    }
    Ok(set)
}

fn wespeaker_features(wav: &Waveform, input_names: &[String]) -> Result<FeatureSet, VoiceprintError> {
    let input = sole_input(input_names)?;
    let samples: Vec<f32> = wav.first_channel().iter().map(|&x| x * WESPEAKER_WAV_SCALE).collect();

    let extractor = fbank::Extractor::new(fbank::Config::with_sample_rate(wav.sample_rate));
    let mut feats = extractor.extract(&samples);
    if feats.is_empty() {
        return Err(VoiceprintError::AudioTooShort {
            min_samples: extractor.config().window_size(),
            got_samples: samples.len(),
        });
    }
    fbank::cmn(&mut feats);

    let tensor = batch_of_frames(&feats)?;
    let mut set = FeatureSet::new();
    set.insert(input, tensor);
    Ok(set)
}

fn resemblyzer_features(
    mel: &melspec::MelSpectrogram,
    wav: &Waveform,
    input_names: &[String],
) -> Result<FeatureSet, VoiceprintError> {
    let input = sole_input(input_names)?;
    let samples = wav.to_mono_at(mel.config().sample_rate)?;
    if samples.is_empty() {
        return Err(VoiceprintError::AudioTooShort {
            min_samples: 1,
            got_samples: 0,
        });
    }
    let frames = mel.compute(&samples)?;

    let tensor = batch_of_frames(&frames)?;
    let mut set = FeatureSet::new();
    set.insert(input, tensor);
    Ok(set)
}

fn sole_input(input_names: &[String]) -> Result<&str, VoiceprintError> {
    input_names
        .first()
        .map(String::as_str)
        .ok_or_else(|| VoiceprintError::Configuration("model graph declares no inputs".into()))
}

/// Packs time-major frames into a `[1, T, D]` tensor.
fn batch_of_frames(frames: &[Vec<f32>]) -> Result<Tensor, VoiceprintError> {
    let t = frames.len() as i64;
    let d = frames.first().map_or(0, Vec::len) as i64;
    debug!(frames = t, dim = d, "feature matrix");
    Ok(Tensor::from_vec(vec![1, t, d], fbank::flatten(frames))?)
}
