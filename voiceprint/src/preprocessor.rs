//! Raw-waveform feature extractor for WavLM-style models.
//!
//! Reads the `preprocessor_config.json` shipped next to a Wav2Vec2/WavLM
//! checkpoint and turns a single waveform into the graph inputs:
//! `input_values` `[1, N]` f32 and, when the config asks for it,
//! `attention_mask` `[1, N]`.

use std::path::Path;

use serde::Deserialize;
use spksim_onnx::Tensor;

use crate::error::VoiceprintError;

/// File name of the feature-extractor config inside a model repository.
pub const PREPROCESSOR_CONFIG_FILE: &str = "preprocessor_config.json";

/// Name of the waveform input slot.
pub const INPUT_VALUES: &str = "input_values";
/// Name of the attention mask input slot.
pub const ATTENTION_MASK: &str = "attention_mask";

const NORM_EPS: f64 = 1e-7;

/// Wav2Vec2 feature-extractor settings.
///
/// Unknown fields in the JSON file are ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PreprocessorConfig {
    pub sampling_rate: u32,
    pub do_normalize: bool,
    pub padding_value: f32,
    pub return_attention_mask: bool,
    pub feature_size: usize,
}

impl Default for PreprocessorConfig {
    fn default() -> Self {
        Self {
            sampling_rate: 16000,
            do_normalize: true,
            padding_value: 0.0,
            return_attention_mask: false,
            feature_size: 1,
        }
    }
}

impl PreprocessorConfig {
    /// Parses a config from JSON text.
    pub fn from_json(json: &str) -> Result<Self, VoiceprintError> {
        let cfg: Self = serde_json::from_str(json).map_err(|e| {
            VoiceprintError::Configuration(format!("invalid {PREPROCESSOR_CONFIG_FILE}: {e}"))
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reads a config file.
    pub fn from_file(path: &Path) -> Result<Self, VoiceprintError> {
        if !path.is_file() {
            return Err(VoiceprintError::NotFound(path.to_path_buf()));
        }
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Reads `preprocessor_config.json` from a feature-extractor directory.
    pub fn from_dir(dir: &Path) -> Result<Self, VoiceprintError> {
        Self::from_file(&dir.join(PREPROCESSOR_CONFIG_FILE))
    }

    fn validate(&self) -> Result<(), VoiceprintError> {
        if self.sampling_rate == 0 {
            return Err(VoiceprintError::Configuration(
                "feature extractor sampling_rate must be positive".into(),
            ));
        }
        if self.feature_size != 1 {
            return Err(VoiceprintError::Configuration(format!(
                "feature extractor feature_size {} is not supported, expected 1",
                self.feature_size
            )));
        }
        Ok(())
    }

    /// Produces the named input tensors for one waveform sampled at
    /// `sampling_rate`.
    ///
    /// A single utterance is never padded, so the mask (when returned) is
    /// all ones.
    pub fn process(&self, samples: &[f32]) -> Result<Vec<(String, Tensor)>, VoiceprintError> {
        if samples.is_empty() {
            return Err(VoiceprintError::AudioTooShort {
                min_samples: 1,
                got_samples: 0,
            });
        }

        let values = if self.do_normalize {
            zero_mean_unit_var(samples)
        } else {
            samples.to_vec()
        };
        let n = values.len() as i64;

        let mut out = vec![(INPUT_VALUES.to_string(), Tensor::from_vec(vec![1, n], values)?)];
        if self.return_attention_mask {
            let mask = Tensor::from_vec_i64(vec![1, n], vec![1; n as usize])?;
            out.push((ATTENTION_MASK.to_string(), mask));
        }
        Ok(out)
    }
}

/// Normalizes to zero mean and unit variance: `(x - mean) / sqrt(var + 1e-7)`.
pub fn zero_mean_unit_var(samples: &[f32]) -> Vec<f32> {
    if samples.is_empty() {
        return Vec::new();
    }
    let n = samples.len() as f64;
    let mean = samples.iter().map(|&x| x as f64).sum::<f64>() / n;
    let var = samples
        .iter()
        .map(|&x| {
            let d = x as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    let scale = 1.0 / (var + NORM_EPS).sqrt();
    samples.iter().map(|&x| ((x as f64 - mean) * scale) as f32).collect()
}
