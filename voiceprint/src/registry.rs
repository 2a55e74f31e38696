//! Model registry: maps model names to families and weight locations, and
//! loads them.
//!
//! A model is selected either by name from the registry table or by an
//! explicit local weights file plus family. Remote weights are resolved
//! through a [`ModelHub`] into the registry's cache directory.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use spksim_onnx::{Env, SessionOptions};
use tracing::{debug, info};

use crate::error::VoiceprintError;
use crate::frontend::FrontEnd;
use crate::hub::{HfHub, ModelHub};
use crate::model::EmbeddingModel;
use crate::preprocessor::{PreprocessorConfig, PREPROCESSOR_CONFIG_FILE};

/// Repository hosting the converted WavLM and Resemblyzer graphs.
pub const SPKSIM_MODELS_REPO: &str = "sgqt2369144677/speaker-similarity-models";

// ---------------------------------------------------------------------------
// Family
// ---------------------------------------------------------------------------

/// Closed set of supported model families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    /// Raw waveform input with a Wav2Vec2 feature extractor.
    WavLm,
    /// Kaldi filterbank input.
    WeSpeaker,
    /// Mel spectrogram input.
    Resemblyzer,
}

impl Family {
    pub const ALL: [Family; 3] = [Family::WavLm, Family::WeSpeaker, Family::Resemblyzer];

    pub fn as_str(&self) -> &'static str {
        match self {
            Family::WavLm => "wavlm",
            Family::WeSpeaker => "wespeaker",
            Family::Resemblyzer => "resemblyzer",
        }
    }

    /// Whether models of this family need a feature-extractor config.
    pub fn needs_feature_extractor(&self) -> bool {
        matches!(self, Family::WavLm)
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Family {
    type Err = VoiceprintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Family::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                VoiceprintError::Configuration(format!(
                    "unknown model family {s:?}; expected one of: wavlm, wespeaker, resemblyzer"
                ))
            })
    }
}

// ---------------------------------------------------------------------------
// Descriptors
// ---------------------------------------------------------------------------

/// Where a model's ONNX weights live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WeightsSource {
    Local(PathBuf),
    Remote { repo_id: String, filename: String },
}

/// Where a WavLM model's `preprocessor_config.json` lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractorSource {
    /// Directory containing the config file.
    Local(PathBuf),
    /// Repository containing the config file.
    Remote(String),
}

/// A named, selectable model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDescriptor {
    pub name: String,
    pub family: Family,
    pub weights: WeightsSource,
    pub feature_extractor: Option<ExtractorSource>,
}

impl ModelDescriptor {
    /// A model hosted in a remote repository.
    pub fn remote(name: &str, family: Family, repo_id: &str, filename: &str) -> Self {
        Self {
            name: name.to_string(),
            family,
            weights: WeightsSource::Remote {
                repo_id: repo_id.to_string(),
                filename: filename.to_string(),
            },
            feature_extractor: None,
        }
    }

    /// A model whose weights are a local file.
    pub fn local(name: &str, family: Family, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.to_string(),
            family,
            weights: WeightsSource::Local(path.into()),
            feature_extractor: None,
        }
    }

    pub fn with_feature_extractor(mut self, source: ExtractorSource) -> Self {
        self.feature_extractor = Some(source);
        self
    }
}

const WESPEAKER_MODELS: &[(&str, &str, &str)] = &[
    ("wespeaker-resnet34", "Wespeaker/wespeaker-voxceleb-resnet34", "voxceleb_resnet34.onnx"),
    ("wespeaker-resnet34-lm", "Wespeaker/wespeaker-voxceleb-resnet34-LM", "voxceleb_resnet34_LM.onnx"),
    ("wespeaker-cnceleb-resnet34", "Wespeaker/wespeaker-cnceleb-resnet34", "cnceleb_resnet34.onnx"),
    ("wespeaker-cnceleb-resnet34-lm", "Wespeaker/wespeaker-cnceleb-resnet34-LM", "cnceleb_resnet34_LM.onnx"),
    ("wespeaker-campplus", "Wespeaker/wespeaker-voxceleb-campplus", "voxceleb_CAM++.onnx"),
    ("wespeaker-campplus-lm", "Wespeaker/wespeaker-voxceleb-campplus-LM", "voxceleb_CAM++_LM.onnx"),
    ("wespeaker-ecapa-tdnn512", "Wespeaker/wespeaker-voxceleb-ecapa-tdnn512", "voxceleb_ECAPA512.onnx"),
    ("wespeaker-ecapa-tdnn512-lm", "Wespeaker/wespeaker-ecapa-tdnn512-LM", "voxceleb_ECAPA512_LM.onnx"),
    ("wespeaker-ecapa-tdnn1024", "Wespeaker/wespeaker-voxceleb-ecapa-tdnn1024", "voxceleb_ECAPA1024.onnx"),
    ("wespeaker-ecapa-tdnn1024-lm", "Wespeaker/wespeaker-voxceleb-ecapa-tdnn1024-LM", "voxceleb_ECAPA1024_LM.onnx"),
    ("wespeaker-resnet152-lm", "Wespeaker/wespeaker-voxceleb-resnet152-LM", "voxceleb_resnet152_LM.onnx"),
    ("wespeaker-resnet221-lm", "Wespeaker/wespeaker-voxceleb-resnet221-LM", "voxceleb_resnet221_LM.onnx"),
    ("wespeaker-resnet293-lm", "Wespeaker/wespeaker-voxceleb-resnet293-LM", "voxceleb_resnet293_LM.onnx"),
    (
        "wespeaker-dfresnet114-gemini",
        "Wespeaker/wespeaker-voxceleb-gemini-DFresnet114-LM",
        "voxceleb_gemini_dfresnet114_LM.onnx",
    ),
];

/// The built-in model table.
pub fn builtin_models() -> Vec<ModelDescriptor> {
    let mut models = vec![
        ModelDescriptor::remote(
            "wavlm-base-plus-sv",
            Family::WavLm,
            SPKSIM_MODELS_REPO,
            "wavlm-base-plus-sv.onnx",
        )
        .with_feature_extractor(ExtractorSource::Remote(SPKSIM_MODELS_REPO.to_string())),
        ModelDescriptor::remote(
            "resemblyzer",
            Family::Resemblyzer,
            SPKSIM_MODELS_REPO,
            "resemblyzer_voice_encoder.onnx",
        ),
    ];
    models.extend(
        WESPEAKER_MODELS
            .iter()
            .map(|&(name, repo, file)| ModelDescriptor::remote(name, Family::WeSpeaker, repo, file)),
    );
    models
}

// ---------------------------------------------------------------------------
// Selection and resolution
// ---------------------------------------------------------------------------

/// How the caller picks a model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSelection {
    /// A name from the registry table.
    Named(String),
    /// An explicit local weights file.
    Local {
        family: Family,
        weights: PathBuf,
        feature_extractor: Option<PathBuf>,
    },
}

/// A model whose files are all present on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedModel {
    pub name: String,
    pub family: Family,
    /// ONNX weights file.
    pub weights: PathBuf,
    /// `preprocessor_config.json` for WavLM models.
    pub preprocessor: Option<PathBuf>,
}

/// Checks a selection against a model table without touching any file.
///
/// Catches an unknown name and a WavLM local model without a feature
/// extractor, the mistakes that need no disk access to detect.
pub fn check_selection(selection: &ModelSelection, models: &[ModelDescriptor]) -> Result<(), VoiceprintError> {
    match selection {
        ModelSelection::Named(name) => {
            if models.iter().any(|m| &m.name == name) {
                return Ok(());
            }
            let mut known: Vec<String> = models.iter().map(|m| m.name.clone()).collect();
            known.sort();
            known.dedup();
            Err(VoiceprintError::UnknownModel {
                name: name.clone(),
                known,
            })
        }
        ModelSelection::Local {
            family,
            feature_extractor: None,
            ..
        } if family.needs_feature_extractor() => Err(VoiceprintError::Configuration(format!(
            "local {family} models require a feature extractor directory"
        ))),
        ModelSelection::Local { .. } => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Resolves and loads speaker embedding models.
pub struct Registry {
    cache_dir: PathBuf,
    models: BTreeMap<String, ModelDescriptor>,
    hub: Box<dyn ModelHub>,
    session_options: SessionOptions,
}

impl Registry {
    /// Creates a registry with the built-in table, downloading into
    /// `cache_dir` (created if absent).
    pub fn new(cache_dir: impl Into<PathBuf>) -> Result<Self, VoiceprintError> {
        let cache_dir = cache_dir.into();
        std::fs::create_dir_all(&cache_dir)?;
        debug!(cache_dir = %cache_dir.display(), "model cache");

        let models = builtin_models().into_iter().map(|m| (m.name.clone(), m)).collect();
        Ok(Self {
            hub: Box::new(HfHub::new(&cache_dir)),
            cache_dir,
            models,
            session_options: SessionOptions::default(),
        })
    }

    /// Replaces the hub used for remote files.
    pub fn with_hub(mut self, hub: impl ModelHub + 'static) -> Self {
        self.hub = Box::new(hub);
        self
    }

    /// Adds models to the table; a model with an existing name replaces it.
    pub fn with_models(mut self, models: impl IntoIterator<Item = ModelDescriptor>) -> Self {
        for m in models {
            self.models.insert(m.name.clone(), m);
        }
        self
    }

    pub fn with_session_options(mut self, opts: SessionOptions) -> Self {
        self.session_options = opts;
        self
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Registered model names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.models.keys().cloned().collect()
    }

    pub fn descriptor(&self, name: &str) -> Option<&ModelDescriptor> {
        self.models.get(name)
    }

    /// Iterates over registered models in name order.
    pub fn models(&self) -> impl Iterator<Item = &ModelDescriptor> {
        self.models.values()
    }

    /// Locates every file a selection needs, downloading remote files.
    ///
    /// An unknown name fails before any file access.
    pub fn resolve(&self, selection: &ModelSelection) -> Result<ResolvedModel, VoiceprintError> {
        match selection {
            ModelSelection::Named(name) => {
                let desc = self.models.get(name).ok_or_else(|| VoiceprintError::UnknownModel {
                    name: name.clone(),
                    known: self.names(),
                })?;
                self.resolve_descriptor(desc)
            }
            ModelSelection::Local {
                family,
                weights,
                feature_extractor,
            } => {
                let name = weights
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| weights.display().to_string());
                let mut desc = ModelDescriptor::local(&name, *family, weights);
                desc.feature_extractor = feature_extractor.clone().map(ExtractorSource::Local);
                self.resolve_descriptor(&desc)
            }
        }
    }

    fn resolve_descriptor(&self, desc: &ModelDescriptor) -> Result<ResolvedModel, VoiceprintError> {
        let extractor = if desc.family.needs_feature_extractor() {
            let source = desc.feature_extractor.as_ref().ok_or_else(|| {
                VoiceprintError::Configuration(format!(
                    "model {:?} ({}) requires a feature extractor directory",
                    desc.name, desc.family
                ))
            })?;
            Some(source)
        } else {
            if desc.feature_extractor.is_some() {
                debug!(model = %desc.name, family = %desc.family, "feature extractor ignored");
            }
            None
        };

        let weights = match &desc.weights {
            WeightsSource::Local(path) => {
                if !path.is_file() {
                    return Err(VoiceprintError::NotFound(path.clone()));
                }
                path.clone()
            }
            WeightsSource::Remote { repo_id, filename } => self.hub.fetch(repo_id, filename)?,
        };

        let preprocessor = match extractor {
            None => None,
            Some(ExtractorSource::Local(dir)) => {
                if !dir.is_dir() {
                    return Err(VoiceprintError::Configuration(format!(
                        "feature extractor directory {} does not exist",
                        dir.display()
                    )));
                }
                Some(dir.join(PREPROCESSOR_CONFIG_FILE))
            }
            Some(ExtractorSource::Remote(repo_id)) => {
                Some(self.hub.fetch(repo_id, PREPROCESSOR_CONFIG_FILE)?)
            }
        };

        Ok(ResolvedModel {
            name: desc.name.clone(),
            family: desc.family,
            weights,
            preprocessor,
        })
    }

    /// Resolves a selection and loads its inference graph.
    pub fn load(&self, selection: &ModelSelection) -> Result<EmbeddingModel, VoiceprintError> {
        let resolved = self.resolve(selection)?;
        let preprocessor = resolved
            .preprocessor
            .as_deref()
            .map(PreprocessorConfig::from_file)
            .transpose()?;
        let front_end = FrontEnd::for_family(resolved.family, preprocessor)?;

        info!(
            model = %resolved.name,
            family = %resolved.family,
            weights = %resolved.weights.display(),
            "loading model"
        );
        let env = Env::new("spksim")?;
        let session = env.new_session(&resolved.weights, &self.session_options)?;
        EmbeddingModel::new(resolved.name, front_end, session)
    }
}
