//! Configuration management for spksim.
//!
//! Configuration is stored in ~/.spksim/config.yaml:
//!
//! ```yaml
//! cache_dir: ~/models/spksim
//! models:
//!   lab-resnet:
//!     family: wespeaker
//!     path: ~/models/lab_resnet34.onnx
//!   team-wavlm:
//!     family: wavlm
//!     repo_id: team/wavlm-sv
//!     filename: model.onnx
//!     feature_extractor_repo: team/wavlm-sv
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context as _};
use serde::{Deserialize, Serialize};
use spksim_voiceprint::{ExtractorSource, Family, ModelDescriptor, WeightsSource};

use crate::paths::Paths;

/// spksim configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Model cache directory override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,

    /// Additional named models, merged over the built-in table.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub models: BTreeMap<String, ModelEntry>,

    /// Path the config was read from (not serialized).
    #[serde(skip)]
    config_path: Option<PathBuf>,
}

/// One named model in the config file.
///
/// Either `path` (local weights) or `repo_id` + `filename` (remote).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelEntry {
    pub family: Family,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_extractor_path: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_extractor_repo: Option<String>,
}

impl ModelEntry {
    /// Converts the entry to a registry descriptor.
    ///
    /// Relative local paths are resolved against `base_dir`.
    pub fn to_descriptor(
        &self,
        name: &str,
        paths: &Paths,
        base_dir: Option<&Path>,
    ) -> anyhow::Result<ModelDescriptor> {
        let local = |p: &Path| {
            let p = paths.expand_home(p);
            match base_dir {
                Some(dir) if p.is_relative() => dir.join(p),
                _ => p,
            }
        };

        let weights = match (&self.path, &self.repo_id, &self.filename) {
            (Some(path), None, None) => WeightsSource::Local(local(path)),
            (None, Some(repo_id), Some(filename)) => WeightsSource::Remote {
                repo_id: repo_id.clone(),
                filename: filename.clone(),
            },
            _ => bail!("model '{name}': set either `path` or both `repo_id` and `filename`"),
        };

        let feature_extractor = match (&self.feature_extractor_path, &self.feature_extractor_repo) {
            (None, None) => None,
            (Some(dir), None) => Some(ExtractorSource::Local(local(dir))),
            (None, Some(repo)) => Some(ExtractorSource::Remote(repo.clone())),
            (Some(_), Some(_)) => {
                bail!("model '{name}': set only one of `feature_extractor_path` and `feature_extractor_repo`")
            }
        };

        Ok(ModelDescriptor {
            name: name.to_string(),
            family: self.family,
            weights,
            feature_extractor,
        })
    }
}

impl Config {
    /// Returns the path the config was loaded from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Returns the config directory path.
    pub fn dir(&self) -> Option<&Path> {
        self.config_path.as_deref().and_then(Path::parent)
    }

    /// Converts all configured models to registry descriptors.
    pub fn model_descriptors(&self, paths: &Paths) -> anyhow::Result<Vec<ModelDescriptor>> {
        self.models
            .iter()
            .map(|(name, entry)| entry.to_descriptor(name, paths, self.dir()))
            .collect()
    }
}

/// Loads the configuration file.
///
/// With `custom_path` the file must exist. Otherwise the default
/// `~/.spksim/config.yaml` is read if present, and an empty config is
/// returned if not.
pub fn load_config(paths: &Paths, custom_path: Option<&Path>) -> anyhow::Result<Config> {
    let config_path = match custom_path {
        Some(p) => {
            if !p.is_file() {
                bail!("config file not found: {}", p.display());
            }
            p.to_path_buf()
        }
        None => {
            let p = paths.config_file();
            if !p.exists() {
                return Ok(Config::default());
            }
            p
        }
    };

    let content = std::fs::read_to_string(&config_path)
        .with_context(|| format!("read config {}", config_path.display()))?;
    let mut cfg: Config = if content.trim().is_empty() {
        Config::default()
    } else {
        serde_yaml::from_str(&content)
            .with_context(|| format!("parse config {}", config_path.display()))?
    };
    cfg.config_path = Some(config_path);
    Ok(cfg)
}

/// Picks the model cache directory: the command line value (flag or
/// environment) first, then the config file, then `~/.spksim/cache`.
pub fn resolve_cache_dir(cli: Option<&Path>, config: &Config, paths: &Paths) -> PathBuf {
    if let Some(dir) = cli {
        return paths.expand_home(dir);
    }
    if let Some(dir) = &config.cache_dir {
        return paths.expand_home(dir);
    }
    paths.cache_dir()
}
