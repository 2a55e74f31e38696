//! Remote model repositories.

use std::path::{Path, PathBuf};

use hf_hub::api::sync::ApiBuilder;
use hf_hub::{Repo, RepoType};
use tracing::info;

use crate::error::VoiceprintError;

/// Fetches files from a model repository into a local cache.
pub trait ModelHub: Send + Sync {
    /// Returns the local path of `filename` in `repo_id`, downloading it if
    /// it is not cached yet.
    fn fetch(&self, repo_id: &str, filename: &str) -> Result<PathBuf, VoiceprintError>;
}

/// Hugging Face Hub client backed by `hf-hub`.
///
/// Files are cached under the given directory, keyed by repository id and
/// filename; a cached file is returned without network access.
#[derive(Debug, Clone)]
pub struct HfHub {
    cache_dir: PathBuf,
    progress: bool,
}

impl HfHub {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            progress: false,
        }
    }

    /// Shows a download progress bar on stderr.
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }
}

impl ModelHub for HfHub {
    fn fetch(&self, repo_id: &str, filename: &str) -> Result<PathBuf, VoiceprintError> {
        let hub_err = |message: String| VoiceprintError::Hub {
            repo_id: repo_id.to_string(),
            filename: filename.to_string(),
            message,
        };

        let api = ApiBuilder::new()
            .with_cache_dir(self.cache_dir.clone())
            .with_progress(self.progress)
            .build()
            .map_err(|e| hub_err(e.to_string()))?;
        let repo = api.repo(Repo::new(repo_id.to_string(), RepoType::Model));

        info!(repo = repo_id, file = filename, "resolving model file");
        let path = repo.get(filename).map_err(|e| hub_err(e.to_string()))?;
        Ok(path)
    }
}
