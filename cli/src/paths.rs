//! Path utilities for spksim.

use std::io;
use std::path::{Path, PathBuf};

/// Default base directory name.
pub const DEFAULT_BASE_DIR: &str = ".spksim";

/// Default configuration filename.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// Provides access to the spksim directory structure.
#[derive(Debug, Clone)]
pub struct Paths {
    /// User's home directory.
    pub home_dir: PathBuf,
}

impl Paths {
    /// Paths rooted at the current user's home directory.
    pub fn new() -> io::Result<Self> {
        let home_dir = dirs::home_dir().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "could not find home directory")
        })?;
        Ok(Self { home_dir })
    }

    /// Paths rooted at an explicit home directory.
    pub fn with_home(home_dir: impl Into<PathBuf>) -> Self {
        Self {
            home_dir: home_dir.into(),
        }
    }

    /// Returns the base directory (~/.spksim).
    pub fn base_dir(&self) -> PathBuf {
        self.home_dir.join(DEFAULT_BASE_DIR)
    }

    /// Returns the config file path (~/.spksim/config.yaml).
    pub fn config_file(&self) -> PathBuf {
        self.base_dir().join(DEFAULT_CONFIG_FILE)
    }

    /// Returns the model cache directory (~/.spksim/cache).
    pub fn cache_dir(&self) -> PathBuf {
        self.base_dir().join("cache")
    }

    /// Expands a leading `~` to the home directory.
    pub fn expand_home(&self, path: &Path) -> PathBuf {
        match path.strip_prefix("~") {
            Ok(rest) => self.home_dir.join(rest),
            Err(_) => path.to_path_buf(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_new() {
        let paths = Paths::new().unwrap();
        assert!(!paths.home_dir.as_os_str().is_empty());
    }

    #[test]
    fn test_paths_structure() {
        let paths = Paths::with_home("/home/alice");
        assert_eq!(paths.base_dir(), PathBuf::from("/home/alice/.spksim"));
        assert_eq!(paths.config_file(), PathBuf::from("/home/alice/.spksim/config.yaml"));
        assert_eq!(paths.cache_dir(), PathBuf::from("/home/alice/.spksim/cache"));
    }

    #[test]
    fn test_expand_home() {
        let paths = Paths::with_home("/home/alice");
        assert_eq!(
            paths.expand_home(Path::new("~/models/a.onnx")),
            PathBuf::from("/home/alice/models/a.onnx")
        );
        assert_eq!(paths.expand_home(Path::new("~")), PathBuf::from("/home/alice"));
        assert_eq!(paths.expand_home(Path::new("/abs/x")), PathBuf::from("/abs/x"));
        assert_eq!(paths.expand_home(Path::new("rel/~x")), PathBuf::from("rel/~x"));
    }
}
