//! Model weight path validation.

use std::path::{Path, PathBuf};

use super::error::BackendError;

/// Validated weights path inside the model directory.
#[derive(Debug, Clone)]
pub struct WeightsPath {
    path: PathBuf,
    size_bytes: u64,
}

impl WeightsPath {
    pub fn as_path(&self) -> &Path {
        &self.path
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }
}

/// Resolves weight files relative to the configured model directory.
#[derive(Debug, Clone)]
pub struct WeightsLocator {
    model_dir: PathBuf,
}

impl WeightsLocator {
    pub fn new(model_dir: impl Into<PathBuf>) -> Self {
        Self { model_dir: model_dir.into() }
    }

    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    /// Resolve `file_name` and reject anything that escapes the model directory.
    pub fn resolve(&self, file_name: &str) -> Result<WeightsPath, BackendError> {
        let full_path = self.model_dir.join(file_name);
        let canonical = full_path.canonicalize().map_err(|_| {
            BackendError::Unavailable(format!("weights not found: {}", full_path.display()))
        })?;
        let root = self.model_dir.canonicalize().map_err(|_| {
            BackendError::Unavailable(format!(
                "model directory not found: {}",
                self.model_dir.display()
            ))
        })?;

        if !canonical.starts_with(&root) {
            return Err(BackendError::InvalidConfig(format!(
                "weights path outside model directory: {}",
                canonical.display()
            )));
        }

        let meta = std::fs::metadata(&canonical)
            .map_err(|e| BackendError::Unavailable(format!("weights metadata: {e}")))?;
        if !meta.is_file() {
            return Err(BackendError::InvalidConfig(format!(
                "weights path is not a file: {}",
                canonical.display()
            )));
        }

        Ok(WeightsPath { path: canonical, size_bytes: meta.len() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolves_file_inside_model_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("coder.gguf"), b"GGUF....").unwrap();

        let locator = WeightsLocator::new(dir.path());
        let weights = locator.resolve("coder.gguf").unwrap();
        assert_eq!(weights.size_bytes(), 8);
        assert!(weights.as_path().ends_with("coder.gguf"));
    }

    #[test]
    fn test_missing_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let locator = WeightsLocator::new(dir.path());
        assert!(matches!(
            locator.resolve("missing.gguf"),
            Err(BackendError::Unavailable(_))
        ));
    }

    #[test]
    fn test_traversal_rejected() {
        let outer = tempfile::tempdir().unwrap();
        let models = outer.path().join("models");
        std::fs::create_dir(&models).unwrap();
        std::fs::write(outer.path().join("secret.gguf"), b"x").unwrap();

        let locator = WeightsLocator::new(&models);
        assert!(matches!(
            locator.resolve("../secret.gguf"),
            Err(BackendError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_directory_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        let locator = WeightsLocator::new(dir.path());
        assert!(locator.resolve("nested").is_err());
    }
}
