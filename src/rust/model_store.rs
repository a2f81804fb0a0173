use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Model file not found: {0}")]
    NotFound(String),
    #[error("No download URL configured for model '{0}'")]
    NoSource(String),
    #[error("Download error: {0}")]
    DownloadError(#[from] reqwest::Error),
    #[error("Download of {url} failed with status {status}")]
    DownloadStatus { url: String, status: u16 },
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Model verification failed")]
    VerificationFailed,
    #[error("Hash mismatch: expected {expected}, got {actual} for model '{name}'")]
    HashMismatch {
        name: String,
        expected: String,
        actual: String,
    },
}

/// Where a model's weights live and how to obtain and check them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelArtifact {
    pub name: String,
    pub path: PathBuf,
    pub url: Option<String>,
    pub sha256: Option<String>,
}

impl ModelArtifact {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            url: None,
            sha256: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_sha256(mut self, hash: impl Into<String>) -> Self {
        self.sha256 = Some(hash.into().to_ascii_lowercase());
        self
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}

/// Hex-encoded SHA-256 of a byte slice.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Checks a file on disk against an expected SHA-256.
pub fn verify_file(path: &Path, expected_hash: &str) -> Result<bool, ModelError> {
    log::info!("Verifying file: {:?}", path);
    let bytes = fs::read(path)?;
    let hash = sha256_hex(&bytes);
    log::debug!("Calculated hash: {}", hash);
    log::debug!("Expected hash:   {}", expected_hash);
    Ok(hash.eq_ignore_ascii_case(expected_hash))
}

/// Resolves, verifies and fetches model artifacts under a models directory.
#[derive(Clone, Debug)]
pub struct ModelStore {
    models_dir: PathBuf,
    download_lock: Arc<Mutex<()>>,
}

impl ModelStore {
    /// Returns the default models directory path
    pub fn default_models_dir() -> PathBuf {
        // 1. Check environment variable
        if let Ok(path) = env::var("NEUROPATH_MODELS_DIR") {
            return PathBuf::from(path);
        }

        // 2. Use platform-specific cache directory
        if let Some(cache_dir) = dirs::cache_dir() {
            return cache_dir.join("neuropath").join("models");
        }

        // 3. Fallback to user's home directory
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir.join(".cache").join("neuropath").join("models");
        }

        // 4. If all else fails, use system temp directory
        env::temp_dir().join("neuropath").join("models")
    }

    pub fn new<P: AsRef<Path>>(models_dir: P) -> io::Result<Self> {
        let models_dir = models_dir.as_ref().to_path_buf();
        fs::create_dir_all(&models_dir)?;
        Ok(Self {
            models_dir,
            download_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    /// Conventional location of a named model: `<models_dir>/<name>/model.onnx`.
    pub fn model_path(&self, name: &str) -> PathBuf {
        self.models_dir.join(name).join("model.onnx")
    }

    pub fn artifact(&self, name: &str) -> ModelArtifact {
        ModelArtifact::new(name, self.model_path(name))
    }

    /// True when the file exists and, if a hash is configured, matches it.
    pub fn verify(&self, artifact: &ModelArtifact) -> Result<bool, ModelError> {
        if !artifact.exists() {
            log::info!("Model '{}' not present at {:?}", artifact.name, artifact.path);
            return Ok(false);
        }
        match &artifact.sha256 {
            Some(expected) => verify_file(&artifact.path, expected),
            None => Ok(true),
        }
    }

    pub async fn download(&self, artifact: &ModelArtifact) -> Result<(), ModelError> {
        let url = artifact
            .url
            .as_deref()
            .ok_or_else(|| ModelError::NoSource(artifact.name.clone()))?;
        let _lock = self.download_lock.lock().await;

        log::info!("Downloading model '{}' from {} to {:?}", artifact.name, url, artifact.path);
        let response = reqwest::get(url).await?;
        log::info!("Download response status: {}", response.status());
        if !response.status().is_success() {
            return Err(ModelError::DownloadStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        let bytes = response.bytes().await?;
        log::info!("Downloaded {} bytes", bytes.len());

        if let Some(expected) = &artifact.sha256 {
            let actual = sha256_hex(&bytes);
            if !actual.eq_ignore_ascii_case(expected) {
                log::error!("'{}' hash mismatch: expected {}, got {}", artifact.name, expected, actual);
                return Err(ModelError::HashMismatch {
                    name: artifact.name.clone(),
                    expected: expected.clone(),
                    actual,
                });
            }
        }

        if let Some(parent) = artifact.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&artifact.path, &bytes)?;

        // Verify after writing
        if !self.verify(artifact)? {
            return Err(ModelError::VerificationFailed);
        }

        log::info!("Model '{}' downloaded and verified successfully", artifact.name);
        Ok(())
    }

    pub fn remove(&self, artifact: &ModelArtifact) -> Result<(), ModelError> {
        if artifact.exists() {
            fs::remove_file(&artifact.path)?;
        }
        Ok(())
    }

    /// Ensures that a model is present and verified.
    /// If the model doesn't exist, it will be downloaded.
    /// If verification fails, it will be re-downloaded.
    pub async fn ensure(&self, artifact: &ModelArtifact) -> Result<(), ModelError> {
        log::info!("Checking if model '{}' is present...", artifact.name);
        if self.verify(artifact)? {
            log::info!("Model '{}' verified", artifact.name);
            return Ok(());
        }
        if artifact.url.is_none() {
            return if artifact.exists() {
                Err(ModelError::VerificationFailed)
            } else {
                Err(ModelError::NotFound(artifact.path.display().to_string()))
            };
        }
        self.remove(artifact)?;
        self.download(artifact).await
    }

    /// Startup fetch. With `fresh`, the local copy is discarded and downloaded
    /// again. Artifacts without a download URL are never removed; returns
    /// false when such an artifact was skipped.
    pub async fn refresh(&self, artifact: &ModelArtifact, fresh: bool) -> Result<bool, ModelError> {
        if artifact.url.is_none() {
            if fresh && artifact.exists() {
                log::warn!(
                    "No download URL configured for '{}', keeping existing file at {:?}",
                    artifact.name,
                    artifact.path
                );
            } else if !artifact.exists() {
                log::warn!("No download URL configured for '{}', skipping", artifact.name);
            }
            return Ok(false);
        }
        if fresh {
            log::info!("Fresh download requested - removing existing '{}' model...", artifact.name);
            self.remove(artifact)?;
        }
        self.ensure(artifact).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store(tag: &str) -> ModelStore {
        let dir = env::temp_dir().join(format!("neuropath-store-{}-{}", tag, std::process::id()));
        ModelStore::new(dir).unwrap()
    }

    #[test]
    fn test_model_paths() {
        let store = temp_store("paths");
        let artifact = store.artifact("alzheimer");
        assert!(artifact.path.ends_with("alzheimer/model.onnx"));
        assert!(artifact.path.starts_with(store.models_dir()));
    }

    #[test]
    fn test_verify_checks_hash() -> Result<(), ModelError> {
        let store = temp_store("verify");
        let artifact = store.artifact("eeg").with_sha256(sha256_hex(b"weights"));
        assert!(!store.verify(&artifact)?);

        fs::create_dir_all(artifact.path.parent().unwrap())?;
        fs::write(&artifact.path, b"weights")?;
        assert!(store.verify(&artifact)?);

        fs::write(&artifact.path, b"corrupted data")?;
        assert!(!store.verify(&artifact)?);

        store.remove(&artifact)?;
        assert!(!artifact.exists());
        Ok(())
    }

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[tokio::test]
    async fn test_ensure_without_source() {
        let store = temp_store("ensure");
        let artifact = store.artifact("missing");
        assert!(matches!(store.ensure(&artifact).await, Err(ModelError::NotFound(_))));
        assert!(matches!(store.download(&artifact).await, Err(ModelError::NoSource(_))));
    }

    #[test]
    fn test_default_models_dir_honours_env() {
        env::set_var("NEUROPATH_MODELS_DIR", "/tmp/neuropath-env-models");
        let path = ModelStore::default_models_dir();
        env::remove_var("NEUROPATH_MODELS_DIR");
        assert_eq!(path, PathBuf::from("/tmp/neuropath-env-models"));
    }
}
