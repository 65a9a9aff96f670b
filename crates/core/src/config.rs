use crate::chunking::ChunkingConfig;
use crate::embeddings::BatchOptions;
use crate::retriever::DEFAULT_TOP_K;
use crate::IngestError;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_DOCS_DIR: &str = "data";
pub const DEFAULT_INDEX_DIR: &str = "index_bio";
pub const DEFAULT_KEY_FILE: &str = ".biochat/api_key";

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub docs_dir: PathBuf,
    pub index_dir: PathBuf,
    pub chunking: ChunkingConfig,
    pub batch: BatchOptions,
    pub top_k: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            docs_dir: PathBuf::from(DEFAULT_DOCS_DIR),
            index_dir: PathBuf::from(DEFAULT_INDEX_DIR),
            chunking: ChunkingConfig::default(),
            batch: BatchOptions::default(),
            top_k: DEFAULT_TOP_K,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), IngestError> {
        self.chunking.validate()?;
        if self.top_k == 0 {
            return Err(IngestError::InvalidArgument(
                "top_k must be greater than zero".to_string(),
            ));
        }
        if self.batch.batch_size == 0 {
            return Err(IngestError::InvalidArgument(
                "embedding batch size must be greater than zero".to_string(),
            ));
        }
        let docs = resolve_path(&self.docs_dir)?;
        let index = resolve_path(&self.index_dir)?;
        if docs.starts_with(&index) || index.starts_with(&docs) {
            return Err(IngestError::InvalidArgument(format!(
                "document folder {} and index folder {} must not contain one another",
                self.docs_dir.display(),
                self.index_dir.display()
            )));
        }
        Ok(())
    }
}

/// Absolute form of `path` with symlinks resolved as far as the path exists.
fn resolve_path(path: &Path) -> Result<PathBuf, IngestError> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut missing = Vec::new();
    let mut existing = absolute.as_path();
    loop {
        if let Ok(resolved) = existing.canonicalize() {
            return Ok(missing
                .iter()
                .rev()
                .fold(resolved, |resolved, part| resolved.join(part)));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => return Ok(absolute),
        }
    }
}

/// API key kept in a local file, readable only by the owner on unix.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<String>, IngestError> {
        if !self.path.is_file() {
            return Ok(None);
        }
        let key = fs::read_to_string(&self.path)?.trim().to_string();
        Ok(if key.is_empty() { None } else { Some(key) })
    }

    pub fn save(&self, key: &str) -> Result<(), IngestError> {
        let key = key.trim();
        if key.is_empty() {
            return Err(IngestError::InvalidArgument(
                "refusing to store an empty API key".to_string(),
            ));
        }

        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, key)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))?;
        }

        debug!(path = %self.path.display(), "stored api key");
        Ok(())
    }

    pub fn clear(&self) -> Result<bool, IngestError> {
        if !self.path.exists() {
            return Ok(false);
        }
        fs::remove_file(&self.path)?;
        Ok(true)
    }

    /// An explicitly supplied key wins over the stored one.
    pub fn resolve(&self, explicit: Option<&str>) -> Result<Option<String>, IngestError> {
        match explicit.map(str::trim).filter(|key| !key.is_empty()) {
            Some(key) => Ok(Some(key.to_string())),
            None => self.load(),
        }
    }
}
