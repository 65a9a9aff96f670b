use crate::chunking::ChunkingConfig;
use crate::models::{IndexEntry, IndexManifest, RetrievedChunk};
use crate::IndexError;
use chrono::Utc;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const MANIFEST_FILE: &str = "manifest.json";
pub const ENTRIES_FILE: &str = "entries.json";
pub const FORMAT_VERSION: u32 = 1;
pub const METRIC: &str = "cosine";

#[derive(Debug, Clone)]
pub struct BuildMetadata {
    pub embedding_model: String,
    pub chunking: ChunkingConfig,
    pub corpus_fingerprint: String,
}

/// Flat exact-search vector index persisted as a manifest plus an entries file.
///
/// A directory counts as a usable index only when its manifest reports at
/// least one entry. Builds are staged in a sibling directory and renamed into
/// place, so a failed build never leaves a half-written index behind.
#[derive(Debug, Clone)]
pub struct PersistedIndex {
    root: PathBuf,
    manifest: IndexManifest,
    entries: Vec<IndexEntry>,
}

impl PersistedIndex {
    pub fn open(root: &Path) -> Result<Option<Self>, IndexError> {
        let Some(manifest) = read_manifest(root)? else {
            return Ok(None);
        };
        if manifest.entry_count == 0 {
            return Ok(None);
        }

        let file = File::open(root.join(ENTRIES_FILE)).map_err(|error| corrupt(root, error))?;
        let entries: Vec<IndexEntry> =
            serde_json::from_reader(BufReader::new(file)).map_err(|error| corrupt(root, error))?;

        if entries.len() != manifest.entry_count {
            return Err(corrupt(
                root,
                format!(
                    "manifest lists {} entries but {} were stored",
                    manifest.entry_count,
                    entries.len()
                ),
            ));
        }
        if let Some(entry) = entries
            .iter()
            .find(|entry| entry.vector.len() != manifest.dimensions)
        {
            return Err(corrupt(
                root,
                format!("entry {} has dimension {}", entry.id, entry.vector.len()),
            ));
        }

        info!(path = %root.display(), entries = entries.len(), "loaded persisted index");
        Ok(Some(Self {
            root: root.to_path_buf(),
            manifest,
            entries,
        }))
    }

    pub fn build(
        root: &Path,
        entries: Vec<IndexEntry>,
        metadata: BuildMetadata,
    ) -> Result<Self, IndexError> {
        let dimensions = validate_entries(&entries)?;

        let manifest = IndexManifest {
            format_version: FORMAT_VERSION,
            dimensions,
            metric: METRIC.to_string(),
            entry_count: entries.len(),
            embedding_model: metadata.embedding_model,
            chunking: metadata.chunking,
            corpus_fingerprint: metadata.corpus_fingerprint,
            built_at: Utc::now(),
        };

        ensure_replaceable(root)?;

        let staging = staging_dir(root);
        if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }
        fs::create_dir_all(&staging)?;

        let written = write_json(&staging.join(ENTRIES_FILE), &entries)
            .and_then(|_| write_json(&staging.join(MANIFEST_FILE), &manifest));
        if let Err(error) = written {
            discard_staging(&staging);
            return Err(error);
        }

        if root.exists() {
            fs::remove_dir_all(root)?;
        }
        if let Some(parent) = root.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::rename(&staging, root)?;

        info!(path = %root.display(), entries = manifest.entry_count, dimensions, "committed index");
        Ok(Self {
            root: root.to_path_buf(),
            manifest,
            entries,
        })
    }

    /// Removes the persisted index. Returns `false` when there was nothing to
    /// delete. A directory holding anything besides index files is left alone.
    pub fn destroy(root: &Path) -> Result<bool, IndexError> {
        let staging = staging_dir(root);
        if staging.exists() {
            discard_staging(&staging);
        }

        if !root.exists() {
            debug!(path = %root.display(), "no index directory to delete");
            return Ok(false);
        }
        if root.is_dir() {
            ensure_replaceable(root)?;
        }

        fs::remove_dir_all(root).map_err(|error| IndexError::DeletionFailed {
            path: root.display().to_string(),
            reason: error.to_string(),
        })?;
        info!(path = %root.display(), "deleted index directory");
        Ok(true)
    }

    /// Top `k` entries by cosine similarity, best first. Equal scores keep
    /// insertion order.
    pub fn query(&self, vector: &[f32], k: usize) -> Result<Vec<RetrievedChunk>, IndexError> {
        if self.entries.is_empty() {
            return Err(IndexError::NotInitialized(self.root.display().to_string()));
        }
        if vector.len() != self.manifest.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.manifest.dimensions,
                actual: vector.len(),
            });
        }

        let mut scored = self
            .entries
            .iter()
            .map(|entry| (cosine_similarity(&entry.vector, vector), entry))
            .collect::<Vec<_>>();
        scored.sort_by(|left, right| right.0.total_cmp(&left.0));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(score, entry)| RetrievedChunk {
                chunk_text: entry.chunk_text.clone(),
                metadata: entry.metadata.clone(),
                score,
            })
            .collect())
    }

    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Manifest of the index at `root`, or `None` when no index has been committed.
pub fn read_manifest(root: &Path) -> Result<Option<IndexManifest>, IndexError> {
    let path = root.join(MANIFEST_FILE);
    if !path.is_file() {
        return Ok(None);
    }

    let file = File::open(&path)?;
    let manifest: IndexManifest =
        serde_json::from_reader(BufReader::new(file)).map_err(|error| corrupt(root, error))?;

    if manifest.format_version != FORMAT_VERSION {
        return Err(corrupt(
            root,
            format!("unsupported format version {}", manifest.format_version),
        ));
    }
    Ok(Some(manifest))
}

fn validate_entries(entries: &[IndexEntry]) -> Result<usize, IndexError> {
    let Some(first) = entries.first() else {
        return Err(IndexError::NotInitialized(
            "refusing to commit an index without entries".to_string(),
        ));
    };
    let dimensions = first.vector.len();
    if dimensions == 0 {
        return Err(IndexError::DimensionMismatch {
            expected: 1,
            actual: 0,
        });
    }

    let mut seen = HashSet::with_capacity(entries.len());
    for entry in entries {
        if entry.vector.len() != dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: dimensions,
                actual: entry.vector.len(),
            });
        }
        if !seen.insert(entry.id.as_str()) {
            return Err(IndexError::DuplicateId(entry.id.clone()));
        }
    }
    Ok(dimensions)
}

fn write_json<T: serde::Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), IndexError> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}

/// Only a missing path, an empty directory, or one holding nothing but index
/// files may be deleted to make room for a new index.
fn ensure_replaceable(root: &Path) -> Result<(), IndexError> {
    if !root.exists() {
        return Ok(());
    }
    if !root.is_dir() {
        return Err(IndexError::ForeignDirectory {
            path: root.display().to_string(),
            found: "not a directory".to_string(),
        });
    }

    let mut foreign = Vec::new();
    for entry in fs::read_dir(root)? {
        let name = entry?.file_name().to_string_lossy().to_string();
        if name != MANIFEST_FILE && name != ENTRIES_FILE {
            foreign.push(name);
        }
    }

    if foreign.is_empty() {
        return Ok(());
    }
    foreign.sort();
    Err(IndexError::ForeignDirectory {
        path: root.display().to_string(),
        found: foreign.join(", "),
    })
}

fn discard_staging(staging: &Path) {
    if let Err(error) = fs::remove_dir_all(staging) {
        warn!(path = %staging.display(), %error, "could not remove staging directory");
    }
}

fn staging_dir(root: &Path) -> PathBuf {
    let name = root
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "index".to_string());
    root.with_file_name(format!("{name}.staging"))
}

fn corrupt(root: &Path, details: impl ToString) -> IndexError {
    IndexError::Corrupt {
        path: root.display().to_string(),
        details: details.to_string(),
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
