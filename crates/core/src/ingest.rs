use crate::chunking::{build_chunks, normalize_whitespace, TextSplitter};
use crate::extractor::{join_pages, PdfExtractor};
use crate::models::{Chunk, Document};
use crate::IngestError;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// PDF files directly inside `folder`, sorted by path. Subdirectories are not visited.
pub fn discover_pdf_files(folder: &Path) -> Result<Vec<PathBuf>, IngestError> {
    if !folder.is_dir() {
        return Err(IngestError::MissingDirectory(folder.display().to_string()));
    }

    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    Ok(files)
}

pub fn digest_file(path: &Path) -> Result<String, IngestError> {
    let bytes = fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Content hash over every PDF in the folder. Changes whenever a file is
/// added, removed, renamed or edited.
pub fn corpus_fingerprint(folder: &Path) -> Result<String, IngestError> {
    let mut hasher = Sha256::new();
    for path in discover_pdf_files(folder)? {
        hasher.update(file_name(&path)?.as_bytes());
        hasher.update([0u8]);
        hasher.update(digest_file(&path)?.as_bytes());
        hasher.update([0u8]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

#[derive(Debug, Clone)]
pub struct SkippedPdf {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct LoadReport {
    pub documents: Vec<Document>,
    pub skipped_files: Vec<SkippedPdf>,
}

/// Extracts every PDF in `folder`, skipping (and reporting) files that fail
/// or carry no text. Fails only when nothing usable is left.
pub fn load_documents(
    folder: &Path,
    extractor: &dyn PdfExtractor,
) -> Result<LoadReport, IngestError> {
    let files = discover_pdf_files(folder)?;

    if files.is_empty() {
        return Err(IngestError::NoUsableDocuments(format!(
            "{} (no pdf files found)",
            folder.display()
        )));
    }

    let mut documents = Vec::new();
    let mut skipped_files = Vec::new();

    for path in files {
        let loaded = (|| {
            let filename = file_name(&path)?;
            let pages = extractor.extract_pages(&path)?;
            let raw_text = normalize_whitespace(&join_pages(&pages));
            Ok::<_, IngestError>(Document { filename, raw_text })
        })();

        match loaded {
            Ok(document) if !document.raw_text.trim().is_empty() => {
                debug!(file = %document.filename, chars = document.raw_text.len(), "extracted document");
                documents.push(document);
            }
            Ok(document) => {
                warn!(file = %document.filename, "could not extract text, skipping");
                skipped_files.push(SkippedPdf {
                    path,
                    reason: "no extractable text".to_string(),
                });
            }
            Err(error) => {
                warn!(path = %path.display(), %error, "failed to read pdf, skipping");
                skipped_files.push(SkippedPdf {
                    path,
                    reason: error.to_string(),
                });
            }
        }
    }

    if documents.is_empty() {
        return Err(IngestError::NoUsableDocuments(folder.display().to_string()));
    }

    Ok(LoadReport {
        documents,
        skipped_files,
    })
}

pub fn chunk_documents(documents: &[Document], splitter: &TextSplitter) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut cursor = 0u64;

    for document in documents {
        let (document_chunks, next_cursor) = build_chunks(document, splitter, cursor);
        cursor = next_cursor;
        chunks.extend(document_chunks);
    }

    chunks
}

fn file_name(path: &Path) -> Result<String, IngestError> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| {
            IngestError::MissingFileName(format!("path missing filename: {}", path.display()))
        })
}
