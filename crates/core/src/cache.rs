use crate::chunking::ChunkingConfig;
use crate::ingest::SkippedPdf;
use crate::models::Chunk;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub corpus_fingerprint: String,
    pub chunking: ChunkingConfig,
}

/// Output of the load and chunk stages for one corpus.
#[derive(Debug, Clone)]
pub struct PreparedCorpus {
    pub documents: usize,
    pub skipped_files: Vec<SkippedPdf>,
    pub chunks: Vec<Chunk>,
}

/// Memoized load-and-chunk results. A key only matches when both the corpus
/// content and the chunk parameters are unchanged.
#[derive(Debug, Default)]
pub struct BuildCache {
    entries: HashMap<CacheKey, Arc<PreparedCorpus>>,
}

impl BuildCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<PreparedCorpus>> {
        self.entries.get(key).cloned()
    }

    pub fn insert(&mut self, key: CacheKey, corpus: PreparedCorpus) -> Arc<PreparedCorpus> {
        let corpus = Arc::new(corpus);
        self.entries.insert(key, Arc::clone(&corpus));
        corpus
    }

    pub fn invalidate(&mut self) {
        debug!(entries = self.entries.len(), "clearing build cache");
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
