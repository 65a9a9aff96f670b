use crate::answer::{self, NO_CONTEXT_RESPONSE};
use crate::cache::{BuildCache, CacheKey, PreparedCorpus};
use crate::chunking::TextSplitter;
use crate::config::PipelineConfig;
use crate::embeddings::embed_in_batches;
use crate::extractor::{LopdfExtractor, PdfExtractor};
use crate::ingest::{chunk_documents, corpus_fingerprint, load_documents, SkippedPdf};
use crate::locale::Language;
use crate::models::{IndexEntry, RetrievedContext};
use crate::retriever;
use crate::session::ConversationSession;
use crate::store::{read_manifest, BuildMetadata, PersistedIndex};
use crate::traits::{CredentialCheck, Embedder, Generator};
use crate::{IndexError, IngestError, PipelineError};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SystemState {
    Uninitialized,
    LoadingDocuments,
    Chunking,
    BuildingIndex,
    Ready,
    Failed(String),
}

impl fmt::Display for SystemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SystemState::Uninitialized => f.write_str("uninitialized"),
            SystemState::LoadingDocuments => f.write_str("loading documents"),
            SystemState::Chunking => f.write_str("chunking"),
            SystemState::BuildingIndex => f.write_str("building index"),
            SystemState::Ready => f.write_str("ready"),
            SystemState::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct InitReport {
    pub reused_index: bool,
    pub documents: usize,
    pub skipped_files: Vec<SkippedPdf>,
    pub chunks: usize,
    pub entries: usize,
    pub elapsed: Duration,
    /// Model recorded in a reused index when it differs from the configured one.
    pub stale_embedding_model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerOutcome {
    Answered,
    NoContext,
    RetrievalFailed(String),
    GenerationFailed(String),
}

#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<String>,
    pub outcome: AnswerOutcome,
}

impl Answer {
    fn fallback(text: &str, outcome: AnswerOutcome) -> Self {
        Self {
            text: text.to_string(),
            sources: Vec::new(),
            outcome,
        }
    }
}

/// Owns the knowledge base lifecycle and answers questions against it.
///
/// `initialize` walks Uninitialized -> LoadingDocuments -> Chunking ->
/// BuildingIndex -> Ready, or lands in Failed. A persisted index found on
/// disk skips straight to Ready without touching the documents.
pub struct Assistant<E, G> {
    config: PipelineConfig,
    embedder: E,
    generator: G,
    extractor: Box<dyn PdfExtractor + Send + Sync>,
    state: SystemState,
    index: Option<PersistedIndex>,
    cache: BuildCache,
}

impl<E, G> Assistant<E, G>
where
    E: Embedder,
    G: Generator,
{
    pub fn new(config: PipelineConfig, embedder: E, generator: G) -> Self {
        Self {
            config,
            embedder,
            generator,
            extractor: Box::new(LopdfExtractor),
            state: SystemState::Uninitialized,
            index: None,
            cache: BuildCache::new(),
        }
    }

    pub fn with_extractor(mut self, extractor: impl PdfExtractor + Send + Sync + 'static) -> Self {
        self.extractor = Box::new(extractor);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn state(&self) -> &SystemState {
        &self.state
    }

    pub fn index(&self) -> Option<&PersistedIndex> {
        self.index.as_ref()
    }

    /// Configuration checks that need no network: parameters, and the
    /// document directory when there is no index to reuse.
    pub fn preflight(&self) -> Result<(), PipelineError> {
        self.config.validate()?;
        if read_manifest(&self.config.index_dir)?.is_none() && !self.config.docs_dir.is_dir() {
            return Err(IngestError::MissingDirectory(self.config.docs_dir.display().to_string()).into());
        }
        Ok(())
    }

    /// Preflight, then credential validation, then [`Assistant::initialize`].
    /// Nothing is loaded or embedded when either check fails.
    pub async fn start<C>(&mut self, credential: &C) -> Result<InitReport, PipelineError>
    where
        C: CredentialCheck + ?Sized,
    {
        let checked = match self.preflight() {
            Ok(()) => credential.validate_credential().await.map_err(PipelineError::from),
            Err(error) => Err(error),
        };

        if let Err(error) = checked {
            error!(%error, "startup checks failed");
            self.state = SystemState::Failed(error.to_string());
            return Err(error);
        }

        self.initialize().await
    }

    pub async fn initialize(&mut self) -> Result<InitReport, PipelineError> {
        match &self.state {
            SystemState::Ready => {
                if let Some(index) = &self.index {
                    return Ok(InitReport {
                        reused_index: true,
                        documents: 0,
                        skipped_files: Vec::new(),
                        chunks: index.len(),
                        entries: index.len(),
                        elapsed: Duration::ZERO,
                        stale_embedding_model: self.stale_embedding_model(index),
                    });
                }
            }
            SystemState::Failed(_) => return Err(PipelineError::NotReady(self.state.to_string())),
            _ => {}
        }

        let started = Instant::now();
        match self.run_stages(started).await {
            Ok(report) => {
                self.state = SystemState::Ready;
                info!(
                    reused = report.reused_index,
                    entries = report.entries,
                    elapsed_ms = report.elapsed.as_millis() as u64,
                    "knowledge base ready"
                );
                Ok(report)
            }
            Err(error) => {
                error!(stage = %self.state, %error, "knowledge base initialization failed");
                self.index = None;
                self.state = SystemState::Failed(error.to_string());
                Err(error)
            }
        }
    }

    async fn run_stages(&mut self, started: Instant) -> Result<InitReport, PipelineError> {
        self.config.validate()?;

        if let Some(index) = PersistedIndex::open(&self.config.index_dir)? {
            info!(
                path = %self.config.index_dir.display(),
                entries = index.len(),
                "reusing persisted index"
            );
            let stale_embedding_model = self.stale_embedding_model(&index);
            if let Some(recorded) = &stale_embedding_model {
                warn!(
                    recorded = %recorded,
                    configured = %self.embedder.model(),
                    "persisted index was embedded with a different model; rebuild it"
                );
            }
            let entries = index.len();
            self.index = Some(index);
            return Ok(InitReport {
                reused_index: true,
                documents: 0,
                skipped_files: Vec::new(),
                chunks: entries,
                entries,
                elapsed: started.elapsed(),
                stale_embedding_model,
            });
        }

        self.state = SystemState::LoadingDocuments;
        let key = CacheKey {
            corpus_fingerprint: corpus_fingerprint(&self.config.docs_dir)?,
            chunking: self.config.chunking,
        };
        let corpus = match self.cache.get(&key) {
            Some(corpus) => {
                debug!(chunks = corpus.chunks.len(), "reusing cached chunks");
                corpus
            }
            None => self.prepare_corpus(key.clone())?,
        };

        self.state = SystemState::BuildingIndex;
        let texts = corpus
            .chunks
            .iter()
            .map(|chunk| chunk.text.clone())
            .collect::<Vec<_>>();
        let vectors = embed_in_batches(&self.embedder, &texts, self.config.batch).await?;
        if vectors.len() != corpus.chunks.len() {
            return Err(IndexError::CountMismatch {
                chunks: corpus.chunks.len(),
                entries: vectors.len(),
            }
            .into());
        }

        let entries = corpus
            .chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexEntry::from_chunk(chunk, vector))
            .collect::<Vec<_>>();
        let index = PersistedIndex::build(
            &self.config.index_dir,
            entries,
            BuildMetadata {
                embedding_model: self.embedder.model().to_string(),
                chunking: self.config.chunking,
                corpus_fingerprint: key.corpus_fingerprint,
            },
        )?;

        let entries = index.len();
        self.index = Some(index);
        Ok(InitReport {
            reused_index: false,
            documents: corpus.documents,
            skipped_files: corpus.skipped_files.clone(),
            chunks: corpus.chunks.len(),
            entries,
            elapsed: started.elapsed(),
            stale_embedding_model: None,
        })
    }

    fn stale_embedding_model(&self, index: &PersistedIndex) -> Option<String> {
        let recorded = &index.manifest().embedding_model;
        (recorded != self.embedder.model()).then(|| recorded.clone())
    }

    fn prepare_corpus(&mut self, key: CacheKey) -> Result<Arc<PreparedCorpus>, PipelineError> {
        let loaded = load_documents(&self.config.docs_dir, &*self.extractor)?;
        info!(
            documents = loaded.documents.len(),
            skipped = loaded.skipped_files.len(),
            "loaded documents"
        );

        self.state = SystemState::Chunking;
        let splitter = TextSplitter::new(self.config.chunking)?;
        let chunks = chunk_documents(&loaded.documents, &splitter);
        if chunks.is_empty() {
            return Err(IngestError::NoUsableDocuments(self.config.docs_dir.display().to_string()).into());
        }
        info!(chunks = chunks.len(), "split documents into chunks");

        Ok(self.cache.insert(
            key,
            PreparedCorpus {
                documents: loaded.documents.len(),
                skipped_files: loaded.skipped_files,
                chunks,
            },
        ))
    }

    /// Deletes the persisted index and forgets cached chunks so the next
    /// `initialize` rebuilds from the documents. When deletion fails the
    /// state and cache are left as they were.
    pub fn rebuild(&mut self) -> Result<bool, PipelineError> {
        match PersistedIndex::destroy(&self.config.index_dir) {
            Ok(deleted) => {
                self.index = None;
                self.cache.invalidate();
                self.state = SystemState::Uninitialized;
                info!(deleted, path = %self.config.index_dir.display(), "index cleared for rebuild");
                Ok(deleted)
            }
            Err(error) => {
                warn!(%error, "index rebuild aborted");
                Err(error.into())
            }
        }
    }

    /// Leaves Failed for Uninitialized once the operator has fixed the cause.
    /// Cached chunks survive, so a retry after an embedding outage does not
    /// re-read unchanged documents.
    pub fn restart(&mut self) {
        if matches!(self.state, SystemState::Failed(_)) {
            self.state = SystemState::Uninitialized;
        }
    }

    fn ready_index(&self) -> Result<&PersistedIndex, PipelineError> {
        match (&self.state, &self.index) {
            (SystemState::Ready, Some(index)) => Ok(index),
            _ => Err(PipelineError::NotReady(self.state.to_string())),
        }
    }

    pub async fn retrieve(&self, question: &str) -> Result<RetrievedContext, PipelineError> {
        let index = self.ready_index()?;
        retriever::retrieve(&self.embedder, question, self.config.top_k, index).await
    }

    /// Answers one question. Service failures become fixed fallback texts
    /// tagged in [`Answer::outcome`]; only an empty question or a knowledge
    /// base that is not ready is an error.
    pub async fn answer(&self, question: &str, language: Option<Language>) -> Result<Answer, PipelineError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(PipelineError::EmptyQuestion);
        }
        self.ready_index()?;

        let context = match self.retrieve(question).await {
            Ok(context) => context,
            Err(error) => {
                warn!(%error, "retrieval failed");
                return Ok(Answer::fallback(
                    NO_CONTEXT_RESPONSE,
                    AnswerOutcome::RetrievalFailed(error.to_string()),
                ));
            }
        };

        if context.is_empty() {
            return Ok(Answer::fallback(NO_CONTEXT_RESPONSE, AnswerOutcome::NoContext));
        }

        let generation = answer::generate(&self.generator, question, &context, language).await;
        Ok(match generation.failure {
            None => Answer {
                text: generation.text,
                sources: context.sources(),
                outcome: AnswerOutcome::Answered,
            },
            Some(error) => Answer::fallback(
                &generation.text,
                AnswerOutcome::GenerationFailed(error.to_string()),
            ),
        })
    }

    /// Answers in the session's language and records the exchange.
    pub async fn handle_turn(
        &self,
        session: &mut ConversationSession,
        question: &str,
    ) -> Result<Answer, PipelineError> {
        let answer = self.answer(question, session.language()).await?;
        session.record_turn(question.trim(), &answer.text);
        Ok(answer)
    }
}
