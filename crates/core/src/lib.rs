pub mod answer;
pub mod cache;
pub mod chunking;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod gemini;
pub mod ingest;
pub mod locale;
pub mod models;
pub mod orchestrator;
pub mod retriever;
pub mod session;
pub mod store;
pub mod traits;

pub use answer::{build_prompt, citation_trailer, Generation, APOLOGY_RESPONSE, NO_CONTEXT_RESPONSE};
pub use cache::{BuildCache, CacheKey, PreparedCorpus};
pub use chunking::{build_chunks, normalize_whitespace, ChunkingConfig, TextSplitter};
pub use config::{CredentialStore, PipelineConfig};
pub use embeddings::{embed_in_batches, BatchOptions};
pub use error::{IndexError, IngestError, PipelineError, ServiceError};
pub use extractor::{extract_page_texts, LopdfExtractor, PageText, PdfExtractor};
pub use gemini::{GeminiClient, GeminiConfig};
pub use ingest::{discover_pdf_files, load_documents, LoadReport, SkippedPdf};
pub use locale::{ui_text, Language, UiText};
pub use models::{
    Chunk, ChunkMetadata, ConversationMessage, Document, IndexEntry, IndexManifest, RetrievedChunk,
    RetrievedContext, Role,
};
pub use orchestrator::{Answer, AnswerOutcome, Assistant, InitReport, SystemState};
pub use session::ConversationSession;
pub use store::{read_manifest, BuildMetadata, PersistedIndex};
pub use traits::{CredentialCheck, Embedder, Generator};
