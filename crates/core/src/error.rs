use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("regex error: {0}")]
    RegexError(#[from] regex::Error),

    #[error("path has no file name: {0}")]
    MissingFileName(String),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("document directory not found: {0}")]
    MissingDirectory(String),

    #[error("no text could be extracted from any document in {0}")]
    NoUsableDocuments(String),
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid response from {service}: status {status}: {details}")]
    BadStatus {
        service: String,
        status: u16,
        details: String,
    },

    #[error("malformed response from {service}: {details}")]
    MalformedResponse { service: String, details: String },

    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    #[error("embedding count mismatch: {texts} texts produced {vectors} vectors")]
    CountMismatch { texts: usize, vectors: usize },

    #[error("embedding batch {batch} failed: {reason}")]
    BatchFailed { batch: usize, reason: String },
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("knowledge base is not initialized: {0}")]
    NotInitialized(String),

    #[error("vector dimension {actual} does not match index dimension {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("duplicate index entry id: {0}")]
    DuplicateId(String),

    #[error("entry count {entries} does not match chunk count {chunks}")]
    CountMismatch { chunks: usize, entries: usize },

    #[error("corrupt index at {path}: {details}")]
    Corrupt { path: String, details: String },

    #[error("refusing to replace {path}: it holds files that are not part of an index ({found})")]
    ForeignDirectory { path: String, found: String },

    #[error(
        "could not delete index directory {path}: {reason}. The store is likely still in use; \
         restart the process and the knowledge base will be rebuilt"
    )]
    DeletionFailed { path: String, reason: String },
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("knowledge base is not ready (state: {0})")]
    NotReady(String),

    #[error("question is empty")]
    EmptyQuestion,
}

impl PipelineError {
    /// Configuration problems must be fixed by the operator before anything is retried.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            PipelineError::Ingest(
                IngestError::MissingDirectory(_)
                    | IngestError::InvalidChunkConfig(_)
                    | IngestError::InvalidArgument(_)
            ) | PipelineError::Service(ServiceError::InvalidCredential(_))
                | PipelineError::Index(IndexError::ForeignDirectory { .. })
        )
    }
}
