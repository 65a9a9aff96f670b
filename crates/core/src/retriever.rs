use crate::models::RetrievedContext;
use crate::store::PersistedIndex;
use crate::traits::Embedder;
use crate::PipelineError;
use tracing::debug;

pub const DEFAULT_TOP_K: usize = 5;

/// Embeds `query` and returns the `k` nearest chunks. No relevance threshold
/// is applied: whatever the index returns is passed on as context.
pub async fn retrieve<E>(
    embedder: &E,
    query: &str,
    k: usize,
    index: &PersistedIndex,
) -> Result<RetrievedContext, PipelineError>
where
    E: Embedder + ?Sized,
{
    let vector = embedder.embed_query(query).await?;
    let chunks = index.query(&vector, k)?;

    debug!(
        hits = chunks.len(),
        top_score = chunks.first().map(|hit| hit.score),
        "retrieved context"
    );
    Ok(RetrievedContext { chunks })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::ChunkingConfig;
    use crate::embeddings::test_support::{CountingEmbedder, TrigramEmbedder};
    use crate::models::{ChunkMetadata, IndexEntry};
    use crate::store::BuildMetadata;
    use tempfile::tempdir;

    fn indexed(text: &str, source: &str, id: &str) -> IndexEntry {
        IndexEntry {
            id: id.to_string(),
            vector: TrigramEmbedder::default().embed(text),
            chunk_text: text.to_string(),
            metadata: ChunkMetadata {
                source: source.to_string(),
                chunk: 0,
            },
        }
    }

    #[tokio::test]
    async fn codon_question_ranks_codon_chunk_first() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let index = PersistedIndex::build(
            &dir.path().join("idx"),
            vec![
                indexed(
                    "Phylogenetic trees group species by ancestry inferred from sequence alignments.",
                    "phylogenetics.pdf",
                    "doc_phylogenetics.pdf_chunk_0",
                ),
                indexed(
                    "A codon is a sequence of three nucleotides that encodes an amino acid.",
                    "genetics.pdf",
                    "doc_genetics.pdf_chunk_1",
                ),
            ],
            BuildMetadata {
                embedding_model: "local".to_string(),
                chunking: ChunkingConfig::default(),
                corpus_fingerprint: "fp".to_string(),
            },
        )?;
        let embedder = CountingEmbedder::default();

        let context = retrieve(&embedder, "What is a codon?", 5, &index).await?;

        assert_eq!(context.len(), 2);
        assert_eq!(context.chunks[0].metadata.source, "genetics.pdf");
        assert!(context.chunks[0].chunk_text.starts_with("A codon is"));
        assert_eq!(embedder.query_calls(), 1);
        Ok(())
    }
}
