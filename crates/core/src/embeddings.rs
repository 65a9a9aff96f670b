use crate::traits::Embedder;
use crate::ServiceError;
use std::time::Duration;
use tracing::{debug, error, info};

pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_BATCH_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    pub batch_size: usize,
    pub delay: Duration,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            delay: DEFAULT_BATCH_DELAY,
        }
    }
}

/// Embeds `texts` in batches of at most `options.batch_size`, sleeping
/// `options.delay` between batches. The first failing batch aborts the run;
/// the result always has one vector per input text, in input order.
pub async fn embed_in_batches<E>(
    embedder: &E,
    texts: &[String],
    options: BatchOptions,
) -> Result<Vec<Vec<f32>>, ServiceError>
where
    E: Embedder + ?Sized,
{
    let batch_size = options.batch_size.max(1);
    let batch_count = texts.len().div_ceil(batch_size);
    let mut vectors = Vec::with_capacity(texts.len());

    for (batch_index, batch) in texts.chunks(batch_size).enumerate() {
        if batch_index > 0 && !options.delay.is_zero() {
            tokio::time::sleep(options.delay).await;
        }

        debug!(batch = batch_index + 1, of = batch_count, size = batch.len(), "embedding batch");
        let embedded = embedder.embed_documents(batch).await.map_err(|source| {
            error!(batch = batch_index + 1, error = %source, "embedding batch failed");
            ServiceError::BatchFailed {
                batch: batch_index + 1,
                reason: source.to_string(),
            }
        })?;

        if embedded.len() != batch.len() {
            return Err(ServiceError::CountMismatch {
                texts: batch.len(),
                vectors: embedded.len(),
            });
        }
        vectors.extend(embedded);
    }

    if vectors.len() != texts.len() {
        return Err(ServiceError::CountMismatch {
            texts: texts.len(),
            vectors: vectors.len(),
        });
    }

    info!(texts = texts.len(), batches = batch_count, "embedded corpus");
    Ok(vectors)
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::traits::Embedder;
    use crate::ServiceError;
    use async_trait::async_trait;
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Deterministic offline embedder: character trigrams of the lowercased,
    /// space-padded text hashed into a unit-length bag.
    #[derive(Debug, Clone, Copy)]
    pub(crate) struct TrigramEmbedder {
        pub(crate) dimensions: usize,
    }

    impl Default for TrigramEmbedder {
        fn default() -> Self {
            Self { dimensions: 96 }
        }
    }

    impl TrigramEmbedder {
        pub(crate) fn embed(&self, text: &str) -> Vec<f32> {
            let buckets = self.dimensions.max(1);
            let mut vector = vec![0f32; buckets];
            let padded = format!(" {} ", text.to_lowercase())
                .chars()
                .collect::<Vec<_>>();

            for trigram in padded.windows(3) {
                let mut hasher = DefaultHasher::new();
                trigram.hash(&mut hasher);
                vector[(hasher.finish() % buckets as u64) as usize] += 1.0;
            }

            let norm = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
            if norm > 0.0 {
                vector.iter_mut().for_each(|value| *value /= norm);
            }
            vector
        }
    }

    #[async_trait]
    impl Embedder for TrigramEmbedder {
        fn model(&self) -> &str {
            "test/trigram"
        }

        async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ServiceError> {
            Ok(texts.iter().map(|text| self.embed(text)).collect())
        }

        async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
            Ok(self.embed(text))
        }
    }

    /// Wraps the trigram embedder and counts calls; can be told to fail a batch.
    #[derive(Debug, Clone, Default)]
    pub(crate) struct CountingEmbedder {
        pub(crate) inner: TrigramEmbedder,
        pub(crate) document_calls: Arc<AtomicUsize>,
        pub(crate) query_calls: Arc<AtomicUsize>,
        pub(crate) fail_on_call: Option<usize>,
        pub(crate) drop_last_vector: bool,
        pub(crate) fail_queries: bool,
    }

    impl CountingEmbedder {
        pub(crate) fn failing_on(call: usize) -> Self {
            Self {
                fail_on_call: Some(call),
                ..Self::default()
            }
        }

        pub(crate) fn document_calls(&self) -> usize {
            self.document_calls.load(Ordering::SeqCst)
        }

        pub(crate) fn query_calls(&self) -> usize {
            self.query_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        fn model(&self) -> &str {
            "test/counting"
        }

        async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ServiceError> {
            let call = self.document_calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_on_call == Some(call) {
                return Err(ServiceError::BadStatus {
                    service: "test".to_string(),
                    status: 429,
                    details: "quota exhausted".to_string(),
                });
            }
            let mut vectors = self.inner.embed_documents(texts).await?;
            if self.drop_last_vector {
                vectors.pop();
            }
            Ok(vectors)
        }

        async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
            self.query_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_queries {
                return Err(ServiceError::BadStatus {
                    service: "test".to_string(),
                    status: 500,
                    details: "embedding backend down".to_string(),
                });
            }
            self.inner.embed_query(text).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{CountingEmbedder, TrigramEmbedder};
    use super::*;

    fn texts(count: usize) -> Vec<String> {
        (0..count).map(|index| format!("ribosome fragment {index}")).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn batches_preserve_count_and_order() -> Result<(), ServiceError> {
        let embedder = CountingEmbedder::default();
        let inputs = texts(250);

        let vectors = embed_in_batches(&embedder, &inputs, BatchOptions::default()).await?;

        assert_eq!(vectors.len(), 250);
        assert_eq!(embedder.document_calls(), 3);
        let reference = TrigramEmbedder::default();
        assert_eq!(vectors[0], reference.embed(&inputs[0]));
        assert_eq!(vectors[137], reference.embed(&inputs[137]));
        assert_eq!(vectors[249], reference.embed(&inputs[249]));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn failing_batch_aborts_the_run() {
        let embedder = CountingEmbedder::failing_on(2);
        let result = embed_in_batches(&embedder, &texts(250), BatchOptions::default()).await;

        assert!(matches!(result, Err(ServiceError::BatchFailed { batch: 2, .. })));
        assert_eq!(embedder.document_calls(), 2);
    }

    #[tokio::test]
    async fn short_response_is_a_count_mismatch() {
        let embedder = CountingEmbedder {
            drop_last_vector: true,
            ..CountingEmbedder::default()
        };
        let options = BatchOptions {
            batch_size: 10,
            delay: Duration::ZERO,
        };

        let result = embed_in_batches(&embedder, &texts(4), options).await;
        assert!(matches!(
            result,
            Err(ServiceError::CountMismatch {
                texts: 4,
                vectors: 3
            })
        ));
    }

    #[tokio::test]
    async fn empty_input_makes_no_calls() -> Result<(), ServiceError> {
        let embedder = CountingEmbedder::default();
        let vectors = embed_in_batches(&embedder, &[], BatchOptions::default()).await?;
        assert!(vectors.is_empty());
        assert_eq!(embedder.document_calls(), 0);
        Ok(())
    }
}
