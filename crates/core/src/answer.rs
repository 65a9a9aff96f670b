use crate::locale::Language;
use crate::models::RetrievedContext;
use crate::traits::Generator;
use crate::ServiceError;
use tracing::error;

pub const APOLOGY_RESPONSE: &str = "Sorry, I encountered an error while generating the response.";
pub const NO_CONTEXT_RESPONSE: &str =
    "I couldn't find relevant information in the documents to answer your question.";

const DOMAIN: &str = "bioinformatics";

pub fn build_prompt(query: &str, context: &RetrievedContext, language: Option<Language>) -> String {
    let mut context_block = String::new();
    for chunk in &context.chunks {
        context_block.push_str(&format!(
            "Source: {}\nContent:\n{}\n\n---\n\n",
            chunk.metadata.source, chunk.chunk_text
        ));
    }

    let language_instruction = match language {
        Some(language) => format!("Write your answer in {}.\n", language.name()),
        None => String::new(),
    };

    format!(
        "You are a helpful assistant knowledgeable in {DOMAIN}, answering questions based on the provided text snippets.\n\
         Directly answer the question using *only* the information available in the text snippets below.\n\
         Do not use any prior knowledge.\n\
         If the answer is not found in the snippets, state that the information is not available in the provided documents.\n\
         {language_instruction}\n\
         Context from documents:\n\
         {context_block}\n\
         Question:\n\
         {query}\n\n\
         Answer:\n"
    )
}

/// `*Sources:*` line naming each contributing file once, sorted.
pub fn citation_trailer(context: &RetrievedContext) -> Option<String> {
    let sources = context.sources();
    if sources.is_empty() {
        None
    } else {
        Some(format!("\n\n*Sources:* {}", sources.join(", ")))
    }
}

/// Result of one generation call. A failed call still carries the text to
/// show, [`APOLOGY_RESPONSE`], next to the service error that caused it.
#[derive(Debug)]
pub struct Generation {
    pub text: String,
    pub failure: Option<ServiceError>,
}

impl Generation {
    pub fn is_answered(&self) -> bool {
        self.failure.is_none()
    }
}

/// One generation call; the answer carries the citation trailer.
/// Empty context short-circuits to the fixed no-information response.
pub async fn generate<G>(
    generator: &G,
    query: &str,
    context: &RetrievedContext,
    language: Option<Language>,
) -> Generation
where
    G: Generator + ?Sized,
{
    match try_generate(generator, query, context, language).await {
        Ok(text) => Generation {
            text,
            failure: None,
        },
        Err(source) => {
            error!(error = %source, "answer generation failed");
            Generation {
                text: APOLOGY_RESPONSE.to_string(),
                failure: Some(source),
            }
        }
    }
}

async fn try_generate<G>(
    generator: &G,
    query: &str,
    context: &RetrievedContext,
    language: Option<Language>,
) -> Result<String, ServiceError>
where
    G: Generator + ?Sized,
{
    if context.is_empty() {
        return Ok(NO_CONTEXT_RESPONSE.to_string());
    }

    let prompt = build_prompt(query, context, language);
    let mut answer = generator.generate(&prompt).await?;
    if let Some(trailer) = citation_trailer(context) {
        answer.push_str(&trailer);
    }
    Ok(answer)
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::traits::Generator;
    use crate::ServiceError;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    /// Records prompts and answers with a canned reply, or fails every call.
    #[derive(Debug, Clone, Default)]
    pub(crate) struct RecordingGenerator {
        pub(crate) prompts: Arc<Mutex<Vec<String>>>,
        pub(crate) fail: bool,
    }

    impl RecordingGenerator {
        pub(crate) fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        pub(crate) fn calls(&self) -> usize {
            self.prompts.lock().map(|prompts| prompts.len()).unwrap_or(0)
        }

        pub(crate) fn last_prompt(&self) -> Option<String> {
            self.prompts
                .lock()
                .ok()
                .and_then(|prompts| prompts.last().cloned())
        }
    }

    #[async_trait]
    impl Generator for RecordingGenerator {
        async fn generate(&self, prompt: &str) -> Result<String, ServiceError> {
            if let Ok(mut prompts) = self.prompts.lock() {
                prompts.push(prompt.to_string());
            }
            if self.fail {
                return Err(ServiceError::BadStatus {
                    service: "test".to_string(),
                    status: 503,
                    details: "unavailable".to_string(),
                });
            }
            Ok("A codon is a triplet of nucleotides.".to_string())
        }
    }
}
