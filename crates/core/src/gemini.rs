use crate::traits::{CredentialCheck, Embedder, Generator};
use crate::ServiceError;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/";
pub const DEFAULT_EMBEDDING_MODEL: &str = "models/embedding-001";
pub const DEFAULT_GENERATIVE_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

const SERVICE: &str = "gemini";

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    pub embedding_model: String,
    pub generative_model: String,
    pub timeout: Duration,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            generative_model: DEFAULT_GENERATIVE_MODEL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// REST client for the Gemini embedding and generation endpoints.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: Url,
    embedding_model: String,
    generative_model: String,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    RetrievalDocument,
    RetrievalQuery,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest<'a> {
    model: &'a str,
    content: Content<'a>,
    task_type: TaskType,
}

#[derive(Debug, Serialize)]
struct BatchEmbedContentsRequest<'a> {
    requests: Vec<EmbedContentRequest<'a>>,
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct EmbedContentResponse {
    embedding: ContentEmbedding,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedContentsResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self, ServiceError> {
        let api_key = config.api_key.trim();
        if api_key.is_empty() {
            return Err(ServiceError::InvalidCredential(
                "no API key was supplied".to_string(),
            ));
        }

        let header = HeaderValue::from_str(api_key).map_err(|error| {
            ServiceError::InvalidCredential(format!("API key is not a valid header value: {error}"))
        })?;
        let headers = HeaderMap::from_iter([(HeaderName::from_static("x-goog-api-key"), header)]);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        let mut base = config.base_url;
        if !base.ends_with('/') {
            base.push('/');
        }

        Ok(Self {
            client,
            base_url: Url::parse(&base)?,
            embedding_model: qualified_model(&config.embedding_model),
            generative_model: qualified_model(&config.generative_model),
        })
    }

    fn model_url(&self, model: &str, method: &str) -> Result<Url, ServiceError> {
        Ok(self.base_url.join(&format!("{model}:{method}"))?)
    }

    fn embed_request<'a>(&'a self, text: &'a str, task_type: TaskType) -> EmbedContentRequest<'a> {
        EmbedContentRequest {
            model: &self.embedding_model,
            content: Content {
                parts: vec![Part { text }],
            },
            task_type,
        }
    }

    async fn post_json<T: Serialize + ?Sized>(
        &self,
        url: Url,
        body: &T,
    ) -> Result<Value, ServiceError> {
        let response = self.client.post(url).json(body).send().await?;
        let response = check_response(response).await?;
        Ok(response.json().await?)
    }
}

async fn check_response(response: Response) -> Result<Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let details = response.text().await.unwrap_or_default();
    Err(ServiceError::BadStatus {
        service: SERVICE.to_string(),
        status: status.as_u16(),
        details,
    })
}

fn qualified_model(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{model}")
    }
}

fn malformed(details: impl Into<String>) -> ServiceError {
    ServiceError::MalformedResponse {
        service: SERVICE.to_string(),
        details: details.into(),
    }
}

fn parse_batch_embeddings(payload: Value) -> Result<Vec<Vec<f32>>, ServiceError> {
    let parsed: BatchEmbedContentsResponse = serde_json::from_value(payload)?;
    Ok(parsed
        .embeddings
        .into_iter()
        .map(|embedding| embedding.values)
        .collect())
}

fn parse_single_embedding(payload: Value) -> Result<Vec<f32>, ServiceError> {
    let parsed: EmbedContentResponse = serde_json::from_value(payload)?;
    if parsed.embedding.values.is_empty() {
        return Err(malformed("embedding has no values"));
    }
    Ok(parsed.embedding.values)
}

/// Concatenates the text parts of the first candidate.
fn parse_generated_text(payload: &Value) -> Result<String, ServiceError> {
    if let Some(reason) = payload
        .pointer("/promptFeedback/blockReason")
        .and_then(Value::as_str)
    {
        return Err(malformed(format!("prompt was blocked: {reason}")));
    }

    let parts = payload
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .ok_or_else(|| malformed("response has no candidate content"))?;

    let text = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect::<String>();

    if text.trim().is_empty() {
        return Err(malformed("candidate contained no text"));
    }
    Ok(text)
}

#[async_trait]
impl Embedder for GeminiClient {
    fn model(&self) -> &str {
        &self.embedding_model
    }

    #[instrument(skip_all, fields(batch.size = texts.len()))]
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ServiceError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = BatchEmbedContentsRequest {
            requests: texts
                .iter()
                .map(|text| self.embed_request(text, TaskType::RetrievalDocument))
                .collect(),
        };

        let url = self.model_url(&self.embedding_model, "batchEmbedContents")?;
        let vectors = parse_batch_embeddings(self.post_json(url, &request).await?)?;

        if vectors.len() != texts.len() {
            return Err(ServiceError::CountMismatch {
                texts: texts.len(),
                vectors: vectors.len(),
            });
        }
        Ok(vectors)
    }

    #[instrument(skip_all, fields(query.len = text.len()))]
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
        let request = self.embed_request(text, TaskType::RetrievalQuery);
        let url = self.model_url(&self.embedding_model, "embedContent")?;
        parse_single_embedding(self.post_json(url, &request).await?)
    }
}

#[async_trait]
impl Generator for GeminiClient {
    #[instrument(skip_all, fields(model = %self.generative_model, prompt.len = prompt.len()))]
    async fn generate(&self, prompt: &str) -> Result<String, ServiceError> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
        };

        let url = self.model_url(&self.generative_model, "generateContent")?;
        let payload = self.post_json(url, &request).await?;
        parse_generated_text(&payload)
    }
}

#[async_trait]
impl CredentialCheck for GeminiClient {
    /// Lists models. Only an authentication rejection marks the key invalid;
    /// outages and rate limits surface as ordinary service errors.
    async fn validate_credential(&self) -> Result<(), ServiceError> {
        let url = self.base_url.join("models")?;
        let response = self.client.get(url).send().await?;

        check_response(response)
            .await
            .map_err(credential_error)?;
        debug!("credential accepted");
        Ok(())
    }
}

fn credential_error(error: ServiceError) -> ServiceError {
    match error {
        ServiceError::BadStatus {
            status: status @ (400 | 401 | 403),
            details,
            ..
        } => ServiceError::InvalidCredential(format!(
            "service rejected the API key ({status}): {details}"
        )),
        other => other,
    }
}
