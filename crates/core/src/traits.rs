use crate::ServiceError;
use async_trait::async_trait;

#[async_trait]
pub trait Embedder: Send + Sync {
    fn model(&self) -> &str;

    /// One vector per input text, in input order.
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ServiceError>;

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ServiceError>;
}

#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, ServiceError>;
}

#[async_trait]
pub trait CredentialCheck: Send + Sync {
    async fn validate_credential(&self) -> Result<(), ServiceError>;
}
