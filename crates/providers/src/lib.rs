//! Provider abstractions for embeddings and chat generation.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

pub mod ollama;
pub mod openai;
pub mod seeded;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    RequestFailed(String),
    #[error("bad response: {0}")]
    BadResponse(String),
    #[error("provider not configured: {0}")]
    NotConfigured(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedResponse {
    pub vectors: Vec<Vec<f32>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Sampling controls passed through to the chat backend.
#[derive(Debug, Clone, Copy)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            max_tokens: 800,
        }
    }
}

#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<EmbedResponse, ProviderError>;
}

#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        options: GenerationOptions,
    ) -> Result<String, ProviderError>;
}

/// An embedding backend registered under a name, with the largest batch it accepts.
#[derive(Clone)]
pub struct EmbeddingBackend {
    pub name: String,
    pub provider: Arc<dyn EmbeddingProvider>,
    pub batch_size: usize,
}

/// Ordered set of backends. Registration order is priority order.
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    embeddings: Vec<EmbeddingBackend>,
    llms: Vec<(String, Arc<dyn LlmProvider>)>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_embedding(
        mut self,
        name: &str,
        provider: Arc<dyn EmbeddingProvider>,
        batch_size: usize,
    ) -> Self {
        self.embeddings.push(EmbeddingBackend {
            name: name.to_string(),
            provider,
            batch_size: batch_size.max(1),
        });
        self
    }

    pub fn with_llm(mut self, name: &str, provider: Arc<dyn LlmProvider>) -> Self {
        self.llms.push((name.to_string(), provider));
        self
    }

    pub fn embeddings(&self) -> &[EmbeddingBackend] {
        &self.embeddings
    }

    pub fn embedding_names(&self) -> Vec<&str> {
        self.embeddings.iter().map(|b| b.name.as_str()).collect()
    }

    /// First registered chat backend.
    pub fn llm(&self) -> Result<(&str, Arc<dyn LlmProvider>), ProviderError> {
        self.llms
            .first()
            .map(|(name, p)| (name.as_str(), p.clone()))
            .ok_or_else(|| ProviderError::NotConfigured("no llm provider configured".into()))
    }
}

/// Scale `v` to unit length. Zero vectors stay zero.
pub fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt() + 1e-12;
    for x in v.iter_mut() {
        *x /= norm;
    }
}
