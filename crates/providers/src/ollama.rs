//! Self-hosted Ollama backend. The embeddings endpoint takes one prompt per call.

use crate::{ChatMessage, EmbedResponse, EmbeddingProvider, GenerationOptions, LlmProvider, ProviderError};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct OllamaConfig {
    pub base_url: String,
    pub embedding_model: String,
    pub chat_model: String,
    pub timeout: Duration,
}

#[derive(Clone)]
pub struct OllamaProvider {
    client: Client,
    cfg: Arc<OllamaConfig>,
}

impl OllamaProvider {
    pub fn new(cfg: OllamaConfig) -> Self {
        let client = Client::builder()
            .timeout(cfg.timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            cfg: Arc::new(cfg),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/{}", self.cfg.base_url.trim_end_matches('/'), path)
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        #[derive(Serialize)]
        struct EmbeddingRequest<'a> {
            model: &'a str,
            prompt: &'a str,
        }
        #[derive(Deserialize)]
        struct EmbeddingData {
            embedding: Vec<f32>,
        }
        #[derive(Deserialize)]
        struct EmbeddingResponse {
            embedding: Option<Vec<f32>>,
            #[serde(default)]
            data: Vec<EmbeddingData>,
        }

        let resp = self
            .client
            .post(self.endpoint("embeddings"))
            .json(&EmbeddingRequest {
                model: &self.cfg.embedding_model,
                prompt: text,
            })
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(ProviderError::RequestFailed(format!(
                "embedding request failed: {}",
                resp.status()
            )));
        }
        let parsed: EmbeddingResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::BadResponse(e.to_string()))?;
        parsed
            .embedding
            .or_else(|| parsed.data.into_iter().next().map(|d| d.embedding))
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ProviderError::BadResponse("response missing 'embedding'".into()))
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for OllamaProvider {
    async fn embed(&self, texts: &[String]) -> Result<EmbedResponse, ProviderError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed_one(text).await?);
        }
        Ok(EmbedResponse { vectors })
    }
}

#[async_trait::async_trait]
impl LlmProvider for OllamaProvider {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        options: GenerationOptions,
    ) -> Result<String, ProviderError> {
        #[derive(Serialize)]
        struct ChatOptions {
            temperature: f32,
            num_predict: u32,
        }
        #[derive(Serialize)]
        struct ChatRequest<'a> {
            model: &'a str,
            messages: &'a [ChatMessage],
            stream: bool,
            options: ChatOptions,
        }
        #[derive(Deserialize)]
        struct ChatMessageResp {
            #[serde(default)]
            content: String,
        }
        #[derive(Deserialize)]
        struct ChatResponse {
            message: Option<ChatMessageResp>,
        }

        let body = ChatRequest {
            model: &self.cfg.chat_model,
            messages,
            stream: false,
            options: ChatOptions {
                temperature: options.temperature,
                num_predict: options.max_tokens,
            },
        };

        let resp = self
            .client
            .post(self.endpoint("chat"))
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(ProviderError::RequestFailed(format!(
                "chat request failed: {}",
                resp.status()
            )));
        }
        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::BadResponse(e.to_string()))?;
        Ok(parsed.message.map(|m| m.content).unwrap_or_default())
    }
}
