//! Embedding backend selection.
//!
//! Backends are tried in registry order; the first one that embeds the whole
//! input wins. Any failure moves on to the next backend, and the seeded
//! generator at the end of the chain always succeeds, so callers never see a
//! provider error.

use providers::seeded::SeededEmbeddings;
use providers::{l2_normalize, EmbeddingBackend, EmbeddingProvider, ProviderError, ProviderRegistry};
use tracing::{debug, warn};

pub const FALLBACK_BACKEND: &str = "seeded";

/// Vectors from one `embed` call, all produced by the same backend.
#[derive(Debug, Clone)]
pub struct Embedded {
    pub backend: String,
    pub dims: usize,
    pub vectors: Vec<Vec<f32>>,
}

pub struct EmbeddingChain {
    registry: ProviderRegistry,
    fallback: SeededEmbeddings,
}

impl EmbeddingChain {
    pub fn new(registry: ProviderRegistry, fallback: SeededEmbeddings) -> Self {
        Self { registry, fallback }
    }

    /// Chain with no remote backends: every call uses the seeded generator.
    pub fn offline(seed: u64, dims: usize) -> Self {
        Self::new(ProviderRegistry::new(), SeededEmbeddings::new(seed, dims))
    }

    pub fn backend_names(&self) -> Vec<&str> {
        let mut names = self.registry.embedding_names();
        names.push(FALLBACK_BACKEND);
        names
    }

    /// One unit-length vector per input text, in input order.
    pub async fn embed(&self, texts: &[String]) -> Embedded {
        if texts.is_empty() {
            return Embedded {
                backend: FALLBACK_BACKEND.to_string(),
                dims: self.fallback.dims(),
                vectors: Vec::new(),
            };
        }
        for backend in self.registry.embeddings() {
            match embed_batched(backend, texts).await {
                Ok(vectors) => {
                    debug!(backend = %backend.name, count = vectors.len(), "embedded");
                    let dims = vectors.first().map(Vec::len).unwrap_or_default();
                    return Embedded {
                        backend: backend.name.clone(),
                        dims,
                        vectors,
                    };
                }
                Err(e) => {
                    warn!(backend = %backend.name, error = %e, "embedding backend failed, trying next");
                }
            }
        }
        debug!(count = texts.len(), "using seeded fallback embeddings");
        Embedded {
            backend: FALLBACK_BACKEND.to_string(),
            dims: self.fallback.dims(),
            vectors: self.fallback.generate(texts.len()),
        }
    }

    pub async fn embed_one(&self, text: &str) -> Embedded {
        self.embed(&[text.to_string()]).await
    }
}

async fn embed_batched(
    backend: &EmbeddingBackend,
    texts: &[String],
) -> Result<Vec<Vec<f32>>, ProviderError> {
    let mut vectors = Vec::with_capacity(texts.len());
    for batch in texts.chunks(backend.batch_size) {
        let resp = backend.provider.embed(batch).await?;
        if resp.vectors.len() != batch.len() {
            return Err(ProviderError::BadResponse(format!(
                "expected {} vectors, got {}",
                batch.len(),
                resp.vectors.len()
            )));
        }
        vectors.extend(resp.vectors);
    }
    let dims = vectors.first().map(Vec::len).unwrap_or_default();
    if dims == 0 || vectors.iter().any(|v| v.len() != dims) {
        return Err(ProviderError::BadResponse(
            "empty or mixed-dimension vectors".into(),
        ));
    }
    for v in vectors.iter_mut() {
        l2_normalize(v);
    }
    Ok(vectors)
}

/// Whether a model name designates an embedding model served by Ollama.
pub fn is_ollama_embedding_model(model: &str) -> bool {
    model.starts_with("ollama:") || model.contains("embed") || model.contains("nomic")
}

#[cfg(test)]
mod tests {
    use super::*;
    use providers::EmbedResponse;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Failing;

    #[async_trait::async_trait]
    impl EmbeddingProvider for Failing {
        async fn embed(&self, _texts: &[String]) -> Result<EmbedResponse, ProviderError> {
            Err(ProviderError::RequestFailed("connection refused".into()))
        }
    }

    #[derive(Default)]
    struct Counting {
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl EmbeddingProvider for Counting {
        async fn embed(&self, texts: &[String]) -> Result<EmbedResponse, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(EmbedResponse {
                vectors: texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect(),
            })
        }
    }

    fn texts(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("text {}", i)).collect()
    }

    #[tokio::test]
    async fn failing_backend_falls_through_to_seeded() {
        let reg = ProviderRegistry::new().with_embedding("remote", Arc::new(Failing), 64);
        let chain = EmbeddingChain::new(reg, SeededEmbeddings::new(42, 384));
        let out = chain.embed(&texts(3)).await;
        assert_eq!(out.backend, FALLBACK_BACKEND);
        assert_eq!(out.dims, 384);
        assert_eq!(out.vectors.len(), 3);
    }

    #[tokio::test]
    async fn first_working_backend_wins_and_batches() {
        let counting = Arc::new(Counting::default());
        let reg = ProviderRegistry::new()
            .with_embedding("down", Arc::new(Failing), 64)
            .with_embedding("up", counting.clone(), 2);
        let chain = EmbeddingChain::new(reg, SeededEmbeddings::new(42, 384));
        let out = chain.embed(&texts(5)).await;
        assert_eq!(out.backend, "up");
        assert_eq!(out.dims, 2);
        assert_eq!(counting.calls.load(Ordering::SeqCst), 3);
        for v in &out.vectors {
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            assert!((norm - 1.0).abs() < 1e-5);
        }
    }

    #[tokio::test]
    async fn offline_chain_is_reproducible() {
        let chain = EmbeddingChain::offline(42, 384);
        let a = chain.embed(&texts(4)).await;
        let b = chain.embed(&texts(4)).await;
        assert_eq!(a.vectors, b.vectors);
    }

    #[test]
    fn ollama_model_detection() {
        assert!(is_ollama_embedding_model("ollama:nomic-embed-text"));
        assert!(is_ollama_embedding_model("mxbai-embed-large"));
        assert!(!is_ollama_embedding_model("llama3.1"));
    }
}
