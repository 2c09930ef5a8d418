use crate::{l2_normalize, EmbedResponse, EmbeddingProvider, ProviderError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Offline stand-in that needs no model or network.
///
/// Every call reseeds the generator, so the output depends only on the number
/// of input texts: the i-th vector of any call is always the same. Retrieval
/// quality is meaningless, but the index stays buildable and reproducible.
#[derive(Debug, Clone)]
pub struct SeededEmbeddings {
    seed: u64,
    dims: usize,
}

impl SeededEmbeddings {
    pub fn new(seed: u64, dims: usize) -> Self {
        Self {
            seed,
            dims: dims.max(1),
        }
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn generate(&self, count: usize) -> Vec<Vec<f32>> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        (0..count)
            .map(|_| {
                let mut v: Vec<f32> = (0..self.dims).map(|_| rng.gen::<f32>()).collect();
                l2_normalize(&mut v);
                v
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for SeededEmbeddings {
    async fn embed(&self, texts: &[String]) -> Result<EmbedResponse, ProviderError> {
        Ok(EmbedResponse {
            vectors: self.generate(texts.len()),
        })
    }
}
