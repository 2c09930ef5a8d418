//! In-memory vector index over reference-corpus chunks.
//!
//! Vectors are unit length, so the inner product is the cosine similarity.
//! Search is a linear scan; corpora are expected to be small.

use crate::chunker::{Chunker, ChunkerConfig};
use crate::embeddings::EmbeddingChain;
use crate::extractor::TextExtractor;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use storage::models::{Chunk, ChunkMeta, IndexSnapshot};
use storage::ArtifactStore;
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("reference directory not found: {0}")]
    CorpusNotFound(PathBuf),
    #[error("query has {query} dimensions but the index ({backend}) holds {index}")]
    DimensionMismatch {
        query: usize,
        index: usize,
        backend: String,
    },
}

#[derive(Debug, Clone)]
pub struct CorpusOptions {
    pub include: Vec<String>,
    pub chunking: ChunkerConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    /// Insertion position of the chunk in the index.
    pub position: usize,
    pub score: f32,
    pub text: String,
    pub meta: ChunkMeta,
}

#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    backend: String,
    dims: usize,
    vectors: Vec<Vec<f32>>,
    chunks: Vec<Chunk>,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assemble an index from aligned vectors and chunks.
    pub fn from_parts(
        backend: impl Into<String>,
        vectors: Vec<Vec<f32>>,
        chunks: Vec<Chunk>,
    ) -> anyhow::Result<Self> {
        anyhow::ensure!(
            vectors.len() == chunks.len(),
            "{} vectors for {} chunks",
            vectors.len(),
            chunks.len()
        );
        let dims = vectors.first().map(Vec::len).unwrap_or_default();
        anyhow::ensure!(
            vectors.iter().all(|v| v.len() == dims),
            "vectors of mixed dimension"
        );
        Ok(Self {
            backend: backend.into(),
            dims,
            vectors,
            chunks,
        })
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn backend(&self) -> &str {
        &self.backend
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn vectors(&self) -> &[Vec<f32>] {
        &self.vectors
    }

    /// Rebuild from every eligible file under `dir`. The current contents are
    /// replaced in one assignment, and only when the corpus produced at least
    /// one chunk. Returns the number of chunks indexed.
    pub async fn build_from_corpus(
        &mut self,
        dir: &Path,
        opts: &CorpusOptions,
        extractor: &dyn TextExtractor,
        embedder: &EmbeddingChain,
    ) -> anyhow::Result<usize> {
        if !dir.is_dir() {
            return Err(IndexError::CorpusNotFound(dir.to_path_buf()).into());
        }
        let include = build_globset(&opts.include)?;
        let chunker = Chunker::new(opts.chunking);

        let mut files: Vec<PathBuf> = WalkDir::new(dir)
            .follow_links(true)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| p.file_name().map(|n| include.is_match(n)).unwrap_or(false))
            .collect();
        files.sort();

        let mut chunks = Vec::new();
        for file in &files {
            let extracted = extractor.extract(file);
            if extracted.text.trim().is_empty() {
                debug!(path = %file.display(), "no text, skipping");
                continue;
            }
            let source = file.to_string_lossy().into_owned();
            for (i, text) in chunker.split(&extracted.text).into_iter().enumerate() {
                let meta = ChunkMeta::new(source.clone(), i)
                    .with("type", extracted.kind.as_str())
                    .with("chunk_id", blake3::hash(text.as_bytes()).to_hex().to_string());
                chunks.push(Chunk { text, meta });
            }
        }
        if chunks.is_empty() {
            info!(dir = %dir.display(), files = files.len(), "corpus produced no chunks");
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embedded = embedder.embed(&texts).await;
        let built = Self::from_parts(embedded.backend, embedded.vectors, chunks)?;
        info!(
            files = files.len(),
            chunks = built.len(),
            backend = %built.backend,
            dims = built.dims,
            "index built"
        );
        let count = built.len();
        *self = built;
        Ok(count)
    }

    pub fn persist(&self, store: &ArtifactStore) -> anyhow::Result<()> {
        store.write(&IndexSnapshot {
            backend: self.backend.clone(),
            dims: self.dims,
            vectors: self.vectors.clone(),
            chunks: self.chunks.clone(),
        })?;
        Ok(())
    }

    /// Load persisted artifacts. `None` when they are absent or incomplete.
    pub fn load(store: &ArtifactStore) -> anyhow::Result<Option<Self>> {
        match store.read()? {
            Some(snap) => {
                let index = Self::from_parts(snap.backend, snap.vectors, snap.chunks)?;
                if index.dims != snap.dims && !index.is_empty() {
                    anyhow::bail!("vector artifact header says {} dims, rows have {}", snap.dims, index.dims);
                }
                Ok(Some(index))
            }
            None => Ok(None),
        }
    }

    /// Top-`k` chunks by inner product with `query`, best first. Equal scores
    /// keep insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, IndexError> {
        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.dims {
            return Err(IndexError::DimensionMismatch {
                query: query.len(),
                index: self.dims,
                backend: self.backend.clone(),
            });
        }
        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .map(|v| dot(v, query))
            .enumerate()
            .collect();
        // Stable sort: ties stay in insertion order.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);
        Ok(scored
            .into_iter()
            .map(|(i, score)| SearchHit {
                position: i,
                score,
                text: self.chunks[i].text.clone(),
                meta: self.chunks[i].meta.clone(),
            })
            .collect())
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn build_globset(patterns: &[String]) -> anyhow::Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        builder.add(GlobBuilder::new(pat).case_insensitive(true).build()?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(text: &str, i: usize) -> Chunk {
        Chunk {
            text: text.to_string(),
            meta: ChunkMeta::new("ref/doc.md", i),
        }
    }

    fn index() -> VectorIndex {
        VectorIndex::from_parts(
            "test",
            vec![
                vec![1.0, 0.0],
                vec![0.0, 1.0],
                vec![1.0, 0.0],
                vec![0.6, 0.8],
            ],
            vec![chunk("a", 0), chunk("b", 1), chunk("c", 2), chunk("d", 3)],
        )
        .unwrap()
    }

    #[test]
    fn empty_index_returns_nothing() {
        let idx = VectorIndex::new();
        assert!(idx.search(&[1.0, 0.0], 5).unwrap().is_empty());
        assert!(idx.search(&[], 5).unwrap().is_empty());
    }

    #[test]
    fn results_are_sorted_and_ties_keep_insertion_order() {
        let hits = index().search(&[1.0, 0.0], 3).unwrap();
        let order: Vec<usize> = hits.iter().map(|h| h.position).collect();
        assert_eq!(order, vec![0, 2, 3]);
        assert!((hits[2].score - 0.6).abs() < 1e-6);
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn never_returns_more_than_k() {
        assert_eq!(index().search(&[0.0, 1.0], 2).unwrap().len(), 2);
        assert_eq!(index().search(&[0.0, 1.0], 10).unwrap().len(), 4);
        assert!(index().search(&[0.0, 1.0], 0).unwrap().is_empty());
    }

    #[test]
    fn dimension_mismatch_is_an_error() {
        let err = index().search(&[1.0, 0.0, 0.0], 1).unwrap_err();
        assert!(matches!(err, IndexError::DimensionMismatch { query: 3, index: 2, .. }));
    }

    #[test]
    fn misaligned_parts_are_rejected() {
        assert!(VectorIndex::from_parts("x", vec![vec![1.0]], vec![]).is_err());
    }
}
