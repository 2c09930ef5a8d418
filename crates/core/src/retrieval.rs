//! Retrieval over the reference index and prompt assembly for generation.

use crate::chunker::ChunkerConfig;
use crate::config::AppConfig;
use crate::embeddings::EmbeddingChain;
use crate::extractor::TextExtractor;
use crate::vectorstore::{CorpusOptions, VectorIndex};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use storage::ArtifactStore;
use tokio::sync::RwLock;
use tracing::info;

pub const PROMPT_PREAMBLE: &str = "You are an expert ADGM corporate paralegal. Use only the provided context to assess compliance.\n\
Cite the exact regulation or the source document name where relevant.\n";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedContext {
    pub source: String,
    pub score: f32,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexStatus {
    pub chunks: usize,
    pub backend: String,
    pub dims: usize,
}

pub struct Retriever {
    reference_dir: PathBuf,
    corpus: CorpusOptions,
    max_context_chars: usize,
    store: ArtifactStore,
    embedder: Arc<EmbeddingChain>,
    extractor: Arc<dyn TextExtractor>,
    index: RwLock<VectorIndex>,
}

impl Retriever {
    pub fn new(
        config: &AppConfig,
        embedder: Arc<EmbeddingChain>,
        extractor: Arc<dyn TextExtractor>,
    ) -> Self {
        Self {
            reference_dir: PathBuf::from(&config.corpus.reference_dir),
            corpus: CorpusOptions {
                include: config.corpus.include.clone(),
                chunking: ChunkerConfig {
                    chunk_size: config.corpus.chunk_size,
                    chunk_overlap: config.corpus.chunk_overlap,
                },
            },
            max_context_chars: config.retrieval.max_context_chars,
            store: ArtifactStore::new(&config.index.path),
            embedder,
            extractor,
            index: RwLock::new(VectorIndex::new()),
        }
    }

    /// Make the index usable: keep what is in memory, else load the persisted
    /// artifacts, else build from the reference corpus and persist.
    pub async fn ensure_index(&self) -> anyhow::Result<IndexStatus> {
        {
            let index = self.index.read().await;
            if !index.is_empty() {
                return Ok(status_of(&index));
            }
        }
        let mut index = self.index.write().await;
        if index.is_empty() {
            match VectorIndex::load(&self.store).context("load index artifacts")? {
                Some(loaded) if !loaded.is_empty() => {
                    info!(chunks = loaded.len(), backend = %loaded.backend(), "index loaded");
                    *index = loaded;
                }
                _ => self.build_into(&mut index).await?,
            }
        }
        Ok(status_of(&index))
    }

    /// Rebuild from the reference corpus regardless of current state.
    pub async fn rebuild(&self) -> anyhow::Result<IndexStatus> {
        let mut index = self.index.write().await;
        self.build_into(&mut index).await?;
        Ok(status_of(&index))
    }

    async fn build_into(&self, index: &mut VectorIndex) -> anyhow::Result<()> {
        let count = index
            .build_from_corpus(
                &self.reference_dir,
                &self.corpus,
                self.extractor.as_ref(),
                &self.embedder,
            )
            .await
            .context("build index from reference corpus")?;
        if count > 0 {
            index.persist(&self.store).context("persist index")?;
        }
        Ok(())
    }

    /// Top-`k` reference passages for `question`, texts capped in length.
    pub async fn retrieve(&self, question: &str, k: usize) -> anyhow::Result<Vec<RetrievedContext>> {
        self.ensure_index().await?;
        let query = self.embedder.embed_one(question).await;
        let vector = query.vectors.into_iter().next().unwrap_or_default();
        let index = self.index.read().await;
        let hits = index.search(&vector, k)?;
        Ok(hits
            .into_iter()
            .map(|h| RetrievedContext {
                source: h.meta.source,
                score: h.score,
                text: truncate_chars(&h.text, self.max_context_chars),
            })
            .collect())
    }
}

fn status_of(index: &VectorIndex) -> IndexStatus {
    IndexStatus {
        chunks: index.len(),
        backend: index.backend().to_string(),
        dims: index.dims(),
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => text[..cut].to_string(),
        None => text.to_string(),
    }
}

/// Preamble, one labelled block per context, then the task. Labels use the
/// source file name only.
pub fn build_prompt(task: &str, contexts: &[RetrievedContext]) -> String {
    let blocks: Vec<String> = contexts
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let name = Path::new(&c.source)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| c.source.clone());
            format!("[Source {}: {}]\n{}", i + 1, name, c.text)
        })
        .collect();
    format!(
        "{}\n\n{}\n\nUser task:\n{}",
        PROMPT_PREAMBLE,
        blocks.join("\n\n"),
        task
    )
}
