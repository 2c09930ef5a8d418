//! Review orchestration: per-document detector fan-in and the checklist gap.

use crate::checklist::{missing_documents, Checklist, IncorporationChecklist};
use crate::classifier::{DocumentClassifier, PatternClassifier};
use crate::config::AppConfig;
use crate::detectors::{Detector, GenerativeDetector, PatternDetector, TemplateDetector};
use crate::embeddings::{is_ollama_embedding_model, EmbeddingChain};
use crate::extractor::{FsExtractor, TextExtractor};
use crate::models::{DocumentAnalysis, Report, UploadedDocument};
use crate::retrieval::Retriever;
use crate::rules::load_rules_from_dir;
use anyhow::Context;
use providers::ollama::{OllamaConfig, OllamaProvider};
use providers::openai::{OpenAiConfig, OpenAiProvider};
use providers::seeded::SeededEmbeddings;
use providers::{GenerationOptions, ProviderRegistry};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct Reviewer {
    classifier: Arc<dyn DocumentClassifier>,
    checklist: Arc<dyn Checklist>,
    detectors: Vec<Arc<dyn Detector>>,
}

impl Reviewer {
    /// `detectors` run in the given order and their issues are concatenated in
    /// that order.
    pub fn new(
        classifier: Arc<dyn DocumentClassifier>,
        checklist: Arc<dyn Checklist>,
        detectors: Vec<Arc<dyn Detector>>,
    ) -> Self {
        Self {
            classifier,
            checklist,
            detectors,
        }
    }

    pub fn detector_names(&self) -> Vec<&'static str> {
        self.detectors.iter().map(|d| d.name()).collect()
    }

    pub async fn analyze_document(&self, doc: &UploadedDocument) -> DocumentAnalysis {
        let file = doc.file_name();
        let outcome = self.classifier.classify(&doc.path, &doc.text);
        debug!(file = %file, doc_type = %outcome.label, "classified");

        let mut issues = Vec::new();
        let mut degraded_detectors = Vec::new();
        for detector in &self.detectors {
            match detector.detect(&doc.text, &outcome.label).await {
                Ok(found) => issues.extend(found),
                Err(e) => {
                    warn!(file = %file, detector = detector.name(), error = %e, "detector failed");
                    degraded_detectors.push(detector.name().to_string());
                }
            }
        }

        DocumentAnalysis {
            file,
            doc_type: outcome.label,
            confidence: outcome.confidence,
            issues,
            degraded_detectors,
        }
    }

    /// Analyze every document in submission order and assemble the report.
    pub async fn review(&self, docs: &[UploadedDocument]) -> Report {
        let mut files = Vec::with_capacity(docs.len());
        for doc in docs {
            files.push(self.analyze_document(doc).await);
        }

        let detected: Vec<String> = files.iter().map(|f| f.doc_type.clone()).collect();
        let process = self.checklist.infer_process(&detected);
        let required = self.checklist.required_documents(&process);
        let missing = missing_documents(&required, &detected);
        let degraded = files.iter().any(|f| !f.degraded_detectors.is_empty());
        info!(
            process = %process,
            documents = docs.len(),
            missing = missing.len(),
            degraded,
            "review complete"
        );

        Report {
            process,
            documents_uploaded: docs.len(),
            required_documents: required.len(),
            missing_documents: missing,
            files,
            degraded,
        }
    }
}

/// Everything a review session needs, wired from one configuration.
pub struct ReviewServices {
    pub extractor: Arc<dyn TextExtractor>,
    pub embedder: Arc<EmbeddingChain>,
    pub retriever: Arc<Retriever>,
    pub reviewer: Reviewer,
}

pub fn build_services(config: &AppConfig) -> anyhow::Result<ReviewServices> {
    let registry = build_registry(config);
    let extractor: Arc<dyn TextExtractor> = Arc::new(FsExtractor);
    let embedder = Arc::new(EmbeddingChain::new(
        registry.clone(),
        SeededEmbeddings::new(config.embeddings.fallback_seed, config.embeddings.fallback_dims),
    ));
    let retriever = Arc::new(Retriever::new(config, embedder.clone(), extractor.clone()));

    let extra_rules = match &config.rules.path {
        Some(dir) => load_rules_from_dir(Path::new(dir)).context("load pattern rules")?,
        None => Vec::new(),
    };
    let template = Arc::new(TemplateDetector::new()?);
    let patterns = Arc::new(PatternDetector::with_extra_rules(extra_rules)?);
    let llm = match registry.llm() {
        Ok((name, llm)) => {
            info!(backend = name, "chat backend selected");
            Some(llm)
        }
        Err(_) => {
            warn!("no chat backend configured, generative findings disabled");
            None
        }
    };
    let generative = Arc::new(GenerativeDetector::new(
        retriever.clone(),
        llm,
        GenerationOptions {
            temperature: config.generation.temperature,
            max_tokens: config.generation.max_tokens,
        },
        config.retrieval.top_k,
    ));

    let detectors: Vec<Arc<dyn Detector>> = vec![template, patterns, generative];
    let reviewer = Reviewer::new(
        Arc::new(PatternClassifier::new()?),
        Arc::new(IncorporationChecklist),
        detectors,
    );

    Ok(ReviewServices {
        extractor,
        embedder,
        retriever,
        reviewer,
    })
}

/// Register remote backends in priority order. At most one embedding backend
/// is registered: OpenAI when a key is set, else Ollama when an endpoint is set
/// and the model is an embedding model.
pub fn build_registry(config: &AppConfig) -> ProviderRegistry {
    let mut reg = ProviderRegistry::new();
    let timeout = Duration::from_secs(config.generation.timeout_secs.max(1));
    let model = config.embedding_model();

    if let Some(key) = &config.openai.api_key {
        let provider = OpenAiProvider::new(OpenAiConfig {
            api_key: key.clone(),
            base_url: config.openai.base_url.clone(),
            embedding_model: model.clone(),
            chat_model: config.openai.chat_model.clone(),
            timeout,
        });
        reg = reg
            .with_embedding("openai", Arc::new(provider.clone()), config.embeddings.batch_size)
            .with_llm("openai", Arc::new(provider));
    }

    if let Some(base) = &config.ollama.base_url {
        let provider = OllamaProvider::new(OllamaConfig {
            base_url: base.clone(),
            embedding_model: model.trim_start_matches("ollama:").to_string(),
            chat_model: config.ollama.chat_model.clone(),
            timeout,
        });
        if config.openai.api_key.is_none() && is_ollama_embedding_model(&model) {
            reg = reg.with_embedding("ollama", Arc::new(provider.clone()), config.embeddings.batch_size);
        }
        reg = reg.with_llm("ollama", Arc::new(provider));
    }

    reg
}

/// Extract every path into an uploaded document, keeping the given order.
pub fn load_documents(extractor: &dyn TextExtractor, paths: &[PathBuf]) -> Vec<UploadedDocument> {
    paths
        .iter()
        .map(|p| UploadedDocument::new(p.clone(), extractor.extract(p).text))
        .collect()
}
