use providers::{
    ChatMessage, EmbedResponse, EmbeddingProvider, GenerationOptions, LlmProvider, ProviderError,
    ProviderRegistry,
};
use providers::seeded::SeededEmbeddings;
use review_core::checklist::IncorporationChecklist;
use review_core::classifier::PatternClassifier;
use review_core::config::AppConfig;
use review_core::detectors::{Detector, GenerativeDetector, PatternDetector, TemplateDetector};
use review_core::embeddings::EmbeddingChain;
use review_core::extractor::{FsExtractor, TextExtractor};
use review_core::models::{Severity, UploadedDocument};
use review_core::pipeline::Reviewer;
use review_core::retrieval::Retriever;
use review_core::chunker::ChunkerConfig;
use review_core::vectorstore::{CorpusOptions, IndexError, VectorIndex};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use storage::ArtifactStore;
use tempfile::tempdir;

fn write_corpus(dir: &Path) {
    fs::create_dir_all(dir.join("guidance")).unwrap();
    fs::write(
        dir.join("companies_regulations.txt"),
        "Every company incorporated in ADGM must file Articles of Association.\n\n\
         Disputes are heard by the ADGM Courts.",
    )
    .unwrap();
    fs::write(
        dir.join("guidance").join("ubo.md"),
        "# Beneficial ownership\n\nA UBO declaration is filed with the Registration Authority.",
    )
    .unwrap();
    fs::write(dir.join("scan.bin"), [0u8, 159, 146, 150]).unwrap();
}

fn config_for(root: &Path) -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.corpus.reference_dir = root.join("reference").to_string_lossy().into_owned();
    cfg.index.path = root.join("vector").join("index").to_string_lossy().into_owned();
    cfg
}

fn offline_retriever(cfg: &AppConfig) -> Arc<Retriever> {
    let extractor: Arc<dyn TextExtractor> = Arc::new(FsExtractor);
    Arc::new(Retriever::new(
        cfg,
        Arc::new(EmbeddingChain::offline(42, 384)),
        extractor,
    ))
}

fn reviewer(detectors: Vec<Arc<dyn Detector>>) -> Reviewer {
    Reviewer::new(
        Arc::new(PatternClassifier::new().unwrap()),
        Arc::new(IncorporationChecklist),
        detectors,
    )
}

/// Fails whenever the prompt carries the marker text, answers with one issue otherwise.
struct PickyLlm;

#[async_trait::async_trait]
impl LlmProvider for PickyLlm {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        _options: GenerationOptions,
    ) -> Result<String, ProviderError> {
        if messages.iter().any(|m| m.content.contains("REJECT-ME")) {
            return Err(ProviderError::RequestFailed("connection reset".into()));
        }
        Ok(r#"[{"section_hint": "Clause 2", "issue": "Quorum not stated", "severity": "low",
                "suggestion": "State the quorum", "citation": "Companies Regulations 2020"}]"#
            .to_string())
    }
}

struct ConstantEmbeddings(usize);

#[async_trait::async_trait]
impl EmbeddingProvider for ConstantEmbeddings {
    async fn embed(&self, texts: &[String]) -> Result<EmbedResponse, ProviderError> {
        Ok(EmbedResponse {
            vectors: texts.iter().map(|_| vec![1.0; self.0]).collect(),
        })
    }
}

#[tokio::test]
async fn index_is_built_once_and_reloaded() {
    let temp = tempdir().unwrap();
    write_corpus(&temp.path().join("reference"));
    let cfg = config_for(temp.path());

    let status = offline_retriever(&cfg).ensure_index().await.unwrap();
    assert!(status.chunks >= 2);
    assert_eq!(status.backend, "seeded");
    assert_eq!(status.dims, 384);

    let store = ArtifactStore::new(&cfg.index.path);
    assert!(store.is_complete());
    let loaded = VectorIndex::load(&store).unwrap().unwrap();
    assert_eq!(loaded.len(), status.chunks);
    assert!(loaded
        .chunks()
        .iter()
        .all(|c| !c.meta.source.ends_with("scan.bin")));
    assert!(loaded.chunks().iter().all(|c| c.meta.get_str("chunk_id").is_some()));

    // Same corpus, settings and embedder as the retriever: the reloaded index
    // must match it row for row.
    let opts = CorpusOptions {
        include: cfg.corpus.include.clone(),
        chunking: ChunkerConfig {
            chunk_size: cfg.corpus.chunk_size,
            chunk_overlap: cfg.corpus.chunk_overlap,
        },
    };
    let mut built = VectorIndex::new();
    built
        .build_from_corpus(
            &temp.path().join("reference"),
            &opts,
            &FsExtractor,
            &EmbeddingChain::offline(42, 384),
        )
        .await
        .unwrap();
    assert_eq!(loaded.backend(), built.backend());
    assert_eq!(loaded.dims(), built.dims());
    assert_eq!(loaded.chunks(), built.chunks());
    assert_eq!(loaded.vectors(), built.vectors());

    // A fresh retriever must pick up the persisted artifacts unchanged.
    fs::remove_dir_all(temp.path().join("reference")).unwrap();
    let again = offline_retriever(&cfg).ensure_index().await.unwrap();
    assert_eq!(again.chunks, status.chunks);
}

#[tokio::test]
async fn small_chunks_survive_persist_and_load_in_order() {
    let temp = tempdir().unwrap();
    let reference = temp.path().join("reference");
    write_corpus(&reference);
    let opts = CorpusOptions {
        include: AppConfig::default().corpus.include,
        chunking: ChunkerConfig {
            chunk_size: 40,
            chunk_overlap: 8,
        },
    };
    let mut built = VectorIndex::new();
    let count = built
        .build_from_corpus(&reference, &opts, &FsExtractor, &EmbeddingChain::offline(7, 16))
        .await
        .unwrap();
    assert!(count > 2);

    let store = ArtifactStore::new(temp.path().join("idx"));
    built.persist(&store).unwrap();
    let loaded = VectorIndex::load(&store).unwrap().unwrap();
    assert_eq!(loaded.len(), count);
    for (i, (chunk, vector)) in loaded.chunks().iter().zip(loaded.vectors()).enumerate() {
        assert_eq!(chunk, &built.chunks()[i]);
        assert_eq!(vector, &built.vectors()[i]);
    }
}

#[tokio::test]
async fn retrieval_respects_k_and_context_cap() {
    let temp = tempdir().unwrap();
    write_corpus(&temp.path().join("reference"));
    let mut cfg = config_for(temp.path());
    cfg.retrieval.max_context_chars = 20;
    let retriever = offline_retriever(&cfg);

    let hits = retriever.retrieve("Which court hears disputes?", 1).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert!(hits[0].text.chars().count() <= 20);

    let all = retriever.retrieve("Which court hears disputes?", 50).await.unwrap();
    assert!(all.windows(2).all(|w| w[0].score >= w[1].score));
    assert!(retriever.retrieve("anything", 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn missing_reference_dir_is_an_error() {
    let temp = tempdir().unwrap();
    let cfg = config_for(temp.path());
    let err = offline_retriever(&cfg).ensure_index().await.unwrap_err();
    assert!(err
        .chain()
        .any(|e| matches!(e.downcast_ref::<IndexError>(), Some(IndexError::CorpusNotFound(_)))));
    assert!(!ArtifactStore::new(&cfg.index.path).is_complete());
}

#[tokio::test]
async fn batch_lists_missing_documents_in_checklist_order() {
    let detectors: Vec<Arc<dyn Detector>> = vec![
        Arc::new(TemplateDetector::new().unwrap()),
        Arc::new(PatternDetector::new().unwrap()),
    ];
    let r = reviewer(detectors);
    let docs = vec![
        UploadedDocument::new("uploads/articles.docx", "ARTICLES OF ASSOCIATION of Example Ltd"),
        UploadedDocument::new("uploads/notes.txt", "Meeting notes, nothing formal."),
        UploadedDocument::new("uploads/letter.txt", "Dear Sir, please find enclosed."),
    ];
    let report = r.review(&docs).await;

    assert_eq!(report.process, "Company Incorporation");
    assert_eq!(report.documents_uploaded, 3);
    assert_eq!(report.required_documents, 8);
    assert_eq!(
        report.missing_documents,
        vec![
            "Memorandum of Association",
            "Board Resolution",
            "Shareholder Resolution",
            "Incorporation Application Form",
            "UBO Declaration",
            "Register of Members and Directors",
            "Change of Registered Address Notice",
        ]
    );
    let files: Vec<&str> = report.files.iter().map(|f| f.file.as_str()).collect();
    assert_eq!(files, vec!["articles.docx", "notes.txt", "letter.txt"]);
    assert_eq!(report.files[1].doc_type, "Unknown");
    assert!(!report.degraded);
}

#[tokio::test]
async fn generation_failure_is_isolated_to_one_document() {
    let temp = tempdir().unwrap();
    write_corpus(&temp.path().join("reference"));
    let cfg = config_for(temp.path());
    let template = Arc::new(TemplateDetector::new().unwrap());
    let patterns = Arc::new(PatternDetector::new().unwrap());
    let llm: Arc<dyn LlmProvider> = Arc::new(PickyLlm);
    let generative = Arc::new(GenerativeDetector::new(
        offline_retriever(&cfg),
        Some(llm),
        GenerationOptions::default(),
        3,
    ));
    let detectors: Vec<Arc<dyn Detector>> = vec![template.clone(), patterns.clone(), generative];
    let r = reviewer(detectors);

    let failing = "Articles of Association. REJECT-ME. Disputes go to the UAE Federal Courts. Signed by the Director.";
    let healthy = "Board Resolution of Example Ltd. Signature: ____";
    let report = r
        .review(&[
            UploadedDocument::new("a.txt", failing),
            UploadedDocument::new("b.txt", healthy),
        ])
        .await;

    let first = &report.files[0];
    let mut expected = template.check(failing);
    expected.extend(patterns.scan(failing));
    assert_eq!(first.issues, expected);
    assert_eq!(first.degraded_detectors, vec!["generative"]);

    let second = &report.files[1];
    assert!(second.degraded_detectors.is_empty());
    let last = second.issues.last().unwrap();
    assert_eq!(last.issue, "Quorum not stated");
    assert_eq!(last.severity, Severity::Low);
    assert!(report.degraded);
}

#[tokio::test]
async fn index_from_another_backend_degrades_generation() {
    let temp = tempdir().unwrap();
    write_corpus(&temp.path().join("reference"));
    let cfg = config_for(temp.path());

    let constant: Arc<dyn EmbeddingProvider> = Arc::new(ConstantEmbeddings(8));
    let remote = EmbeddingChain::new(
        ProviderRegistry::new().with_embedding("constant", constant, 16),
        SeededEmbeddings::new(42, 384),
    );
    let extractor: Arc<dyn TextExtractor> = Arc::new(FsExtractor);
    let built = Retriever::new(&cfg, Arc::new(remote), extractor);
    assert_eq!(built.ensure_index().await.unwrap().dims, 8);

    let llm: Arc<dyn LlmProvider> = Arc::new(PickyLlm);
    let generative = Arc::new(GenerativeDetector::new(
        offline_retriever(&cfg),
        Some(llm),
        GenerationOptions::default(),
        3,
    ));
    assert!(generative.detect("Board Resolution", "Board Resolution").await.is_err());

    let r = reviewer(vec![generative as Arc<dyn Detector>]);
    let report = r
        .review(&[UploadedDocument::new("b.txt", "Board Resolution")])
        .await;
    assert!(report.files[0].issues.is_empty());
    assert!(report.degraded);
}
