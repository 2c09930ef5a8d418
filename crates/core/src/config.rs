use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub embeddings: EmbeddingConfig,
    pub openai: OpenAiSection,
    pub ollama: OllamaSection,
    pub corpus: CorpusConfig,
    pub index: IndexConfig,
    pub retrieval: RetrievalConfig,
    pub generation: GenerationConfig,
    pub rules: RuleConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Unset means: pick from whichever backend is configured.
    pub model: Option<String>,
    pub batch_size: usize,
    pub fallback_dims: usize,
    pub fallback_seed: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: None,
            batch_size: 64,
            fallback_dims: 384,
            fallback_seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiSection {
    pub api_key: Option<String>,
    pub base_url: String,
    pub chat_model: String,
}

impl Default for OpenAiSection {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com".to_string(),
            chat_model: "gpt-4o-mini".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaSection {
    pub base_url: Option<String>,
    pub chat_model: String,
}

impl Default for OllamaSection {
    fn default() -> Self {
        Self {
            base_url: None,
            chat_model: "llama3.1".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusConfig {
    pub reference_dir: String,
    /// Glob allow-list, matched against file names.
    pub include: Vec<String>,
    /// Target chunk length in chars.
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            reference_dir: "./data/reference".to_string(),
            include: vec![
                "*.docx".to_string(),
                "*.pdf".to_string(),
                "*.md".to_string(),
                "*.txt".to_string(),
            ],
            chunk_size: 1200,
            chunk_overlap: 150,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Path prefix shared by the three index artifacts.
    pub path: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: "./data/vector".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub max_context_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 6,
            max_context_chars: 3000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            max_tokens: 700,
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleConfig {
    pub path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: "./outputs".to_string(),
        }
    }
}

impl AppConfig {
    /// Overlay the well-known environment variables.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("OPENAI_API_KEY") {
            self.openai.api_key = Some(v);
        }
        if let Some(v) = get("OPENAI_BASE_URL").or_else(|| get("OPENAI_API_BASE")) {
            self.openai.base_url = v;
        }
        if let Some(v) = get("OPENAI_MODEL") {
            self.openai.chat_model = v;
        }
        if let Some(v) = get("OLLAMA_BASE_URL") {
            self.ollama.base_url = Some(v);
        }
        if let Some(v) = get("OLLAMA_MODEL") {
            self.ollama.chat_model = v;
        }
        if let Some(v) = get("EMBEDDING_MODEL") {
            self.embeddings.model = Some(v);
        }
        if let Some(v) = get("VECTOR_DB_PATH") {
            self.index.path = v;
        }
        if let Some(v) = get("REFERENCE_DIR") {
            self.corpus.reference_dir = v;
        }
        if let Some(v) = get("OUTPUT_DIR") {
            self.output.dir = v;
        }
    }

    /// The embedding model in effect: explicit setting, else the default for
    /// whichever backend is available.
    pub fn embedding_model(&self) -> String {
        match &self.embeddings.model {
            Some(m) if !m.trim().is_empty() => m.trim().to_string(),
            _ if self.openai.api_key.is_some() => "text-embedding-3-small".to_string(),
            _ => "ollama:nomic-embed-text".to_string(),
        }
    }
}

pub fn load(path: Option<&str>) -> anyhow::Result<AppConfig> {
    let mut settings = config::Config::builder();
    if let Some(p) = path {
        settings = settings.add_source(config::File::with_name(p));
    } else {
        settings = settings.add_source(config::File::with_name("config/default").required(false));
    }
    let cfg = settings.build()?;
    let mut app: AppConfig = cfg.try_deserialize()?;
    app.apply_env(|k| std::env::var(k).ok());
    Ok(app)
}
