//! Retrieval-augmented findings from a chat model.

use super::{Detector, DetectorError};
use crate::models::{Issue, Severity};
use crate::retrieval::{build_prompt, Retriever};
use providers::{ChatMessage, GenerationOptions, LlmProvider};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

const SYSTEM_PROMPT: &str = "Return only valid JSON array.";
const EXCERPT_CHARS: usize = 4000;

pub struct GenerativeDetector {
    retriever: Arc<Retriever>,
    llm: Option<Arc<dyn LlmProvider>>,
    options: GenerationOptions,
    top_k: usize,
}

impl GenerativeDetector {
    pub fn new(
        retriever: Arc<Retriever>,
        llm: Option<Arc<dyn LlmProvider>>,
        options: GenerationOptions,
        top_k: usize,
    ) -> Self {
        Self {
            retriever,
            llm,
            options,
            top_k,
        }
    }
}

pub fn retrieval_question(doc_type: &str) -> String {
    format!("Identify ADGM compliance red flags for a {} and cite rules.", doc_type)
}

pub fn task_description(doc_type: &str, text: &str) -> String {
    let excerpt: String = text.chars().take(EXCERPT_CHARS).collect();
    format!(
        "Document type: {}. Provide a short list of issues with citations and suggestions.\n\
         Use JSON with fields: section_hint, issue, severity (High/Medium/Low), suggestion, citation.\n\n\
         Document excerpt:\n{}",
        doc_type, excerpt
    )
}

#[async_trait::async_trait]
impl Detector for GenerativeDetector {
    fn name(&self) -> &'static str {
        "generative"
    }

    async fn detect(&self, text: &str, doc_type: &str) -> Result<Vec<Issue>, DetectorError> {
        let llm = self
            .llm
            .as_ref()
            .ok_or_else(|| DetectorError::Unavailable("no chat backend configured".into()))?;
        let contexts = self
            .retriever
            .retrieve(&retrieval_question(doc_type), self.top_k)
            .await
            .map_err(|e| DetectorError::Retrieval(format!("{:#}", e)))?;
        debug!(contexts = contexts.len(), doc_type, "retrieved context");
        let prompt = build_prompt(&task_description(doc_type, text), &contexts);
        let messages = [ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)];
        let output = llm.generate(&messages, self.options).await?;
        parse_issues(&output)
    }
}

/// Parse model output into issues. Accepts a JSON array of issue objects or
/// an object with an `issues` array, optionally inside a Markdown code fence.
pub fn parse_issues(raw: &str) -> Result<Vec<Issue>, DetectorError> {
    let body = strip_code_fence(raw);
    let value: Value =
        serde_json::from_str(body).map_err(|e| DetectorError::Parse(e.to_string()))?;
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("issues") {
            Some(Value::Array(items)) => items,
            _ => return Err(DetectorError::Parse("expected an array of issues".into())),
        },
        _ => return Err(DetectorError::Parse("expected an array of issues".into())),
    };
    Ok(items.iter().filter_map(normalize_issue).collect())
}

fn normalize_issue(item: &Value) -> Option<Issue> {
    let field = |key: &str| -> String {
        match item.get(key) {
            Some(Value::String(s)) => s.trim().to_string(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        }
    };
    if !item.is_object() {
        return None;
    }
    let issue = field("issue");
    if issue.is_empty() {
        return None;
    }
    let severity = Severity::parse_lenient(&field("severity"));
    Some(
        Issue::new(issue, severity)
            .section(field("section_hint"))
            .suggest(field("suggestion"))
            .cite(field("citation")),
    )
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. "json") on the opening line.
    let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}
