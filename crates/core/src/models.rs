use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Severity {
    #[serde(alias = "high", alias = "HIGH")]
    High,
    #[default]
    #[serde(alias = "medium", alias = "MEDIUM")]
    Medium,
    #[serde(alias = "low", alias = "LOW")]
    Low,
}

impl Severity {
    /// Case-insensitive parse; anything unrecognised is `Medium`.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Severity::High,
            "low" => Severity::Low,
            _ => Severity::Medium,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::High => "High",
            Severity::Medium => "Medium",
            Severity::Low => "Low",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    #[serde(default)]
    pub section_hint: String,
    pub issue: String,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub suggestion: String,
    #[serde(default)]
    pub citation: String,
}

impl Issue {
    pub fn new(issue: impl Into<String>, severity: Severity) -> Self {
        Self {
            section_hint: String::new(),
            issue: issue.into(),
            severity,
            suggestion: String::new(),
            citation: String::new(),
        }
    }

    pub fn section(mut self, hint: impl Into<String>) -> Self {
        self.section_hint = hint.into();
        self
    }

    pub fn suggest(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = suggestion.into();
        self
    }

    pub fn cite(mut self, citation: impl Into<String>) -> Self {
        self.citation = citation.into();
        self
    }
}

/// A document submitted for review, already reduced to text.
#[derive(Debug, Clone)]
pub struct UploadedDocument {
    pub path: PathBuf,
    pub text: String,
}

impl UploadedDocument {
    pub fn new(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
        }
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.to_string_lossy().into_owned())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentAnalysis {
    pub file: String,
    #[serde(rename = "type")]
    pub doc_type: String,
    pub confidence: f32,
    /// Format issues, then pattern issues, then generative issues.
    pub issues: Vec<Issue>,
    /// Detectors that failed for this document and contributed nothing.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub degraded_detectors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub process: String,
    pub documents_uploaded: usize,
    pub required_documents: usize,
    pub missing_documents: Vec<String>,
    pub files: Vec<DocumentAnalysis>,
    #[serde(default)]
    pub degraded: bool,
}
