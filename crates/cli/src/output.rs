use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use review_core::models::Report;
use review_core::retrieval::RetrievedContext;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

/// Human-readable report: header counts, then one block per document.
pub fn render_report(report: &Report) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "process: {}", report.process);
    let _ = writeln!(
        out,
        "documents uploaded: {}, required: {}",
        report.documents_uploaded, report.required_documents
    );
    if report.missing_documents.is_empty() {
        let _ = writeln!(out, "missing documents: none");
    } else {
        let _ = writeln!(out, "missing documents:");
        for doc in &report.missing_documents {
            let _ = writeln!(out, "  - {}", doc);
        }
    }
    for file in &report.files {
        let _ = writeln!(
            out,
            "\n{} [{} {:.2}] {} issue(s)",
            file.file,
            file.doc_type,
            file.confidence,
            file.issues.len()
        );
        for issue in &file.issues {
            let section = if issue.section_hint.is_empty() {
                String::new()
            } else {
                format!(" ({})", issue.section_hint)
            };
            let _ = writeln!(out, "  [{}]{} {}", issue.severity, section, issue.issue);
            if !issue.suggestion.is_empty() {
                let _ = writeln!(out, "      suggestion: {}", issue.suggestion);
            }
            if !issue.citation.is_empty() {
                let _ = writeln!(out, "      citation: {}", issue.citation);
            }
        }
        if !file.degraded_detectors.is_empty() {
            let _ = writeln!(out, "  skipped: {}", file.degraded_detectors.join(", "));
        }
    }
    if report.degraded {
        let _ = writeln!(out, "\nwarning: some detectors failed, findings may be incomplete");
    }
    out
}

pub fn render_hits(hits: &[RetrievedContext]) -> String {
    let mut out = String::new();
    for (i, hit) in hits.iter().enumerate() {
        let source = Path::new(&hit.source)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| hit.source.clone());
        let snippet: String = hit.text.chars().take(160).collect();
        let _ = writeln!(
            out,
            "{}. {:.4} {}\n   {}",
            i + 1,
            hit.score,
            source,
            snippet.replace('\n', " ")
        );
    }
    out
}

pub fn report_file_name(at: DateTime<Utc>) -> String {
    format!("review-{}.json", at.format("%Y%m%dT%H%M%SZ"))
}

/// Write the report as pretty JSON under `dir`, creating it if needed.
pub fn save_report(report: &Report, dir: &Path, at: DateTime<Utc>) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    let path = dir.join(report_file_name(at));
    let body = serde_json::to_string_pretty(report)?;
    fs::write(&path, body).with_context(|| format!("write {}", path.display()))?;
    Ok(path)
}
