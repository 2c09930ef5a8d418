//! Plain-text extraction from reference and uploaded documents.
//!
//! Extraction never fails: unreadable or unsupported content comes back as
//! empty text so callers can skip it.

use quick_xml::events::Event;
use quick_xml::Reader;
use std::fs;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub struct Extracted {
    pub text: String,
    /// Lowercase extension, or "text" when there is none.
    pub kind: String,
}

pub trait TextExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Extracted;
}

/// Reads documents from the local filesystem by extension.
#[derive(Debug, Default, Clone)]
pub struct FsExtractor;

impl TextExtractor for FsExtractor {
    fn extract(&self, path: &Path) -> Extracted {
        let kind = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| "text".to_string());
        let text = match kind.as_str() {
            "docx" => docx_text(path),
            "pdf" => pdf_text(path),
            _ => match fs::read(path) {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "unreadable file");
                    String::new()
                }
            },
        };
        Extracted { text, kind }
    }
}

/// Flatten a WordprocessingML body: text runs concatenated, one line per
/// paragraph, tabs kept. Table rows follow the body paragraphs, one line per
/// row with cells joined by tabs. Runs of three or more newlines collapse to two.
pub fn wordml_to_text(xml: &str) -> String {
    let mut reader = Reader::from_str(xml);
    let mut body = String::new();
    let mut rows: Vec<String> = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut cell = String::new();
    let mut depth = 0usize;
    let mut in_text = false;
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"w:t" => in_text = true,
                b"w:tbl" => depth += 1,
                b"w:tr" if depth == 1 => row.clear(),
                b"w:tc" if depth == 1 => cell.clear(),
                _ => {}
            },
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:tbl" => depth = depth.saturating_sub(1),
                b"w:tr" if depth == 1 => rows.push(row.join("\t")),
                b"w:tc" if depth == 1 => row.push(cell.trim_end_matches('\n').to_string()),
                b"w:p" if depth > 0 => cell.push('\n'),
                b"w:p" => body.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                let target = if depth > 0 { &mut cell } else { &mut body };
                match e.name().as_ref() {
                    b"w:tab" => target.push('\t'),
                    b"w:br" => target.push('\n'),
                    _ => {}
                }
            }
            Ok(Event::Text(t)) if in_text => {
                if let Ok(s) = t.unescape() {
                    let target = if depth > 0 { &mut cell } else { &mut body };
                    target.push_str(&s);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                warn!(error = %e, "malformed document xml");
                break;
            }
            _ => {}
        }
    }
    for r in rows {
        body.push_str(&r);
        body.push('\n');
    }
    collapse_blank_lines(&body)
}

fn collapse_blank_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut newlines = 0;
    for c in text.chars() {
        if c == '\n' {
            newlines += 1;
            if newlines <= 2 {
                out.push(c);
            }
        } else {
            newlines = 0;
            out.push(c);
        }
    }
    out
}

#[cfg(feature = "office")]
fn docx_text(path: &Path) -> String {
    use std::io::Read;
    let read = || -> anyhow::Result<String> {
        let file = fs::File::open(path)?;
        let mut archive = zip::ZipArchive::new(file)?;
        let mut part = archive.by_name("word/document.xml")?;
        let mut xml = String::new();
        part.read_to_string(&mut xml)?;
        Ok(xml)
    };
    match read() {
        Ok(xml) => wordml_to_text(&xml),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "docx extraction failed");
            String::new()
        }
    }
}

#[cfg(not(feature = "office"))]
fn docx_text(path: &Path) -> String {
    warn!(path = %path.display(), "docx support not compiled in (feature `office`)");
    String::new()
}

#[cfg(feature = "pdf")]
fn pdf_text(path: &Path) -> String {
    match pdf_extract::extract_text(path) {
        Ok(text) => text,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "pdf extraction failed");
            String::new()
        }
    }
}

#[cfg(not(feature = "pdf"))]
fn pdf_text(path: &Path) -> String {
    warn!(path = %path.display(), "pdf support not compiled in (feature `pdf`)");
    String::new()
}
