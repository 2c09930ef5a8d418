use regex::{Regex, RegexBuilder};
use std::path::Path;

pub const UNKNOWN_TYPE: &str = "Unknown";

/// Chars of body text (after the file name) the classifier looks at.
const CLASSIFY_PREFIX_CHARS: usize = 4000;

#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationOutcome {
    pub label: String,
    pub confidence: f32,
}

pub trait DocumentClassifier: Send + Sync {
    fn classify(&self, path: &Path, text: &str) -> ClassificationOutcome;
}

const PATTERNS: &[(&str, &str)] = &[
    (r"articles? of association|\bAOA\b", "Articles of Association"),
    (r"memorandum of association|\bMOA\b|\bMOU\b", "Memorandum of Association"),
    (r"board resolution", "Board Resolution"),
    (r"shareholder resolution|shareholders' resolution", "Shareholder Resolution"),
    (r"register of members|register of directors", "Register of Members and Directors"),
    (r"incorporation application|application form", "Incorporation Application Form"),
    (r"beneficial owner|UBO", "UBO Declaration"),
    (r"change of registered address", "Change of Registered Address Notice"),
];

/// First matching pattern over the file name and the head of the text wins.
pub struct PatternClassifier {
    patterns: Vec<(Regex, &'static str)>,
}

impl PatternClassifier {
    pub fn new() -> anyhow::Result<Self> {
        let patterns = PATTERNS
            .iter()
            .map(|(pat, label)| {
                let re = RegexBuilder::new(pat).case_insensitive(true).build()?;
                Ok((re, *label))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }
}

impl DocumentClassifier for PatternClassifier {
    fn classify(&self, path: &Path, text: &str) -> ClassificationOutcome {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let head: String = text.chars().take(CLASSIFY_PREFIX_CHARS).collect();
        let haystack = format!("{}\n{}", name, head);
        for (re, label) in &self.patterns {
            if re.is_match(&haystack) {
                return ClassificationOutcome {
                    label: label.to_string(),
                    confidence: 0.9,
                };
            }
        }
        ClassificationOutcome {
            label: UNKNOWN_TYPE.to_string(),
            confidence: 0.2,
        }
    }
}
