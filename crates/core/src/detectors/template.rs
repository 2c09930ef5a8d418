use super::{Detector, DetectorError};
use crate::models::{Issue, Severity};
use regex::{Regex, RegexBuilder};

/// Only the head of a document is expected to carry template markers.
const SAMPLE_CHARS: usize = 8000;

const CORE_MARKERS: &[&str] = &[
    r"\bAbu Dhabi Global Market\b",
    r"\bADGM\b",
    r"\bRegistration Authority\b",
    r"\bCompanies Regulations\b",
];

const CONTACT_MARKERS: &[&str] = &[r"adgm\.com", r"registrationauthority@adgm\.com"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerCount {
    pub core: usize,
    pub contact: usize,
}

impl MarkerCount {
    /// Two core markers, or one core marker backed by a contact marker.
    pub fn passes(&self) -> bool {
        self.core >= 2 || (self.core >= 1 && self.contact >= 1)
    }
}

/// Pass/fail gate on whether a document looks like an official template.
pub struct TemplateDetector {
    core: Vec<Regex>,
    contact: Vec<Regex>,
}

impl TemplateDetector {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            core: compile_all(CORE_MARKERS)?,
            contact: compile_all(CONTACT_MARKERS)?,
        })
    }

    pub fn count_markers(&self, text: &str) -> MarkerCount {
        let sample: String = text.chars().take(SAMPLE_CHARS).collect();
        MarkerCount {
            core: self.core.iter().filter(|re| re.is_match(&sample)).count(),
            contact: self.contact.iter().filter(|re| re.is_match(&sample)).count(),
        }
    }

    pub fn is_official_format(&self, text: &str) -> bool {
        self.count_markers(text).passes()
    }

    pub fn check(&self, text: &str) -> Vec<Issue> {
        if self.is_official_format(text) {
            return Vec::new();
        }
        vec![Issue::new(
            "Document does not appear to be in official ADGM format",
            Severity::High,
        )
        .section("Formatting/Template")
        .suggest(
            "Please use the official ADGM template as per ADGM rules and regulations. \
             Download the correct form from the official ADGM website.",
        )
        .cite("ADGM official forms/templates (see ADGM Registration Authority).")]
    }
}

fn compile_all(patterns: &[&str]) -> anyhow::Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| Ok(RegexBuilder::new(p).case_insensitive(true).build()?))
        .collect()
}

#[async_trait::async_trait]
impl Detector for TemplateDetector {
    fn name(&self) -> &'static str {
        "template"
    }

    async fn detect(&self, text: &str, _doc_type: &str) -> Result<Vec<Issue>, DetectorError> {
        Ok(self.check(text))
    }
}
