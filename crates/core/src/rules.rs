//! Regular-expression red-flag rules.
//!
//! Built-in rules come first; extra rules may be dropped into a directory as
//! one TOML file per rule and are appended in file-name order.

use crate::models::{Issue, Severity};
use anyhow::Context;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// Flag when the pattern matches.
    #[default]
    Present,
    /// Flag when the pattern matches nowhere in the text.
    Absent,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Rule {
    pub name: String,
    pub pattern: String,
    #[serde(default)]
    pub trigger: Trigger,
    pub issue: String,
    #[serde(default)]
    pub section_hint: String,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub suggestion: String,
    #[serde(default)]
    pub citation: String,
}

impl Rule {
    fn builtin(
        name: &str,
        pattern: &str,
        trigger: Trigger,
        issue: &str,
        section_hint: &str,
        severity: Severity,
        suggestion: &str,
    ) -> Self {
        Self {
            name: name.to_string(),
            pattern: pattern.to_string(),
            trigger,
            issue: issue.to_string(),
            section_hint: section_hint.to_string(),
            severity,
            suggestion: suggestion.to_string(),
            citation: String::new(),
        }
    }
}

pub fn builtin_rules() -> Vec<Rule> {
    vec![
        Rule::builtin(
            "jurisdiction",
            r"Dubai Courts|UAE Federal Courts|onshore UAE",
            Trigger::Present,
            "Document references non-ADGM jurisdiction",
            "Jurisdiction/Dispute Resolution",
            Severity::High,
            "Specify ADGM Courts or ADGM Arbitration as applicable.",
        ),
        Rule::builtin(
            "ambiguous_language",
            r"may\s+at its discretion|best efforts|endeavour to",
            Trigger::Present,
            "Ambiguous or non-binding language detected",
            "Obligations/Definitions",
            Severity::Medium,
            "Replace with clear, binding obligations (e.g., 'shall').",
        ),
        Rule::builtin(
            "signature_block",
            r"Signed by|Signature|Authorised Signatory|Director",
            Trigger::Absent,
            "No signatory/signature section detected",
            "Execution/Signatures",
            Severity::High,
            "Add execution blocks for authorised signatories.",
        ),
    ]
}

/// A rule with its pattern compiled (case-insensitive).
#[derive(Debug, Clone)]
pub struct CompiledRule {
    rule: Rule,
    regex: Regex,
}

impl CompiledRule {
    pub fn compile(rule: Rule) -> anyhow::Result<Self> {
        let regex = RegexBuilder::new(&rule.pattern)
            .case_insensitive(true)
            .build()
            .with_context(|| format!("invalid pattern in rule '{}'", rule.name))?;
        Ok(Self { rule, regex })
    }

    pub fn name(&self) -> &str {
        &self.rule.name
    }

    pub fn evaluate(&self, text: &str) -> Option<Issue> {
        let matched = self.regex.is_match(text);
        let fire = match self.rule.trigger {
            Trigger::Present => matched,
            Trigger::Absent => !matched,
        };
        fire.then(|| {
            Issue::new(self.rule.issue.clone(), self.rule.severity)
                .section(self.rule.section_hint.clone())
                .suggest(self.rule.suggestion.clone())
                .cite(self.rule.citation.clone())
        })
    }
}

pub fn load_rules_from_dir(dir: &Path) -> anyhow::Result<Vec<Rule>> {
    let mut rules = Vec::new();
    if !dir.exists() {
        return Ok(rules);
    }
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file()
            && entry.path().extension().and_then(|e| e.to_str()) == Some("toml")
        {
            paths.push(entry.path());
        }
    }
    paths.sort();
    for path in paths {
        let content = fs::read_to_string(&path)?;
        let rule: Rule =
            toml::from_str(&content).with_context(|| format!("parse rule {}", path.display()))?;
        rules.push(rule);
    }
    Ok(rules)
}
