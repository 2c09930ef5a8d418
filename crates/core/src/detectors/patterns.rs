use super::{Detector, DetectorError};
use crate::models::Issue;
use crate::rules::{builtin_rules, CompiledRule, Rule};

/// Fixed red-flag rules over the full text. Issues come out in rule order,
/// whatever the position of the match in the document.
pub struct PatternDetector {
    rules: Vec<CompiledRule>,
}

impl PatternDetector {
    pub fn new() -> anyhow::Result<Self> {
        Self::with_extra_rules(Vec::new())
    }

    /// Built-in rules followed by `extra`.
    pub fn with_extra_rules(extra: Vec<Rule>) -> anyhow::Result<Self> {
        let rules = builtin_rules()
            .into_iter()
            .chain(extra)
            .map(CompiledRule::compile)
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(CompiledRule::name).collect()
    }

    pub fn scan(&self, text: &str) -> Vec<Issue> {
        self.rules.iter().filter_map(|r| r.evaluate(text)).collect()
    }
}

#[async_trait::async_trait]
impl Detector for PatternDetector {
    fn name(&self) -> &'static str {
        "pattern"
    }

    async fn detect(&self, text: &str, _doc_type: &str) -> Result<Vec<Issue>, DetectorError> {
        Ok(self.scan(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Severity;
    use crate::rules::Trigger;

    #[test]
    fn foreign_courts_are_high_severity() {
        let d = PatternDetector::new().unwrap();
        let issues = d.scan("Disputes go to the UAE Federal Courts. Signed by the Director.");
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].issue, "Document references non-ADGM jurisdiction");
        assert_eq!(issues[0].severity, Severity::High);
    }

    #[test]
    fn director_mention_suppresses_missing_signature() {
        let d = PatternDetector::new().unwrap();
        assert!(d.scan("The director shall attend.").is_empty());
        let issues = d.scan("Nothing to see.");
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].section_hint, "Execution/Signatures");
    }

    #[test]
    fn order_follows_rules_not_text_position() {
        let d = PatternDetector::new().unwrap();
        let issues = d.scan("We will use best efforts. Later: subject to Dubai Courts.");
        let texts: Vec<&str> = issues.iter().map(|i| i.issue.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "Document references non-ADGM jurisdiction",
                "Ambiguous or non-binding language detected",
                "No signatory/signature section detected",
            ]
        );
    }

    #[test]
    fn extra_rules_follow_builtins() {
        let extra = Rule {
            name: "english_law".into(),
            pattern: "laws of England".into(),
            trigger: Trigger::Present,
            issue: "Foreign governing law".into(),
            section_hint: "Governing Law".into(),
            severity: Severity::Low,
            suggestion: String::new(),
            citation: String::new(),
        };
        let d = PatternDetector::with_extra_rules(vec![extra]).unwrap();
        assert_eq!(d.rule_names().last(), Some(&"english_law"));
        let issues = d.scan("Governed by the laws of England. Signature: ____");
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Low);
    }
}
