use crate::classifier::UNKNOWN_TYPE;

pub const INCORPORATION: &str = "Company Incorporation";
pub const UNKNOWN_PROCESS: &str = "Unknown";

const INCORPORATION_DOCS: &[&str] = &[
    "Articles of Association",
    "Memorandum of Association",
    "Board Resolution",
    "Shareholder Resolution",
    "Incorporation Application Form",
    "UBO Declaration",
    "Register of Members and Directors",
    "Change of Registered Address Notice",
];

const FORMATION_TYPES: &[&str] = &[
    "Articles of Association",
    "Memorandum of Association",
    "Board Resolution",
    "Shareholder Resolution",
    "Register of Members and Directors",
];

pub trait Checklist: Send + Sync {
    /// Required document types for `process`, in declared order.
    fn required_documents(&self, process: &str) -> Vec<String>;
    fn infer_process(&self, detected_types: &[String]) -> String;
}

#[derive(Debug, Default, Clone)]
pub struct IncorporationChecklist;

impl Checklist for IncorporationChecklist {
    fn required_documents(&self, process: &str) -> Vec<String> {
        match process {
            INCORPORATION => INCORPORATION_DOCS.iter().map(|s| s.to_string()).collect(),
            _ => Vec::new(),
        }
    }

    fn infer_process(&self, detected_types: &[String]) -> String {
        if detected_types
            .iter()
            .any(|t| FORMATION_TYPES.contains(&t.as_str()))
        {
            INCORPORATION.to_string()
        } else {
            UNKNOWN_PROCESS.to_string()
        }
    }
}

/// Required types not present among `detected_types`, in required order.
/// `Unknown` detections never count as present.
pub fn missing_documents(required: &[String], detected_types: &[String]) -> Vec<String> {
    required
        .iter()
        .filter(|r| {
            !detected_types
                .iter()
                .any(|t| t != UNKNOWN_TYPE && t == *r)
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &[&str]) -> Vec<String> {
        v.iter().map(|x| x.to_string()).collect()
    }

    #[test]
    fn formation_document_implies_incorporation() {
        let c = IncorporationChecklist;
        assert_eq!(c.infer_process(&s(&["Unknown", "Board Resolution"])), INCORPORATION);
        assert_eq!(c.infer_process(&s(&["UBO Declaration"])), UNKNOWN_PROCESS);
        assert_eq!(c.required_documents(INCORPORATION).len(), 8);
        assert!(c.required_documents(UNKNOWN_PROCESS).is_empty());
    }

    #[test]
    fn missing_keeps_required_order() {
        let required = s(&["A", "B", "C", "D"]);
        let missing = missing_documents(&required, &s(&["C", "Unknown", "A"]));
        assert_eq!(missing, s(&["B", "D"]));
    }
}
