//! Independent issue detectors. Each looks at one document's text and its
//! classified type and returns its findings in emission order.

pub mod generative;
pub mod patterns;
pub mod template;

use crate::models::Issue;
use providers::ProviderError;
use thiserror::Error;

pub use generative::GenerativeDetector;
pub use patterns::PatternDetector;
pub use template::TemplateDetector;

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("detector unavailable: {0}")]
    Unavailable(String),
    #[error("retrieval failed: {0}")]
    Retrieval(String),
    #[error("generation failed: {0}")]
    Generation(#[from] ProviderError),
    #[error("unparseable output: {0}")]
    Parse(String),
}

#[async_trait::async_trait]
pub trait Detector: Send + Sync {
    fn name(&self) -> &'static str;

    async fn detect(&self, text: &str, doc_type: &str) -> Result<Vec<Issue>, DetectorError>;
}
