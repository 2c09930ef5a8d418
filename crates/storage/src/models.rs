use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metadata values are restricted to strings and numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<&str> for MetaValue {
    fn from(s: &str) -> Self {
        MetaValue::Text(s.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(s: String) -> Self {
        MetaValue::Text(s)
    }
}

impl From<i64> for MetaValue {
    fn from(n: i64) -> Self {
        MetaValue::Int(n)
    }
}

impl From<f64> for MetaValue {
    fn from(n: f64) -> Self {
        MetaValue::Float(n)
    }
}

/// One metadata record: where the chunk came from plus free-form attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMeta {
    pub source: String,
    pub chunk_index: usize,
    #[serde(flatten)]
    pub extra: BTreeMap<String, MetaValue>,
}

impl ChunkMeta {
    pub fn new(source: impl Into<String>, chunk_index: usize) -> Self {
        Self {
            source: source.into(),
            chunk_index,
            extra: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<MetaValue>) -> Self {
        self.extra.insert(key.to_string(), value.into());
        self
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.extra.get(key) {
            Some(MetaValue::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }
}

/// Immutable unit of reference text.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub text: String,
    pub meta: ChunkMeta,
}

/// Everything needed to restore an index: aligned vectors and chunks.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSnapshot {
    pub backend: String,
    pub dims: usize,
    pub vectors: Vec<Vec<f32>>,
    pub chunks: Vec<Chunk>,
}
