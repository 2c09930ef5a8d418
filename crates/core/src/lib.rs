//! Core library: reference indexing, retrieval, classification and issue detection.

pub mod checklist;
pub mod chunker;
pub mod classifier;
pub mod config;
pub mod detectors;
pub mod embeddings;
pub mod extractor;
pub mod models;
pub mod pipeline;
pub mod retrieval;
pub mod rules;
pub mod vectorstore;
