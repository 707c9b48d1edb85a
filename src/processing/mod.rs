//! Matching core: embeddings, filtering, scoring and ranking

pub mod cache_builder;
pub mod embedding_manager;
pub mod embeddings;
pub mod knowledge_filter;
pub mod matcher;
pub mod preprocessor;
pub mod retriever;
pub mod snapshot;
pub mod text_processor;
