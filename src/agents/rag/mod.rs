//! Retrieval-augmented generation helpers

mod helper;
mod options;

pub use helper::{
    KnowledgeRetriever, RagHelper, RetrievedChunk, KNOWLEDGE_CONTEXT_KEY, KNOWLEDGE_SOURCES_KEY,
};
pub use options::{RagMode, RagOptions, RAG_MAP_REDUCE_MAX_CHUNKS, RAG_MIN_SCORE, RAG_MODE, RAG_TOP_K};
