//! Knowledge enrichment of agent inputs

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use super::options::{RagMode, RagOptions};
use crate::agents::config::AgentConfig;
use crate::agents::domain::{AgentInput, Message};
use crate::agents::error::{AgentError, AgentResult};
use crate::agents::llm::{ChatRequest, ModelClient};
use crate::config::RagSettings;

/// Context data key carrying the knowledge block
pub const KNOWLEDGE_CONTEXT_KEY: &str = "knowledge_context";
/// Context data key carrying the number of contributing sources
pub const KNOWLEDGE_SOURCES_KEY: &str = "knowledge_sources";

const KNOWLEDGE_INSTRUCTION: &str = "Prefer the reference knowledge above when it answers the request. \
If it is insufficient, you may rely on your own knowledge.";

const MAP_PROMPT: &str = "Extract only the facts from the passage that help answer the question. \
Reply with a short summary.";

const REDUCE_PROMPT: &str = "Combine the notes into one coherent background summary \
that helps answer the question. Do not add facts that are not in the notes.";

/// One search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub content: String,
    /// Similarity score in [0, 1]
    pub score: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl RetrievedChunk {
    pub fn new(content: impl Into<String>, score: f32) -> Self {
        Self {
            content: content.into(),
            score,
            source: None,
        }
    }
}

/// Knowledge base search capability
#[async_trait]
pub trait KnowledgeRetriever: Send + Sync {
    /// Ranked results, best first
    async fn search(
        &self,
        knowledge_base_id: &str,
        tenant_id: &str,
        query: &str,
        top_k: usize,
    ) -> AgentResult<Vec<RetrievedChunk>>;
}

/// Adds retrieved knowledge to agent inputs
pub struct RagHelper {
    retriever: Arc<dyn KnowledgeRetriever>,
    defaults: RagSettings,
}

impl RagHelper {
    pub fn new(retriever: Arc<dyn KnowledgeRetriever>, defaults: RagSettings) -> Self {
        Self {
            retriever,
            defaults,
        }
    }

    /// Retrieve knowledge for `input.content` and record it in the input's
    /// context data.
    ///
    /// Returns whether anything was added. Retrieval and summarization
    /// failures are logged and never surface.
    pub async fn enrich_with_knowledge(
        &self,
        config: &AgentConfig,
        input: &mut AgentInput,
        client: Option<&dyn ModelClient>,
    ) -> bool {
        if !config.rag.enabled {
            return false;
        }
        let Some(kb_id) = config
            .rag
            .knowledge_base_id
            .as_deref()
            .filter(|id| !id.is_empty())
        else {
            return false;
        };
        let query = input.content.trim();
        if query.is_empty() {
            return false;
        }

        let options = RagOptions::resolve(&self.defaults, &config.rag, &input.extra_params);
        if options.mode == RagMode::None {
            return false;
        }

        let tenant_id = input.context.tenant_id.as_str();
        let candidates = match self
            .retriever
            .search(kb_id, tenant_id, query, options.top_k)
            .await
        {
            Ok(chunks) => chunks,
            Err(e) => {
                tracing::warn!(tenant_id, knowledge_base_id = kb_id, error = %e, "Knowledge retrieval failed");
                return false;
            }
        };

        let chunks: Vec<RetrievedChunk> = candidates
            .into_iter()
            .filter(|c| c.score >= options.min_score)
            .collect();
        if chunks.is_empty() {
            tracing::debug!(tenant_id, knowledge_base_id = kb_id, "No knowledge above min score");
            return false;
        }

        let (context, sources) = match options.mode {
            RagMode::MapReduce => {
                match self
                    .build_map_reduce_context(client, query, &chunks, options.map_reduce_max_chunks)
                    .await
                {
                    Ok(built) => built,
                    Err(e) => {
                        tracing::warn!(tenant_id, error = %e, "Map-reduce failed, using retrieved passages directly");
                        (Self::build_stuff_context(&chunks), chunks.len())
                    }
                }
            }
            _ => (Self::build_stuff_context(&chunks), chunks.len()),
        };

        if context.trim().is_empty() {
            return false;
        }

        input
            .context
            .data
            .insert(KNOWLEDGE_CONTEXT_KEY.to_string(), Value::String(context));
        input
            .context
            .data
            .insert(KNOWLEDGE_SOURCES_KEY.to_string(), Value::from(sources as u64));
        true
    }

    /// Concatenate passages with their scores into one labeled block
    pub fn build_stuff_context(chunks: &[RetrievedChunk]) -> String {
        let mut block = String::from("Retrieved knowledge:\n");
        for (i, chunk) in chunks.iter().enumerate() {
            block.push_str(&format!("\n[{}] (score: {:.2})", i + 1, chunk.score));
            if let Some(source) = &chunk.source {
                block.push_str(&format!(" source: {}", source));
            }
            block.push('\n');
            block.push_str(chunk.content.trim());
            block.push('\n');
        }
        block
    }

    /// Summarize each passage, then combine the summaries.
    ///
    /// Returns the block and the number of passages that contributed. Without
    /// a client, or when every map call fails, the passages are concatenated
    /// instead. A failed combine step is an error.
    pub async fn build_map_reduce_context(
        &self,
        client: Option<&dyn ModelClient>,
        query: &str,
        chunks: &[RetrievedChunk],
        max_chunks: usize,
    ) -> AgentResult<(String, usize)> {
        let Some(client) = client else {
            return Ok((Self::build_stuff_context(chunks), chunks.len()));
        };

        let capped = &chunks[..chunks.len().min(max_chunks.max(1))];

        let maps = capped.iter().map(|chunk| {
            let request = ChatRequest::new(
                vec![
                    Message::system(MAP_PROMPT),
                    Message::user(format!("Question: {}\n\nPassage:\n{}", query, chunk.content)),
                ],
                Some(0.0),
                Some(256),
            );
            client.chat_completion(request)
        });

        let summaries: Vec<String> = join_all(maps)
            .await
            .into_iter()
            .filter_map(|result| match result {
                Ok(response) => Some(response.content().trim().to_string()),
                Err(e) => {
                    tracing::debug!(error = %e, "Map call failed, skipping passage");
                    None
                }
            })
            .filter(|s| !s.is_empty())
            .collect();

        if summaries.is_empty() {
            return Ok((Self::build_stuff_context(chunks), chunks.len()));
        }

        let notes = summaries
            .iter()
            .map(|s| format!("- {}", s))
            .collect::<Vec<_>>()
            .join("\n");
        let request = ChatRequest::new(
            vec![
                Message::system(REDUCE_PROMPT),
                Message::user(format!("Question: {}\n\nNotes:\n{}", query, notes)),
            ],
            Some(0.0),
            Some(512),
        );

        let reduced = client
            .chat_completion(request)
            .await
            .map_err(|e| AgentError::Retrieval(format!("reduce step failed: {}", e)))?;

        Ok((
            format!("Retrieved knowledge (summary):\n{}", reduced.content().trim()),
            summaries.len(),
        ))
    }

    /// Append the knowledge block recorded on `input` to `system_prompt`
    pub fn inject_knowledge_into_prompt(system_prompt: &str, input: &AgentInput) -> String {
        match input
            .context
            .data_str(KNOWLEDGE_CONTEXT_KEY)
            .filter(|k| !k.trim().is_empty())
        {
            Some(knowledge) => format!(
                "{}\n\n{}\n\n{}",
                system_prompt.trim_end(),
                knowledge.trim_end(),
                KNOWLEDGE_INSTRUCTION
            ),
            None => system_prompt.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::domain::AgentContext;

    #[test]
    fn test_stuff_context_lists_scores() {
        let chunks = vec![
            RetrievedChunk::new("Rust has no GC.", 0.91),
            RetrievedChunk {
                source: Some("book.md".into()),
                ..RetrievedChunk::new("Ownership moves values.", 0.8)
            },
        ];
        let block = RagHelper::build_stuff_context(&chunks);
        assert!(block.starts_with("Retrieved knowledge:"));
        assert!(block.contains("[1] (score: 0.91)"));
        assert!(block.contains("source: book.md"));
        assert!(block.contains("Ownership moves values."));
    }

    #[test]
    fn test_inject_without_knowledge_is_identity() {
        let input = AgentInput::new("q", AgentContext::new("t", "u"));
        assert_eq!(RagHelper::inject_knowledge_into_prompt("sys", &input), "sys");
    }

    #[test]
    fn test_inject_appends_block_and_instruction() {
        let mut input = AgentInput::new("q", AgentContext::new("t", "u"));
        input
            .context
            .data
            .insert(KNOWLEDGE_CONTEXT_KEY.into(), Value::String("K".into()));
        let prompt = RagHelper::inject_knowledge_into_prompt("sys", &input);
        assert!(prompt.starts_with("sys\n\nK\n\n"));
        assert!(prompt.ends_with(KNOWLEDGE_INSTRUCTION));
    }
}
