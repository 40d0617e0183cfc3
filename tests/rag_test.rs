mod common;

use agentry::agents::config::AgentConfig;
use agentry::agents::domain::{AgentContext, AgentInput, AgentType};
use agentry::agents::error::LlmError;
use agentry::agents::llm::ModelClient;
use agentry::agents::rag::{RagHelper, RetrievedChunk, KNOWLEDGE_CONTEXT_KEY, KNOWLEDGE_SOURCES_KEY};
use agentry::config::RagSettings;
use common::{CountingRetriever, FailingRetriever, ScriptedModel};
use serde_json::json;
use std::sync::Arc;

fn rag_agent() -> AgentConfig {
    let mut config = AgentConfig::new("researcher", "t1", AgentType::Researcher, "gpt-4o");
    config.rag.enabled = true;
    config.rag.knowledge_base_id = Some("kb-1".to_string());
    config
}

fn input(text: &str) -> AgentInput {
    AgentInput::new(text, AgentContext::new("t1", "u1"))
}

fn chunks() -> Vec<RetrievedChunk> {
    vec![
        RetrievedChunk::new("Rust 1.0 shipped in May 2015.", 0.91),
        RetrievedChunk::new("Cargo is the Rust package manager.", 0.82),
        RetrievedChunk::new("Unrelated gardening tips.", 0.20),
    ]
}

#[tokio::test]
async fn test_mode_none_never_calls_the_retriever() {
    let retriever = Arc::new(CountingRetriever::new(chunks()));
    let helper = RagHelper::new(retriever.clone(), RagSettings::default());

    let mut input = input("When did Rust 1.0 ship?").with_param("rag_mode", "none");
    let before = serde_json::to_value(&input).unwrap();

    let enriched = helper
        .enrich_with_knowledge(&rag_agent(), &mut input, None)
        .await;

    assert!(!enriched);
    assert_eq!(retriever.calls(), 0);
    assert_eq!(serde_json::to_value(&input).unwrap(), before);
}

#[tokio::test]
async fn test_stuff_mode_injects_knowledge_context() {
    let retriever = Arc::new(CountingRetriever::new(vec![RetrievedChunk::new(
        "Rust 1.0 shipped in May 2015.",
        0.9,
    )]));
    let helper = RagHelper::new(retriever.clone(), RagSettings::default());

    let mut input = input("When did Rust 1.0 ship?");
    assert!(
        helper
            .enrich_with_knowledge(&rag_agent(), &mut input, None)
            .await
    );

    assert_eq!(retriever.calls(), 1);
    let context = input.context.data_str(KNOWLEDGE_CONTEXT_KEY).unwrap();
    assert!(!context.is_empty());
    assert!(context.contains("May 2015"));
    assert_eq!(input.context.data.get(KNOWLEDGE_SOURCES_KEY), Some(&json!(1)));

    let prompt = RagHelper::inject_knowledge_into_prompt("You research.", &input);
    assert!(prompt.starts_with("You research."));
    assert!(prompt.contains("May 2015"));
}

#[tokio::test]
async fn test_low_scores_are_discarded() {
    let retriever = Arc::new(CountingRetriever::new(chunks()));
    let helper = RagHelper::new(retriever, RagSettings::default());

    let mut input = input("rust history");
    assert!(
        helper
            .enrich_with_knowledge(&rag_agent(), &mut input, None)
            .await
    );
    let context = input.context.data_str(KNOWLEDGE_CONTEXT_KEY).unwrap();
    assert!(!context.contains("gardening"));
    assert_eq!(input.context.data.get(KNOWLEDGE_SOURCES_KEY), Some(&json!(2)));
}

#[tokio::test]
async fn test_call_params_override_agent_config() {
    let retriever = Arc::new(CountingRetriever::new(chunks()));
    let helper = RagHelper::new(retriever, RagSettings::default());

    let mut config = rag_agent();
    config.rag.min_score = Some(0.95);

    // Agent threshold filters everything out
    let mut strict = input("rust history");
    assert!(!helper.enrich_with_knowledge(&config, &mut strict, None).await);

    // A per-call threshold wins; a malformed top_k is ignored
    let mut relaxed = input("rust history")
        .with_param("rag_min_score", 0.1)
        .with_param("rag_top_k", "lots");
    assert!(helper.enrich_with_knowledge(&config, &mut relaxed, None).await);
    assert_eq!(
        relaxed.context.data.get(KNOWLEDGE_SOURCES_KEY),
        Some(&json!(3))
    );
}

#[tokio::test]
async fn test_map_reduce_summarizes_through_the_model() {
    let retriever = Arc::new(CountingRetriever::new(chunks()));
    let helper = RagHelper::new(retriever, RagSettings::default());
    let model = ScriptedModel::new("gpt-4o")
        .reply("Rust 1.0: May 2015")
        .reply("Cargo manages packages")
        .reply("Rust 1.0 shipped in May 2015 with Cargo.");

    let mut input = input("rust history").with_param("rag_mode", "map_reduce");
    let client: &dyn ModelClient = &model;
    assert!(
        helper
            .enrich_with_knowledge(&rag_agent(), &mut input, Some(client))
            .await
    );

    assert_eq!(model.calls(), 3);
    let context = input.context.data_str(KNOWLEDGE_CONTEXT_KEY).unwrap();
    assert!(context.starts_with("Retrieved knowledge (summary):"));
    assert!(context.contains("with Cargo"));
}

#[tokio::test]
async fn test_map_reduce_falls_back_to_stuff() {
    let retriever = Arc::new(CountingRetriever::new(chunks()));
    let helper = RagHelper::new(retriever, RagSettings::default());

    // No client at all
    let mut no_client = input("rust history").with_param("rag_mode", "map_reduce");
    assert!(
        helper
            .enrich_with_knowledge(&rag_agent(), &mut no_client, None)
            .await
    );
    assert!(no_client
        .context
        .data_str(KNOWLEDGE_CONTEXT_KEY)
        .unwrap()
        .starts_with("Retrieved knowledge:"));

    // Maps succeed but the reduce step fails
    let model = ScriptedModel::new("gpt-4o")
        .reply("a")
        .reply("b")
        .fail(LlmError::Network("connection reset".into()));
    let client: &dyn ModelClient = &model;
    let mut reduce_fails = input("rust history").with_param("rag_mode", "map_reduce");
    assert!(
        helper
            .enrich_with_knowledge(&rag_agent(), &mut reduce_fails, Some(client))
            .await
    );
    assert!(reduce_fails
        .context
        .data_str(KNOWLEDGE_CONTEXT_KEY)
        .unwrap()
        .starts_with("Retrieved knowledge:"));

    // Direct call surfaces the reduce failure
    let model = ScriptedModel::new("gpt-4o")
        .reply("a")
        .fail(LlmError::Network("connection reset".into()));
    let client: &dyn ModelClient = &model;
    let result = helper
        .build_map_reduce_context(Some(client), "q", &chunks()[..1], 5)
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_every_map_failing_falls_back_to_stuff() {
    let retriever = Arc::new(CountingRetriever::new(chunks()));
    let helper = RagHelper::new(retriever, RagSettings::default());
    let model = ScriptedModel::new("gpt-4o")
        .fail(LlmError::Network("connection reset".into()))
        .fail(LlmError::Network("connection reset".into()));
    let client: &dyn ModelClient = &model;

    let mut input = input("rust history").with_param("rag_mode", "map_reduce");
    assert!(
        helper
            .enrich_with_knowledge(&rag_agent(), &mut input, Some(client))
            .await
    );

    // Two map calls, no reduce
    assert_eq!(model.calls(), 2);
    let context = input.context.data_str(KNOWLEDGE_CONTEXT_KEY).unwrap();
    assert!(context.starts_with("Retrieved knowledge:"));
    assert!(context.contains("Cargo is the Rust package manager."));
    assert_eq!(input.context.data.get(KNOWLEDGE_SOURCES_KEY), Some(&json!(2)));
}

#[tokio::test]
async fn test_retrieval_error_leaves_input_unenriched() {
    let helper = RagHelper::new(Arc::new(FailingRetriever), RagSettings::default());

    let mut input = input("When did Rust 1.0 ship?");
    let before = serde_json::to_value(&input).unwrap();

    assert!(
        !helper
            .enrich_with_knowledge(&rag_agent(), &mut input, None)
            .await
    );
    assert_eq!(serde_json::to_value(&input).unwrap(), before);
    assert!(input.context.data_str(KNOWLEDGE_CONTEXT_KEY).is_none());
}

#[tokio::test]
async fn test_disabled_rag_is_a_no_op() {
    let retriever = Arc::new(CountingRetriever::new(chunks()));
    let helper = RagHelper::new(retriever.clone(), RagSettings::default());

    let mut config = rag_agent();
    config.rag.enabled = false;
    let mut input = input("rust history");
    assert!(!helper.enrich_with_knowledge(&config, &mut input, None).await);
    assert_eq!(retriever.calls(), 0);
}
