use agentry::agents::domain::AgentType;
use agentry::config::{SessionStoreKind, Settings, TokenizerKind};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_load_settings_and_agent_definitions() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let root = temp_dir.path();

    fs::create_dir_all(root.join("config/agents"))?;

    let agentry_toml = r#"
log_level = "debug"

[context]
history_limit = 12
compression_threshold = 2000
store = "ttl"
tokenizer = "approximate"

[tools]
max_rounds = 3

[rag]
mode = "map_reduce"
top_k = 6

[pricing.models.gpt-4o]
prompt_per_1k = 0.005
completion_per_1k = 0.015
"#;
    fs::write(root.join("agentry.toml"), agentry_toml)?;

    // An agent in JSON
    let writer_json = r#"
{
    "id": "writer-1",
    "tenant_id": "t1",
    "name": "Story writer",
    "agent_type": "writer",
    "model": "gpt-4o",
    "temperature": 0.9,
    "allowed_tools": ["search"]
}
"#;
    fs::write(root.join("config/agents/writer.json"), writer_json)?;

    // An agent in YAML
    let researcher_yaml = r#"
id: researcher-1
tenant_id: t1
name: Researcher
agent_type: researcher
model: gpt-4o-mini
secondary_model: gpt-4o
rag:
  enabled: true
  knowledge_base_id: kb-1
  min_score: 0.5
"#;
    fs::write(root.join("config/agents/researcher.yaml"), researcher_yaml)?;

    // Files with other extensions are ignored
    fs::write(root.join("config/agents/README.md"), "# agents")?;

    let settings = Settings::from_root(root.to_str().unwrap())?;

    assert_eq!(settings.log_level, "debug");
    assert_eq!(settings.context.history_limit, 12);
    assert_eq!(settings.context.compression_threshold, 2000);
    assert_eq!(settings.context.store, SessionStoreKind::Ttl);
    assert_eq!(settings.context.tokenizer, TokenizerKind::Approximate);
    // Unset fields keep their defaults
    assert_eq!(settings.context.summary_trigger_messages, 30);
    assert_eq!(settings.tools.max_rounds, 3);
    assert_eq!(settings.rag.mode, "map_reduce");
    assert_eq!(settings.rag.top_k, 6);
    assert_eq!(settings.pricing.models["gpt-4o"].completion_per_1k, 0.015);

    assert_eq!(settings.agents.len(), 2);
    let writer = settings
        .agents
        .iter()
        .find(|a| a.id == "writer-1")
        .unwrap();
    assert_eq!(writer.agent_type, AgentType::Writer);
    assert_eq!(writer.temperature, Some(0.9));
    assert_eq!(writer.allowed_tools, vec!["search".to_string()]);
    assert_eq!(writer.timeout_seconds, 120);

    let researcher = settings
        .agents
        .iter()
        .find(|a| a.id == "researcher-1")
        .unwrap();
    assert_eq!(researcher.agent_type, AgentType::Researcher);
    assert_eq!(researcher.secondary_model.as_deref(), Some("gpt-4o"));
    assert!(researcher.rag.enabled);
    assert_eq!(researcher.rag.min_score, Some(0.5));

    Ok(())
}

#[test]
fn test_missing_files_yield_defaults() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;

    let settings = Settings::from_root(temp_dir.path().to_str().unwrap())?;
    assert!(settings.agents.is_empty());
    assert_eq!(settings.context.history_limit, 20);
    assert_eq!(settings.queue.concurrency, 10);

    Ok(())
}

#[test]
fn test_duplicate_agents_fail_validation() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let root = temp_dir.path();
    fs::create_dir_all(root.join("config/agents"))?;

    let agent = r#"
id: writer-1
tenant_id: t1
name: Writer
model: gpt-4o
"#;
    fs::write(root.join("config/agents/a.yaml"), agent)?;
    fs::write(root.join("config/agents/b.yml"), agent)?;

    let err = Settings::from_root(root.to_str().unwrap()).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("Configuration validation failed"));
    assert!(message.contains("writer-1"));

    Ok(())
}

#[test]
fn test_invalid_runtime_values_fail_validation() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let root = temp_dir.path();

    fs::write(
        root.join("agentry.toml"),
        r#"
[rag]
mode = "everything"
min_score = 1.5

[queue]
concurrency = 0
"#,
    )?;

    let message = Settings::from_root(root.to_str().unwrap())
        .unwrap_err()
        .to_string();
    assert!(message.contains("rag.mode"));
    assert!(message.contains("rag.min_score"));
    assert!(message.contains("queue.concurrency"));

    Ok(())
}

#[test]
fn test_rag_without_knowledge_base_is_rejected() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let root = temp_dir.path();
    fs::create_dir_all(root.join("config/agents"))?;

    fs::write(
        root.join("config/agents/researcher.json"),
        r#"{"id": "r1", "tenant_id": "t1", "name": "R", "model": "gpt-4o", "rag": {"enabled": true}}"#,
    )?;

    let message = Settings::from_root(root.to_str().unwrap())
        .unwrap_err()
        .to_string();
    assert!(message.contains("knowledge_base_id"));

    Ok(())
}
