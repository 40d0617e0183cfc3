//! Per-role behavior as data

use crate::agents::domain::{AgentInput, AgentType};
use crate::agents::params::param_str;

/// What distinguishes one role from another
#[derive(Debug)]
pub struct RoleStrategy {
    pub agent_type: AgentType,
    /// System prompt used when neither a template nor a literal prompt is configured
    pub default_prompt: &'static str,
    /// Extra-param keys appended to the user turn, with their labels
    pub param_fields: &'static [(&'static str, &'static str)],
    /// Whether the role may call tools
    pub uses_tools: bool,
    /// Whether the role consults long-term memory before prompting
    pub searches_memory: bool,
}

static WRITER: RoleStrategy = RoleStrategy {
    agent_type: AgentType::Writer,
    default_prompt: "You are a skilled writer. Produce clear, engaging, well-structured prose \
that follows the requested style and length.",
    param_fields: &[("style", "Style"), ("length", "Target length"), ("audience", "Audience")],
    uses_tools: true,
    searches_memory: false,
};

static REVIEWER: RoleStrategy = RoleStrategy {
    agent_type: AgentType::Reviewer,
    default_prompt: "You are a careful reviewer. Assess the content for accuracy, clarity and \
consistency, and give concrete suggestions for improvement.",
    param_fields: &[("criteria", "Review criteria"), ("focus", "Focus")],
    uses_tools: true,
    searches_memory: false,
};

static PLANNER: RoleStrategy = RoleStrategy {
    agent_type: AgentType::Planner,
    default_prompt: "You are a planner. Break the goal into ordered, actionable steps, noting \
dependencies and risks.",
    param_fields: &[("goal", "Goal"), ("constraints", "Constraints"), ("deadline", "Deadline")],
    uses_tools: true,
    searches_memory: true,
};

static TRANSLATOR: RoleStrategy = RoleStrategy {
    agent_type: AgentType::Translator,
    default_prompt: "You are a professional translator. Translate faithfully, preserving meaning, \
tone and formatting. Output only the translation.",
    param_fields: &[
        ("source_language", "Source language"),
        ("target_language", "Target language"),
        ("tone", "Tone"),
    ],
    uses_tools: false,
    searches_memory: false,
};

static ANALYZER: RoleStrategy = RoleStrategy {
    agent_type: AgentType::Analyzer,
    default_prompt: "You are an analyst. Examine the material, identify key findings and patterns, \
and support every conclusion with evidence from the input.",
    param_fields: &[("analysis_type", "Analysis type"), ("metrics", "Metrics")],
    uses_tools: true,
    searches_memory: false,
};

static RESEARCHER: RoleStrategy = RoleStrategy {
    agent_type: AgentType::Researcher,
    default_prompt: "You are a researcher. Gather relevant facts, cite where they come from, and \
separate established facts from speculation.",
    param_fields: &[("depth", "Depth"), ("sources", "Preferred sources")],
    uses_tools: true,
    searches_memory: false,
};

static FORMATTER: RoleStrategy = RoleStrategy {
    agent_type: AgentType::Formatter,
    default_prompt: "You are a formatter. Restructure the content into the requested format \
without changing its meaning.",
    param_fields: &[("format", "Output format"), ("schema", "Schema")],
    uses_tools: false,
    searches_memory: false,
};

static WORLD_BUILDER: RoleStrategy = RoleStrategy {
    agent_type: AgentType::WorldBuilder,
    default_prompt: "You are a world builder. Design settings with consistent geography, history, \
cultures and rules.",
    param_fields: &[("genre", "Genre"), ("setting", "Setting")],
    uses_tools: false,
    searches_memory: false,
};

static PLOT_DESIGNER: RoleStrategy = RoleStrategy {
    agent_type: AgentType::PlotDesigner,
    default_prompt: "You are a plot designer. Outline story arcs with clear conflict, rising \
tension and satisfying resolution.",
    param_fields: &[("genre", "Genre"), ("structure", "Structure"), ("characters", "Characters")],
    uses_tools: false,
    searches_memory: false,
};

impl RoleStrategy {
    pub fn for_type(agent_type: AgentType) -> &'static RoleStrategy {
        match agent_type {
            AgentType::Writer => &WRITER,
            AgentType::Reviewer => &REVIEWER,
            AgentType::Planner => &PLANNER,
            AgentType::Translator => &TRANSLATOR,
            AgentType::Analyzer => &ANALYZER,
            AgentType::Researcher => &RESEARCHER,
            AgentType::Formatter => &FORMATTER,
            AgentType::WorldBuilder => &WORLD_BUILDER,
            AgentType::PlotDesigner => &PLOT_DESIGNER,
        }
    }

    /// The current user turn plus any role fields present in the extra params
    pub fn user_turn(&self, input: &AgentInput) -> String {
        let fields: Vec<String> = self
            .param_fields
            .iter()
            .filter_map(|(key, label)| {
                param_str(&input.extra_params, key).map(|value| format!("{}: {}", label, value))
            })
            .collect();

        if fields.is_empty() {
            input.content.clone()
        } else {
            format!("{}\n\n{}", input.content, fields.join("\n"))
        }
    }
}
