//! Immutable per-generation input.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::adapters::ModelKind;

/// Output of the external context-analysis service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextAnalysis {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub detected_domain: Option<String>,
    #[serde(default)]
    pub complexity: Option<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

/// Rewritten prompts per stage. Missing entries use the original prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagePrompts {
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub review: Option<String>,
    #[serde(default)]
    pub docs: Option<String>,
}

impl StagePrompts {
    pub fn for_kind(&self, kind: ModelKind) -> Option<&str> {
        let prompt = match kind {
            ModelKind::SchemaExtractor => &self.schema,
            ModelKind::CodeGenerator => &self.code,
            ModelKind::CodeReviewer => &self.review,
            ModelKind::DocGenerator => &self.docs,
        };
        prompt.as_deref().filter(|p| !p.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Enhancement {
    pub analysis: ContextAnalysis,
    pub prompts: StagePrompts,
}

/// Everything one generation run needs from the caller.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationContext {
    request_id: Uuid,
    user_id: Option<String>,
    prompt: String,
    domain: String,
    tech_stack: String,
    constraints: Vec<String>,
    enhancement: Option<Enhancement>,
}

impl GenerationContext {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            user_id: None,
            prompt: prompt.into(),
            domain: String::new(),
            tech_stack: "python".to_string(),
            constraints: Vec::new(),
            enhancement: None,
        }
    }

    pub fn with_request_id(mut self, id: Uuid) -> Self {
        self.request_id = id;
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    pub fn with_tech_stack(mut self, tech_stack: impl Into<String>) -> Self {
        self.tech_stack = tech_stack.into();
        self
    }

    pub fn with_constraints(mut self, constraints: Vec<String>) -> Self {
        self.constraints = constraints;
        self
    }

    /// A copy of this context whose stages use the enhanced prompts.
    pub fn enhanced(&self, enhancement: Enhancement) -> Self {
        let mut next = self.clone();
        next.enhancement = Some(enhancement);
        next
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn tech_stack(&self) -> &str {
        &self.tech_stack
    }

    pub fn constraints(&self) -> &[String] {
        &self.constraints
    }

    pub fn enhancement(&self) -> Option<&Enhancement> {
        self.enhancement.as_ref()
    }

    pub fn is_enhanced(&self) -> bool {
        self.enhancement.is_some()
    }

    /// The prompt a given stage should see.
    pub fn prompt_for(&self, kind: ModelKind) -> &str {
        self.enhancement
            .as_ref()
            .and_then(|e| e.prompts.for_kind(kind))
            .unwrap_or(&self.prompt)
    }

    /// Short slug derived from the prompt, e.g. `todo-list-api`.
    pub fn project_name(&self) -> String {
        let words: Vec<String> = self
            .prompt
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|w| w.len() > 1)
            .map(|w| w.to_ascii_lowercase())
            .filter(|w| !STOP_WORDS.contains(&w.as_str()))
            .take(3)
            .collect();
        if words.is_empty() {
            "generated-backend".to_string()
        } else {
            words.join("-")
        }
    }
}

const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "for", "with", "and", "or", "to", "of", "in", "on", "that", "build", "create",
    "make", "me", "my", "please", "simple", "which", "where", "can",
];
