//! Typed artifacts produced by the generation stages.
//!
//! These are the shapes that flow between stages and end up in a
//! `PipelineResult`. Maps are ordered so serialized output is stable.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Generated project files: path → content.
pub type FileSet = BTreeMap<String, String>;

/// A single field on an extracted entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type", default = "default_field_type")]
    pub field_type: String,
    #[serde(default)]
    pub required: bool,
}

fn default_field_type() -> String {
    "string".to_string()
}

impl Field {
    pub fn new(name: &str, field_type: &str, required: bool) -> Self {
        Self {
            name: name.to_string(),
            field_type: field_type.to_string(),
            required,
        }
    }
}

/// A domain entity extracted from the prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<Field>,
}

/// A relationship between two entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub from: String,
    pub to: String,
    #[serde(default = "default_cardinality")]
    pub kind: String,
}

fn default_cardinality() -> String {
    "one_to_many".to_string()
}

/// An HTTP endpoint the generated backend should expose.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub description: String,
}

impl Endpoint {
    pub fn new(method: &str, path: &str, description: &str) -> Self {
        Self {
            method: method.to_string(),
            path: path.to_string(),
            description: description.to_string(),
        }
    }
}

/// Output of the schema extraction stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSchema {
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
    #[serde(default)]
    pub constraints: Vec<String>,
}

impl ProjectSchema {
    pub fn has_entities(&self) -> bool {
        !self.entities.is_empty()
    }

    pub fn has_endpoints(&self) -> bool {
        !self.endpoints.is_empty()
    }
}

/// Severity of a review finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Info,
    Warning,
    Error,
}

/// A single problem the reviewer found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewIssue {
    #[serde(default)]
    pub file: Option<String>,
    pub message: String,
    #[serde(default = "default_severity")]
    pub severity: IssueSeverity,
}

fn default_severity() -> IssueSeverity {
    IssueSeverity::Warning
}

/// Review scores, each in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReviewScores {
    pub overall: f64,
    #[serde(default = "neutral_score")]
    pub correctness: f64,
    #[serde(default = "neutral_score")]
    pub security: f64,
    #[serde(default = "neutral_score")]
    pub maintainability: f64,
}

fn neutral_score() -> f64 {
    ReviewScores::NEUTRAL
}

impl ReviewScores {
    pub const NEUTRAL: f64 = 0.5;

    pub fn neutral() -> Self {
        Self {
            overall: Self::NEUTRAL,
            correctness: Self::NEUTRAL,
            security: Self::NEUTRAL,
            maintainability: Self::NEUTRAL,
        }
    }

    /// Bring every score into [0, 1]. Reviewers reporting on a 0–10 scale
    /// are rescaled; non-finite values become neutral.
    pub fn normalized(self) -> Self {
        fn norm(v: f64) -> f64 {
            if !v.is_finite() {
                return ReviewScores::NEUTRAL;
            }
            let v = if v > 1.0 && v <= 10.0 { v / 10.0 } else { v };
            v.clamp(0.0, 1.0)
        }
        Self {
            overall: norm(self.overall),
            correctness: norm(self.correctness),
            security: norm(self.security),
            maintainability: norm(self.maintainability),
        }
    }
}

/// Output of the code review stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewFeedback {
    #[serde(default)]
    pub issues: Vec<ReviewIssue>,
    #[serde(default)]
    pub suggestions: Vec<String>,
    pub scores: ReviewScores,
}

/// Output of the documentation stage: document name → markdown.
pub type Documentation = BTreeMap<String, String>;
