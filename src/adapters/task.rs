//! Task-specific inputs and outputs for each adapter kind.

use crate::artifacts::{Documentation, FileSet, ProjectSchema, ReviewFeedback};

use super::ModelKind;

#[derive(Debug, Clone)]
pub struct SchemaTask {
    pub prompt: String,
    pub domain: String,
    pub tech_stack: String,
    pub constraints: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct CodeTask {
    pub prompt: String,
    pub domain: String,
    pub tech_stack: String,
    pub constraints: Vec<String>,
    pub schema: ProjectSchema,
}

#[derive(Debug, Clone)]
pub struct ReviewTask {
    pub prompt: String,
    pub tech_stack: String,
    pub schema: ProjectSchema,
    pub files: FileSet,
}

#[derive(Debug, Clone)]
pub struct DocsTask {
    pub prompt: String,
    pub project_name: String,
    pub tech_stack: String,
    pub schema: ProjectSchema,
    pub files: FileSet,
    pub review: ReviewFeedback,
}

/// Input to `ModelAdapter::generate`.
#[derive(Debug, Clone)]
pub enum TaskInput {
    Schema(SchemaTask),
    Code(CodeTask),
    Review(ReviewTask),
    Docs(DocsTask),
}

impl TaskInput {
    /// The adapter kind this input is meant for.
    pub fn kind(&self) -> ModelKind {
        match self {
            Self::Schema(_) => ModelKind::SchemaExtractor,
            Self::Code(_) => ModelKind::CodeGenerator,
            Self::Review(_) => ModelKind::CodeReviewer,
            Self::Docs(_) => ModelKind::DocGenerator,
        }
    }
}

/// Output of `ModelAdapter::generate`.
#[derive(Debug, Clone)]
pub enum TaskOutput {
    Schema(ProjectSchema),
    Code(FileSet),
    Review(ReviewFeedback),
    Docs(Documentation),
}

impl TaskOutput {
    pub fn kind(&self) -> ModelKind {
        match self {
            Self::Schema(_) => ModelKind::SchemaExtractor,
            Self::Code(_) => ModelKind::CodeGenerator,
            Self::Review(_) => ModelKind::CodeReviewer,
            Self::Docs(_) => ModelKind::DocGenerator,
        }
    }
}
