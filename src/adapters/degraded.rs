//! Lightweight rule-based adapters.
//!
//! These back the schema, review and documentation kinds when local
//! weights cannot be loaded. They are deterministic and never touch a model.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::artifacts::{
    Documentation, Endpoint, Entity, Field, IssueSeverity, ProjectSchema, Relationship,
    ReviewFeedback, ReviewIssue, ReviewScores,
};

use super::{
    unexpected, AdapterError, DocsTask, LoadGuard, ModelAdapter, ModelKind, ReviewTask, SchemaTask,
    TaskInput, TaskOutput,
};

/// Nouns recognised as entities, singular form.
const ENTITY_WORDS: &[&str] = &[
    "user", "customer", "account", "product", "order", "item", "category", "book", "author",
    "post", "comment", "article", "task", "project", "invoice", "payment", "review", "event",
    "ticket", "message", "employee", "department", "student", "course", "booking", "room",
    "recipe", "ingredient", "patient", "appointment", "vehicle", "note", "tag", "team",
];

const AUTH_WORDS: &[&str] = &["auth", "login", "signup", "jwt", "authentication"];

/// Compare a lowercase token to a singular noun, allowing simple plurals.
fn same_noun(token: &str, word: &str) -> bool {
    token == word
        || token.strip_suffix('s') == Some(word)
        || token.strip_suffix("es") == Some(word)
        || (word.ends_with('y')
            && token.strip_suffix("ies") == word.strip_suffix('y'))
}

pub(crate) fn pluralize(word: &str) -> String {
    let bytes = word.as_bytes();
    let vowel_before_y = bytes.len() >= 2 && b"aeiou".contains(&bytes[bytes.len() - 2]);
    if word.ends_with('y') && !vowel_before_y {
        format!("{}ies", &word[..word.len() - 1])
    } else if ["s", "x", "ch", "sh"].iter().any(|s| word.ends_with(s)) {
        format!("{word}es")
    } else {
        format!("{word}s")
    }
}

pub(crate) fn pascal_case(word: &str) -> String {
    word.split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(|s| {
            let mut chars = s.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

fn tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_ascii_lowercase())
        .collect()
}

/// Standard CRUD endpoints for one entity.
pub(crate) fn crud_endpoints(entity: &str) -> Vec<Endpoint> {
    let plural = pluralize(&entity.to_ascii_lowercase());
    let collection = format!("/{plural}");
    let member = format!("/{plural}/{{id}}");
    vec![
        Endpoint::new("GET", &collection, &format!("List {plural}")),
        Endpoint::new("POST", &collection, &format!("Create a {}", entity.to_ascii_lowercase())),
        Endpoint::new("GET", &member, &format!("Fetch one {}", entity.to_ascii_lowercase())),
        Endpoint::new("PUT", &member, &format!("Update a {}", entity.to_ascii_lowercase())),
        Endpoint::new("DELETE", &member, &format!("Delete a {}", entity.to_ascii_lowercase())),
    ]
}

pub(crate) fn base_fields() -> Vec<Field> {
    vec![
        Field::new("id", "integer", true),
        Field::new("name", "string", true),
        Field::new("created_at", "datetime", true),
    ]
}

/// Keyword-driven schema extraction.
pub struct HeuristicSchemaExtractor {
    guard: LoadGuard,
}

impl HeuristicSchemaExtractor {
    pub fn new() -> Self {
        Self { guard: LoadGuard::new(ModelKind::SchemaExtractor) }
    }

    /// Derive a schema from the words in the request.
    pub fn extract(task: &SchemaTask) -> Option<ProjectSchema> {
        let words = tokens(&format!("{} {}", task.prompt, task.domain));
        let mut found: Vec<&str> = Vec::new();
        for token in &words {
            if let Some(word) = ENTITY_WORDS.iter().find(|w| same_noun(token, w)).copied() {
                if !found.contains(&word) {
                    found.push(word);
                }
            }
        }
        if found.is_empty() {
            return None;
        }

        let owner = found
            .iter()
            .find(|w| ["user", "customer", "account"].contains(*w))
            .copied();
        let mut schema = ProjectSchema::default();
        for word in &found {
            let name = pascal_case(word);
            let mut fields = base_fields();
            if let Some(owner) = owner.filter(|o| o != word) {
                fields.push(Field::new(&format!("{owner}_id"), "integer", true));
                schema.relationships.push(Relationship {
                    from: pascal_case(owner),
                    to: name.clone(),
                    kind: "one_to_many".to_string(),
                });
            }
            schema.endpoints.extend(crud_endpoints(&name));
            schema.entities.push(Entity { name, fields });
        }

        if words.iter().any(|t| AUTH_WORDS.contains(&t.as_str())) {
            schema.endpoints.push(Endpoint::new("POST", "/auth/login", "Issue an access token"));
            schema.constraints.push("authentication required".to_string());
        }
        schema.constraints.extend(task.constraints.iter().cloned());
        Some(schema)
    }
}

impl Default for HeuristicSchemaExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelAdapter for HeuristicSchemaExtractor {
    fn kind(&self) -> ModelKind {
        ModelKind::SchemaExtractor
    }

    async fn load(&mut self) -> Result<(), AdapterError> {
        self.guard.begin()?;
        self.guard.finish();
        Ok(())
    }

    async fn generate(
        &self,
        input: TaskInput,
        _cancel: &CancellationToken,
    ) -> Result<TaskOutput, AdapterError> {
        self.guard.ensure_loaded()?;
        let task = match input {
            TaskInput::Schema(task) => task,
            other => return Err(unexpected(self.kind(), &other)),
        };
        Self::extract(&task).map(TaskOutput::Schema).ok_or_else(|| AdapterError::Parse {
            kind: self.kind(),
            reason: "no recognizable entities in request".into(),
        })
    }

    async fn cleanup(&mut self) -> Result<(), AdapterError> {
        self.guard.release();
        Ok(())
    }
}

const SECRET_MARKERS: &[&str] = &["password = \"", "password=\"", "secret_key = \"", "api_key = \""];

/// Rule-based review over the generated files.
pub struct HeuristicReviewer {
    guard: LoadGuard,
}

impl HeuristicReviewer {
    pub fn new() -> Self {
        Self { guard: LoadGuard::new(ModelKind::CodeReviewer) }
    }

    pub fn review(task: &ReviewTask) -> ReviewFeedback {
        let mut issues = Vec::new();
        let mut suggestions = Vec::new();
        let mut empty_files = 0u32;
        let mut secrets = 0u32;

        for (path, content) in &task.files {
            if content.trim().is_empty() {
                empty_files += 1;
                issues.push(ReviewIssue {
                    file: Some(path.clone()),
                    message: "file is empty".into(),
                    severity: IssueSeverity::Warning,
                });
            }
            if content.contains("TODO") {
                issues.push(ReviewIssue {
                    file: Some(path.clone()),
                    message: "unfinished TODO left in generated code".into(),
                    severity: IssueSeverity::Info,
                });
            }
            let lowered = content.to_ascii_lowercase();
            if SECRET_MARKERS.iter().any(|m| lowered.contains(m)) {
                secrets += 1;
                issues.push(ReviewIssue {
                    file: Some(path.clone()),
                    message: "hard-coded credential".into(),
                    severity: IssueSeverity::Error,
                });
            }
        }

        let has_tests = task.files.keys().any(|p| p.to_ascii_lowercase().contains("test"));
        let has_readme = task.files.keys().any(|p| p.eq_ignore_ascii_case("README.md"));
        if !has_tests {
            suggestions.push("add automated tests for each endpoint".to_string());
        }
        if !has_readme {
            suggestions.push("add a README describing setup and usage".to_string());
        }
        if secrets > 0 {
            suggestions.push("load credentials from environment variables".to_string());
        }

        let correctness = 0.8 - 0.1 * f64::from(empty_files);
        let security = 0.9 - 0.3 * f64::from(secrets);
        let maintainability = 0.5
            + if has_tests { 0.25 } else { 0.0 }
            + if has_readme { 0.15 } else { 0.0 };
        let overall = (correctness + security + maintainability) / 3.0;

        ReviewFeedback {
            issues,
            suggestions,
            scores: ReviewScores { overall, correctness, security, maintainability }.normalized(),
        }
    }
}

impl Default for HeuristicReviewer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelAdapter for HeuristicReviewer {
    fn kind(&self) -> ModelKind {
        ModelKind::CodeReviewer
    }

    async fn load(&mut self) -> Result<(), AdapterError> {
        self.guard.begin()?;
        self.guard.finish();
        Ok(())
    }

    async fn generate(
        &self,
        input: TaskInput,
        _cancel: &CancellationToken,
    ) -> Result<TaskOutput, AdapterError> {
        self.guard.ensure_loaded()?;
        match input {
            TaskInput::Review(task) => Ok(TaskOutput::Review(Self::review(&task))),
            other => Err(unexpected(self.kind(), &other)),
        }
    }

    async fn cleanup(&mut self) -> Result<(), AdapterError> {
        self.guard.release();
        Ok(())
    }
}

/// Template-driven documentation.
pub struct TemplateDocGenerator {
    guard: LoadGuard,
}

impl TemplateDocGenerator {
    pub fn new() -> Self {
        Self { guard: LoadGuard::new(ModelKind::DocGenerator) }
    }

    pub fn render(task: &DocsTask) -> Documentation {
        let mut readme = format!(
            "# {}\n\n{}\n\n## Tech stack\n\n{}\n\n## Endpoints\n\n| Method | Path | Description |\n|---|---|---|\n",
            task.project_name,
            task.prompt.trim(),
            task.tech_stack
        );
        for ep in &task.schema.endpoints {
            readme.push_str(&format!("| {} | `{}` | {} |\n", ep.method, ep.path, ep.description));
        }
        readme.push_str("\n## Files\n\n");
        for path in task.files.keys() {
            readme.push_str(&format!("- `{path}`\n"));
        }
        readme.push_str(&format!(
            "\n## Review\n\nOverall score: {:.2}. {} issue(s) reported.\n",
            task.review.scores.overall,
            task.review.issues.len()
        ));

        let mut api = String::from("# API reference\n");
        for entity in &task.schema.entities {
            api.push_str(&format!("\n## {}\n\n", entity.name));
            for field in &entity.fields {
                let req = if field.required { "required" } else { "optional" };
                api.push_str(&format!("- `{}` ({}, {})\n", field.name, field.field_type, req));
            }
        }

        let mut docs = Documentation::new();
        docs.insert("README.md".to_string(), readme);
        docs.insert("API.md".to_string(), api);
        docs
    }
}

impl Default for TemplateDocGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelAdapter for TemplateDocGenerator {
    fn kind(&self) -> ModelKind {
        ModelKind::DocGenerator
    }

    async fn load(&mut self) -> Result<(), AdapterError> {
        self.guard.begin()?;
        self.guard.finish();
        Ok(())
    }

    async fn generate(
        &self,
        input: TaskInput,
        _cancel: &CancellationToken,
    ) -> Result<TaskOutput, AdapterError> {
        self.guard.ensure_loaded()?;
        match input {
            TaskInput::Docs(task) => Ok(TaskOutput::Docs(Self::render(&task))),
            other => Err(unexpected(self.kind(), &other)),
        }
    }

    async fn cleanup(&mut self) -> Result<(), AdapterError> {
        self.guard.release();
        Ok(())
    }
}
