//! The closed set of generation task roles.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

const GIB: u64 = 1024 * 1024 * 1024;

/// Generation task role. Used as the key for slots, adapters and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    SchemaExtractor,
    CodeGenerator,
    CodeReviewer,
    DocGenerator,
}

impl ModelKind {
    /// All kinds in pipeline stage order.
    pub const ALL: [ModelKind; 4] = [
        ModelKind::SchemaExtractor,
        ModelKind::CodeGenerator,
        ModelKind::CodeReviewer,
        ModelKind::DocGenerator,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SchemaExtractor => "schema_extractor",
            Self::CodeGenerator => "code_generator",
            Self::CodeReviewer => "code_reviewer",
            Self::DocGenerator => "doc_generator",
        }
    }

    /// Fixed resident-memory estimate. Bookkeeping only, never a limiter.
    pub fn memory_estimate_bytes(&self) -> u64 {
        match self {
            Self::SchemaExtractor => 4 * GIB,
            Self::CodeGenerator => 14 * GIB,
            Self::CodeReviewer => 7 * GIB,
            Self::DocGenerator => 2 * GIB,
        }
    }

    /// Default output budget for one call of this kind.
    pub fn default_max_tokens(&self) -> u32 {
        match self {
            Self::SchemaExtractor => 1024,
            Self::CodeGenerator => 4096,
            Self::CodeReviewer => 1024,
            Self::DocGenerator => 2048,
        }
    }

    pub fn default_temperature(&self) -> f32 {
        match self {
            Self::SchemaExtractor => 0.1,
            Self::CodeGenerator => 0.2,
            Self::CodeReviewer => 0.1,
            Self::DocGenerator => 0.4,
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "schema_extractor" | "schema" => Ok(Self::SchemaExtractor),
            "code_generator" | "code" | "codegen" => Ok(Self::CodeGenerator),
            "code_reviewer" | "review" | "reviewer" => Ok(Self::CodeReviewer),
            "doc_generator" | "docs" | "documentation" => Ok(Self::DocGenerator),
            other => Err(format!("unknown model kind '{other}'")),
        }
    }
}
