//! Parsing of raw model text into typed artifacts.
//!
//! Models are asked for JSON (schema, review) or for fenced file blocks
//! headed by `### File: <path>` (code, docs). Parsers tolerate surrounding
//! prose and markdown fences.

use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

use crate::artifacts::{FileSet, ProjectSchema, ReviewFeedback, ReviewIssue, ReviewScores};

/// Locate the first balanced top-level JSON object in `text`.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse a schema from model output.
pub fn parse_schema(text: &str) -> Result<ProjectSchema, String> {
    let json = extract_json_object(text).ok_or("no JSON object in output")?;
    let schema: ProjectSchema = serde_json::from_str(json).map_err(|e| e.to_string())?;
    if !schema.has_entities() && !schema.has_endpoints() {
        return Err("schema has neither entities nor endpoints".into());
    }
    Ok(schema)
}

#[derive(Deserialize)]
struct RawReview {
    #[serde(default)]
    issues: Vec<ReviewIssue>,
    #[serde(default)]
    suggestions: Vec<String>,
    #[serde(default)]
    scores: Option<ReviewScores>,
    #[serde(default, alias = "overall_score", alias = "score")]
    overall: Option<f64>,
}

/// Parse review feedback. Accepts nested `scores` or a flat `overall` number.
pub fn parse_review(text: &str) -> Result<ReviewFeedback, String> {
    let json = extract_json_object(text).ok_or("no JSON object in output")?;
    let raw: RawReview = serde_json::from_str(json).map_err(|e| e.to_string())?;
    let scores = match (raw.scores, raw.overall) {
        (Some(scores), _) => scores,
        (None, Some(overall)) => ReviewScores { overall, ..ReviewScores::neutral() },
        (None, None) => return Err("review has no scores".into()),
    };
    Ok(ReviewFeedback {
        issues: raw.issues,
        suggestions: raw.suggestions,
        scores: scores.normalized(),
    })
}

fn file_block_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?mis)^[ \t]*(?:#+[ \t]*)?(?:\*\*)?(?:file|path)[ \t]*:[ \t]*(?:\*\*)?[ \t]*`?([^\s`*]+)`?(?:\*\*)?[ \t]*\r?\n```[^\n]*\n(.*?)\n```")
            .expect("file block pattern is valid")
    })
}

/// Normalise a model-supplied path. Rejects absolute paths and traversal.
pub fn sanitize_path(raw: &str) -> Option<String> {
    let path = raw.trim().replace('\\', "/");
    let path = path.trim_start_matches("./");
    if path.is_empty() || path.starts_with('/') || path.contains(':') {
        return None;
    }
    if path.split('/').any(|seg| seg.is_empty() || seg == "..") {
        return None;
    }
    Some(path.to_string())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawFiles {
    Map(std::collections::BTreeMap<String, String>),
    List(Vec<RawFile>),
}

#[derive(Deserialize)]
struct RawFile {
    path: String,
    content: String,
}

#[derive(Deserialize)]
struct RawFileEnvelope {
    files: RawFiles,
}

fn parse_files_json(text: &str) -> Option<FileSet> {
    let json = extract_json_object(text)?;
    let envelope: RawFileEnvelope = serde_json::from_str(json).ok()?;
    let pairs: Vec<(String, String)> = match envelope.files {
        RawFiles::Map(map) => map.into_iter().collect(),
        RawFiles::List(list) => list.into_iter().map(|f| (f.path, f.content)).collect(),
    };
    let files: FileSet = pairs
        .into_iter()
        .filter_map(|(path, content)| sanitize_path(&path).map(|p| (p, content)))
        .collect();
    (!files.is_empty()).then_some(files)
}

/// Parse generated files from model output.
///
/// Fenced `File:` blocks take precedence; a `{"files": ..}` JSON envelope
/// is accepted otherwise. Unsafe paths are dropped.
pub fn parse_files(text: &str) -> FileSet {
    let mut files = FileSet::new();
    for caps in file_block_pattern().captures_iter(text) {
        if let Some(path) = sanitize_path(&caps[1]) {
            files.insert(path, format!("{}\n", &caps[2]));
        }
    }
    if files.is_empty() {
        if let Some(json_files) = parse_files_json(text) {
            return json_files;
        }
    }
    files
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_with_prose_and_braces_in_strings() {
        let text = "Here you go:\n```json\n{\"a\": \"x}y\", \"b\": {\"c\": 1}}\n```\nDone.";
        assert_eq!(extract_json_object(text), Some("{\"a\": \"x}y\", \"b\": {\"c\": 1}}"));
    }

    #[test]
    fn test_extract_json_unbalanced() {
        assert_eq!(extract_json_object("{\"a\": 1"), None);
        assert_eq!(extract_json_object("no json"), None);
    }

    #[test]
    fn test_parse_schema() {
        let text = r#"{"entities":[{"name":"Book","fields":[{"name":"title","type":"string","required":true}]}],
                      "endpoints":[{"method":"GET","path":"/books"}]}"#;
        let schema = parse_schema(text).unwrap();
        assert_eq!(schema.entities[0].name, "Book");
        assert_eq!(schema.endpoints[0].path, "/books");
        assert!(schema.relationships.is_empty());
    }

    #[test]
    fn test_parse_schema_rejects_empty() {
        assert!(parse_schema("{}").is_err());
    }

    #[test]
    fn test_parse_review_flat_ten_point_scale() {
        let review = parse_review(r#"{"issues":[{"message":"no auth"}],"overall_score":8}"#).unwrap();
        assert!((review.scores.overall - 0.8).abs() < 1e-9);
        assert_eq!(review.issues.len(), 1);
        assert_eq!(review.scores.security, ReviewScores::NEUTRAL);
    }

    #[test]
    fn test_parse_review_requires_score() {
        assert!(parse_review(r#"{"issues":[]}"#).is_err());
    }

    #[test]
    fn test_parse_file_blocks() {
        let text = "Project:\n\n### File: main.py\n```python\nprint('hi')\n```\n\n**File:** `app/models.py`\n```python\nclass A: pass\n```\n";
        let files = parse_files(text);
        assert_eq!(files.len(), 2);
        assert_eq!(files["main.py"], "print('hi')\n");
        assert!(files.contains_key("app/models.py"));
    }

    #[test]
    fn test_parse_files_json_envelope() {
        let text = r#"{"files": [{"path": "src/index.js", "content": "x"}, {"path": "../etc/passwd", "content": "y"}]}"#;
        let files = parse_files(text);
        assert_eq!(files.len(), 1);
        assert_eq!(files["src/index.js"], "x");
    }

    #[test]
    fn test_sanitize_path() {
        assert_eq!(sanitize_path("./src\\main.rs").as_deref(), Some("src/main.rs"));
        assert_eq!(sanitize_path("/etc/passwd"), None);
        assert_eq!(sanitize_path("a/../b"), None);
        assert_eq!(sanitize_path("C:/x"), None);
    }
}
