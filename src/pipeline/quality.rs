//! Quality score blending file coverage, schema completeness and review.

use crate::artifacts::{FileSet, ProjectSchema, ReviewFeedback};

/// Files at or above this count earn the full coverage share.
const TARGET_FILES: f64 = 5.0;

const FILES_WEIGHT: f64 = 0.3;
const SCHEMA_WEIGHT: f64 = 0.2;
const REVIEW_WEIGHT: f64 = 0.5;

/// Score in [0, 1].
pub fn quality_score(files: &FileSet, schema: &ProjectSchema, review: &ReviewFeedback) -> f64 {
    let coverage = (files.len() as f64 / TARGET_FILES).min(1.0);
    let completeness = 0.5 * f64::from(u8::from(schema.has_entities()))
        + 0.5 * f64::from(u8::from(schema.has_endpoints()));
    let overall = if review.scores.overall.is_finite() { review.scores.overall } else { 0.0 };

    let score = FILES_WEIGHT * coverage + SCHEMA_WEIGHT * completeness + REVIEW_WEIGHT * overall;
    score.clamp(0.0, 1.0)
}
