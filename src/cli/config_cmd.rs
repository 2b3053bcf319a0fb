// Copyright 2024-2026 forge-core Contributors
// SPDX-License-Identifier: Apache-2.0

//! Config CLI subcommands: show, defaults, validate.
//!
//! These read configuration directly from environment variables; nothing
//! is loaded or probed.

use crate::config::{EffectiveConfig, EnvConfig};

/// Print effective config as key-value pairs to stdout.
pub fn run_show(env: &EnvConfig) {
    print_config(&env.effective_config());
}

/// Print default config values (no env overrides) to stdout.
pub fn run_defaults() {
    print_config(&EnvConfig::default().effective_config());
}

/// Validate configuration.
///
/// Returns 0 if valid, 2 on a configuration error. Non-fatal findings are
/// printed as warnings.
pub fn run_validate(env: &EnvConfig) -> i32 {
    if let Err(e) = env.validate() {
        eprintln!("ERROR: {}", e);
        return super::EXIT_CONFIG;
    }

    for warning in warnings(env) {
        eprintln!("WARNING: {}", warning);
    }
    println!("Configuration is valid.");
    0
}

fn warnings(env: &EnvConfig) -> Vec<String> {
    let mut out = Vec::new();
    if env.max_concurrent == 1 {
        out.push(
            "FORGE_CORE_MAX_CONCURRENT is 1; every stage after the first reloads its adapter"
                .to_string(),
        );
    }
    if env.inference.url.is_some() && env.inference.token.is_none() {
        out.push("FORGE_CORE_INFERENCE_URL is set without FORGE_CORE_INFERENCE_TOKEN".to_string());
    }
    if env.stage_timeout.is_none() {
        out.push("FORGE_CORE_STAGE_TIMEOUT is 0; stages may wait indefinitely".to_string());
    }
    out
}

fn config_lines(cfg: &EffectiveConfig) -> Vec<(&'static str, String)> {
    vec![
        ("FORGE_CORE_MAX_CONCURRENT", cfg.max_concurrent.to_string()),
        ("FORGE_CORE_FORCE_MODE", cfg.force_mode.clone()),
        ("FORGE_CORE_FULL_MIN_MEMORY", cfg.full_min_memory.to_string()),
        ("FORGE_CORE_MODEL_DIR", cfg.model_dir.display().to_string()),
        ("FORGE_CORE_SCHEMA_MODEL", cfg.models.schema.clone()),
        ("FORGE_CORE_CODEGEN_MODEL", cfg.models.codegen.clone()),
        ("FORGE_CORE_REVIEW_MODEL", cfg.models.review.clone()),
        ("FORGE_CORE_DOCS_MODEL", cfg.models.docs.clone()),
        ("FORGE_CORE_INFERENCE_URL", cfg.inference_url.clone().unwrap_or_default()),
        (
            "FORGE_CORE_INFERENCE_TOKEN",
            if cfg.inference_token_set { "<set>" } else { "" }.to_string(),
        ),
        ("FORGE_CORE_INFERENCE_MODEL", cfg.inference_model.clone()),
        ("FORGE_CORE_INFERENCE_TIMEOUT", cfg.inference_timeout_secs.to_string()),
        ("FORGE_CORE_STAGE_TIMEOUT", cfg.stage_timeout_secs.to_string()),
        ("FORGE_CORE_ENHANCEMENT", cfg.enhancement.to_string()),
        ("FORGE_CORE_N_CTX", cfg.n_ctx.to_string()),
        ("FORGE_CORE_N_THREADS", cfg.n_threads.to_string()),
        ("FORGE_CORE_GPU_LAYERS", cfg.n_gpu_layers.to_string()),
        ("FORGE_CORE_LOG_FORMAT", cfg.log_format.clone()),
        ("FORGE_CORE_LOG_LEVEL", cfg.log_level.clone()),
    ]
}

fn print_config(cfg: &EffectiveConfig) {
    for (key, value) in config_lines(cfg) {
        println!("{}={}", key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_passes_with_defaults() {
        let code = run_validate(&EnvConfig::default());
        assert_eq!(code, 0, "default config should pass validation");
    }

    #[test]
    fn test_validate_rejects_zero_concurrent() {
        let env = EnvConfig { max_concurrent: 0, ..EnvConfig::default() };
        assert_eq!(run_validate(&env), super::super::EXIT_CONFIG);
    }

    #[test]
    fn test_validate_rejects_unknown_mode() {
        let env = EnvConfig { force_mode: "turbo".to_string(), ..EnvConfig::default() };
        assert_eq!(run_validate(&env), super::super::EXIT_CONFIG);
    }

    #[test]
    fn test_warnings_for_single_slot_and_missing_token() {
        let mut env = EnvConfig { max_concurrent: 1, ..EnvConfig::default() };
        env.inference.url = Some("https://inference.local/v1/chat/completions".to_string());
        let found = warnings(&env);
        assert_eq!(found.len(), 2);
        assert_eq!(run_validate(&env), 0, "warnings do not fail validation");
    }

    #[test]
    fn test_config_lines_hide_token() {
        let mut env = EnvConfig::default();
        env.inference.token = Some("secret-token".to_string());
        let lines = config_lines(&env.effective_config());
        let token = lines.iter().find(|(k, _)| *k == "FORGE_CORE_INFERENCE_TOKEN").unwrap();
        assert_eq!(token.1, "<set>");
        assert!(lines.iter().all(|(_, v)| !v.contains("secret-token")));
    }

    #[test]
    fn test_config_lines_cover_defaults() {
        let lines = config_lines(&EnvConfig::default().effective_config());
        let get = |key: &str| lines.iter().find(|(k, _)| *k == key).map(|(_, v)| v.clone());
        assert_eq!(get("FORGE_CORE_MAX_CONCURRENT").as_deref(), Some("2"));
        assert_eq!(get("FORGE_CORE_FORCE_MODE").as_deref(), Some("auto"));
        assert_eq!(get("FORGE_CORE_STAGE_TIMEOUT").as_deref(), Some("300"));
    }
}
