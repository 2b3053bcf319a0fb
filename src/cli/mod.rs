// Copyright 2024-2026 forge-core Contributors
// SPDX-License-Identifier: Apache-2.0

//! CLI module for forge-core commands.
//!
//! Runs the pipeline in-process: no server, no persistence. Configuration
//! comes from `FORGE_CORE_*` environment variables.
//!
//! ## Usage
//!
//! ```bash
//! forge-core-cli generate "a todo api with users" --stack python --out ./todo
//! forge-core-cli status --json
//! forge-core-cli config validate
//! ```

pub mod config_cmd;
pub mod generate_cmd;
pub mod status_cmd;

use std::path::PathBuf;

use thiserror::Error;

pub use generate_cmd::run_generate;
pub use status_cmd::run_status;

/// Exit code for an invalid configuration.
pub const EXIT_CONFIG: i32 = 2;
/// Exit code for a generation that did not complete.
pub const EXIT_GENERATION: i32 = 1;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ArgError {
    #[error("missing prompt")]
    MissingPrompt,

    #[error("option {0} requires a value")]
    MissingValue(String),

    #[error("unknown option {0}")]
    UnknownOption(String),
}

/// Parsed arguments of `generate`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateArgs {
    pub prompt: String,
    pub tech_stack: String,
    pub domain: Option<String>,
    pub user_id: Option<String>,
    pub constraints: Vec<String>,
    pub json: bool,
    pub out_dir: Option<PathBuf>,
}

impl GenerateArgs {
    /// Parse the arguments that follow `generate`. Words that are not
    /// options are joined into the prompt.
    pub fn parse(args: &[String]) -> Result<Self, ArgError> {
        let mut words = Vec::new();
        let mut parsed = GenerateArgs {
            prompt: String::new(),
            tech_stack: "python".to_string(),
            domain: None,
            user_id: None,
            constraints: Vec::new(),
            json: false,
            out_dir: None,
        };

        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            let mut value = |name: &str| {
                iter.next().cloned().ok_or_else(|| ArgError::MissingValue(name.to_string()))
            };
            match arg.as_str() {
                "--stack" | "-s" => parsed.tech_stack = value(arg.as_str())?,
                "--domain" | "-d" => parsed.domain = Some(value(arg.as_str())?),
                "--user" | "-u" => parsed.user_id = Some(value(arg.as_str())?),
                "--constraint" | "-c" => parsed.constraints.push(value(arg.as_str())?),
                "--out" | "-o" => parsed.out_dir = Some(PathBuf::from(value(arg.as_str())?)),
                "--json" => parsed.json = true,
                flag if flag.starts_with('-') && flag.len() > 1 => {
                    return Err(ArgError::UnknownOption(flag.to_string()))
                }
                word => words.push(word),
            }
        }

        parsed.prompt = words.join(" ").trim().to_string();
        if parsed.prompt.is_empty() {
            return Err(ArgError::MissingPrompt);
        }
        Ok(parsed)
    }
}

/// True if `--json` appears anywhere in `args`.
pub fn wants_json(args: &[String]) -> bool {
    args.iter().any(|a| a == "--json")
}
