// Copyright 2024-2026 forge-core Contributors
// SPDX-License-Identifier: Apache-2.0

//! Generate CLI subcommand.
//!
//! Runs one generation in-process and prints a summary (or the full record
//! as JSON). With `--out`, generated files and documentation are written
//! below that directory.

use std::io;
use std::path::{Component, Path, PathBuf};

use tokio_util::sync::CancellationToken;

use crate::generation::{GenerationRecord, GenerationStatus};
use crate::pipeline::{GenerationContext, PipelineResult};
use crate::Runtime;

use super::{GenerateArgs, EXIT_GENERATION};

/// Run `generate`. Returns 0 when the record completed.
pub async fn run_generate(runtime: &Runtime, args: &GenerateArgs, cancel: &CancellationToken) -> i32 {
    let ctx = context_for(args);
    let record = match runtime.generate(&ctx, cancel).await {
        Ok(record) => record,
        Err(e) => {
            eprintln!("Generation error: {}", e);
            return EXIT_GENERATION;
        }
    };

    if args.json {
        match serde_json::to_string_pretty(&record) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Failed to serialize record: {}", e);
                return EXIT_GENERATION;
            }
        }
    } else {
        print_summary(&record);
    }

    if let (Some(dir), Some(result)) = (&args.out_dir, &record.result) {
        match write_project(dir, result) {
            Ok(count) => eprintln!("Wrote {} file(s) to {}", count, dir.display()),
            Err(e) => {
                eprintln!("Failed to write project to {}: {}", dir.display(), e);
                return EXIT_GENERATION;
            }
        }
    }

    if record.status == GenerationStatus::Completed {
        0
    } else {
        EXIT_GENERATION
    }
}

fn context_for(args: &GenerateArgs) -> GenerationContext {
    let mut ctx = GenerationContext::new(args.prompt.clone())
        .with_tech_stack(args.tech_stack.clone())
        .with_constraints(args.constraints.clone());
    if let Some(domain) = &args.domain {
        ctx = ctx.with_domain(domain.clone());
    }
    if let Some(user) = &args.user_id {
        ctx = ctx.with_user(user.clone());
    }
    ctx
}

fn print_summary(record: &GenerationRecord) {
    println!("Generation {}: {:?}", record.id, record.status);
    if let Some(error) = &record.error {
        println!("Error: {}", error);
    }
    let Some(result) = &record.result else {
        return;
    };

    println!("Mode:     {}", result.metadata.mode);
    println!("Quality:  {:.2}", result.quality_score);
    println!("Total:    {} ms", result.timings.total_ms);
    let fallbacks = result.metadata.fallback_stages();
    if !fallbacks.is_empty() {
        let names: Vec<&str> = fallbacks.iter().map(|k| k.as_str()).collect();
        println!("Fallback: {}", names.join(", "));
    }
    println!();
    println!("{:<48} {:>10}", "FILE", "BYTES");
    println!("{}", "-".repeat(59));
    for (path, content) in result.files.iter().chain(result.documentation.iter()) {
        println!("{:<48} {:>10}", path, content.len());
    }
}

/// Write files and documentation below `dir`. Returns the number written.
///
/// Paths that are absolute or climb out of `dir` are rejected.
pub fn write_project(dir: &Path, result: &PipelineResult) -> io::Result<usize> {
    let mut written = 0;
    for (path, content) in result.files.iter().chain(result.documentation.iter()) {
        let target = dir.join(relative(path)?);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&target, content)?;
        written += 1;
    }
    Ok(written)
}

fn relative(path: &str) -> io::Result<PathBuf> {
    let candidate = Path::new(path);
    let safe = !path.is_empty()
        && candidate.components().all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if safe {
        Ok(candidate.to_path_buf())
    } else {
        Err(io::Error::new(io::ErrorKind::InvalidInput, format!("unsafe output path {:?}", path)))
    }
}
