// Copyright 2024-2026 forge-core Contributors
// SPDX-License-Identifier: Apache-2.0

//! Status CLI subcommand.
//!
//! Shows which strategy was selected, why earlier modes were skipped, and
//! the state of every adapter slot.

use serde::Serialize;

use crate::models::ResourceStatus;
use crate::strategy::{StrategyAttempt, StrategyMode};
use crate::Runtime;

/// Combined strategy and residency snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub mode: StrategyMode,
    pub fell_back: bool,
    pub available_memory: Option<u64>,
    pub attempts: Vec<StrategyAttempt>,
    pub resources: ResourceStatus,
}

impl StatusReport {
    pub async fn collect(runtime: &Runtime) -> Self {
        let strategy = runtime.strategy();
        Self {
            mode: strategy.mode,
            fell_back: strategy.fell_back(),
            available_memory: strategy.available_memory,
            attempts: strategy.attempts.clone(),
            resources: runtime.status().await,
        }
    }
}

/// Run `status`. Always returns 0 once the runtime exists.
pub async fn run_status(runtime: &Runtime, json_output: bool) -> i32 {
    let report = StatusReport::collect(runtime).await;
    if json_output {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Failed to serialize status: {}", e);
                return 1;
            }
        }
    } else {
        print_status(&report);
    }
    0
}

pub fn print_status(report: &StatusReport) {
    println!("Strategy: {}", report.mode);
    if let Some(bytes) = report.available_memory {
        println!("Available memory: {} MB", bytes / (1024 * 1024));
    }
    for attempt in &report.attempts {
        match &attempt.error {
            Some(error) => println!("  {:<18} skipped: {}", attempt.mode.as_str(), error),
            None => println!("  {:<18} selected", attempt.mode.as_str()),
        }
    }

    let resources = &report.resources;
    println!();
    println!(
        "{:<18} {:<22} {:<10} {:>12} {:>7} {:>7} {:>9}",
        "KIND", "BACKING", "STATE", "MEMORY (MB)", "LEASES", "LOADS", "EVICTIONS"
    );
    println!("{}", "-".repeat(91));
    for slot in &resources.slots {
        println!(
            "{:<18} {:<22} {:<10} {:>12} {:>7} {:>7} {:>9}",
            slot.kind.as_str(),
            truncate(&slot.backing_id, 21),
            format!("{:?}", slot.state).to_lowercase(),
            slot.memory_estimate_bytes / (1024 * 1024),
            slot.leases,
            slot.loads,
            slot.evictions,
        );
    }
    println!("{}", "-".repeat(91));
    println!(
        "Resident: {}/{}  |  Estimated memory: {} MB",
        resources.resident_count(),
        resources.max_concurrent,
        resources.resident_memory_bytes / (1024 * 1024)
    );
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
