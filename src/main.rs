//! forge-core CLI entry point.
//!
//! Loads configuration from the environment, initializes logging, selects a
//! strategy and runs the requested command in-process.
//!
//! ## CLI Subcommands
//!
//! - `forge-core-cli generate <prompt>` - Run one generation
//! - `forge-core-cli status` - Show strategy and adapter slots
//! - `forge-core-cli config show|defaults|validate` - Inspect configuration

use std::process::ExitCode;

use tokio_util::sync::CancellationToken;

use forge_core::cli::{self, config_cmd, GenerateArgs};
use forge_core::config::{self as forge_config, EnvConfig};
use forge_core::telemetry;
use forge_core::Runtime;

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("help");
    let env = forge_config::load();

    match command {
        "generate" | "gen" => {
            let parsed = match GenerateArgs::parse(&args[2..]) {
                Ok(parsed) => parsed,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    print_command_help("generate");
                    return ExitCode::FAILURE;
                }
            };
            let Some(runtime) = start(env).await else {
                return exit(cli::EXIT_CONFIG);
            };
            let cancel = CancellationToken::new();
            spawn_ctrl_c(cancel.clone());
            let code = cli::run_generate(&runtime, &parsed, &cancel).await;
            finish(&runtime).await;
            exit(code)
        }
        "status" => {
            let json_output = cli::wants_json(&args[2..]);
            let Some(runtime) = start(env).await else {
                return exit(cli::EXIT_CONFIG);
            };
            let code = cli::run_status(&runtime, json_output).await;
            finish(&runtime).await;
            exit(code)
        }
        "config" => {
            let subcommand = args.get(2).map(|s| s.as_str()).unwrap_or("show");
            match subcommand {
                "show" => {
                    config_cmd::run_show(&env);
                    ExitCode::SUCCESS
                }
                "defaults" => {
                    config_cmd::run_defaults();
                    ExitCode::SUCCESS
                }
                "validate" => exit(config_cmd::run_validate(&env)),
                _ => {
                    eprintln!("Unknown config subcommand: {}", subcommand);
                    print_command_help("config");
                    ExitCode::FAILURE
                }
            }
        }
        "help" | "--help" | "-h" => {
            if let Some(subcommand) = args.get(2) {
                print_command_help(subcommand);
            } else {
                print_usage();
            }
            ExitCode::SUCCESS
        }
        "version" | "--version" | "-V" => {
            println!("forge-core {}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            ExitCode::FAILURE
        }
    }
}

/// Initialize logging and build the runtime. Errors are printed.
async fn start(env: EnvConfig) -> Option<Runtime> {
    let log_config = match env.log_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return None;
        }
    };
    if let Err(e) = telemetry::init_logging(&log_config) {
        eprintln!("Failed to initialize logging: {}", e);
        return None;
    }

    match Runtime::new(env).await {
        Ok(runtime) => Some(runtime),
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            None
        }
    }
}

async fn finish(runtime: &Runtime) {
    let report = runtime.shutdown().await;
    for (kind, error) in &report.cleanup_errors {
        eprintln!("Cleanup of {} failed: {}", kind, error);
    }
}

fn spawn_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Interrupted, cancelling generation...");
            cancel.cancel();
        }
    });
}

fn exit(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

fn print_usage() {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!(
        "forge-core - staged prompt-to-backend generator v{}

USAGE:
    forge-core-cli [COMMAND] [OPTIONS]

COMMANDS:
    generate     Generate a backend project from a prompt
    status       Show the selected strategy and adapter slots
    config       Inspect configuration (show, defaults, validate)
    version      Show version information
    help         Show this help message

EXAMPLES:
    forge-core-cli generate \"todo api with users and tags\"
    forge-core-cli generate \"blog\" --stack node --out ./blog
    forge-core-cli status --json
    forge-core-cli config validate

ENVIRONMENT:
    FORGE_CORE_MAX_CONCURRENT  Max resident adapters (default: 2)
    FORGE_CORE_FORCE_MODE      auto, full, inference or minimal
    FORGE_CORE_MODEL_DIR       Directory holding GGUF weights
    FORGE_CORE_INFERENCE_URL   Hosted chat-completion endpoint
    FORGE_CORE_LOG_LEVEL       Log filter (debug, info, warn, error)

EXIT CODES:
    0  Success
    1  Generation failed or was cancelled
    2  Configuration error",
        version
    );
}

/// Print detailed help for a specific command.
fn print_command_help(command: &str) {
    match command {
        "generate" | "gen" => {
            eprintln!(
                "forge-core-cli generate - Generate a backend project

USAGE:
    forge-core-cli generate <PROMPT...> [OPTIONS]

OPTIONS:
    -s, --stack NAME        Target stack: python, node, rust, go (default: python)
    -d, --domain NAME       Business domain hint
    -u, --user ID           User the generation belongs to
    -c, --constraint TEXT   Extra constraint (repeatable)
    -o, --out DIR           Write generated files below DIR
    --json                  Print the full generation record as JSON

DESCRIPTION:
    Runs schema extraction, code generation, review and documentation.
    Any stage that fails is replaced by a static fallback, so a completed
    generation always contains files and a README. Ctrl-C cancels.
"
            );
        }
        "status" => {
            eprintln!(
                "forge-core-cli status - Show strategy and adapter slots

USAGE:
    forge-core-cli status [--json]

DESCRIPTION:
    Selects a strategy exactly as generate would, then prints the chosen
    mode, the reason earlier modes were skipped, and each adapter slot.
"
            );
        }
        "config" => {
            eprintln!(
                "forge-core-cli config - Inspect configuration

USAGE:
    forge-core-cli config <show|defaults|validate>

SUBCOMMANDS:
    show      Print effective values (token is never printed)
    defaults  Print built-in defaults
    validate  Exit 0 if valid, 2 on a configuration error
"
            );
        }
        _ => {
            eprintln!("No help available for: {}", command);
            print_usage();
        }
    }
}
