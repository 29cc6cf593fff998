//! # Menu Admin Library
//!
//! Command layer of the `menu-admin` binary: parse, build state, dispatch,
//! print.
//!
//! ## Module Organization
//! ```text
//! menu_admin/
//! ├── lib.rs          ◄─── You are here (run, logging, printing)
//! ├── args.rs         ◄─── Command line definition (clap)
//! ├── state.rs        ◄─── AppState (store, reconciler, view, auth)
//! ├── commands/
//! │   ├── mod.rs      ◄─── Dispatch and formatting helpers
//! │   ├── catalog.rs  ◄─── status, list, categories, show
//! │   ├── items.rs    ◄─── create, edit, delete
//! │   ├── queue.rs    ◄─── pending, replay, usage, strip-images
//! │   ├── account.rs  ◄─── login, register, logout, whoami
//! │   ├── order.rs    ◄─── cart
//! │   └── watch.rs    ◄─── foreground connectivity monitor
//! └── error.rs        ◄─── AppError with stable codes and exit statuses
//! ```
//!
//! ## Startup Sequence
//! 1. Initialize tracing (stderr, so stdout stays clean for `--json`)
//! 2. Parse arguments
//! 3. Load configuration (file, then `MENU_*` environment overrides)
//! 4. Open the local store and build `AppState`
//! 5. Run the command and print its output

pub mod args;
pub mod commands;
pub mod error;
pub mod state;

use clap::error::ErrorKind;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use menu_sync::MenuConfig;

use args::Cli;
use commands::CommandOutput;
use error::{AppError, AppResult, ErrorCode};
use state::AppState;

/// Runs one invocation and returns the process exit status.
pub async fn run(argv: Vec<String>) -> i32 {
    init_tracing();

    let json = argv.iter().any(|a| a == "--json");
    match execute(argv).await {
        Ok(output) => {
            print_output(&output, json);
            0
        }
        Err(err) => {
            print_error(&err, json);
            err.exit_code()
        }
    }
}

async fn execute(argv: Vec<String>) -> AppResult<CommandOutput> {
    let argv = std::iter::once("menu-admin".to_string()).chain(argv);
    let Cli {
        config_path,
        command,
        ..
    } = match Cli::try_parse_from(argv) {
        Ok(cli) => cli,
        // Help and version requests are regular output.
        Err(e) if is_informational(&e) => return Ok(CommandOutput::message(e.to_string())),
        Err(e) => return Err(usage_error(&e)),
    };

    let config = MenuConfig::load(config_path)
        .map_err(|e| AppError::new(ErrorCode::ConfigError, e.to_string()))?;
    debug!(catalog = %config.catalog_url(), auth = %config.auth_url(), "Configuration loaded");

    let state = AppState::init(config).await?;
    commands::dispatch(&state, command).await
}

fn is_informational(err: &clap::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::DisplayHelp
            | ErrorKind::DisplayVersion
            | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
    )
}

/// First line of clap's message, without its `error: ` prefix.
fn usage_error(err: &clap::Error) -> AppError {
    let rendered = err.to_string();
    let first = rendered.lines().next().unwrap_or_default();
    AppError::usage(first.trim_start_matches("error: "))
}

fn print_output(output: &CommandOutput, json: bool) {
    if json {
        match serde_json::to_string_pretty(&output.json) {
            Ok(s) => println!("{}", s),
            Err(e) => eprintln!("error [INTERNAL]: {}", e),
        }
    } else if !output.text.is_empty() {
        println!("{}", output.text);
    }
}

fn print_error(err: &AppError, json: bool) {
    if json {
        if let Ok(s) = serde_json::to_string_pretty(err) {
            eprintln!("{}", s);
            return;
        }
    }
    let code = serde_json::to_value(err.code)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| format!("{:?}", err.code));
    eprintln!("error [{}]: {}", code, err.message);
    if err.code == ErrorCode::Usage {
        eprintln!("\nRun `menu-admin --help` for usage");
    }
}

/// Initializes the tracing subscriber for structured logging.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=menu_sync=trace` - Show trace for the sync crate only
/// - Default: warnings, plus info from the `menu_*` crates
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,menu=info,sqlx=warn"));

    // try_init: a second call (tests) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
