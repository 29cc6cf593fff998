//! # Menu Admin Entry Point
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          menu-admin                                     │
//! │                                                                         │
//! │  main.rs ────► hands argv to menu_admin::run, exits with its status     │
//! │                                                                         │
//! │  lib.rs ─────► logging, config, AppState, dispatch, printing            │
//! │                                                                         │
//! │  commands/ ──► status, list, create, edit, delete, replay, watch...     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

#[tokio::main]
async fn main() {
    // The actual setup is in lib.rs for testability
    let code = menu_admin::run(std::env::args().skip(1).collect()).await;
    std::process::exit(code);
}
