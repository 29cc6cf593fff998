//! # Command Layer
//!
//! One function per command. Each returns a [`CommandOutput`] holding both a
//! human rendering and a JSON value; `main` prints whichever was asked for.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  catalog.rs  status, list, categories, show                             │
//! │  items.rs    create, edit, delete                                       │
//! │  queue.rs    pending, replay, usage, strip-images                       │
//! │  account.rs  login, register, logout, whoami                            │
//! │  order.rs    cart demo                                                  │
//! │  watch.rs    long-running connectivity monitor                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod account;
pub mod catalog;
pub mod items;
pub mod order;
pub mod queue;
pub mod watch;

use std::fmt::Write as _;

use serde::Serialize;

use menu_core::MenuItem;

use crate::args::Command;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// What a command produced.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub text: String,
    pub json: serde_json::Value,
}

impl CommandOutput {
    pub fn new(text: impl Into<String>, value: &impl Serialize) -> AppResult<Self> {
        let json = serde_json::to_value(value)
            .map_err(|e| AppError::internal(format!("Cannot serialize output: {}", e)))?;
        Ok(CommandOutput {
            text: text.into(),
            json,
        })
    }

    /// Output with a message and no structured payload.
    pub fn message(text: impl Into<String>) -> Self {
        let text = text.into();
        CommandOutput {
            json: serde_json::json!({ "message": text }),
            text,
        }
    }
}

/// Runs one command.
pub async fn dispatch(state: &AppState, command: Command) -> AppResult<CommandOutput> {
    match command {
        Command::Status => catalog::status(state).await,
        Command::List { filter } => catalog::list(state, &filter.to_filter()).await,
        Command::Categories => catalog::categories(state).await,
        Command::Show { id } => catalog::show(state, &id).await,
        Command::Create { fields } => items::create(state, &fields).await,
        Command::Edit { id, fields } => items::edit(state, &id, &fields).await,
        Command::Delete { id } => items::delete(state, &id).await,
        Command::Pending => queue::pending(state).await,
        Command::Replay { id } => queue::replay(state, id.as_deref()).await,
        Command::Usage => queue::usage(state).await,
        Command::StripImages => queue::strip_images(state).await,
        Command::Login { email, password } => account::login(state, &email, &password).await,
        Command::Register { registration } => account::register(state, &registration).await,
        Command::Logout => account::logout(state).await,
        Command::Whoami => account::whoami(state).await,
        Command::Watch {
            interval_secs,
            auto_replay,
        } => watch::watch(state, interval_secs, auto_replay).await,
        Command::Order { lines, clear } => order::order(state, &lines, clear).await,
    }
}

// =============================================================================
// Formatting Helpers
// =============================================================================

/// `small $9.99, large $15.99`, or `-` when no size is offered.
pub(crate) fn format_prices(item: &MenuItem) -> String {
    if item.prices.is_empty() {
        return "-".to_string();
    }
    item.prices
        .iter()
        .map(|(tier, price)| format!("{} {}", tier, price))
        .collect::<Vec<_>>()
        .join(", ")
}

/// One line per item for listings.
pub(crate) fn format_item_line(item: &MenuItem) -> String {
    let mut line = format!(
        "{:<28} {:<24} {:<18} {:<10} {}",
        item.id.as_str(),
        item.food_name,
        item.restaurant_name,
        item.category,
        format_prices(item)
    );
    if item.is_pending {
        line.push_str("  [pending]");
    }
    if let Some(err) = &item.last_error {
        let _ = write!(line, "  (last error: {})", err);
    }
    line
}

/// Multi-line detail view.
pub(crate) fn format_item_detail(item: &MenuItem) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Id:          {}", item.id);
    let _ = writeln!(out, "Name:        {}", item.food_name);
    let _ = writeln!(out, "Restaurant:  {} ({})", item.restaurant_name, item.restaurant_id);
    let _ = writeln!(out, "Category:    {}", item.category);
    let _ = writeln!(out, "Prices:      {}", format_prices(item));
    let image = match &item.image {
        Some(img) if img.is_embedded() => format!("embedded ({} chars)", img.as_str().len()),
        Some(img) => img.as_str().to_string(),
        None => "-".to_string(),
    };
    let _ = writeln!(out, "Image:       {}", image);
    if item.is_pending {
        let _ = writeln!(out, "Status:      pending");
    }
    if let Some(original) = &item.original_id {
        let _ = writeln!(out, "Edit of:     {}", original);
    }
    if let Some(err) = &item.last_error {
        let _ = writeln!(out, "Last error:  {}", err);
    }
    out.trim_end().to_string()
}
