//! # Pending Queue Seeder
//!
//! Fills a local store with pending items, for exercising replay and the
//! quota fallback during development.
//!
//! ## Usage
//! ```bash
//! # Queue 20 items (default)
//! cargo run -p menu-store --bin seed
//!
//! # Queue a custom amount
//! cargo run -p menu-store --bin seed -- --count 200
//!
//! # Specify database path
//! cargo run -p menu-store --bin seed -- --db ./data/menu.db
//!
//! # Attach a filler image to each item to push against the quota
//! cargo run -p menu-store --bin seed -- --image-bytes 40000
//! ```
//!
//! Items are variations of the built-in sample dishes. Each gets a fresh
//! temporary id, so seeding twice simply queues more items.

use chrono::Utc;
use clap::Parser;
use menu_core::samples::sample_items;
use menu_core::{ImageRef, ItemId, Money, Prices};
use menu_store::{DbConfig, LocalStore, SaveOutcome};

const RESTAURANT_IDS: &[&str] = &[
    "64b7f0c2a1d3e4f5a6b7c8d1",
    "64b7f0c2a1d3e4f5a6b7c8d2",
    "64b7f0c2a1d3e4f5a6b7c8d3",
];

const VARIANTS: &[&str] = &["Classic", "Spicy", "Deluxe", "Vegan", "Family"];

/// Menu Pending Queue Seeder
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Number of pending items
    #[arg(short, long, default_value_t = 20)]
    count: usize,

    /// Database file path
    #[arg(short, long = "db", default_value = "./menu_dev.db")]
    db_path: String,

    /// Attach an N-character embedded image
    #[arg(long, default_value_t = 0)]
    image_bytes: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let Args {
        count,
        db_path,
        image_bytes,
    } = Args::parse();

    println!("🌱 Menu Pending Queue Seeder");
    println!("===========================");
    println!("Database: {}", db_path);
    println!("Items:    {}", count);
    println!();

    let store = LocalStore::sqlite(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");

    let existing = store.pending_items().count().await?;
    if existing > 0 {
        println!("⚠ Store already has {} pending items, appending", existing);
    }

    let filler = (image_bytes > 0).then(|| ImageRef::embedded("image/jpeg", &"A".repeat(image_bytes)));
    let templates = sample_items();
    let mut queue = store.pending_items().load().await?;

    for n in 0..count {
        let template = &templates[n % templates.len()];
        let variant = VARIANTS[(n / templates.len()) % VARIANTS.len()];

        let mut item = template.clone();
        item.id = ItemId::temporary();
        item.restaurant_id = RESTAURANT_IDS[n % RESTAURANT_IDS.len()].to_string();
        item.food_name = format!("{} {} #{}", variant, template.food_name, n + 1);
        item.prices = template
            .prices
            .iter()
            .fold(Prices::new(), |p, (tier, price)| {
                p.with(tier, price + Money::from_cents((n % 5) as i64 * 50))
            });
        item.image = filler.clone();
        item.created_at = Some(Utc::now());
        item.updated_at = item.created_at;
        item.is_pending = true;

        queue.push(item);
    }

    match store.pending_items().save_all(&queue).await {
        SaveOutcome::Saved | SaveOutcome::Cleared => {
            println!("✓ Queued {} items", count);
        }
        SaveOutcome::SavedWithoutImages { stripped } => {
            println!("✓ Queued {} items", count);
            println!("⚠ Quota exceeded: {} images dropped", stripped);
        }
        SaveOutcome::Unavailable { reason } => {
            eprintln!("✗ Could not save: {}", reason);
            return Ok(());
        }
    }

    let usage = store.usage().await;
    println!();
    println!(
        "Storage: {} / {} bytes ({:.1}%)",
        usage.used,
        usage.total,
        usage.percent_used()
    );
    println!("✓ Seed complete!");

    Ok(())
}
