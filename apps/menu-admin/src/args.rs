//! Command line definition.
//!
//! ```text
//! menu-admin [--config <PATH>] [--json] <COMMAND>
//!
//!   catalog   status · list · categories · show
//!   changes   create · edit · delete
//!   queue     pending · replay · usage · strip-images
//!   account   login · register · logout · whoami
//!   other     watch · order
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use menu_core::{CatalogFilter, MenuItemDraft, SizeTier, SortDirection, SortField};
use menu_sync::{Registration, RestaurantInfo, Role};

/// Parsed command line.
#[derive(Debug, Parser)]
#[command(
    name = "menu-admin",
    version,
    about = "Menu Admin - offline-first menu catalog tool",
    arg_required_else_help = true,
    after_help = "Environment: MENU_CATALOG_URL, MENU_AUTH_URL, MENU_STORAGE_PATH, RUST_LOG"
)]
pub struct Cli {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long = "config", value_name = "PATH", global = true)]
    pub config_path: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Subcommand)]
pub enum Command {
    /// Service connectivity and queue summary
    Status,

    /// Merged catalog listing
    List {
        #[command(flatten)]
        filter: ListArgs,
    },

    /// Distinct categories
    Categories,

    /// One item (queued copy if any)
    Show { id: String },

    /// Create an item, or queue it while the service is down
    Create {
        #[command(flatten)]
        fields: ItemFields,
    },

    /// Change an item; omitted fields keep their current value
    Edit {
        id: String,
        #[command(flatten)]
        fields: ItemFields,
    },

    /// Delete an item
    Delete { id: String },

    /// Items waiting to be published
    Pending,

    /// Publish queued items (and deferred deletes)
    Replay { id: Option<String> },

    /// Local storage usage
    Usage,

    /// Drop embedded images from queued items
    StripImages,

    /// Sign in and store the session token
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "MENU_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Create an account
    Register {
        #[command(flatten)]
        registration: RegistrationArgs,
    },

    /// Forget the session token
    Logout,

    /// Show the signed-in user
    Whoami,

    /// Watch connectivity until Ctrl-C
    Watch {
        /// Seconds between checks (defaults to the configured interval)
        #[arg(long = "interval", value_name = "SECS")]
        interval_secs: Option<u64>,
        /// Replay the queue when the service comes back
        #[arg(long)]
        auto_replay: bool,
    },

    /// Add items to the cart
    Order {
        /// Cart lines as ID:SIZE[:QTY]
        #[arg(value_name = "ID:SIZE[:QTY]", value_parser = OrderLine::parse)]
        lines: Vec<OrderLine>,
        /// Empty the cart first
        #[arg(long)]
        clear: bool,
    },
}

// =============================================================================
// Argument Groups
// =============================================================================

/// `list` options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Args)]
pub struct ListArgs {
    /// Case-insensitive text search
    #[arg(long)]
    pub search: Option<String>,

    /// Exact category ("all" for any)
    #[arg(long)]
    pub category: Option<String>,

    /// name, restaurant, category or price
    #[arg(long)]
    pub sort: Option<SortField>,

    /// Sort descending
    #[arg(long)]
    pub desc: bool,
}

impl ListArgs {
    pub fn to_filter(&self) -> CatalogFilter {
        CatalogFilter {
            search: self.search.clone(),
            category: self.category.clone(),
            sort_by: self.sort,
            direction: if self.desc {
                SortDirection::Descending
            } else {
                SortDirection::Ascending
            },
        }
    }
}

/// Item fields given on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Args)]
pub struct ItemFields {
    #[arg(long)]
    pub restaurant_id: Option<String>,

    #[arg(long = "restaurant", value_name = "NAME")]
    pub restaurant_name: Option<String>,

    #[arg(long = "name", value_name = "NAME")]
    pub food_name: Option<String>,

    #[arg(long)]
    pub category: Option<String>,

    /// Small price
    #[arg(long, value_name = "PRICE")]
    pub small: Option<String>,

    /// Medium price
    #[arg(long, value_name = "PRICE")]
    pub medium: Option<String>,

    /// Large price
    #[arg(long, value_name = "PRICE")]
    pub large: Option<String>,

    /// jpg, png, gif or webp file
    #[arg(long, value_name = "PATH")]
    pub image: Option<PathBuf>,
}

impl ItemFields {
    /// Overwrites the given fields of a draft.
    pub fn apply_to(&self, draft: &mut MenuItemDraft) {
        if let Some(v) = &self.restaurant_id {
            draft.restaurant_id = v.clone();
        }
        if let Some(v) = &self.restaurant_name {
            draft.restaurant_name = v.clone();
        }
        if let Some(v) = &self.food_name {
            draft.food_name = v.clone();
        }
        if let Some(v) = &self.category {
            draft.category = v.clone();
        }
        for (tier, raw) in self.prices() {
            draft.prices.insert(tier, raw.to_string());
        }
    }

    pub fn to_draft(&self) -> MenuItemDraft {
        let mut draft = MenuItemDraft::default();
        self.apply_to(&mut draft);
        draft
    }

    fn prices(&self) -> impl Iterator<Item = (SizeTier, &str)> {
        [
            (SizeTier::Small, &self.small),
            (SizeTier::Medium, &self.medium),
            (SizeTier::Large, &self.large),
        ]
        .into_iter()
        .filter_map(|(tier, raw)| raw.as_deref().map(|r| (tier, r)))
    }
}

/// One `ID:SIZE[:QTY]` argument of `order`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderLine {
    pub item_id: String,
    pub size: SizeTier,
    pub quantity: i64,
}

impl OrderLine {
    fn parse(raw: &str) -> Result<Self, String> {
        let mut parts = raw.split(':');
        let (Some(id), Some(size)) = (parts.next(), parts.next()) else {
            return Err(format!("expected ID:SIZE[:QTY], got '{}'", raw));
        };
        let size = size.parse::<SizeTier>().map_err(|e| e.to_string())?;
        let quantity = match parts.next() {
            Some(q) => q
                .parse::<i64>()
                .map_err(|_| format!("quantity '{}' is not a number", q))?,
            None => 1,
        };

        Ok(OrderLine {
            item_id: id.to_string(),
            size,
            quantity,
        })
    }
}

/// `register` arguments.
#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct RegistrationArgs {
    #[arg(long = "name", value_name = "NAME")]
    pub full_name: String,

    #[arg(long)]
    pub email: String,

    #[arg(long, env = "MENU_PASSWORD", hide_env_values = true)]
    pub password: String,

    #[arg(long = "phone", value_name = "PHONE")]
    pub contact_number: String,

    /// admin, restaurantManager, customer or deliveryPerson
    #[arg(long, default_value = "customer")]
    pub role: Role,

    #[arg(long)]
    pub restaurant_name: Option<String>,

    #[arg(long)]
    pub restaurant_address: Option<String>,
}

impl RegistrationArgs {
    pub fn to_registration(&self) -> Registration {
        let restaurant = match (&self.restaurant_name, &self.restaurant_address) {
            (None, None) => None,
            (name, address) => Some(RestaurantInfo {
                name: name.clone().unwrap_or_default(),
                address: address.clone().unwrap_or_default(),
            }),
        };

        Registration {
            full_name: self.full_name.clone(),
            email: self.email.clone(),
            password: self.password.clone(),
            contact_number: self.contact_number.clone(),
            role: self.role,
            restaurant,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    fn parse(line: &str) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("menu-admin").chain(line.split_whitespace()))
    }

    #[test]
    fn test_global_flags() {
        let cli = parse("--json --config /tmp/menu.toml status").unwrap();
        assert!(cli.json);
        assert_eq!(cli.config_path, Some(PathBuf::from("/tmp/menu.toml")));
        assert_eq!(cli.command, Command::Status);

        let cli = parse("pending --json").unwrap();
        assert!(cli.json);
    }

    #[test]
    fn test_list_filter() {
        let cli = parse("list --search pizza --category Pizza --sort price --desc").unwrap();
        let Command::List { filter } = cli.command else {
            panic!("expected list");
        };
        let filter = filter.to_filter();
        assert_eq!(filter.search.as_deref(), Some("pizza"));
        assert_eq!(filter.category.as_deref(), Some("Pizza"));
        assert_eq!(filter.sort_by, Some(SortField::Price));
        assert_eq!(filter.direction, SortDirection::Descending);

        let Command::List { filter } = parse("list").unwrap().command else {
            panic!("expected list");
        };
        assert_eq!(filter.to_filter(), CatalogFilter::default());

        assert!(parse("list --sort weight").is_err());
    }

    #[test]
    fn test_create_and_edit() {
        let cli = parse(
            "create --restaurant-id 64b7f0c2a1d3e4f5a6b7c8d9 --restaurant Palace --name Diavola --category Pizza --small 9.99 --image pic.png",
        )
        .unwrap();
        let Command::Create { fields } = cli.command else {
            panic!("expected create");
        };
        let draft = fields.to_draft();
        assert_eq!(draft.food_name, "Diavola");
        assert_eq!(draft.prices.get(&SizeTier::Small).map(String::as_str), Some("9.99"));
        assert!(!draft.prices.contains_key(&SizeTier::Large));
        assert_eq!(fields.image, Some(PathBuf::from("pic.png")));

        let cli = parse("edit srv1 --large 15.50").unwrap();
        let Command::Edit { id, fields } = cli.command else {
            panic!("expected edit");
        };
        assert_eq!(id, "srv1");
        assert!(fields.food_name.is_none());

        let err = parse("edit --large 15.50").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_order_lines() {
        let cli = parse("order mock1:small:2 mock2:large").unwrap();
        let Command::Order { lines, clear } = cli.command else {
            panic!("expected order");
        };
        assert!(!clear);
        assert_eq!(lines[0].quantity, 2);
        assert_eq!(lines[1].size, SizeTier::Large);
        assert_eq!(lines[1].quantity, 1);

        assert!(parse("order mock1").is_err());
        assert!(parse("order mock1:huge").is_err());
    }

    #[test]
    fn test_register_manager() {
        let cli = parse(
            "register --name Rita --email r@x.io --password pw --phone 0123 --role restaurantManager --restaurant-name Ritas --restaurant-address Main",
        )
        .unwrap();
        let Command::Register { registration } = cli.command else {
            panic!("expected register");
        };
        let reg = registration.to_registration();
        assert_eq!(reg.role, Role::RestaurantManager);
        assert_eq!(reg.restaurant.unwrap().address, "Main");
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(
            parse("frobnicate").unwrap_err().kind(),
            ErrorKind::InvalidSubcommand
        );
        assert!(parse("show").is_err());
        assert!(parse("show a b").is_err());
    }
}
