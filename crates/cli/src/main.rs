//! Agroshop CLI - cart, checkout and order tracking from the terminal.
//!
//! # Usage
//!
//! ```bash
//! # Show the cart with totals for the selected lines
//! agroshop cart show
//!
//! # Add two units of product 42
//! agroshop cart add 42 --quantity 2
//!
//! # Pay for everything except line 7
//! agroshop checkout --phone 254712345678 --exclude 7
//!
//! # Cancel an order
//! agroshop orders cancel 6f1c2a3e-7b4d-4c1a-9e2f-0a1b2c3d4e5f --reason "ordered twice"
//!
//! # Mark a vendor item as shipped
//! agroshop vendor set-status 12 SHIPPED
//! ```
//!
//! # Environment
//!
//! Reads the storefront configuration (see `agroshop_storefront::config`)
//! plus `AGROSHOP_ACCESS_TOKEN`, `AGROSHOP_REFRESH_TOKEN` and
//! `AGROSHOP_USER_ID`.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;

use agroshop_core::{CartItemId, OrderId, OrderItemId, OrderStatus, ProductId, UserId};
use agroshop_storefront::Storefront;
use agroshop_storefront::api::MemoryTokenStore;
use agroshop_storefront::config::{ConfigError, StorefrontConfig};
use agroshop_storefront::error::StorefrontError;
use clap::{Parser, Subcommand};
use secrecy::SecretString;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "agroshop")]
#[command(author, version, about = "Agroshop storefront client")]
struct Cli {
    /// Signed-in user ID (needed for order commands)
    #[arg(long, env = "AGROSHOP_USER_ID", global = true)]
    user_id: Option<i64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect and change the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Pay for the selected cart lines by mobile money
    Checkout {
        /// Phone number that receives the payment prompt (254XXXXXXXXX)
        #[arg(short, long)]
        phone: String,

        /// Cart lines to leave out of this checkout
        #[arg(short, long)]
        exclude: Vec<CartItemId>,
    },
    /// Customer order commands
    Orders {
        #[command(subcommand)]
        action: OrdersAction,
    },
    /// Vendor order-item commands
    Vendor {
        #[command(subcommand)]
        action: VendorAction,
    },
    /// List the statuses vendors can choose from
    StatusChoices,
}

#[derive(Subcommand)]
enum CartAction {
    /// Show lines and totals
    Show,
    /// Add a product
    Add {
        /// Product ID
        product: ProductId,

        /// Units to add
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
    },
    /// Set a line's quantity (0 or less removes it)
    Set {
        /// Cart item ID
        item: CartItemId,

        /// New quantity
        #[arg(allow_negative_numbers = true)]
        quantity: i64,
    },
    /// Raise a line's quantity by one
    Inc {
        /// Cart item ID
        item: CartItemId,
    },
    /// Lower a line's quantity by one
    Dec {
        /// Cart item ID
        item: CartItemId,
    },
    /// Remove a line
    Remove {
        /// Cart item ID
        item: CartItemId,
    },
    /// Empty the cart
    Clear,
}

#[derive(Subcommand)]
enum OrdersAction {
    /// List your orders
    List,
    /// Show one order
    Show {
        /// Order UUID
        order: OrderId,
    },
    /// Cancel a pending or paid order
    Cancel {
        /// Order UUID
        order: OrderId,

        /// Reason given to the store
        #[arg(short, long)]
        reason: Option<String>,
    },
}

#[derive(Subcommand)]
enum VendorAction {
    /// List every order item you fulfil
    Items,
    /// Show your items within one order
    Order {
        /// Order UUID
        order: OrderId,
    },
    /// Change an item's status
    SetStatus {
        /// Order item ID
        item: OrderItemId,

        /// New status (PENDING, PAID, PROCESSING, SHIPPED, DELIVERED, CANCELLED)
        status: OrderStatus,

        /// Order the item belongs to; without it the item is looked up in
        /// your full item list
        #[arg(short, long)]
        order: Option<OrderId>,
    },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "agroshop_storefront=info,agroshop_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match StorefrontConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            init_tracing();
            tracing::error!("Failed to load configuration: {e}");
            std::process::exit(2);
        }
    };

    // Sentry must be initialized before the tracing subscriber
    let _sentry_guard = init_sentry(&config);
    init_tracing();

    if let Err(e) = run(cli, config).await {
        tracing::error!(error = %e, "{}", e.user_message());
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: StorefrontConfig) -> Result<(), StorefrontError> {
    let storefront = Storefront::new(config, Arc::new(load_tokens()?))?;
    let user_id = cli.user_id.map(UserId::new);

    match cli.command {
        Commands::Cart { action } => match action {
            CartAction::Show => commands::cart::show(&storefront).await?,
            CartAction::Add { product, quantity } => {
                commands::cart::add(&storefront, product, quantity).await?;
            }
            CartAction::Set { item, quantity } => {
                commands::cart::set(&storefront, item, quantity).await?;
            }
            CartAction::Inc { item } => commands::cart::step(&storefront, item, 1).await?,
            CartAction::Dec { item } => commands::cart::step(&storefront, item, -1).await?,
            CartAction::Remove { item } => commands::cart::remove(&storefront, item).await?,
            CartAction::Clear => commands::cart::clear(&storefront).await?,
        },
        Commands::Checkout { phone, exclude } => {
            commands::checkout::run(&storefront, &phone, &exclude).await?;
        }
        Commands::Orders { action } => {
            let tracker = storefront.orders(commands::customer(user_id)?);
            match action {
                OrdersAction::List => commands::orders::list(&storefront, &tracker).await?,
                OrdersAction::Show { order } => {
                    commands::orders::show(&storefront, &tracker, order).await?;
                }
                OrdersAction::Cancel { order, reason } => {
                    commands::orders::cancel(&storefront, &tracker, order, reason.as_deref())
                        .await?;
                }
            }
        }
        Commands::Vendor { action } => {
            let tracker = storefront.orders(commands::vendor(user_id)?);
            match action {
                VendorAction::Items => commands::vendor::items(&storefront, &tracker).await?,
                VendorAction::Order { order } => {
                    commands::vendor::order(&storefront, &tracker, order).await?;
                }
                VendorAction::SetStatus {
                    item,
                    status,
                    order,
                } => {
                    commands::vendor::set_status(&storefront, &tracker, item, status, order)
                        .await?;
                }
            }
        }
        Commands::StatusChoices => {
            let tracker = storefront.orders(commands::vendor(user_id)?);
            commands::vendor::status_choices(&tracker).await;
        }
    }
    Ok(())
}

/// Session tokens from the environment.
fn load_tokens() -> Result<MemoryTokenStore, ConfigError> {
    let access = std::env::var("AGROSHOP_ACCESS_TOKEN")
        .ok()
        .filter(|v| !v.is_empty())
        .map(SecretString::from)
        .ok_or_else(|| ConfigError::MissingEnvVar("AGROSHOP_ACCESS_TOKEN".to_string()))?;
    let refresh = std::env::var("AGROSHOP_REFRESH_TOKEN")
        .ok()
        .filter(|v| !v.is_empty())
        .map(SecretString::from);

    Ok(MemoryTokenStore::new(Some(access), refresh))
}
