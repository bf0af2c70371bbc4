//! Cart commands.
//!
//! Each invocation is one short session: resolve the identity, let the sync
//! engine load (and merge on login), apply one operation through the cart
//! API, and print the result.
//!
//! # Usage
//!
//! ```bash
//! # Anonymous cart on this device
//! suburbia cart add --deck oni-mask --wheel red --truck silver --bolt black
//! suburbia cart show
//!
//! # Sign in: the device cart is merged into the account cart
//! suburbia cart --user user_123 show
//!
//! # Change quantities (zero or negative removes the line)
//! suburbia cart --user user_123 set oni-mask-red-silver-black 3
//!
//! # Sign out: the device cart is cleared
//! suburbia cart --user user_123 logout
//! ```
//!
//! # Environment Variables
//!
//! - `SUBURBIA_STOREFRONT_URL` - Storefront base URL (default: `http://127.0.0.1:3000`)
//! - `SUBURBIA_DATA_DIR` - Directory holding the device cart
//! - `SUBURBIA_USER` - Signed-in user id

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use clap::{Args, Subcommand};
use thiserror::Error;

use suburbia_cart_sync::{
    Cart, FileCartStore, HttpCartStore, RemoteOp, RemoteStoreError, SyncEvent, identity_channel,
};
use suburbia_core::{
    BASE_PRICE, CartItemDraft, CartItemId, CartSnapshot, ColoredPart, ComponentId, Identity,
    Price, QuantityOutcome, TexturedPart, UserId,
};

/// Errors that can occur while running a cart command.
#[derive(Debug, Error)]
pub enum CartCommandError {
    #[error("no data directory; set SUBURBIA_DATA_DIR or pass --data-dir")]
    NoDataDir,

    #[error("logout needs a signed-in user; pass --user")]
    LogoutWithoutUser,

    #[error("invalid storefront URL: {0}")]
    Storefront(#[from] RemoteStoreError),
}

#[derive(Debug, Args)]
pub struct CartArgs {
    /// Signed-in user id (anonymous when absent)
    #[arg(long, env = "SUBURBIA_USER", global = true)]
    pub user: Option<String>,

    /// Storefront base URL
    #[arg(
        long,
        env = "SUBURBIA_STOREFRONT_URL",
        default_value = "http://127.0.0.1:3000",
        global = true
    )]
    pub storefront_url: String,

    /// Directory holding the device cart
    #[arg(long, env = "SUBURBIA_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub action: CartAction,
}

#[derive(Debug, Subcommand)]
pub enum CartAction {
    /// Print the cart
    Show,
    /// Add one configured board
    Add(BoardArgs),
    /// Remove a line
    Remove {
        /// Cart item id
        id: String,
    },
    /// Set a line's quantity
    Set {
        /// Cart item id
        id: String,
        /// New quantity (zero or negative removes the line)
        #[arg(allow_negative_numbers = true)]
        quantity: i64,
    },
    /// Empty the cart
    Clear,
    /// Sign out and start a fresh anonymous cart
    Logout,
}

/// Component selection for a board.
#[derive(Debug, Args)]
pub struct BoardArgs {
    #[arg(long)]
    pub deck: String,
    #[arg(long)]
    pub wheel: String,
    #[arg(long)]
    pub truck: String,
    #[arg(long)]
    pub bolt: String,
    /// Unit price in cents
    #[arg(long, default_value_t = BASE_PRICE.cents())]
    pub price: u64,
}

impl BoardArgs {
    fn into_draft(self) -> CartItemDraft {
        let textured = |id: String| TexturedPart {
            name: id.clone(),
            id: ComponentId::new(id),
            texture: String::new(),
        };
        let colored = |id: String| ColoredPart {
            name: id.clone(),
            id: ComponentId::new(id),
            color: String::new(),
        };
        CartItemDraft::new(
            textured(self.deck),
            textured(self.wheel),
            colored(self.truck),
            colored(self.bolt),
            Price::from_cents(self.price),
        )
    }
}

/// Run a cart command.
///
/// # Errors
///
/// Returns `CartCommandError` for unusable arguments. Store failures are
/// not errors: the sync engine degrades and the notices are printed.
pub async fn run(args: CartArgs) -> Result<(), CartCommandError> {
    let data_dir = args
        .data_dir
        .or_else(|| dirs::data_dir().map(|dir| dir.join("suburbia")))
        .ok_or(CartCommandError::NoDataDir)?;
    let identity = args
        .user
        .filter(|user| !user.trim().is_empty())
        .map_or(Identity::Anonymous, |user| Identity::User(UserId::new(user)));

    if matches!(args.action, CartAction::Logout) && !identity.is_authenticated() {
        return Err(CartCommandError::LogoutWithoutUser);
    }

    let events = Arc::new(Mutex::new(Vec::<SyncEvent>::new()));
    let hook_events = Arc::clone(&events);

    let (publisher, observer) = identity_channel();
    let local = FileCartStore::new(&data_dir);
    let remote = HttpCartStore::new(&args.storefront_url)?;
    let cart = Cart::new(local, remote, observer).with_event_hook(Arc::new(
        move |event: &SyncEvent| {
            hook_events
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(event.clone());
        },
    ));

    tracing::debug!(%identity, data_dir = %data_dir.display(), "starting cart session");
    publisher.publish_identity(identity);
    cart.sync().await;

    let message = match args.action {
        CartAction::Show => None,
        CartAction::Add(board) => {
            let draft = board.into_draft();
            let id = draft.id.clone();
            cart.add_item(draft).await;
            Some(format!("Added {id}"))
        }
        CartAction::Remove { id } => {
            let id = CartItemId::new(id);
            Some(if cart.remove_item(&id).await {
                format!("Removed {id}")
            } else {
                format!("{id} is not in the cart")
            })
        }
        CartAction::Set { id, quantity } => {
            let id = CartItemId::new(id);
            Some(match cart.update_quantity(&id, quantity).await {
                QuantityOutcome::Updated => format!("Set {id} to {quantity}"),
                QuantityOutcome::Removed => format!("Removed {id}"),
                QuantityOutcome::Missing => format!("{id} is not in the cart"),
            })
        }
        CartAction::Clear => {
            cart.clear_cart().await;
            Some("Cart cleared".to_string())
        }
        CartAction::Logout => {
            publisher.publish_identity(Identity::Anonymous);
            cart.sync().await;
            Some("Signed out".to_string())
        }
    };

    let notices: Vec<String> = events
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .iter()
        .filter_map(notice)
        .collect();

    let current = cart
        .controller()
        .state()
        .tracked_identity
        .unwrap_or(Identity::Anonymous);

    #[allow(clippy::print_stdout, clippy::print_stderr)]
    {
        for line in notices {
            eprintln!("warning: {line}");
        }
        if let Some(message) = message {
            println!("{message}");
        }
        print!("{}", render(&current, &cart.snapshot()));
    }

    Ok(())
}

/// A user-facing warning for events that mean the cart is degraded.
fn notice(event: &SyncEvent) -> Option<String> {
    match event {
        SyncEvent::RemoteUnavailable {
            op: RemoteOp::Fetch,
            reason,
        } => Some(format!(
            "storefront unavailable during fetch ({reason}); changes are kept on this device until the next sign-in"
        )),
        SyncEvent::RemoteUnavailable { op, reason } => Some(format!(
            "storefront unavailable during {op} ({reason}); changes may not be saved to your account"
        )),
        SyncEvent::StorageCorrupt { reason } => {
            Some(format!("device cart was unreadable and was reset ({reason})"))
        }
        SyncEvent::LocalWriteFailed { reason } => {
            Some(format!("could not save the device cart ({reason})"))
        }
        SyncEvent::LocalRetainedAfterFailedMerge { user } => Some(format!(
            "device cart kept; it will be merged into {user} on the next sign-in"
        )),
        _ => None,
    }
}

/// Render a cart as a plain-text table.
fn render(identity: &Identity, cart: &CartSnapshot) -> String {
    if cart.is_empty() {
        return format!("Cart ({identity}) is empty\n");
    }

    let total = cart.total_items();
    let noun = if total == 1 { "board" } else { "boards" };

    let mut lines = vec![format!("Cart ({identity})")];
    lines.extend(cart.items().iter().map(|item| {
        format!(
            "  {}  {} x {} = {}",
            item.id,
            item.quantity,
            item.price,
            item.line_price()
        )
    }));
    lines.push(format!("Total: {total} {noun}, {}", cart.total_price()));
    lines.push(String::new());
    lines.join("\n")
}
