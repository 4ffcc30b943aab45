//! shoptrack
//!
//! A small library for keeping a shopping list and the purchase history behind
//! it. Pairs with the `shoptrack` CLI.
//!
//! ### Features
//! - Shopping list with case-insensitive duplicate detection
//! - Purchase history grouped by item, newest first
//! - Per-item price statistics and SVG price trend charts
//! - Receipt scanning and store suggestions through a generative model
//! - Save history as CSV or JSON
//!
//! ### Example
//! ```no_run
//! use shoptrack::{Config, JsonFileStore, NewItem, Tracker, User};
//!
//! let config = Config::load(None)?;
//! let user = User { id: "user_1".into(), email: "me@example.com".into() };
//! let store = JsonFileStore::new(&config.data_dir);
//! let mut tracker = Tracker::open(user, store, config)?;
//!
//! let milk = tracker.add_item(NewItem::named("Milk"))?;
//! tracker.confirm_purchase(&milk.id, 3.49, "Giant", None)?;
//! tracker.save_list()?;
//!
//! for entry in tracker.grouped_history().entries {
//!     println!("{} x{}", entry.most_recent.name, entry.count);
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod list;
pub mod models;
pub mod stats;
pub mod storage;
pub mod tracker;
pub mod viz;

pub use api::{GeminiClient, ReceiptExtractor, ReceiptImage, StoreAdvisor};
pub use auth::{AuthProvider, LocalAuth};
pub use config::Config;
pub use error::{Result, TrackerError};
pub use list::ShoppingList;
pub use models::{ItemKey, NewItem, PurchaseRecord, ScannedItem, ShoppingListItem, User};
pub use storage::{HistoryStore, JsonFileStore, MemoryStore};
pub use tracker::Tracker;
