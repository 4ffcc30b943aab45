//! A signed-in user's session: their shopping list and purchase history.
//!
//! History is loaded once when the tracker is opened and kept in memory,
//! newest first. Every write goes through the [`HistoryStore`] before the
//! in-memory state changes, so a failed write leaves the tracker as it was.

use crate::api::{MSG_NO_VALID_ITEMS, StoreAdvisor};
use crate::config::Config;
use crate::error::{Result, TrackerError};
use crate::list::ShoppingList;
use crate::models::{ItemKey, NewItem, PurchaseRecord, ScannedItem, ShoppingListItem, User, new_id};
use crate::stats::{HistoryView, PriceSummary, group_history, order_recent, price_summary};
use crate::storage::HistoryStore;
use chrono::{DateTime, Utc};

pub const MSG_SUGGEST_FAILED: &str = "Unable to get store suggestion at this time.";

/// All purchases of one item, oldest first.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemHistory {
    /// Name as written on the most recent purchase.
    pub display_name: String,
    pub records: Vec<PurchaseRecord>,
}

pub struct Tracker<S: HistoryStore> {
    user: User,
    store: S,
    config: Config,
    list: ShoppingList,
    history: Vec<PurchaseRecord>,
}

fn check_store_name(store_name: &str) -> Result<String> {
    let store_name = store_name.trim();
    if store_name.is_empty() {
        return Err(TrackerError::validation("Store name is required."));
    }
    Ok(store_name.to_string())
}

impl<S: HistoryStore> Tracker<S> {
    /// Load the user's saved list and their history from `store`.
    pub fn open(user: User, store: S, config: Config) -> Result<Self> {
        let list = ShoppingList::load(config.list_path(&user.id))?;
        Self::with_list(user, store, config, list)
    }

    /// Like [`Tracker::open`] but with a list supplied by the caller.
    pub fn with_list(user: User, store: S, config: Config, list: ShoppingList) -> Result<Self> {
        let history = store.get_history(&user.id)?;
        log::debug!(
            "opened tracker for {}: {} list item(s), {} purchase(s)",
            user.email,
            list.len(),
            history.len()
        );
        Ok(Self {
            user,
            store,
            config,
            list,
            history,
        })
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn list(&self) -> &ShoppingList {
        &self.list
    }

    /// Full history, newest first.
    pub fn history(&self) -> &[PurchaseRecord] {
        &self.history
    }

    /// Write the shopping list to the data directory.
    pub fn save_list(&self) -> Result<()> {
        self.list.save(self.config.list_path(&self.user.id))
    }

    pub fn add_item(&mut self, item: NewItem) -> Result<ShoppingListItem> {
        self.list.add(item).cloned()
    }

    pub fn edit_item(&mut self, id: &str, item: NewItem) -> Result<ShoppingListItem> {
        self.list.edit(id, item).cloned()
    }

    pub fn clear_suggestion(&mut self, id: &str) -> Result<Option<String>> {
        self.list.clear_suggestion(id)
    }

    pub fn remove_item(&mut self, id: &str) -> Result<ShoppingListItem> {
        self.list.remove(id)
    }

    /// Record the purchase of a list item and take it off the list.
    pub fn confirm_purchase(
        &mut self,
        item_id: &str,
        price: f64,
        store_name: &str,
        image_url: Option<String>,
    ) -> Result<PurchaseRecord> {
        self.confirm_purchase_at(item_id, price, store_name, image_url, Utc::now())
    }

    pub fn confirm_purchase_at(
        &mut self,
        item_id: &str,
        price: f64,
        store_name: &str,
        image_url: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<PurchaseRecord> {
        if !price.is_finite() || price <= 0.0 {
            return Err(TrackerError::validation("Price must be greater than zero."));
        }
        let store_name = check_store_name(store_name)?;
        let item = self
            .list
            .get(item_id)
            .ok_or_else(|| TrackerError::NotFound(format!("list item {item_id}")))?;

        let record = PurchaseRecord {
            id: new_id(now),
            name: item.name.clone(),
            price,
            store: store_name,
            date: now,
            image_url: image_url.filter(|s| !s.is_empty()),
        };
        self.store
            .append_history(&self.user.id, std::slice::from_ref(&record))?;

        self.list.remove(item_id)?;
        self.history.insert(0, record.clone());
        log::info!("purchased {} at {} for {:.2}", record.name, record.store, record.price);
        Ok(record)
    }

    /// Record every usable line of a scanned receipt as a purchase.
    pub fn confirm_receipt(
        &mut self,
        items: &[ScannedItem],
        store_name: &str,
    ) -> Result<Vec<PurchaseRecord>> {
        self.confirm_receipt_at(items, store_name, Utc::now())
    }

    pub fn confirm_receipt_at(
        &mut self,
        items: &[ScannedItem],
        store_name: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<PurchaseRecord>> {
        let store_name = check_store_name(store_name)?;
        let records: Vec<PurchaseRecord> = items
            .iter()
            .filter(|i| i.is_valid())
            .map(|i| PurchaseRecord {
                id: new_id(now),
                name: i.name.trim().to_string(),
                price: i.price,
                store: store_name.clone(),
                date: now,
                image_url: None,
            })
            .collect();
        if records.is_empty() {
            return Err(TrackerError::validation(MSG_NO_VALID_ITEMS));
        }
        if records.len() < items.len() {
            log::warn!("skipped {} unusable receipt line(s)", items.len() - records.len());
        }

        self.store.append_history(&self.user.id, &records)?;

        let older = std::mem::take(&mut self.history);
        self.history = records.iter().cloned().chain(older).collect();
        log::info!("saved {} receipt item(s) from {}", records.len(), store_name);
        Ok(records)
    }

    /// Grouped overview of the most recently bought items.
    pub fn grouped_history(&self) -> HistoryView {
        self.grouped_history_limited(self.config.display_limit)
    }

    pub fn grouped_history_limited(&self, limit: usize) -> HistoryView {
        order_recent(group_history(&self.history), limit)
    }

    /// Every purchase of `name` (any casing), oldest first.
    pub fn item_history(&self, name: &str) -> Option<ItemHistory> {
        let key = ItemKey::new(name);
        let mut records: Vec<PurchaseRecord> = self
            .history
            .iter()
            .filter(|r| key.matches(&r.name))
            .cloned()
            .collect();
        // stable, so same-instant purchases keep history order
        records.sort_by(|a, b| a.date.cmp(&b.date));
        let display_name = records.last()?.name.clone();
        Some(ItemHistory {
            display_name,
            records,
        })
    }

    pub fn price_summary(&self) -> Vec<PriceSummary> {
        price_summary(&self.history)
    }

    /// Ask `advisor` where to buy `name`, passing past purchases cheapest
    /// first. Never fails: problems turn into a message for the user.
    pub fn suggest_store<A: StoreAdvisor + ?Sized>(&self, name: &str, advisor: &A) -> String {
        let key = ItemKey::new(name);
        let mut past: Vec<PurchaseRecord> = self
            .history
            .iter()
            .filter(|r| key.matches(&r.name))
            .cloned()
            .collect();
        past.sort_by(|a, b| a.price.total_cmp(&b.price));
        match advisor.suggest_store(name.trim(), &past) {
            Ok(s) if !s.trim().is_empty() => s.trim().to_string(),
            Ok(_) => MSG_SUGGEST_FAILED.to_string(),
            Err(e) => {
                log::warn!("store suggestion failed: {e}");
                MSG_SUGGEST_FAILED.to_string()
            }
        }
    }
}
