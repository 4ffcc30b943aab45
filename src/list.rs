//! The active shopping list.

use crate::error::{Result, TrackerError};
use crate::models::{ItemKey, NewItem, ShoppingListItem, new_id};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Group name for list items without a category.
pub const UNCATEGORIZED: &str = "Uncategorized";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShoppingList {
    items: Vec<ShoppingListItem>,
}

/// Trim text fields and apply defaults; reject an empty name.
fn clean(item: NewItem) -> Result<NewItem> {
    let name = item.name.trim().to_string();
    if name.is_empty() {
        return Err(TrackerError::validation("Item name cannot be empty."));
    }
    let opt = |s: Option<String>| s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
    Ok(NewItem {
        name,
        quantity: item.quantity.max(1),
        unit: opt(item.unit),
        suggested_store: opt(item.suggested_store),
        category: opt(item.category),
        image_url: item.image_url.filter(|s| !s.is_empty()),
    })
}

impl ShoppingList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a saved list; a missing file is an empty list.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let s = fs::read_to_string(path)?;
        serde_json::from_str(&s)
            .map_err(|e| TrackerError::Storage(format!("parse {}: {e}", path.display())))
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn items(&self) -> &[ShoppingListItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items grouped by category: named categories alphabetically (ignoring
    /// case), then items without one under [`UNCATEGORIZED`]. Items keep list
    /// order within a group.
    pub fn by_category(&self) -> Vec<(String, Vec<&ShoppingListItem>)> {
        let mut groups: BTreeMap<(bool, String, String), Vec<&ShoppingListItem>> = BTreeMap::new();
        for item in &self.items {
            let name = item
                .category
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty() && *c != UNCATEGORIZED)
                .unwrap_or(UNCATEGORIZED);
            let last = name == UNCATEGORIZED;
            groups
                .entry((last, name.to_lowercase(), name.to_string()))
                .or_default()
                .push(item);
        }
        groups
            .into_iter()
            .map(|((_, _, name), items)| (name, items))
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<&ShoppingListItem> {
        self.items.iter().find(|i| i.id == id)
    }

    /// Is an item with the same normalized name already listed (ignoring `except_id`)?
    pub fn contains_name(&self, name: &str, except_id: Option<&str>) -> bool {
        let key = ItemKey::new(name);
        self.items
            .iter()
            .any(|i| Some(i.id.as_str()) != except_id && key.matches(&i.name))
    }

    pub fn add(&mut self, item: NewItem) -> Result<&ShoppingListItem> {
        let item = clean(item)?;
        if self.contains_name(&item.name, None) {
            return Err(TrackerError::Duplicate(item.name));
        }
        self.items.push(ShoppingListItem {
            id: new_id(Utc::now()),
            name: item.name,
            quantity: item.quantity,
            unit: item.unit,
            suggested_store: item.suggested_store,
            category: item.category,
            image_url: item.image_url,
        });
        log::debug!("list: added item, {} total", self.items.len());
        Ok(&self.items[self.items.len() - 1])
    }

    /// Replace an item's fields, keeping its id.
    ///
    /// The store suggestion is the exception: it is only replaced when `item`
    /// carries a new one, so editing quantity or unit keeps an earlier
    /// suggestion. Use [`ShoppingList::clear_suggestion`] to drop it.
    pub fn edit(&mut self, id: &str, item: NewItem) -> Result<&ShoppingListItem> {
        let item = clean(item)?;
        let idx = self
            .items
            .iter()
            .position(|i| i.id == id)
            .ok_or_else(|| TrackerError::NotFound(format!("list item {id}")))?;
        if self.contains_name(&item.name, Some(id)) {
            return Err(TrackerError::Duplicate(item.name));
        }
        let slot = &mut self.items[idx];
        slot.name = item.name;
        slot.quantity = item.quantity;
        slot.unit = item.unit;
        slot.category = item.category;
        slot.image_url = item.image_url;
        if item.suggested_store.is_some() {
            slot.suggested_store = item.suggested_store;
        }
        Ok(&self.items[idx])
    }

    /// Drop the store suggestion of an item; returns the old one.
    pub fn clear_suggestion(&mut self, id: &str) -> Result<Option<String>> {
        let item = self
            .items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| TrackerError::NotFound(format!("list item {id}")))?;
        Ok(item.suggested_store.take())
    }

    pub fn remove(&mut self, id: &str) -> Result<ShoppingListItem> {
        let idx = self
            .items
            .iter()
            .position(|i| i.id == id)
            .ok_or_else(|| TrackerError::NotFound(format!("list item {id}")))?;
        Ok(self.items.remove(idx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_trims_and_defaults() {
        let mut list = ShoppingList::new();
        let item = list
            .add(NewItem {
                name: "  Greek Yogurt ".into(),
                quantity: 0,
                category: Some("".into()),
                ..Default::default()
            })
            .unwrap()
            .clone();
        assert_eq!(item.name, "Greek Yogurt");
        assert_eq!(item.quantity, 1);
        assert_eq!(item.category, None);
        assert_eq!(list.get(&item.id), Some(&item));
    }

    #[test]
    fn empty_name_is_rejected() {
        let mut list = ShoppingList::new();
        let err = list.add(NewItem::named("   ")).unwrap_err();
        assert!(err.is_validation());
        assert!(list.is_empty());
    }

    #[test]
    fn edit_allows_same_name_but_not_other_items() {
        let mut list = ShoppingList::new();
        let milk = list.add(NewItem::named("Milk")).unwrap().id.clone();
        list.add(NewItem::named("Bread")).unwrap();

        let edited = list.edit(&milk, NewItem::named("milk ")).unwrap();
        assert_eq!(edited.name, "milk");

        let err = list.edit(&milk, NewItem::named("BREAD")).unwrap_err();
        assert!(matches!(err, TrackerError::Duplicate(_)));
        assert!(matches!(
            list.edit("missing", NewItem::named("Tea")),
            Err(TrackerError::NotFound(_))
        ));
    }

    #[test]
    fn groups_by_category_with_uncategorized_last() {
        let mut list = ShoppingList::new();
        let with = |name: &str, category: Option<&str>| NewItem {
            category: category.map(str::to_string),
            ..NewItem::named(name)
        };
        list.add(with("Paper Towels", None)).unwrap();
        list.add(with("Milk", Some("Dairy & Eggs"))).unwrap();
        list.add(with("Apples", Some("Produce"))).unwrap();
        list.add(with("Batteries", Some("  "))).unwrap();
        list.add(with("Cheddar", Some("Dairy & Eggs"))).unwrap();
        list.add(with("Dog Food", Some("Uncategorized"))).unwrap();
        list.add(with("Bagels", Some("bakery"))).unwrap();

        let groups = list.by_category();
        let names: Vec<&str> = groups.iter().map(|(c, _)| c.as_str()).collect();
        assert_eq!(names, vec!["bakery", "Dairy & Eggs", "Produce", UNCATEGORIZED]);

        let items = |i: usize| groups[i].1.iter().map(|it| it.name.as_str()).collect::<Vec<_>>();
        assert_eq!(items(1), vec!["Milk", "Cheddar"]);
        assert_eq!(items(3), vec!["Paper Towels", "Batteries", "Dog Food"]);
        assert_eq!(groups.iter().map(|(_, v)| v.len()).sum::<usize>(), list.len());
        assert!(ShoppingList::new().by_category().is_empty());
    }

    #[test]
    fn edit_keeps_suggestion_until_cleared() {
        let mut list = ShoppingList::new();
        let id = list
            .add(NewItem {
                suggested_store: Some("FairPrice".into()),
                ..NewItem::named("Rice")
            })
            .unwrap()
            .id
            .clone();

        let edited = list.edit(&id, NewItem { quantity: 2, ..NewItem::named("Rice") }).unwrap();
        assert_eq!(edited.suggested_store.as_deref(), Some("FairPrice"));
        assert_eq!(edited.quantity, 2);

        assert_eq!(list.clear_suggestion(&id).unwrap().as_deref(), Some("FairPrice"));
        assert_eq!(list.get(&id).unwrap().suggested_store, None);
        assert!(list.clear_suggestion("missing").is_err());
    }

    #[test]
    fn remove_and_persist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("list.json");
        let mut list = ShoppingList::new();
        let id = list.add(NewItem::named("Dish Soap")).unwrap().id.clone();
        list.add(NewItem::named("Paper Towels")).unwrap();
        list.save(&path).unwrap();

        let mut loaded = ShoppingList::load(&path).unwrap();
        assert_eq!(loaded, list);
        assert_eq!(loaded.remove(&id).unwrap().name, "Dish Soap");
        assert!(loaded.remove(&id).is_err());
        assert_eq!(loaded.len(), 1);
    }
}
