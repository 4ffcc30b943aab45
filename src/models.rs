use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Grocery categories offered when adding an item.
pub const CATEGORIES: [&str; 13] = [
    "Produce",
    "Dairy & Eggs",
    "Meat & Seafood",
    "Bakery & Bread",
    "Pantry",
    "Frozen Foods",
    "Snacks",
    "Beverages",
    "Household",
    "Health & Beauty",
    "Pets",
    "Baby",
    "Other",
];

/// Quantity units offered when adding an item.
pub const UNITS: [&str; 10] = [
    "pcs", "kg", "g", "L", "ml", "pack", "box", "bottle", "can", "dozen",
];

pub const DEFAULT_UNIT: &str = "pcs";

/// Canonical form of an item name: trimmed and lowercased.
///
/// This is the only normalization used anywhere in the crate. History
/// grouping, duplicate detection on the shopping list and item-history
/// lookup all go through it.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Grouping key for purchase history (a normalized item name).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct ItemKey(String);

impl ItemKey {
    pub fn new(name: &str) -> Self {
        ItemKey(normalize_name(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Does `name` normalize to this key?
    pub fn matches(&self, name: &str) -> bool {
        normalize_name(name) == self.0
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemKey {
    fn from(name: &str) -> Self {
        ItemKey::new(name)
    }
}

/// One historical purchase event. Append-only: never edited or deleted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseRecord {
    pub id: String,
    pub name: String,
    pub price: f64,
    pub store: String,
    pub date: DateTime<Utc>,
    /// Data URL of a photo taken at purchase time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl PurchaseRecord {
    pub fn key(&self) -> ItemKey {
        ItemKey::new(&self.name)
    }
}

/// An entry on the active shopping list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ShoppingListItem {
    pub id: String,
    pub name: String,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_store: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// User input for a list item, before an id is assigned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewItem {
    pub name: String,
    pub quantity: u32,
    pub unit: Option<String>,
    pub suggested_store: Option<String>,
    pub category: Option<String>,
    pub image_url: Option<String>,
}

impl NewItem {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            quantity: 1,
            unit: Some(DEFAULT_UNIT.to_string()),
            ..Default::default()
        }
    }
}

/// A line item extracted from a receipt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScannedItem {
    pub name: String,
    pub quantity: f64,
    pub price: f64,
}

impl ScannedItem {
    /// Non-empty name, positive price and positive quantity.
    pub fn is_valid(&self) -> bool {
        !self.name.trim().is_empty()
            && self.price.is_finite()
            && self.price > 0.0
            && self.quantity.is_finite()
            && self.quantity > 0.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub email: String,
}

/// Raw line item as returned by the model. Any field may be missing or mistyped.
#[derive(Debug, Clone, Deserialize)]
pub struct RawScannedItem {
    /// Kept loose so a non-string name drops the item instead of the whole response.
    #[serde(default)]
    pub name: Option<serde_json::Value>,
    /// Models sometimes return numbers as strings ("2.50"); accept both.
    #[serde(default, deserialize_with = "de_opt_f64_from_string_or_number")]
    pub quantity: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64_from_string_or_number")]
    pub price: Option<f64>,
}

impl RawScannedItem {
    /// Apply defaults (quantity 1) and drop the item if it is not usable.
    pub fn into_valid(self) -> Option<ScannedItem> {
        let item = ScannedItem {
            name: self.name?.as_str()?.trim().to_string(),
            quantity: self.quantity.unwrap_or(1.0),
            price: self.price?,
        };
        item.is_valid().then_some(item)
    }
}

/// Serde helper: parse an optional `f64` from a JSON number, a numeric string, or null.
fn de_opt_f64_from_string_or_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::{self, Visitor};
    struct F64Visitor;

    impl<'de> Visitor<'de> for F64Visitor {
        type Value = Option<f64>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            write!(f, "a number, a string containing a number, or null")
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(v))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(v as f64))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(v as f64))
        }

        fn visit_str<E>(self, s: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            let cleaned = s.trim().trim_start_matches('$').replace(',', "");
            // Unparseable strings count as missing; the item gets filtered later.
            Ok(cleaned.parse::<f64>().ok())
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }
    }

    deserializer.deserialize_any(F64Visitor)
}

static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Timestamp-based identifier, unique within the process.
pub(crate) fn new_id(now: DateTime<Utc>) -> String {
    let n = ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{}-{}", now.to_rfc3339_opts(SecondsFormat::Millis, true), n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_trims_and_lowercases() {
        assert_eq!(normalize_name(" Milk "), "milk");
        assert_eq!(normalize_name("milk"), "milk");
        assert_eq!(normalize_name("\tOrganic Almond MILK\n"), "organic almond milk");
    }

    #[test]
    fn normalize_is_idempotent() {
        for s in [" Milk ", "EGGS", "  free-range Eggs", "", "   ", "Crème Brûlée "] {
            let once = normalize_name(s);
            assert_eq!(normalize_name(&once), once);
        }
    }

    #[test]
    fn item_key_matches_variants() {
        let key = ItemKey::new("Eggs");
        assert!(key.matches("eggs "));
        assert!(key.matches(" EGGS"));
        assert!(!key.matches("egg"));
        assert_eq!(key.to_string(), "eggs");
    }

    #[test]
    fn purchase_record_uses_camel_case_on_the_wire() {
        let rec = PurchaseRecord {
            id: "1".into(),
            name: "Avocado".into(),
            price: 1.5,
            store: "Cold Storage".into(),
            date: "2024-07-19T12:30:00Z".parse().unwrap(),
            image_url: Some("data:image/jpeg;base64,AAAA".into()),
        };
        let v = serde_json::to_value(&rec).unwrap();
        assert_eq!(v["imageUrl"], "data:image/jpeg;base64,AAAA");
        assert_eq!(v["date"], "2024-07-19T12:30:00Z");
        let back: PurchaseRecord = serde_json::from_value(v).unwrap();
        assert_eq!(back, rec);
    }

    #[test]
    fn raw_item_defaults_quantity_and_accepts_string_numbers() {
        let raw: RawScannedItem =
            serde_json::from_str(r#"{"name":" Bananas ","price":"$2.40"}"#).unwrap();
        let item = raw.into_valid().unwrap();
        assert_eq!(item.name, "Bananas");
        assert_eq!(item.quantity, 1.0);
        assert!((item.price - 2.4).abs() < 1e-9);
    }

    #[test]
    fn raw_item_rejects_unusable_values() {
        for json in [
            r#"{"name":"","price":1.0,"quantity":1}"#,
            r#"{"name":"Tax","price":0,"quantity":1}"#,
            r#"{"name":"Refund","price":-3.0}"#,
            r#"{"name":"Ghost","price":1.0,"quantity":0}"#,
            r#"{"price":1.0}"#,
            r#"{"name":"No price"}"#,
            r#"{"name":42,"price":1.0}"#,
        ] {
            let raw: RawScannedItem = serde_json::from_str(json).unwrap();
            assert!(raw.into_valid().is_none(), "should reject {json}");
        }
    }

    #[test]
    fn ids_are_unique() {
        let now = Utc::now();
        assert_ne!(new_id(now), new_id(now));
    }
}
