use crate::models::{ItemKey, PurchaseRecord};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Number of groups shown in the history overview.
pub const DEFAULT_DISPLAY_LIMIT: usize = 10;

/// One row of the grouped purchase history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GroupedEntry {
    pub key: ItemKey,
    pub count: usize,
    pub most_recent: PurchaseRecord,
}

/// Purchase history grouped by normalized item name.
///
/// Groups are kept in order of first appearance in the input, so any later
/// stable sort breaks ties by that order.
#[derive(Debug, Clone, Default)]
pub struct GroupedHistory {
    entries: Vec<GroupedEntry>,
    index: AHashMap<ItemKey, usize>,
}

impl GroupedHistory {
    pub fn get(&self, key: &ItemKey) -> Option<&GroupedEntry> {
        self.index.get(key).map(|&i| &self.entries[i])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GroupedEntry> {
        self.entries.iter()
    }

    pub fn into_entries(self) -> Vec<GroupedEntry> {
        self.entries
    }
}

/// Group purchases by normalized name, counting them and keeping the most
/// recent record per group.
///
/// A record replaces the current `most_recent` only when its date is strictly
/// later. With equal timestamps the record seen first wins.
pub fn group_history(records: &[PurchaseRecord]) -> GroupedHistory {
    let mut out = GroupedHistory::default();
    for rec in records {
        let key = rec.key();
        match out.index.get(&key) {
            Some(&i) => {
                let entry = &mut out.entries[i];
                entry.count += 1;
                if rec.date > entry.most_recent.date {
                    entry.most_recent = rec.clone();
                }
            }
            None => {
                out.index.insert(key.clone(), out.entries.len());
                out.entries.push(GroupedEntry {
                    key,
                    count: 1,
                    most_recent: rec.clone(),
                });
            }
        }
    }
    out
}

/// Display-ready slice of the grouped history.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryView {
    /// Newest first, at most `limit` entries.
    pub entries: Vec<GroupedEntry>,
    /// Number of groups before truncation.
    pub total_groups: usize,
    /// Set when some groups were cut off ("showing the N most recent items").
    pub truncated: bool,
}

/// Sort groups by most recent purchase (newest first) and keep at most `limit`.
pub fn order_recent(grouped: GroupedHistory, limit: usize) -> HistoryView {
    let mut entries = grouped.into_entries();
    let total_groups = entries.len();
    // stable: equal dates keep first-appearance order
    entries.sort_by(|a, b| b.most_recent.date.cmp(&a.most_recent.date));
    entries.truncate(limit);
    HistoryView {
        entries,
        total_groups,
        truncated: total_groups > limit,
    }
}

/// Price statistics for one item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceSummary {
    pub key: ItemKey,
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub latest: f64,
    /// Store of the cheapest purchase (first one on ties).
    pub cheapest_store: String,
}

/// Compute per-item price statistics, keyed and ordered by normalized name.
pub fn price_summary(records: &[PurchaseRecord]) -> Vec<PriceSummary> {
    let mut groups: BTreeMap<ItemKey, Vec<&PurchaseRecord>> = BTreeMap::new();
    for rec in records {
        groups.entry(rec.key()).or_default().push(rec);
    }

    let mut out = Vec::new();
    for (key, recs) in groups {
        let count = recs.len();
        let cheapest = recs
            .iter()
            .copied()
            .reduce(|best, r| if r.price < best.price { r } else { best });
        let latest = recs
            .iter()
            .copied()
            .reduce(|best, r| if r.date > best.date { r } else { best });
        let (Some(cheapest), Some(latest)) = (cheapest, latest) else {
            continue;
        };
        let max = recs.iter().map(|r| r.price).fold(f64::NEG_INFINITY, f64::max);
        let mean = recs.iter().map(|r| r.price).sum::<f64>() / count as f64;
        out.push(PriceSummary {
            key,
            count,
            min: cheapest.price,
            max,
            mean,
            latest: latest.price,
            cheapest_store: cheapest.store.clone(),
        });
    }
    out
}
