//! Coordinate mapping and label formatting for price charts.

use crate::models::PurchaseRecord;
use chrono::{DateTime, Utc};
use num_format::{Locale, ToFormattedString};

use super::types::{
    ChartOutcome, ChartPoint, DateLabel, MAX_PRICE_LABELS, MIN_CHART_POINTS, PriceChart,
    PriceLabel, Viewport,
};

/// Linear mapping from (date, price) to viewport pixels.
///
/// Zero-width ranges are replaced by 1 so a series with a single date or a
/// single price never divides by zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordMapper {
    viewport: Viewport,
    min_price: f64,
    price_range: f64,
    min_date_ms: f64,
    date_range_ms: f64,
}

impl CoordMapper {
    /// Build a mapper from the extrema of `records`. Returns `None` for an empty slice.
    pub fn from_records(records: &[PurchaseRecord], viewport: Viewport) -> Option<Self> {
        let first = records.first()?;
        let (mut min_price, mut max_price) = (first.price, first.price);
        let (mut min_date, mut max_date) = (first.date, first.date);
        for r in &records[1..] {
            min_price = min_price.min(r.price);
            max_price = max_price.max(r.price);
            min_date = min_date.min(r.date);
            max_date = max_date.max(r.date);
        }
        let price_range = non_zero(max_price - min_price);
        let date_range_ms = non_zero((max_date - min_date).num_milliseconds() as f64);
        Some(Self {
            viewport,
            min_price,
            price_range,
            min_date_ms: min_date.timestamp_millis() as f64,
            date_range_ms,
        })
    }

    pub fn x(&self, date: DateTime<Utc>) -> f64 {
        let pad = self.viewport.padding as f64;
        let span = self.viewport.width as f64 - 2.0 * pad;
        ((date.timestamp_millis() as f64 - self.min_date_ms) / self.date_range_ms) * span + pad
    }

    /// Pixel y grows downward, so higher prices get smaller y.
    pub fn y(&self, price: f64) -> f64 {
        let pad = self.viewport.padding as f64;
        let height = self.viewport.height as f64;
        let span = height - 2.0 * pad;
        height - (((price - self.min_price) / self.price_range) * span + pad)
    }

    pub fn point(&self, record: &PurchaseRecord) -> ChartPoint {
        ChartPoint {
            x: self.x(record.date),
            y: self.y(record.price),
        }
    }
}

fn non_zero(range: f64) -> f64 {
    if range == 0.0 { 1.0 } else { range }
}

/// Map one item's purchases (oldest first) into chart coordinates with axis labels.
pub fn map_price_chart(records: &[PurchaseRecord], viewport: Viewport) -> ChartOutcome {
    if !viewport.is_valid() {
        return ChartOutcome::InvalidViewport(viewport);
    }
    if records.len() < MIN_CHART_POINTS {
        return ChartOutcome::InsufficientData {
            count: records.len(),
        };
    }
    let Some(mapper) = CoordMapper::from_records(records, viewport) else {
        return ChartOutcome::InsufficientData { count: 0 };
    };

    let points = records.iter().map(|r| mapper.point(r)).collect();

    let min_price = records.iter().map(|r| r.price).fold(f64::INFINITY, f64::min);
    let max_price = records
        .iter()
        .map(|r| r.price)
        .fold(f64::NEG_INFINITY, f64::max);
    let price_labels = price_labels(&mapper, min_price, max_price, records.len());

    // non-empty: checked above
    let min_date = records.iter().map(|r| r.date).min().unwrap_or(records[0].date);
    let max_date = records.iter().map(|r| r.date).max().unwrap_or(records[0].date);

    ChartOutcome::Chart(PriceChart {
        viewport,
        points,
        price_labels,
        start_label: DateLabel {
            date: min_date,
            text: short_date(min_date),
            x: mapper.x(min_date),
        },
        end_label: DateLabel {
            date: max_date,
            text: short_date(max_date),
            x: mapper.x(max_date),
        },
        min_price,
        max_price,
    })
}

/// Evenly spaced price gridlines between `min` and `max` inclusive.
///
/// A flat series gets a single label at `min`; otherwise
/// `min(MAX_PRICE_LABELS, n_records)` labels.
fn price_labels(mapper: &CoordMapper, min: f64, max: f64, n_records: usize) -> Vec<PriceLabel> {
    let range = max - min;
    let count = if range == 0.0 {
        1
    } else {
        MAX_PRICE_LABELS.min(n_records)
    };
    if count <= 1 {
        return vec![PriceLabel {
            price: min,
            y: mapper.y(min),
        }];
    }
    (0..count)
        .map(|i| {
            let price = min + (range / (count - 1) as f64) * i as f64;
            PriceLabel {
                price,
                y: mapper.y(price),
            }
        })
        .collect()
}

/// Short month/day label, e.g. "Jan 5".
pub fn short_date(date: DateTime<Utc>) -> String {
    date.format("%b %-d").to_string()
}

/// Map a user-provided locale tag to a `num_format::Locale` and its decimal separator char.
///
/// Supported tags (case-insensitive): `en`, `us`, `en_US`, `de`, `de_DE`, `german`,
/// `fr`, `es`, `it`, `pt`, `nl`. Defaults to English.
pub fn map_locale(tag: &str) -> (&'static Locale, char) {
    match tag.to_lowercase().as_str() {
        "de" | "de_de" | "german" => (&Locale::de, ','),
        "fr" | "fr_fr" => (&Locale::fr, ','),
        "es" | "es_es" => (&Locale::es, ','),
        "it" | "it_it" => (&Locale::it, ','),
        "pt" | "pt_pt" | "pt_br" => (&Locale::pt, ','),
        "nl" | "nl_nl" => (&Locale::nl, ','),
        _ => (&Locale::en, '.'), // default
    }
}

/// Format a price with two decimals and locale grouping, e.g. `$1,234.50`.
pub fn format_price(value: f64, locale_tag: &str) -> String {
    let (locale, dec_sep) = map_locale(locale_tag);
    let cents = (value.abs() * 100.0).round() as u64;
    let sign = if value < 0.0 && cents > 0 { "-" } else { "" };
    format!(
        "{sign}${}{dec_sep}{:02}",
        (cents / 100).to_formatted_string(locale),
        cents % 100
    )
}
