//! Public types and constants for the visualization module.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fixed-size pixel space a price chart is mapped into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    /// Inset on every side; axis labels are drawn inside it.
    pub padding: u32,
}

/// The viewport used by the item-history view: 450x200 with a 40px inset.
pub const DEFAULT_VIEWPORT: Viewport = Viewport {
    width: 450,
    height: 200,
    padding: 40,
};

impl Default for Viewport {
    fn default() -> Self {
        DEFAULT_VIEWPORT
    }
}

impl Viewport {
    /// Largest width or height accepted; pixel coordinates are drawn as `i32`.
    pub const MAX_SIDE: u32 = i32::MAX as u32;

    /// The plotting area must have positive width and height once padding is removed.
    pub fn is_valid(&self) -> bool {
        self.width <= Self::MAX_SIDE
            && self.height <= Self::MAX_SIDE
            && self
                .padding
                .checked_mul(2)
                .is_some_and(|p| self.width > p && self.height > p)
    }

    /// Plotting area width (`width - 2 * padding`), zero for an invalid viewport.
    pub fn inner_width(&self) -> u32 {
        if self.is_valid() {
            self.width - 2 * self.padding
        } else {
            0
        }
    }
}

/// A (date, price) observation mapped into pixel space. Y grows downward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub x: f64,
    pub y: f64,
}

/// Horizontal gridline label.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceLabel {
    pub price: f64,
    pub y: f64,
}

/// Date label under the x axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateLabel {
    pub date: DateTime<Utc>,
    /// Short month/day text, e.g. "Jan 5".
    pub text: String,
    pub x: f64,
}

/// Everything needed to draw a price trend chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceChart {
    pub viewport: Viewport,
    /// One point per input record, in input order.
    pub points: Vec<ChartPoint>,
    /// At most four, lowest price first.
    pub price_labels: Vec<PriceLabel>,
    pub start_label: DateLabel,
    pub end_label: DateLabel,
    pub min_price: f64,
    pub max_price: f64,
}

/// Result of mapping a purchase series onto a chart.
#[derive(Debug, Clone, PartialEq)]
pub enum ChartOutcome {
    Chart(PriceChart),
    /// Fewer than two purchases: show a "not enough data" notice instead.
    InsufficientData { count: usize },
    /// The viewport leaves no room to plot once padding is removed.
    InvalidViewport(Viewport),
}

impl ChartOutcome {
    pub fn chart(&self) -> Option<&PriceChart> {
        match self {
            ChartOutcome::Chart(c) => Some(c),
            ChartOutcome::InsufficientData { .. } | ChartOutcome::InvalidViewport(_) => None,
        }
    }
}

/// Minimum number of purchases for a trend chart.
pub const MIN_CHART_POINTS: usize = 2;

/// At most this many price gridlines.
pub const MAX_PRICE_LABELS: usize = 4;
