//! Price trend charts for a single item's purchase history.
//!
//! - [`map_price_chart`] turns purchases into pixel coordinates and axis labels
//! - [`plot_price_history`] draws that chart into an **SVG** file with Plotters
//! - Locale-aware price labels (`$1,234.50` vs `$1.234,50`)

pub mod text;
pub mod types;
pub mod util;

pub use types::{
    ChartOutcome, ChartPoint, DEFAULT_VIEWPORT, DateLabel, PriceChart, PriceLabel, Viewport,
};
pub use util::{CoordMapper, format_price, map_price_chart};

use crate::models::PurchaseRecord;
use anyhow::{Result, anyhow, bail};

use plotters::backend::DrawingBackend;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::FontFamily;
use plotters::style::text_anchor::{HPos, Pos, VPos};

use plotters_svg::SVGBackend;

use std::path::Path;

use text::truncate_to_width;

const BACKGROUND: RGBColor = RGBColor(30, 41, 59); // slate-800 (#1E293B)
const GRID: RGBColor = RGBColor(71, 85, 105); // slate-600 (#475569)
const LABEL: RGBColor = RGBColor(148, 163, 184); // slate-400 (#94A3B8)
const LINE: RGBColor = RGBColor(167, 139, 250); // violet-400 (#A78BFA)
const MARKER: RGBColor = RGBColor(124, 58, 237); // violet-600 (#7C3AED)

const LABEL_FONT_PX: u32 = 10;
const TITLE_FONT_PX: u32 = 13;

/// Render a purchase series (oldest first) as an SVG price trend chart.
///
/// Fails with "not enough data" for fewer than two purchases, and for
/// output paths that are not `.svg`.
pub fn plot_price_history<P: AsRef<Path>>(
    records: &[PurchaseRecord],
    out_path: P,
    viewport: Viewport,
    title: &str,
    locale_tag: &str,
) -> Result<()> {
    let out_path = out_path.as_ref();
    if out_path.extension().and_then(|s| s.to_str()) != Some("svg") {
        bail!("unsupported chart format for {}: use .svg", out_path.display());
    }

    let chart = match map_price_chart(records, viewport) {
        ChartOutcome::Chart(c) => c,
        ChartOutcome::InvalidViewport(vp) => {
            bail!("viewport {}x{} is too small for padding {}", vp.width, vp.height, vp.padding)
        }
        ChartOutcome::InsufficientData { count } => {
            bail!("not enough data for a price trend chart ({count} purchase(s), need at least 2)")
        }
    };

    let path_string = out_path.to_string_lossy().into_owned();
    let root = SVGBackend::new(path_string.as_str(), (viewport.width, viewport.height))
        .into_drawing_area();
    draw_chart(&root, &chart, title, locale_tag)?;
    root.present().map_err(|e| anyhow!("{:?}", e))?;
    log::debug!("wrote price chart with {} points to {}", chart.points.len(), path_string);
    Ok(())
}

fn px(v: f64) -> i32 {
    v.round() as i32
}

fn draw_chart<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    chart: &PriceChart,
    title: &str,
    locale_tag: &str,
) -> Result<()> {
    let vp = chart.viewport;
    let pad = vp.padding as i32;
    let right = vp.width as i32 - pad;

    root.fill(&BACKGROUND).map_err(|e| anyhow!("{:?}", e))?;

    if !title.trim().is_empty() {
        let max_px = vp.inner_width();
        let title_style = TextStyle::from((FontFamily::SansSerif, TITLE_FONT_PX))
            .color(&LABEL)
            .pos(Pos::new(HPos::Left, VPos::Top));
        root.draw(&Text::new(
            truncate_to_width(title, TITLE_FONT_PX, max_px),
            (pad, 8),
            title_style,
        ))
        .map_err(|e| anyhow!("{:?}", e))?;
    }

    // Price gridlines with labels left of the plotting area
    let grid_style = ShapeStyle {
        color: GRID.to_rgba(),
        filled: false,
        stroke_width: 1,
    };
    let price_style = TextStyle::from((FontFamily::SansSerif, LABEL_FONT_PX))
        .color(&LABEL)
        .pos(Pos::new(HPos::Right, VPos::Center));
    for label in &chart.price_labels {
        let y = px(label.y);
        draw_dashed_hline(root, pad, right, y, grid_style)?;
        root.draw(&Text::new(
            format_price(label.price, locale_tag),
            (pad - 8, y),
            price_style.clone(),
        ))
        .map_err(|e| anyhow!("{:?}", e))?;
    }

    // First and last purchase dates under the plotting area
    let date_y = vp.height as i32 - pad + 20;
    let start_style = TextStyle::from((FontFamily::SansSerif, LABEL_FONT_PX))
        .color(&LABEL)
        .pos(Pos::new(HPos::Left, VPos::Center));
    let end_style = TextStyle::from((FontFamily::SansSerif, LABEL_FONT_PX))
        .color(&LABEL)
        .pos(Pos::new(HPos::Right, VPos::Center));
    root.draw(&Text::new(
        chart.start_label.text.clone(),
        (pad, date_y),
        start_style,
    ))
    .map_err(|e| anyhow!("{:?}", e))?;
    root.draw(&Text::new(
        chart.end_label.text.clone(),
        (right, date_y),
        end_style,
    ))
    .map_err(|e| anyhow!("{:?}", e))?;

    let coords: Vec<(i32, i32)> = chart.points.iter().map(|p| (px(p.x), px(p.y))).collect();
    root.draw(&PathElement::new(
        coords.clone(),
        ShapeStyle {
            color: LINE.to_rgba(),
            filled: false,
            stroke_width: 2,
        },
    ))
    .map_err(|e| anyhow!("{:?}", e))?;

    for (x, y) in coords {
        root.draw(&Circle::new((x, y), 4, MARKER.filled()))
            .map_err(|e| anyhow!("{:?}", e))?;
        root.draw(&Circle::new(
            (x, y),
            4,
            ShapeStyle {
                color: BACKGROUND.to_rgba(),
                filled: false,
                stroke_width: 2,
            },
        ))
        .map_err(|e| anyhow!("{:?}", e))?;
    }
    Ok(())
}

/// Horizontal dashed line from `x0` to `x1`.
fn draw_dashed_hline<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    x0: i32,
    x1: i32,
    y: i32,
    style: ShapeStyle,
) -> Result<()> {
    let segment_len = 3;
    let gap_len = 3;
    let mut x = x0;
    while x < x1 {
        let segment_end = (x + segment_len).min(x1);
        area.draw(&PathElement::new(vec![(x, y), (segment_end, y)], style))
            .map_err(|e| anyhow!("{:?}", e))?;
        x = segment_end + gap_len;
    }
    Ok(())
}
