//! SVG charts for the dashboard pages.
//!
//! Everything is drawn with plotters primitives on an [`SVGBackend`] writing to
//! a string, with text positioned by explicit anchors. Nothing here measures
//! glyphs, so rendering works on hosts without system fonts.

use crate::analysis::crosstab::CrossTab;
use crate::analysis::frequency::{CategoryCount, percentage};
use crate::analysis::report::{ChartKind, Report};
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::f64::consts::PI;
use thiserror::Error;

/// Errors that can occur during chart generation
#[derive(Error, Debug)]
pub enum PlotError {
    #[error("Failed to draw chart elements: {0}")]
    Drawing(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

type Result<T> = core::result::Result<T, PlotError>;

fn drawing<E: std::fmt::Display>(err: E) -> PlotError {
    PlotError::Drawing(err.to_string())
}

/// Categorical palette, cycled when a chart has more categories than colours.
pub const PALETTE: [RGBColor; 12] = [
    RGBColor(0xFF, 0x6B, 0x8A),
    RGBColor(0x4E, 0xCD, 0xC4),
    RGBColor(0x45, 0xB7, 0xD1),
    RGBColor(0x96, 0xCE, 0xB4),
    RGBColor(0xFF, 0xEA, 0xA7),
    RGBColor(0xA2, 0x9B, 0xFE),
    RGBColor(0x74, 0xB9, 0xFF),
    RGBColor(0xFD, 0x79, 0xA8),
    RGBColor(0x6C, 0x5C, 0xE7),
    RGBColor(0x00, 0xB8, 0x94),
    RGBColor(0xFD, 0xCB, 0x6E),
    RGBColor(0xE1, 0x70, 0x55),
];
const REMAINDER_COLOR: RGBColor = RGBColor(0xBD, 0xC3, 0xC7);
const TITLE_COLOR: RGBColor = RGBColor(0x2C, 0x3E, 0x50);
const MUTED_COLOR: RGBColor = RGBColor(0x7F, 0x8C, 0x8D);
const BAR_COLOR: RGBColor = RGBColor(0x2E, 0x7D, 0x32);

fn palette(i: usize) -> RGBColor {
    PALETTE[i % PALETTE.len()]
}

/// Configuration options for chart generation
#[derive(Clone, Debug)]
pub struct ChartOptions {
    /// Title displayed at the top of the chart
    pub title: String,

    /// Width of the chart in pixels; height follows from the content
    pub width: u32,

    /// Append each category's share to its value label
    pub show_percentages: bool,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            title: String::new(),
            width: 900,
            show_percentages: false,
        }
    }
}

fn truncate(label: &str, max: usize) -> String {
    if label.chars().count() > max {
        let cut: String = label.chars().take(max).collect();
        format!("{}...", cut)
    } else {
        label.to_string()
    }
}

fn text_style(size: u32, color: &RGBColor, h: HPos, v: VPos) -> TextStyle<'static> {
    ("sans-serif", size)
        .into_font()
        .color(color)
        .pos(Pos::new(h, v))
}

/// Creates the chart of a report page
///
/// Pie charts for single-valued reports, horizontal bars otherwise. Both draw
/// the report's bucketed distribution.
///
/// # Arguments
/// * `report` - The computed report
/// * `options` - Title, width and label options
///
/// # Returns
/// * A Result containing the SVG document or an error
pub fn report_chart_svg(report: &Report, options: &ChartOptions) -> Result<String> {
    match report.chart_kind {
        ChartKind::Bar => bar_chart_svg(&report.chart, options),
        ChartKind::Pie => pie_chart_svg(&report.chart, options),
    }
}

/// Creates a horizontal bar chart
///
/// Bars are listed top to bottom in the order of `counts`, so the largest
/// category sits on top. Each bar carries its count and, optionally, its share.
///
/// # Arguments
/// * `counts` - Categories to draw, already bucketed
/// * `options` - Title, width and label options
///
/// # Returns
/// * A Result containing the SVG document or an error
///
/// # Errors
/// * `PlotError::InvalidData` when `counts` is empty
pub fn bar_chart_svg(counts: &CategoryCount, options: &ChartOptions) -> Result<String> {
    if counts.is_empty() {
        return Err(PlotError::InvalidData("no categories to draw".to_string()));
    }

    const TOP: i32 = 60;
    const ROW: i32 = 34;
    const LABEL_AREA: i32 = 320;
    let width = options.width.max(500) as i32;
    let height = TOP + ROW * counts.len() as i32 + 20;
    let total = counts.total();
    let max = counts.iter().map(|(_, c)| c).max().unwrap_or(1).max(1);
    let bar_space = (width - LABEL_AREA - 110) as f64;

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (width as u32, height as u32)).into_drawing_area();
        root.fill(&WHITE).map_err(drawing)?;
        root.draw(&Text::new(
            options.title.clone(),
            (width / 2, 24),
            text_style(20, &TITLE_COLOR, HPos::Center, VPos::Center),
        ))
        .map_err(drawing)?;

        for (i, (label, count)) in counts.iter().enumerate() {
            let y = TOP + ROW * i as i32;
            let len = ((count as f64 / max as f64) * bar_space).round() as i32;
            let x0 = LABEL_AREA + 10;

            root.draw(&Text::new(
                truncate(label, 45),
                (LABEL_AREA, y + ROW / 2),
                text_style(13, &BLACK, HPos::Right, VPos::Center),
            ))
            .map_err(drawing)?;
            root.draw(&Rectangle::new(
                [(x0, y + 5), (x0 + len.max(1), y + ROW - 5)],
                BAR_COLOR.mix(0.35 + 0.65 * (count as f64 / max as f64)).filled(),
            ))
            .map_err(drawing)?;

            let value = if options.show_percentages {
                format!("{} ({:.1}%)", count, percentage(count, total))
            } else {
                count.to_string()
            };
            root.draw(&Text::new(
                value,
                (x0 + len + 8, y + ROW / 2),
                text_style(13, &BLACK, HPos::Left, VPos::Center),
            ))
            .map_err(drawing)?;
        }

        root.present().map_err(drawing)?;
    }
    Ok(svg)
}

/// Creates a pie chart with a legend on the right
///
/// Slices follow the order of `counts`, clockwise from twelve o'clock. Shares of
/// at least 3 % are printed inside their slice.
///
/// # Arguments
/// * `counts` - Categories to draw, already bucketed
/// * `options` - Title and width options
///
/// # Returns
/// * A Result containing the SVG document or an error
pub fn pie_chart_svg(counts: &CategoryCount, options: &ChartOptions) -> Result<String> {
    let total = counts.total();
    if total == 0 {
        return Err(PlotError::InvalidData("no categories to draw".to_string()));
    }

    let width = options.width.max(600) as i32;
    let legend_rows = counts.len() as i32;
    let height = (60 + 22 * legend_rows + 20).max(480);
    let radius = 190.0;
    let center = (230, 60 + radius as i32 + 10);

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (width as u32, height as u32)).into_drawing_area();
        root.fill(&WHITE).map_err(drawing)?;
        root.draw(&Text::new(
            options.title.clone(),
            (width / 2, 24),
            text_style(20, &TITLE_COLOR, HPos::Center, VPos::Center),
        ))
        .map_err(drawing)?;

        let mut start = -PI / 2.0;
        for (i, (label, count)) in counts.iter().enumerate() {
            let sweep = 2.0 * PI * count as f64 / total as f64;
            let color = palette(i);

            // Arc approximated by one vertex every ~2 degrees.
            let steps = ((sweep / (PI / 90.0)).ceil() as usize).max(1);
            let mut points = vec![center];
            for s in 0..=steps {
                let a = start + sweep * s as f64 / steps as f64;
                points.push((
                    center.0 + (radius * a.cos()).round() as i32,
                    center.1 + (radius * a.sin()).round() as i32,
                ));
            }
            root.draw(&Polygon::new(points, color.filled()))
                .map_err(drawing)?;

            let share = percentage(count, total);
            if share >= 3.0 {
                let mid = start + sweep / 2.0;
                root.draw(&Text::new(
                    format!("{:.1}%", share),
                    (
                        center.0 + (radius * 0.65 * mid.cos()).round() as i32,
                        center.1 + (radius * 0.65 * mid.sin()).round() as i32,
                    ),
                    text_style(12, &BLACK, HPos::Center, VPos::Center),
                ))
                .map_err(drawing)?;
            }

            let ly = 70 + 22 * i as i32;
            let lx = center.0 + radius as i32 + 40;
            root.draw(&Rectangle::new([(lx, ly - 7), (lx + 14, ly + 7)], color.filled()))
                .map_err(drawing)?;
            root.draw(&Text::new(
                format!("{} ({})", truncate(label, 40), count),
                (lx + 22, ly),
                text_style(13, &BLACK, HPos::Left, VPos::Center),
            ))
            .map_err(drawing)?;

            start += sweep;
        }

        root.present().map_err(drawing)?;
    }
    Ok(svg)
}

/// One coloured block group of the waffle chart.
#[derive(Debug, Clone, PartialEq)]
pub struct WaffleSlice {
    pub label: String,
    /// Rounded share of all complete pairs; one square per point.
    pub percent: u32,
    pub count: usize,
    pub remainder: bool,
}

/// Maximum number of joint combinations drawn on the waffle chart.
pub const WAFFLE_COMBINATIONS: usize = 8;

/// Picks the waffle chart's blocks from a cross-tabulation
///
/// Every non-zero cell gets its share rounded to a whole percent; cells
/// rounding to zero are dropped. The `k` largest remain, and if their shares
/// leave at least two points of the 100 uncovered, an "Otras combinaciones"
/// block fills the gap. Category names are cut to 20 characters.
///
/// # Arguments
/// * `tab` - The contingency table
/// * `k` - Number of combinations to keep
///
/// # Returns
/// * Slices in drawing order, largest first, remainder last
pub fn waffle_slices(tab: &CrossTab, k: usize) -> Vec<WaffleSlice> {
    let total = tab.total();
    if total == 0 {
        return Vec::new();
    }

    let mut slices: Vec<WaffleSlice> = Vec::new();
    for (r, row) in tab.cells().iter().enumerate() {
        for (c, &count) in row.iter().enumerate() {
            if count == 0 {
                continue;
            }
            let percent = percentage(count, total).round() as u32;
            if percent >= 1 {
                slices.push(WaffleSlice {
                    label: format!(
                        "{} × {}",
                        truncate(&tab.rows()[r], 20),
                        truncate(&tab.cols()[c], 20)
                    ),
                    percent,
                    count,
                    remainder: false,
                });
            }
        }
    }
    slices.sort_by(|a, b| b.percent.cmp(&a.percent));
    slices.truncate(k);

    let covered: u32 = slices.iter().map(|s| s.percent).sum();
    if covered < 100 && 100 - covered >= 2 {
        slices.push(WaffleSlice {
            label: "Otras combinaciones".to_string(),
            percent: 100 - covered,
            count: 0,
            remainder: true,
        });
    }
    slices
}

/// Creates a 10×10 waffle chart where each square is about 1 % of the cases
///
/// Squares are filled row by row from the top left, snaking back on every
/// other row, in slice order. The legend lists each slice with its share and
/// case count.
///
/// # Arguments
/// * `slices` - Output of [`waffle_slices`]
/// * `options` - Title and width options
///
/// # Returns
/// * A Result containing the SVG document or an error
pub fn waffle_chart_svg(slices: &[WaffleSlice], options: &ChartOptions) -> Result<String> {
    if slices.is_empty() {
        return Err(PlotError::InvalidData(
            "no hay combinaciones suficientemente frecuentes".to_string(),
        ));
    }

    const CELL: i32 = 34;
    const GAP: i32 = 4;
    const GRID_TOP: i32 = 80;
    let width = options.width.max(10 * (CELL + GAP) as u32 + 40) as i32;
    let grid_left = (width - 10 * (CELL + GAP)) / 2;
    let legend_top = GRID_TOP + 10 * (CELL + GAP) + 30;
    let legend_cols = 3;
    let legend_rows = (slices.len() as i32 + legend_cols - 1) / legend_cols;
    let height = legend_top + 26 * legend_rows + 20;

    // Colour index per square, in fill order.
    let mut squares: Vec<Option<usize>> = Vec::with_capacity(100);
    for (i, slice) in slices.iter().enumerate() {
        for _ in 0..slice.percent {
            if squares.len() < 100 {
                squares.push(Some(i));
            }
        }
    }
    squares.resize(100, None);

    let color_of = |i: usize| {
        if slices[i].remainder {
            REMAINDER_COLOR
        } else {
            palette(i)
        }
    };

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (width as u32, height as u32)).into_drawing_area();
        root.fill(&WHITE).map_err(drawing)?;
        root.draw(&Text::new(
            options.title.clone(),
            (width / 2, 24),
            text_style(20, &TITLE_COLOR, HPos::Center, VPos::Center),
        ))
        .map_err(drawing)?;
        root.draw(&Text::new(
            "Cada cuadrito representa ≈ 1% del total de casos analizados",
            (width / 2, 54),
            text_style(13, &MUTED_COLOR, HPos::Center, VPos::Center),
        ))
        .map_err(drawing)?;

        for (n, square) in squares.iter().enumerate() {
            let row = (n / 10) as i32;
            let col = (if row % 2 == 0 { n % 10 } else { 9 - n % 10 }) as i32;
            let x = grid_left + col * (CELL + GAP);
            let y = GRID_TOP + row * (CELL + GAP);
            let style = match square {
                Some(i) => color_of(*i).filled(),
                None => RGBColor(0xEE, 0xEE, 0xEE).filled(),
            };
            root.draw(&Rectangle::new([(x, y), (x + CELL, y + CELL)], style))
                .map_err(drawing)?;
        }

        let col_width = (width - 40) / legend_cols;
        for (i, slice) in slices.iter().enumerate() {
            let lx = 20 + col_width * (i as i32 % legend_cols);
            let ly = legend_top + 26 * (i as i32 / legend_cols);
            root.draw(&Rectangle::new([(lx, ly - 8), (lx + 16, ly + 8)], color_of(i).filled()))
                .map_err(drawing)?;
            let text = if slice.remainder {
                format!("{} {}%", slice.label, slice.percent)
            } else {
                format!("{} {}% ({})", slice.label, slice.percent, slice.count)
            };
            root.draw(&Text::new(
                text,
                (lx + 24, ly),
                text_style(12, &BLACK, HPos::Left, VPos::Center),
            ))
            .map_err(drawing)?;
        }

        root.present().map_err(drawing)?;
    }
    Ok(svg)
}
