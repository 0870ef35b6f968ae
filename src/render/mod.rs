//! File-backed chart rendering.
//!
//! Figures draw their axes through plotters charts and then place curves,
//! markers, reference lines and legends in pixel space on the root area, so
//! dash patterns and marker shapes match across the PNG and SVG backends.

use std::ops::Range;
use std::path::Path;

use anyhow::{Context, Result};
use plotters::coord::Shift;
use plotters::element::{DashedPathElement, DottedPathElement};
use plotters::prelude::*;

use crate::color::{LinePattern, MarkerShape, Rgb8};

pub mod fonts;
pub mod histogram;
pub mod metrics;

pub const FONT_FAMILY: &str = "sans-serif";

/// Pixels per matplotlib-style point for line widths and marker sizes.
const PIXEL_SCALE: f64 = 1.5;

// ---------------------------------------------------------------------------
// Figure trait + output
// ---------------------------------------------------------------------------

/// Something that can be drawn onto a full-size root area.
pub trait Figure {
    /// Pixel size of the output.
    fn size(&self) -> (u32, u32);

    fn draw<DB>(&self, root: &DrawingArea<DB, Shift>) -> Result<()>
    where
        DB: DrawingBackend,
        DB::ErrorType: 'static;
}

/// Render `figure` to `path`: `.svg` goes through the SVG backend, anything
/// else is written as a bitmap (PNG).
pub fn save_figure<F: Figure>(figure: &F, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }

    let is_svg = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("svg"));

    if is_svg {
        let root = SVGBackend::new(path, figure.size()).into_drawing_area();
        root.fill(&WHITE)?;
        figure.draw(&root)?;
        root.present()?;
    } else {
        let root = BitMapBackend::new(path, figure.size()).into_drawing_area();
        root.fill(&WHITE)?;
        figure.draw(&root)?;
        root.present()
            .with_context(|| format!("writing {}", path.display()))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Small conversions
// ---------------------------------------------------------------------------

pub fn rgb(c: Rgb8) -> RGBColor {
    RGBColor(c.red, c.green, c.blue)
}

/// Point size → whole pixels, never below one.
pub fn px(points: f64) -> u32 {
    ((points * PIXEL_SCALE).round() as u32).max(1)
}

fn round(p: (f64, f64)) -> (i32, i32) {
    (p.0.round() as i32, p.1.round() as i32)
}

/// Axis range covering every finite value with 5% padding on both sides.
pub fn padded_range(values: impl IntoIterator<Item = f64>) -> Range<f64> {
    let (lo, hi) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));

    if !lo.is_finite() {
        return 0.0..1.0;
    }
    if hi - lo < f64::EPSILON {
        let d = if lo.abs() > f64::EPSILON { lo.abs() * 0.05 } else { 0.5 };
        return (lo - d)..(hi + d);
    }
    let pad = (hi - lo) * 0.05;
    (lo - pad)..(hi + pad)
}

// ---------------------------------------------------------------------------
// Pixel-space primitives
// ---------------------------------------------------------------------------

/// Split a pixel polyline into the visible runs of a dash pattern.
/// Pattern lengths are multiplied by `width`. Only dash-dot strokes need
/// this; plain dashes and dots go through the plotters path elements.
pub fn dash_runs(points: &[(f64, f64)], pattern: LinePattern, width: f64) -> Vec<Vec<(f64, f64)>> {
    if points.len() < 2 {
        return Vec::new();
    }
    let lens: Vec<f64> = pattern.dashes().iter().map(|d| d * width.max(1.0)).collect();
    if lens.is_empty() {
        return vec![points.to_vec()];
    }

    let mut runs = Vec::new();
    let mut current = vec![points[0]];
    let mut idx = 0;
    let mut remaining = lens[0];

    for w in points.windows(2) {
        let (a, b) = (w[0], w[1]);
        let seg = ((b.0 - a.0).powi(2) + (b.1 - a.1).powi(2)).sqrt();
        let mut t = 0.0;
        while seg - t > 1e-9 {
            let step = remaining.min(seg - t);
            t += step;
            remaining -= step;
            let f = t / seg;
            let p = (a.0 + (b.0 - a.0) * f, a.1 + (b.1 - a.1) * f);
            if idx % 2 == 0 {
                current.push(p);
            }
            if remaining <= 1e-9 {
                if idx % 2 == 0 && current.len() >= 2 {
                    runs.push(std::mem::take(&mut current));
                }
                current.clear();
                idx = (idx + 1) % lens.len();
                remaining = lens[idx];
                if idx % 2 == 0 {
                    current.push(p);
                }
            }
        }
    }
    if idx % 2 == 0 && current.len() >= 2 {
        runs.push(current);
    }
    runs
}

/// Stroke a polyline given in pixel coordinates.
pub fn draw_polyline<DB>(
    root: &DrawingArea<DB, Shift>,
    points: &[(f64, f64)],
    pattern: LinePattern,
    color: RGBAColor,
    width: f64,
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    if points.len() < 2 {
        return Ok(());
    }
    let stroke = px(width);
    let style = color.stroke_width(stroke);
    // on/off lengths in whole pixels
    let lens: Vec<u32> = pattern
        .dashes()
        .iter()
        .map(|d| ((d * stroke as f64).round() as u32).max(1))
        .collect();
    let pts: Vec<(i32, i32)> = points.iter().copied().map(round).collect();

    match pattern {
        LinePattern::Solid => root.draw(&PathElement::new(pts, style))?,
        LinePattern::Dashed => root.draw(&DashedPathElement::new(pts, lens[0], lens[1], style))?,
        LinePattern::Dotted => {
            let radius = (stroke / 2).max(1);
            let spacing = (lens[0] + lens[1]).max(2 * radius + 2);
            let dot = move |c: (i32, i32)| Circle::new(c, radius, color.filled());
            root.draw(&DottedPathElement::new(pts, 0, spacing, dot))?
        }
        LinePattern::DashDot => {
            for run in dash_runs(points, pattern, stroke as f64) {
                let run: Vec<(i32, i32)> = run.into_iter().map(round).collect();
                root.draw(&PathElement::new(run, style))?;
            }
        }
    }
    Ok(())
}

/// Filled marker centred on a pixel position. `size` is the marker diameter
/// in points.
pub fn draw_marker<DB>(
    root: &DrawingArea<DB, Shift>,
    center: (f64, f64),
    shape: MarkerShape,
    size: f64,
    color: RGBAColor,
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let r = ((size * PIXEL_SCALE / 2.0).round() as i32).max(1);
    let (x, y) = round(center);
    let style = color.filled();
    match shape {
        MarkerShape::Circle => root.draw(&Circle::new((x, y), r as u32, style))?,
        MarkerShape::Square => root.draw(&Rectangle::new([(x - r, y - r), (x + r, y + r)], style))?,
        MarkerShape::TriangleUp => {
            root.draw(&Polygon::new(vec![(x, y - r), (x - r, y + r), (x + r, y + r)], style))?
        }
        MarkerShape::TriangleDown => {
            root.draw(&Polygon::new(vec![(x, y + r), (x - r, y - r), (x + r, y - r)], style))?
        }
        MarkerShape::Diamond => {
            root.draw(&Polygon::new(vec![(x, y - r), (x + r, y), (x, y + r), (x - r, y)], style))?
        }
    }
    Ok(())
}

pub fn text_style(size: u32) -> TextStyle<'static> {
    (FONT_FAMILY, size).into_font().color(&BLACK)
}

/// Text on a filled, padded box with its top-left corner at `at`.
pub fn draw_text_box<DB>(
    root: &DrawingArea<DB, Shift>,
    text: &str,
    at: (i32, i32),
    font_size: u32,
    fill: RGBAColor,
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let style = text_style(font_size);
    let (w, h) = root.estimate_text_size(text, &style)?;
    let pad = 6;
    let (x, y) = at;
    root.draw(&Rectangle::new(
        [(x - pad, y - pad), (x + w as i32 + pad, y + h as i32 + pad)],
        fill.filled(),
    ))?;
    root.draw(&Text::new(text.to_string(), at, style))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Legend
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LegendEntry {
    pub label: String,
    pub color: RGBAColor,
    pub width: f64,
    pub pattern: LinePattern,
    pub marker: Option<(MarkerShape, f64)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegendCorner {
    UpperLeft,
    UpperRight,
}

/// Draw a framed legend inside `plot` (pixel ranges of a plotting area).
pub fn draw_legend<DB>(
    root: &DrawingArea<DB, Shift>,
    plot: &(Range<i32>, Range<i32>),
    corner: LegendCorner,
    entries: &[LegendEntry],
    columns: usize,
    font_size: u32,
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    if entries.is_empty() {
        return Ok(());
    }
    let columns = columns.clamp(1, entries.len());
    let rows = entries.len().div_ceil(columns);
    let style = text_style(font_size);

    let sample = 44;
    let gap = 8;
    let row_h = font_size as i32 + 10;
    let mut text_w = 0;
    for e in entries {
        text_w = text_w.max(root.estimate_text_size(&e.label, &style)?.0 as i32);
    }
    let col_w = sample + gap + text_w + 2 * gap;
    let box_w = col_w * columns as i32 + gap;
    let box_h = row_h * rows as i32 + gap;

    let (xr, yr) = plot;
    let x0 = match corner {
        LegendCorner::UpperLeft => xr.start + 10,
        LegendCorner::UpperRight => xr.end - 10 - box_w,
    };
    let y0 = yr.start + 10;

    root.draw(&Rectangle::new([(x0, y0), (x0 + box_w, y0 + box_h)], WHITE.mix(0.95).filled()))?;
    root.draw(&Rectangle::new([(x0, y0), (x0 + box_w, y0 + box_h)], BLACK.mix(0.4).stroke_width(1)))?;

    for (i, e) in entries.iter().enumerate() {
        let col = (i / rows) as i32;
        let row = (i % rows) as i32;
        let cx = x0 + gap + col * col_w;
        let cy = y0 + gap + row * row_h + row_h / 2;

        let line = [(cx as f64, cy as f64), ((cx + sample) as f64, cy as f64)];
        draw_polyline(root, &line, e.pattern, e.color, e.width)?;
        if let Some((shape, size)) = e.marker {
            draw_marker(root, ((cx + sample / 2) as f64, cy as f64), shape, size, e.color)?;
        }
        root.draw(&Text::new(
            e.label.clone(),
            (cx + sample + gap, cy - font_size as i32 / 2),
            style.clone(),
        ))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_length(run: &[(f64, f64)]) -> f64 {
        run.windows(2)
            .map(|w| ((w[1].0 - w[0].0).powi(2) + (w[1].1 - w[0].1).powi(2)).sqrt())
            .sum()
    }

    #[test]
    fn solid_pattern_is_one_run() {
        let pts = [(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)];
        let runs = dash_runs(&pts, LinePattern::Solid, 2.0);
        assert_eq!(runs, vec![pts.to_vec()]);
    }

    #[test]
    fn dashes_follow_pattern_lengths() {
        let pts = [(0.0, 0.0), (100.0, 0.0)];
        let runs = dash_runs(&pts, LinePattern::Dashed, 1.0);
        // period 5.3: the 19th dash ends at 99.1
        assert_eq!(runs.len(), 19);
        for run in &runs {
            assert!((run_length(run) - 3.7).abs() < 1e-6);
        }
    }

    #[test]
    fn dashes_continue_across_vertices() {
        let pts = [(0.0, 0.0), (2.0, 0.0), (2.0, 2.0)];
        let runs = dash_runs(&pts, LinePattern::Dashed, 1.0);
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].len(), 3);
        assert!((run_length(&runs[0]) - 3.7).abs() < 1e-6);
    }

    #[test]
    fn dash_dot_alternates_long_and_short_runs() {
        let pts = [(0.0, 0.0), (20.0, 0.0)];
        let runs = dash_runs(&pts, LinePattern::DashDot, 1.0);
        let lengths: Vec<f64> = runs.iter().map(|r| run_length(r)).collect();
        assert_eq!(lengths.len(), 4);
        for (got, want) in lengths.iter().zip([6.4, 1.0, 6.4, 1.0]) {
            assert!((got - want).abs() < 1e-6, "{lengths:?}");
        }
        assert!((runs[1][0].0 - 8.0).abs() < 1e-6);
    }

    /// Row `y` of an RGB buffer as "is dark" flags.
    fn dark_row(buf: &[u8], width: usize, y: usize) -> Vec<bool> {
        buf[y * width * 3..(y + 1) * width * 3]
            .chunks(3)
            .map(|px| px.iter().all(|&c| c < 128))
            .collect()
    }

    fn stroke_row(pattern: LinePattern) -> Vec<bool> {
        const W: usize = 120;
        const H: usize = 20;
        let mut buf = vec![0u8; W * H * 3];
        {
            let root = BitMapBackend::with_buffer(&mut buf, (W as u32, H as u32)).into_drawing_area();
            root.fill(&WHITE).unwrap();
            draw_polyline(&root, &[(5.0, 10.0), (115.0, 10.0)], pattern, BLACK.to_rgba(), 0.5).unwrap();
            root.present().unwrap();
        }
        dark_row(&buf, W, 10)
    }

    #[test]
    fn solid_stroke_covers_the_whole_span() {
        let row = stroke_row(LinePattern::Solid);
        assert!(row[6..=114].iter().all(|&d| d));
        assert!(!row[0] && !row[119]);
    }

    #[test]
    fn dashed_and_dotted_strokes_leave_gaps() {
        for pattern in [LinePattern::Dashed, LinePattern::Dotted, LinePattern::DashDot] {
            let row = stroke_row(pattern);
            let inked = row[5..=115].iter().filter(|&&d| d).count();
            assert!(inked > 10, "{pattern:?} drew {inked} pixels");
            assert!(inked < 100, "{pattern:?} has no gaps");
        }
    }

    #[test]
    fn padded_range_handles_degenerate_input() {
        assert_eq!(padded_range(std::iter::empty()), 0.0..1.0);
        assert_eq!(padded_range([f64::NAN]), 0.0..1.0);
        let r = padded_range([0.0, 0.0]);
        assert_eq!(r, -0.5..0.5);
        let r = padded_range([0.0, 10.0]);
        assert_eq!(r, -0.5..10.5);
    }
}
