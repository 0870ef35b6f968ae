use palette::{Hsl, IntoColor, Lighten, Srgb};

/// 8-bit sRGB colour used across the renderers.
pub type Rgb8 = Srgb<u8>;

// ---------------------------------------------------------------------------
// Fixed colours
// ---------------------------------------------------------------------------

/// Matplotlib's tab10 palette, in its usual order.
pub const TAB10: [Rgb8; 10] = [
    Srgb::new(0x1f, 0x77, 0xb4),
    Srgb::new(0xff, 0x7f, 0x0e),
    Srgb::new(0x2c, 0xa0, 0x2c),
    Srgb::new(0xd6, 0x27, 0x28),
    Srgb::new(0x94, 0x67, 0xbd),
    Srgb::new(0x8c, 0x56, 0x4b),
    Srgb::new(0xe3, 0x77, 0xc2),
    Srgb::new(0x7f, 0x7f, 0x7f),
    Srgb::new(0xbc, 0xbd, 0x22),
    Srgb::new(0x17, 0xbe, 0xcf),
];

pub const ID_COLOR: Rgb8 = Srgb::new(0, 0, 255);
pub const OOD_COLOR: Rgb8 = Srgb::new(255, 0, 0);
pub const BOUNDARY_COLOR: Rgb8 = Srgb::new(128, 128, 128);
pub const HIGHLIGHT_COLOR: Rgb8 = Srgb::new(0xd6, 0x27, 0x28);

/// Colour of the `i`-th experiment; wraps around the palette.
pub fn tab10(i: usize) -> Rgb8 {
    TAB10[i % TAB10.len()]
}

/// Lighter tint of `color` (used for annotation boxes).
pub fn tint(color: Rgb8, amount: f32) -> Rgb8 {
    let hsl: Hsl = color.into_format::<f32>().into_color();
    let rgb: Srgb = hsl.lighten(amount).into_color();
    rgb.into_format()
}

// ---------------------------------------------------------------------------
// Per-experiment visual encoding
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinePattern {
    Solid,
    Dashed,
    DashDot,
    Dotted,
}

impl LinePattern {
    /// On/off run lengths in units of line width; empty means solid.
    pub fn dashes(&self) -> &'static [f64] {
        match self {
            LinePattern::Solid => &[],
            LinePattern::Dashed => &[3.7, 1.6],
            LinePattern::DashDot => &[6.4, 1.6, 1.0, 1.6],
            LinePattern::Dotted => &[1.0, 1.65],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerShape {
    Circle,
    Square,
    TriangleUp,
    TriangleDown,
    Diamond,
}

const LINE_CYCLE: [LinePattern; 5] = [
    LinePattern::Solid,
    LinePattern::Dashed,
    LinePattern::DashDot,
    LinePattern::Dotted,
    LinePattern::Solid,
];

const MARKER_CYCLE: [MarkerShape; 5] = [
    MarkerShape::Circle,
    MarkerShape::Square,
    MarkerShape::TriangleUp,
    MarkerShape::TriangleDown,
    MarkerShape::Diamond,
];

/// How one experiment's curves are drawn in comparison charts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExperimentStyle {
    pub color: Rgb8,
    pub alpha: f64,
    pub line_width: f64,
    pub marker_size: f64,
    pub pattern: LinePattern,
    pub marker: MarkerShape,
}

/// Style for the experiment at `index` named `name`.
///
/// Patterns, markers and colours cycle by index. A `baseline_id_only` run is
/// forced to a thick solid red line with large circles, an `oracle` run gets
/// a moderately thicker line; everything else is thin and semi-transparent.
pub fn experiment_style(index: usize, name: &str) -> ExperimentStyle {
    let lower = name.to_lowercase();
    let pattern = LINE_CYCLE[index % LINE_CYCLE.len()];
    let marker = MARKER_CYCLE[index % MARKER_CYCLE.len()];
    let color = tab10(index);

    if lower.contains("baseline_id_only") {
        ExperimentStyle {
            color: HIGHLIGHT_COLOR,
            alpha: 1.0,
            line_width: 2.5,
            marker_size: 6.0,
            pattern: LinePattern::Solid,
            marker: MarkerShape::Circle,
        }
    } else if lower.contains("oracle") {
        ExperimentStyle {
            color,
            alpha: 0.95,
            line_width: 2.0,
            marker_size: 4.0,
            pattern,
            marker,
        }
    } else {
        ExperimentStyle {
            color,
            alpha: 0.8,
            line_width: 1.0,
            marker_size: 2.5,
            pattern,
            marker,
        }
    }
}

/// Draw a marker on every `n`-th point so dense curves keep roughly
/// 10–25 visible markers.
pub fn marker_stride(len: usize) -> usize {
    let per = if len > 500 {
        25
    } else if len > 200 {
        20
    } else if len > 100 {
        15
    } else {
        10
    };
    (len / per).max(1)
}

/// Legend layout: two columns once there are more than six entries.
pub fn legend_columns(entries: usize) -> usize {
    if entries > 6 { 2 } else { 1 }
}
