use std::ops::Range;

use anyhow::Result;
use plotters::coord::Shift;
use plotters::coord::types::RangedCoordf64;
use plotters::prelude::*;

use super::{
    FONT_FAMILY, Figure, LegendCorner, LegendEntry, draw_legend, draw_marker, draw_polyline,
    draw_text_box, padded_range, rgb,
};
use crate::color::{
    BOUNDARY_COLOR, ID_COLOR, LinePattern, MarkerShape, OOD_COLOR, experiment_style,
    legend_columns, marker_stride, tint,
};
use crate::data::filter::{RegionMasks, masked_points, summarize};
use crate::data::model::{EvalMetrics, MetricKind};
use crate::visualize::compare::Experiment;

type MetricChart<'a, DB> = ChartContext<'a, DB, Cartesian2d<RangedCoordf64, RangedCoordf64>>;

fn curve_points(centers: &[f64], values: &[f64]) -> Vec<(f64, f64)> {
    centers
        .iter()
        .zip(values)
        .filter(|(_, v)| v.is_finite())
        .map(|(&c, &v)| (c, v))
        .collect()
}

/// Build one metric panel with caption and mesh; returns the chart so the
/// caller can map data coordinates to pixels.
fn metric_chart<'a, DB>(
    panel: &'a DrawingArea<DB, Shift>,
    caption: &str,
    kind: MetricKind,
    x_desc: Option<&str>,
    x_range: Range<f64>,
    y_range: Range<f64>,
) -> Result<MetricChart<'a, DB>>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let mut chart = ChartBuilder::on(panel)
        .caption(caption, (FONT_FAMILY, 26))
        .margin(14)
        .x_label_area_size(if x_desc.is_some() { 64 } else { 40 })
        .y_label_area_size(96)
        .build_cartesian_2d(x_range, y_range)?;

    {
        let mut mesh = chart.configure_mesh();
        mesh.y_desc(kind.axis_label())
            .label_style((FONT_FAMILY, 18))
            .axis_desc_style((FONT_FAMILY, 22))
            .light_line_style(BLACK.mix(0.04))
            .bold_line_style(BLACK.mix(0.12));
        if let Some(desc) = x_desc {
            mesh.x_desc(desc);
        }
        mesh.draw()?;
    }
    Ok(chart)
}

fn to_px<DB: DrawingBackend>(chart: &MetricChart<'_, DB>, p: (f64, f64)) -> (f64, f64) {
    let (x, y) = chart.backend_coord(&p);
    (x as f64, y as f64)
}

/// Dashed vertical line across the plotting area at data `x`.
fn draw_boundary<DB>(root: &DrawingArea<DB, Shift>, chart: &MetricChart<'_, DB>, x: f64, alpha: f64) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let (_, yr) = chart.plotting_area().get_pixel_range();
    let bx = to_px(chart, (x, 0.0)).0;
    draw_polyline(
        root,
        &[(bx, yr.start as f64), (bx, yr.end as f64)],
        LinePattern::Dashed,
        rgb(BOUNDARY_COLOR).mix(alpha),
        1.5,
    )
}

fn boundary_entry(alpha: f64) -> LegendEntry {
    LegendEntry {
        label: "ID/OOD Boundary".to_string(),
        color: rgb(BOUNDARY_COLOR).mix(alpha),
        width: 1.5,
        pattern: LinePattern::Dashed,
        marker: None,
    }
}

// ---------------------------------------------------------------------------
// Single experiment: ID vs OOD per metric
// ---------------------------------------------------------------------------

pub struct RegionFigure<'a> {
    pub title: String,
    pub metrics: &'a EvalMetrics,
    pub masks: &'a RegionMasks,
    pub label_name: &'a str,
}

impl RegionFigure<'_> {
    fn draw_panel<DB>(
        &self,
        root: &DrawingArea<DB, Shift>,
        panel: &DrawingArea<DB, Shift>,
        kind: MetricKind,
        values: &[f64],
    ) -> Result<()>
    where
        DB: DrawingBackend,
        DB::ErrorType: 'static,
    {
        let centers = &self.metrics.centers;
        let masks = self.masks;
        let id_pts = masked_points(centers, values, &masks.id_mask);
        let ood_pts = masked_points(centers, values, &masks.ood_mask);
        let id_mean = summarize(values, &masks.id_mask).map(|s| s.mean);
        let ood_mean = summarize(values, &masks.ood_mask).map(|s| s.mean);

        let x_range = padded_range(centers.iter().copied().chain([masks.id.max]));
        let y_range = padded_range(
            id_pts
                .iter()
                .chain(&ood_pts)
                .map(|p| p.1)
                .chain(id_mean)
                .chain(ood_mean),
        );
        let x_desc = (kind == MetricKind::Entropy).then_some(self.label_name);
        let chart = metric_chart(panel, kind.panel_title(), kind, x_desc, x_range, y_range)?;
        let plot = chart.plotting_area().get_pixel_range();

        draw_boundary(root, &chart, masks.id.max, 0.7)?;

        for (mean, color) in [(id_mean, ID_COLOR), (ood_mean, OOD_COLOR)] {
            if let Some(m) = mean {
                let y = to_px(&chart, (0.0, m)).1;
                draw_polyline(
                    root,
                    &[(plot.0.start as f64, y), (plot.0.end as f64, y)],
                    LinePattern::Dotted,
                    rgb(color).mix(0.5),
                    1.0,
                )?;
            }
        }

        for (pts, color, marker) in [
            (&id_pts, ID_COLOR, MarkerShape::Circle),
            (&ood_pts, OOD_COLOR, MarkerShape::Square),
        ] {
            let pixels: Vec<(f64, f64)> = pts.iter().map(|&p| to_px(&chart, p)).collect();
            draw_polyline(root, &pixels, LinePattern::Solid, rgb(color).to_rgba(), 2.0)?;
            for &p in &pixels {
                draw_marker(root, p, marker, 4.0, rgb(color).to_rgba())?;
            }
        }

        let width = (plot.0.end - plot.0.start) as f64;
        let height = (plot.1.end - plot.1.start) as f64;
        let ax = plot.0.start + (width * 0.02) as i32;
        let annotations = [
            (id_mean, "ID", ID_COLOR, 0.05),
            (ood_mean, "OOD", OOD_COLOR, 0.15),
        ];
        for (mean, region, color, dy) in annotations {
            if let Some(m) = mean {
                let text = format!("Avg {} ({region}): {m:.4}", kind.abbreviation());
                let ay = plot.1.start + (height * dy) as i32;
                draw_text_box(root, &text, (ax, ay), 18, rgb(tint(color, 0.6)).mix(0.5))?;
            }
        }

        let entries = [
            LegendEntry {
                label: format!("ID Region {}", masks.id),
                color: rgb(ID_COLOR).to_rgba(),
                width: 2.0,
                pattern: LinePattern::Solid,
                marker: Some((MarkerShape::Circle, 4.0)),
            },
            LegendEntry {
                label: format!("OOD Region {}", masks.ood),
                color: rgb(OOD_COLOR).to_rgba(),
                width: 2.0,
                pattern: LinePattern::Solid,
                marker: Some((MarkerShape::Square, 4.0)),
            },
            boundary_entry(0.7),
        ];
        draw_legend(root, &plot, LegendCorner::UpperRight, &entries, 1, 18)
    }
}

impl Figure for RegionFigure<'_> {
    fn size(&self) -> (u32, u32) {
        (1800, 1500)
    }

    fn draw<DB>(&self, root: &DrawingArea<DB, Shift>) -> Result<()>
    where
        DB: DrawingBackend,
        DB::ErrorType: 'static,
    {
        let title = format!("{} - ID vs OOD Performance", self.title);
        let body = root.titled(&title, (FONT_FAMILY, 34).into_font().style(FontStyle::Bold))?;
        let panels = body.split_evenly((3, 1));

        for (panel, kind) in panels.iter().zip(MetricKind::ALL) {
            if let Some(values) = self.metrics.metric(kind) {
                self.draw_panel(root, panel, kind, values)?;
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Many experiments overlaid
// ---------------------------------------------------------------------------

pub struct ComparisonFigure<'a> {
    pub experiments: &'a [Experiment],
    pub id_max: f64,
    pub label_name: &'a str,
}

impl ComparisonFigure<'_> {
    fn draw_panel<DB>(
        &self,
        root: &DrawingArea<DB, Shift>,
        panel: &DrawingArea<DB, Shift>,
        kind: MetricKind,
        with_boundary_label: bool,
    ) -> Result<()>
    where
        DB: DrawingBackend,
        DB::ErrorType: 'static,
    {
        let curves: Vec<(usize, &Experiment, Vec<(f64, f64)>)> = self
            .experiments
            .iter()
            .enumerate()
            .filter_map(|(i, e)| {
                e.metrics
                    .metric(kind)
                    .map(|values| (i, e, curve_points(&e.metrics.centers, values)))
            })
            .collect();

        let x_range = padded_range(
            curves
                .iter()
                .flat_map(|(_, _, pts)| pts.iter().map(|p| p.0))
                .chain([self.id_max]),
        );
        let y_range = padded_range(curves.iter().flat_map(|(_, _, pts)| pts.iter().map(|p| p.1)));
        let x_desc = (kind == MetricKind::Entropy).then_some(self.label_name);
        let chart = metric_chart(panel, kind.comparison_title(), kind, x_desc, x_range, y_range)?;
        let plot = chart.plotting_area().get_pixel_range();

        draw_boundary(root, &chart, self.id_max, 0.6)?;

        let mut entries = Vec::with_capacity(curves.len() + 1);
        if with_boundary_label {
            entries.push(boundary_entry(0.6));
        }

        for (index, experiment, pts) in &curves {
            let style = experiment_style(*index, &experiment.name);
            let color = rgb(style.color).mix(style.alpha);
            let pixels: Vec<(f64, f64)> = pts.iter().map(|&p| to_px(&chart, p)).collect();

            draw_polyline(root, &pixels, style.pattern, color, style.line_width)?;
            let stride = marker_stride(experiment.metrics.centers.len());
            for &p in pixels.iter().step_by(stride) {
                draw_marker(root, p, style.marker, style.marker_size, color)?;
            }

            entries.push(LegendEntry {
                label: experiment.name.clone(),
                color,
                width: style.line_width,
                pattern: style.pattern,
                marker: Some((style.marker, style.marker_size)),
            });
        }

        let columns = legend_columns(self.experiments.len() + 1);
        draw_legend(root, &plot, LegendCorner::UpperLeft, &entries, columns, 15)
    }
}

impl Figure for ComparisonFigure<'_> {
    fn size(&self) -> (u32, u32) {
        (2400, 1800)
    }

    fn draw<DB>(&self, root: &DrawingArea<DB, Shift>) -> Result<()>
    where
        DB: DrawingBackend,
        DB::ErrorType: 'static,
    {
        let body = root.titled(
            "Comparison: ID vs OOD Performance Across Experiments",
            (FONT_FAMILY, 34).into_font().style(FontStyle::Bold),
        )?;
        let panels = body.split_evenly((3, 1));

        for (i, (panel, kind)) in panels.iter().zip(MetricKind::ALL).enumerate() {
            self.draw_panel(root, panel, kind, i == 0)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::filter::Interval;
    use crate::render::{fonts, save_figure};

    fn metrics() -> EvalMetrics {
        EvalMetrics {
            centers: vec![0.0, 10.0, 20.0, 30.0, 40.0, 50.0],
            centers_synthesized: false,
            fid: Some(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]),
            label_score: None,
            entropy: Some(vec![0.5, 0.6, f64::NAN, 0.7, 0.8, 0.9]),
            nrealimgs: None,
        }
    }

    #[test]
    fn curve_points_drop_nan() {
        let m = metrics();
        let pts = curve_points(&m.centers, m.entropy.as_deref().unwrap());
        assert_eq!(pts.len(), 5);
        assert!(!pts.iter().any(|p| p.0 == 20.0));
    }

    #[test]
    fn renders_region_and_comparison_figures() {
        if let Err(e) = fonts::ensure_font(None) {
            eprintln!("skipping chart rendering: {e}");
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let m = metrics();
        let masks = RegionMasks::new(&m.centers, Interval::closed(0.0, 20.0), Interval::closed(20.0, 50.0));

        let region = RegionFigure {
            title: "exp".to_string(),
            metrics: &m,
            masks: &masks,
            label_name: "Label",
        };
        let png = dir.path().join("region.png");
        save_figure(&region, &png).unwrap();
        assert!(std::fs::metadata(&png).unwrap().len() > 0);

        let experiments = vec![
            Experiment { name: "baseline_id_only".to_string(), metrics: m.clone() },
            Experiment { name: "oracle".to_string(), metrics: m.clone() },
        ];
        let comparison = ComparisonFigure {
            experiments: &experiments,
            id_max: 20.0,
            label_name: "Label",
        };
        let svg = dir.path().join("nested/compare.svg");
        save_figure(&comparison, &svg).unwrap();
        let text = std::fs::read_to_string(&svg).unwrap();
        assert!(text.contains("baseline_id_only"));
    }
}
