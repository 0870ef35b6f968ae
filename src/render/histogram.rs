use anyhow::Result;
use plotters::coord::Shift;
use plotters::prelude::*;

use super::{FONT_FAMILY, Figure, rgb};
use crate::color::{ID_COLOR, OOD_COLOR, Rgb8};
use crate::data::filter::Interval;

/// Equal-width bin counts over the finite values of `values`.
///
/// Bins span `[min, max]`; the last bin is closed so the maximum is counted.
/// A constant input is widened to `[v - 0.5, v + 0.5]`. Returns the bin edges
/// (`bins + 1`) and the counts.
pub fn histogram(values: &[f64], bins: usize) -> (Vec<f64>, Vec<usize>) {
    let bins = bins.max(1);
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    let (mut lo, mut hi) = finite
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if finite.is_empty() {
        (lo, hi) = (0.0, 1.0);
    } else if hi == lo {
        lo -= 0.5;
        hi += 0.5;
    }

    let width = (hi - lo) / bins as f64;
    let edges: Vec<f64> = (0..=bins).map(|i| lo + width * i as f64).collect();
    let mut counts = vec![0usize; bins];
    for v in finite {
        let i = (((v - lo) / width) as usize).min(bins - 1);
        counts[i] += 1;
    }
    (edges, counts)
}

/// Two stacked label histograms: the ID partition on top, OOD below.
pub struct DistributionFigure<'a> {
    pub id_labels: &'a [f64],
    pub ood_labels: &'a [f64],
    pub train: Interval,
    pub label_name: &'a str,
    pub bins: usize,
}

fn draw_histogram<DB>(
    area: &DrawingArea<DB, Shift>,
    values: &[f64],
    bins: usize,
    title: &str,
    x_desc: &str,
    color: Rgb8,
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let (edges, counts) = histogram(values, bins);
    let x_range = edges[0]..edges[edges.len() - 1];
    let y_max = counts.iter().copied().max().unwrap_or(0).max(1) as f64 * 1.05;

    let mut chart = ChartBuilder::on(area)
        .caption(title, (FONT_FAMILY, 24))
        .margin(14)
        .x_label_area_size(56)
        .y_label_area_size(80)
        .build_cartesian_2d(x_range, 0.0..y_max)?;

    chart
        .configure_mesh()
        .x_desc(x_desc)
        .y_desc("Number of Samples")
        .label_style((FONT_FAMILY, 16))
        .axis_desc_style((FONT_FAMILY, 20))
        .light_line_style(BLACK.mix(0.04))
        .bold_line_style(BLACK.mix(0.15))
        .draw()?;

    let fill = rgb(color).mix(0.7);
    chart.draw_series(edges.windows(2).zip(&counts).filter(|(_, c)| **c > 0).map(|(e, &c)| {
        Rectangle::new([(e[0], 0.0), (e[1], c as f64)], fill.filled())
    }))?;
    chart.draw_series(edges.windows(2).zip(&counts).filter(|(_, c)| **c > 0).map(|(e, &c)| {
        Rectangle::new([(e[0], 0.0), (e[1], c as f64)], BLACK.stroke_width(1))
    }))?;
    Ok(())
}

impl Figure for DistributionFigure<'_> {
    fn size(&self) -> (u32, u32) {
        (1500, 1200)
    }

    fn draw<DB>(&self, root: &DrawingArea<DB, Shift>) -> Result<()>
    where
        DB: DrawingBackend,
        DB::ErrorType: 'static,
    {
        let panels = root.split_evenly((2, 1));
        let id_title = format!("ID Region [{}, {}] - Training Data", self.train.min, self.train.max);
        draw_histogram(&panels[0], self.id_labels, self.bins, &id_title, self.label_name, ID_COLOR)?;
        draw_histogram(
            &panels[1],
            self.ood_labels,
            self.bins,
            "OOD Region - Test Data",
            self.label_name,
            OOD_COLOR,
        )
    }
}
