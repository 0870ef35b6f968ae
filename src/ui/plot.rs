use eframe::egui::{Color32, Ui};
use egui_plot::{HLine, Legend, Line, LineStyle, MarkerShape, Plot, PlotPoints, Points, VLine};

use crate::color::{BOUNDARY_COLOR, ID_COLOR, OOD_COLOR, Rgb8};
use crate::data::filter::masked_points;
use crate::data::model::MetricKind;
use crate::state::AppState;

fn color32(c: Rgb8) -> Color32 {
    Color32::from_rgb(c.red, c.green, c.blue)
}

fn plot_points(pts: &[(f64, f64)]) -> PlotPoints {
    pts.iter().map(|&(x, y)| [x, y]).collect()
}

// ---------------------------------------------------------------------------
// Metric plots (central panel)
// ---------------------------------------------------------------------------

/// One stacked plot per metric present in the loaded record.
pub fn region_plots(ui: &mut Ui, state: &AppState) {
    let (Some(metrics), Some(masks)) = (&state.metrics, &state.masks) else {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("Open a metrics bundle to view it  (File → Open…)");
        });
        return;
    };

    let kinds: Vec<MetricKind> = MetricKind::ALL
        .into_iter()
        .filter(|&k| metrics.metric(k).is_some())
        .collect();
    let height = (ui.available_height() - 8.0 * kinds.len() as f32) / kinds.len().max(1) as f32;

    ui.heading(format!("{} - ID vs OOD Performance", state.title));

    for (i, &kind) in kinds.iter().enumerate() {
        let Some(values) = metrics.metric(kind) else {
            continue;
        };
        let id_pts = masked_points(&metrics.centers, values, &masks.id_mask);
        let ood_pts = masked_points(&metrics.centers, values, &masks.ood_mask);
        let stats = state.stats.iter().find(|s| s.kind == kind);

        let mut plot = Plot::new(("region_plot", kind.key()))
            .height(height.max(120.0))
            .legend(Legend::default())
            .y_axis_label(kind.axis_label())
            .allow_boxed_zoom(true)
            .allow_drag(true)
            .allow_scroll(true)
            .allow_zoom(true);
        if i + 1 == kinds.len() {
            plot = plot.x_axis_label(state.label_name.clone());
        }

        ui.label(kind.panel_title());
        plot.show(ui, |plot_ui| {
            plot_ui.vline(
                VLine::new(state.bounds.id_max)
                    .name("ID/OOD Boundary")
                    .color(color32(BOUNDARY_COLOR).gamma_multiply(0.7))
                    .style(LineStyle::Dashed { length: 8.0 }),
            );

            let regions = [
                (format!("ID Region {}", masks.id), &id_pts, ID_COLOR, MarkerShape::Circle),
                (format!("OOD Region {}", masks.ood), &ood_pts, OOD_COLOR, MarkerShape::Square),
            ];
            for (name, pts, color, marker) in regions {
                let c = color32(color);
                plot_ui.line(Line::new(plot_points(pts)).name(&name).color(c).width(2.0));
                plot_ui.points(Points::new(plot_points(pts)).name(&name).color(c).shape(marker).radius(3.0));
            }

            if state.show_means {
                if let Some(s) = stats {
                    let means = [
                        ("ID", s.id.map(|r| r.mean), ID_COLOR),
                        ("OOD", s.ood.map(|r| r.mean), OOD_COLOR),
                    ];
                    for (region, mean, color) in means {
                        if let Some(m) = mean {
                            plot_ui.hline(
                                HLine::new(m)
                                    .name(format!("Avg {} ({region}): {m:.4}", kind.abbreviation()))
                                    .color(color32(color).gamma_multiply(0.5))
                                    .style(LineStyle::dotted_dense()),
                            );
                        }
                    }
                }
            }
        });
        ui.add_space(8.0);
    }
}
