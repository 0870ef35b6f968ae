use eframe::egui::{self, Color32, DragValue, RichText, Ui};
use egui_extras::{Column, TableBuilder};

use crate::data::filter::RegionSummary;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Left side panel – bounds and statistics
// ---------------------------------------------------------------------------

fn bound_row(ui: &mut Ui, label: &str, value: &mut f64) -> bool {
    ui.horizontal(|ui: &mut Ui| {
        ui.label(label);
        ui.add(DragValue::new(value).speed(0.5).max_decimals(3)).changed()
    })
    .inner
}

fn summary_cells(row: &mut egui_extras::TableRow<'_, '_>, s: Option<&RegionSummary>) {
    match s {
        Some(s) => {
            row.col(|ui| {
                ui.label(format!("{:.4}", s.mean));
            });
            row.col(|ui| {
                ui.label(format!("{:.4}", s.min));
            });
            row.col(|ui| {
                ui.label(format!("{:.4}", s.max));
            });
        }
        None => {
            for _ in 0..3 {
                row.col(|ui| {
                    ui.weak("–");
                });
            }
        }
    }
}

/// Render the left panel: region bounds and the per-region table.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Regions");
    ui.separator();

    let mut changed = false;
    ui.strong("ID");
    changed |= bound_row(ui, "min", &mut state.bounds.id_min);
    changed |= bound_row(ui, "max", &mut state.bounds.id_max);
    ui.strong("OOD");
    changed |= bound_row(ui, "min", &mut state.bounds.ood_min);
    changed |= bound_row(ui, "max", &mut state.bounds.ood_max);
    ui.checkbox(&mut state.show_means, "Region means");

    if changed {
        state.recompute();
    }

    ui.separator();
    ui.heading("Statistics");

    let Some(masks) = &state.masks else {
        ui.label("No dataset loaded.");
        return;
    };
    if !masks.any_id() {
        ui.label(RichText::new("No centers in the ID region").color(Color32::YELLOW));
    }
    if !masks.any_ood() {
        ui.label(RichText::new("No centers in the OOD region").color(Color32::YELLOW));
    }

    TableBuilder::new(ui)
        .striped(true)
        .column(Column::auto().at_least(70.0))
        .column(Column::auto().at_least(40.0))
        .columns(Column::auto().at_least(60.0), 3)
        .header(20.0, |mut header| {
            for title in ["Metric", "Region", "Mean", "Min", "Max"] {
                header.col(|ui| {
                    ui.strong(title);
                });
            }
        })
        .body(|mut body| {
            for m in &state.stats {
                for (region, summary) in [("ID", m.id.as_ref()), ("OOD", m.ood.as_ref())] {
                    body.row(18.0, |mut row| {
                        row.col(|ui| {
                            ui.label(m.kind.abbreviation());
                        });
                        row.col(|ui| {
                            ui.label(region);
                        });
                        summary_cells(&mut row, summary);
                    });
                }
            }
        });
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open…").clicked() {
                open_file_dialog(state);
                ui.close_menu();
            }
        });

        ui.separator();

        if let Some(m) = &state.metrics {
            ui.label(format!("{}: {} centers", state.title, m.centers.len()));
        }

        if let Some(source) = state.source_summary() {
            ui.separator();
            ui.label(RichText::new(source).weak());
        }

        if let Some(msg) = &state.status_message {
            ui.separator();
            ui.label(RichText::new(msg).color(Color32::RED));
        }
    });
}

// ---------------------------------------------------------------------------
// File dialog
// ---------------------------------------------------------------------------

pub fn open_file_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Open metrics bundle")
        .add_filter("Supported files", &["npz", "json", "csv", "parquet", "pq"])
        .add_filter("NumPy archive", &["npz"])
        .add_filter("Parquet", &["parquet", "pq"])
        .add_filter("JSON", &["json"])
        .add_filter("CSV", &["csv"])
        .pick_file();

    if let Some(path) = file {
        match crate::data::loader::load_file(&path) {
            Ok(bundle) => {
                log::info!("Loaded {} arrays from {}", bundle.len(), path.display());
                state.set_bundle(bundle);
            }
            Err(e) => {
                log::error!("Failed to load file: {e:#}");
                state.status_message = Some(format!("Error: {e:#}"));
            }
        }
    }
}
