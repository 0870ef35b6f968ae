use std::cell::RefCell;
use std::rc::Rc;

use anyhow::{Result, anyhow};
use eframe::egui;

use crate::data::model::{EvalMetrics, MetricsBundle};
use crate::state::AppState;
use crate::ui::{panels, plot};
use crate::visualize::RegionBounds;

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct RegionViewerApp {
    pub state: Rc<RefCell<AppState>>,
}

impl eframe::App for RegionViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let mut state = self.state.borrow_mut();

        // ---- Top panel: menu bar ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &mut state);
        });

        // ---- Left side panel: bounds + statistics ----
        egui::SidePanel::left("region_panel")
            .default_width(300.0)
            .resizable(true)
            .show(ctx, |ui| {
                panels::side_panel(ui, &mut state);
            });

        // ---- Central panel: metric plots ----
        egui::CentralPanel::default().show(ctx, |ui| {
            plot::region_plots(ui, &state);
        });
    }
}

/// Open the interactive viewer and block until it is closed. Returns the
/// record and bounds on screen at that point.
pub fn run_viewer(
    bundle: MetricsBundle,
    metrics: EvalMetrics,
    bounds: RegionBounds,
    title: String,
    label_name: String,
) -> Result<(EvalMetrics, RegionBounds)> {
    let fallback = (metrics.clone(), bounds);
    let mut state = AppState::new(bounds, title.clone(), label_name);
    state.set_metrics(bundle, metrics);
    let state = Rc::new(RefCell::new(state));

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1400.0, 900.0])
            .with_min_inner_size([700.0, 500.0]),
        ..Default::default()
    };

    let app_state = Rc::clone(&state);
    eframe::run_native(
        &format!("oodlab – {title}"),
        options,
        Box::new(move |_cc| Ok(Box::new(RegionViewerApp { state: app_state }))),
    )
    .map_err(|e| anyhow!("viewer failed: {e}"))?;

    let outcome = state.borrow().outcome();
    Ok(outcome.unwrap_or(fallback))
}
