use crate::data::filter::RegionMasks;
use crate::data::model::{EvalMetrics, MetricsBundle};
use crate::visualize::{MetricRegions, RegionBounds, prepare_metrics, region_stats};

// ---------------------------------------------------------------------------
// Viewer state
// ---------------------------------------------------------------------------

/// The full UI state, independent of rendering.
pub struct AppState {
    /// Bundle currently shown.
    pub bundle: Option<MetricsBundle>,

    /// Metrics extracted from `bundle`.
    pub metrics: Option<EvalMetrics>,

    /// Editable region bounds.
    pub bounds: RegionBounds,

    /// Masks for `bounds` over the current centers (cached).
    pub masks: Option<RegionMasks>,

    /// Per-region table for the current masks (cached).
    pub stats: Vec<MetricRegions>,

    /// Chart title (experiment name).
    pub title: String,

    /// X axis description.
    pub label_name: String,

    /// Draw the dotted per-region mean lines.
    pub show_means: bool,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,
}

impl AppState {
    pub fn new(bounds: RegionBounds, title: String, label_name: String) -> Self {
        Self {
            bundle: None,
            metrics: None,
            bounds,
            masks: None,
            stats: Vec::new(),
            title,
            label_name,
            show_means: true,
            status_message: None,
        }
    }

    /// Show an already-validated record.
    pub fn set_metrics(&mut self, bundle: MetricsBundle, metrics: EvalMetrics) {
        self.bundle = Some(bundle);
        self.metrics = Some(metrics);
        self.status_message = None;
        self.recompute();
    }

    /// Ingest a newly loaded bundle. Bundles without any metric are refused
    /// and the current view is kept.
    pub fn set_bundle(&mut self, bundle: MetricsBundle) {
        match prepare_metrics(&bundle) {
            Some(metrics) => {
                if let Some(name) = bundle.source.file_stem() {
                    self.title = name.to_string_lossy().into_owned();
                }
                self.set_metrics(bundle, metrics);
            }
            None => {
                self.status_message = Some(format!(
                    "{} has no fids, labelscores or entropies",
                    bundle.source.display()
                ));
            }
        }
    }

    /// Recompute masks and statistics after a bounds change.
    pub fn recompute(&mut self) {
        if let Some(m) = &self.metrics {
            let masks = self.bounds.masks(&m.centers);
            self.stats = region_stats(m, &masks);
            self.masks = Some(masks);
        }
    }

    /// File name and array count of the loaded bundle, for the top bar.
    pub fn source_summary(&self) -> Option<String> {
        let bundle = self.bundle.as_ref()?;
        let name = bundle
            .source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| bundle.source.display().to_string());
        Some(format!("{name} ({} arrays)", bundle.len()))
    }

    /// Current record and bounds, for the summary printed after the window
    /// closes.
    pub fn outcome(&self) -> Option<(EvalMetrics, RegionBounds)> {
        self.metrics.clone().map(|m| (m, self.bounds))
    }
}
