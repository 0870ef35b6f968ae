use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::data::loader::load_file;
use crate::data::model::{EvalMetrics, MetricKind};
use crate::render::metrics::ComparisonFigure;
use crate::render::{fonts, save_figure};

/// Bundle file name inside each experiment's evaluation directory.
pub const BUNDLE_FILE_NAME: &str = "fid_ls_entropy_over_centers.npz";

/// Where the comparison chart goes when no output path is given.
pub const DEFAULT_COMPARISON_OUTPUT: &str = "experiments/RC64/eval_comparison.png";

/// One experiment's metrics, labelled for the legend.
#[derive(Debug, Clone)]
pub struct Experiment {
    pub name: String,
    pub metrics: EvalMetrics,
}

/// Legend label for an evaluation directory: the name of its parent
/// (`runs/oracle/eval_0` → `oracle`), falling back to the directory itself.
pub fn experiment_name(dir: &Path) -> String {
    dir.parent()
        .and_then(Path::file_name)
        .or_else(|| dir.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| dir.display().to_string())
}

fn len_or_zero(v: Option<&[f64]>) -> usize {
    v.map_or(0, <[f64]>::len)
}

/// Load one experiment directory. Missing or unusable bundles are logged and
/// yield `None`.
pub fn load_experiment(dir: &Path) -> Option<Experiment> {
    let path = dir.join(BUNDLE_FILE_NAME);
    if !path.exists() {
        log::warn!("File not found, skipping: {}", path.display());
        return None;
    }

    let bundle = match load_file(&path) {
        Ok(b) => b,
        Err(e) => {
            log::warn!("Could not read {}, skipping: {e:#}", path.display());
            return None;
        }
    };

    let metrics = match EvalMetrics::from_bundle(&bundle) {
        Some(m) if m.has_any_metric() => m,
        _ => {
            log::warn!("No fids, labelscores or entropies in {}, skipping", path.display());
            return None;
        }
    };

    let name = experiment_name(dir);

    let lengths = metrics.metric_lengths();
    if lengths.windows(2).any(|w| w[0].1 != w[1].1) {
        log::warn!("{name}: metric arrays differ in length: {lengths:?}");
    }
    if !metrics.centers_synthesized {
        for (key, n) in &lengths {
            if *n != metrics.centers.len() {
                log::warn!(
                    "{name}: centers length ({}) differs from {key} length ({n})",
                    metrics.centers.len()
                );
            }
        }
    }

    log::info!(
        "loaded: {name} - FID({}), LS({}), Entropy({}), Centers({})",
        len_or_zero(metrics.metric(MetricKind::Fid)),
        len_or_zero(metrics.metric(MetricKind::LabelScore)),
        len_or_zero(metrics.metric(MetricKind::Entropy)),
        metrics.centers.len()
    );

    Some(Experiment { name, metrics })
}

/// Load every usable experiment, preserving the given order.
pub fn load_experiments(dirs: &[PathBuf]) -> Vec<Experiment> {
    dirs.iter().filter_map(|d| load_experiment(d)).collect()
}

pub struct CompareOptions {
    pub dirs: Vec<PathBuf>,
    pub output: Option<PathBuf>,
    pub id_max: f64,
    pub label_name: String,
    pub font: Option<PathBuf>,
}

/// Overlay all experiments on one three-panel chart written to a file.
pub fn run(opts: &CompareOptions) -> Result<()> {
    let experiments = load_experiments(&opts.dirs);
    if experiments.is_empty() {
        log::error!("No usable experiment data found in {} directories", opts.dirs.len());
        return Ok(());
    }

    fonts::ensure_font(opts.font.as_deref())?;
    let output = opts
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_COMPARISON_OUTPUT));

    let figure = ComparisonFigure {
        experiments: &experiments,
        id_max: opts.id_max,
        label_name: &opts.label_name,
    };
    save_figure(&figure, &output)?;
    log::info!("Comparison of {} experiments saved to {}", experiments.len(), output.display());
    Ok(())
}
