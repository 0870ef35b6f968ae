//! ID vs OOD charts for one experiment, or many experiments overlaid.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::data::filter::{Interval, RegionMasks, RegionSummary, summarize};
use crate::data::loader::load_file;
use crate::data::model::{EvalMetrics, MetricKind, MetricsBundle};
use crate::inspect::format_shape;
use crate::render::metrics::RegionFigure;
use crate::render::{fonts, save_figure};

pub mod compare;

/// The four user-supplied bounds. Both regions are closed intervals and may
/// share an endpoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionBounds {
    pub id_min: f64,
    pub id_max: f64,
    pub ood_min: f64,
    pub ood_max: f64,
}

impl Default for RegionBounds {
    fn default() -> Self {
        Self {
            id_min: 0.0,
            id_max: 45.0,
            ood_min: 45.0,
            ood_max: 90.0,
        }
    }
}

impl RegionBounds {
    pub fn id(&self) -> Interval {
        Interval::closed(self.id_min, self.id_max)
    }

    pub fn ood(&self) -> Interval {
        Interval::closed(self.ood_min, self.ood_max)
    }

    pub fn masks(&self, centers: &[f64]) -> RegionMasks {
        RegionMasks::new(centers, self.id(), self.ood())
    }
}

// ---------------------------------------------------------------------------
// Per-region statistics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct MetricRegions {
    pub kind: MetricKind,
    pub id: Option<RegionSummary>,
    pub ood: Option<RegionSummary>,
}

/// Summaries for every metric present. Each region is computed from its own
/// mask, so a center in both regions counts in both.
pub fn region_stats(metrics: &EvalMetrics, masks: &RegionMasks) -> Vec<MetricRegions> {
    MetricKind::ALL
        .iter()
        .filter_map(|&kind| {
            let values = metrics.metric(kind)?;
            Some(MetricRegions {
                kind,
                id: summarize(values, &masks.id_mask),
                ood: summarize(values, &masks.ood_mask),
            })
        })
        .collect()
}

fn write_region_line<W: Write>(out: &mut W, label: &str, s: Option<&RegionSummary>) -> io::Result<()> {
    match s {
        Some(s) => writeln!(out, "  {label}: mean={:.4}, min={:.4}, max={:.4}", s.mean, s.min, s.max),
        None => writeln!(out, "  {label}: no data"),
    }
}

pub fn write_region_stats<W: Write>(out: &mut W, stats: &[MetricRegions], masks: &RegionMasks) -> io::Result<()> {
    writeln!(out, "\n{}", "=".repeat(60))?;
    writeln!(out, "Statistics")?;
    writeln!(out, "{}", "=".repeat(60))?;
    for m in stats {
        writeln!(out, "\n{}:", m.kind.abbreviation())?;
        write_region_line(out, &format!("ID Region {}", masks.id), m.id.as_ref())?;
        write_region_line(out, &format!("OOD Region {}", masks.ood), m.ood.as_ref())?;
    }
    writeln!(out)
}

// ---------------------------------------------------------------------------
// Single-experiment command
// ---------------------------------------------------------------------------

pub struct SingleOptions {
    pub path: PathBuf,
    pub output: Option<PathBuf>,
    pub bounds: RegionBounds,
    pub label_name: String,
    pub experiment_name: Option<String>,
    pub font: Option<PathBuf>,
}

/// Default chart title: the bundle's grand-parent directory
/// (`runs/<exp>/eval_0/bundle.npz` → `<exp>`).
pub fn default_experiment_name(path: &Path) -> String {
    path.parent()
        .and_then(Path::parent)
        .and_then(Path::file_name)
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "experiment".to_string())
}

fn print_keys(bundle: &MetricsBundle) {
    println!("Loaded {}", bundle.source.display());
    for a in bundle.arrays() {
        println!("  {}: shape={}, dtype={}", a.name, format_shape(&a.shape), a.dtype);
    }
}

/// Pull the metrics record out of a bundle, logging anything odd about it.
/// `None` means there is nothing to plot.
pub fn prepare_metrics(bundle: &MetricsBundle) -> Option<EvalMetrics> {
    let metrics = match EvalMetrics::from_bundle(bundle) {
        Some(m) if m.has_any_metric() => m,
        _ => {
            log::error!("No fids, labelscores or entropies in {}", bundle.source.display());
            return None;
        }
    };

    if metrics.centers_synthesized {
        log::info!("No centers array; using indices 0..{}", metrics.centers.len());
    }
    for (key, n) in metrics.metric_lengths() {
        if n != metrics.centers.len() {
            log::warn!(
                "{key} has {n} entries but centers has {}; pairing the common prefix",
                metrics.centers.len()
            );
        }
    }
    Some(metrics)
}

/// Render one experiment's ID/OOD chart to a file, or open the interactive
/// viewer when no output path is set, then print the per-region table.
pub fn run_single(opts: SingleOptions) -> Result<()> {
    if !opts.path.exists() {
        log::error!("File does not exist: {}", opts.path.display());
        return Ok(());
    }

    let bundle = load_file(&opts.path).with_context(|| format!("loading {}", opts.path.display()))?;
    print_keys(&bundle);

    let Some(metrics) = prepare_metrics(&bundle) else {
        return Ok(());
    };
    let title = opts
        .experiment_name
        .clone()
        .unwrap_or_else(|| default_experiment_name(&opts.path));

    let (metrics, bounds) = match &opts.output {
        Some(output) => {
            let masks = opts.bounds.masks(&metrics.centers);
            warn_empty_regions(&masks);
            fonts::ensure_font(opts.font.as_deref())?;
            let figure = RegionFigure {
                title,
                metrics: &metrics,
                masks: &masks,
                label_name: &opts.label_name,
            };
            save_figure(&figure, output)?;
            log::info!("Chart saved to {}", output.display());
            (metrics, opts.bounds)
        }
        None => crate::app::run_viewer(bundle, metrics, opts.bounds, title, opts.label_name.clone())?,
    };

    let masks = bounds.masks(&metrics.centers);
    let stats = region_stats(&metrics, &masks);
    write_region_stats(&mut io::stdout().lock(), &stats, &masks)?;
    Ok(())
}

fn warn_empty_regions(masks: &RegionMasks) {
    if !masks.any_id() {
        log::warn!("No centers fall in the ID region {}", masks.id);
    }
    if !masks.any_ood() {
        log::warn!("No centers fall in the OOD region {}", masks.ood);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::NamedArray;

    fn scenario() -> EvalMetrics {
        EvalMetrics {
            centers: vec![0.0, 10.0, 20.0, 30.0, 40.0, 50.0],
            centers_synthesized: false,
            fid: Some(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]),
            label_score: None,
            entropy: None,
            nrealimgs: None,
        }
    }

    fn bounds() -> RegionBounds {
        RegionBounds {
            id_min: 0.0,
            id_max: 20.0,
            ood_min: 20.0,
            ood_max: 50.0,
        }
    }

    #[test]
    fn shared_boundary_counts_in_both_regions() {
        let m = scenario();
        let masks = bounds().masks(&m.centers);
        let stats = region_stats(&m, &masks);

        assert_eq!(stats.len(), 1);
        let fid = &stats[0];
        assert_eq!(fid.kind, MetricKind::Fid);
        let id = fid.id.unwrap();
        let ood = fid.ood.unwrap();
        assert_eq!((id.count, id.mean, id.min, id.max), (3, 2.0, 1.0, 3.0));
        assert_eq!((ood.count, ood.mean, ood.min, ood.max), (4, 4.5, 3.0, 6.0));
    }

    #[test]
    fn stats_table_lists_both_regions() {
        let m = scenario();
        let masks = bounds().masks(&m.centers);
        let mut buf = Vec::new();
        write_region_stats(&mut buf, &region_stats(&m, &masks), &masks).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("ID Region [0.0, 20.0]: mean=2.0000, min=1.0000, max=3.0000"));
        assert!(text.contains("OOD Region [20.0, 50.0]: mean=4.5000"));
    }

    #[test]
    fn empty_region_reports_no_data() {
        let m = scenario();
        let b = RegionBounds { ood_min: 100.0, ood_max: 200.0, ..bounds() };
        let masks = b.masks(&m.centers);
        let stats = region_stats(&m, &masks);
        assert!(stats[0].ood.is_none());
    }

    #[test]
    fn bundle_without_metrics_is_rejected() {
        let b = MetricsBundle::from_arrays(
            Path::new("x.npz"),
            vec![NamedArray::vector("centers", vec![0.0, 1.0])],
        );
        assert!(prepare_metrics(&b).is_none());
    }

    #[test]
    fn experiment_name_is_grandparent() {
        assert_eq!(
            default_experiment_name(Path::new("runs/oracle/eval_0/fid_ls_entropy_over_centers.npz")),
            "oracle"
        );
    }

    #[test]
    fn single_mode_writes_chart_file() {
        if fonts::ensure_font(None).is_err() {
            return;
        }
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("bundle.json");
        std::fs::write(&path, r#"{"centers":[0,10,20,30],"fids":[1.5,2.5,3.5,4.5]}"#).unwrap();
        let output = tmp.path().join("out/chart.png");
        run_single(SingleOptions {
            path,
            output: Some(output.clone()),
            bounds: bounds(),
            label_name: "Label".to_string(),
            experiment_name: None,
            font: None,
        })
        .unwrap();
        assert!(output.exists());
    }

    #[test]
    fn missing_bundle_is_soft() {
        let opts = SingleOptions {
            path: PathBuf::from("/nonexistent/bundle.npz"),
            output: Some(PathBuf::from("/nonexistent/out.png")),
            bounds: RegionBounds::default(),
            label_name: String::new(),
            experiment_name: None,
            font: None,
        };
        assert!(run_single(opts).is_ok());
    }
}
