use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::data::loader::load_file;
use crate::data::model::{
    CENTERS_KEY, ENTROPIES_KEY, ElementType, FIDS_KEY, LABELSCORES_KEY, MetricsBundle,
    NREALIMGS_KEY, NamedArray,
};
use crate::data::stats;

const RULE_WIDTH: usize = 80;

// ---------------------------------------------------------------------------
// Length consistency
// ---------------------------------------------------------------------------

/// Result of comparing the lengths of every known per-label array.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LengthCheck {
    /// One common length (`None` when no known key is present).
    Consistent { length: Option<usize> },
    /// Every present key with its length.
    Inconsistent { lengths: Vec<(String, usize)> },
}

pub fn check_lengths(bundle: &MetricsBundle) -> LengthCheck {
    let lengths = bundle.known_lengths();
    let first = lengths.first().map(|&(_, n)| n);
    if lengths.iter().all(|&(_, n)| Some(n) == first) {
        LengthCheck::Consistent { length: first }
    } else {
        LengthCheck::Inconsistent {
            lengths: lengths.into_iter().map(|(k, n)| (k.to_string(), n)).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Machine-readable summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ArraySummary {
    pub name: String,
    pub dtype: ElementType,
    pub shape: Vec<usize>,
    pub size: usize,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub std: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Inspection {
    pub source: String,
    pub arrays: Vec<ArraySummary>,
    pub lengths: LengthCheck,
}

pub fn summarize_bundle(bundle: &MetricsBundle) -> Inspection {
    let arrays = bundle
        .arrays()
        .map(|a| {
            let stat = |f: fn(&[f64]) -> f64| (!a.is_empty()).then(|| f(&a.values));
            ArraySummary {
                name: a.name.clone(),
                dtype: a.dtype,
                shape: a.shape.clone(),
                size: a.size(),
                min: stat(stats::min),
                max: stat(stats::max),
                mean: stat(stats::mean),
                std: stat(stats::std),
            }
        })
        .collect();

    Inspection {
        source: bundle.source.display().to_string(),
        arrays,
        lengths: check_lengths(bundle),
    }
}

// ---------------------------------------------------------------------------
// Text report
// ---------------------------------------------------------------------------

/// Tuple notation as NumPy prints shapes: `(6,)`, `(2, 3)`, `()`.
pub fn format_shape(shape: &[usize]) -> String {
    match shape {
        [] => "()".to_string(),
        [n] => format!("({n},)"),
        dims => {
            let parts: Vec<String> = dims.iter().map(|d| d.to_string()).collect();
            format!("({})", parts.join(", "))
        }
    }
}

fn format_values(values: &[f64], dtype: ElementType) -> String {
    let parts: Vec<String> = values
        .iter()
        .map(|v| {
            if dtype.is_integral() && v.is_finite() {
                format!("{}", *v as i64)
            } else {
                format!("{v:?}")
            }
        })
        .collect();
    format!("[{}]", parts.join(" "))
}

fn head(values: &[f64], n: usize) -> &[f64] {
    &values[..values.len().min(n)]
}

fn tail(values: &[f64], n: usize) -> &[f64] {
    &values[values.len().saturating_sub(n)..]
}

fn banner<W: Write>(out: &mut W, title: &str) -> io::Result<()> {
    writeln!(out, "\n{}", "=".repeat(RULE_WIDTH))?;
    writeln!(out, "{title}")?;
    writeln!(out, "{}", "=".repeat(RULE_WIDTH))
}

fn write_key_listing<W: Write>(out: &mut W, a: &NamedArray) -> io::Result<()> {
    writeln!(
        out,
        "  {:20}: shape={:20} dtype={}",
        a.name,
        format_shape(&a.shape),
        a.dtype
    )?;
    let pad = " ".repeat(21);
    if a.size() <= 10 {
        writeln!(out, "{pad}values={}", format_values(&a.values, a.dtype))?;
    } else if a.size() <= 50 {
        writeln!(out, "{pad}first 5={}", format_values(head(&a.values, 5), a.dtype))?;
    } else {
        writeln!(out, "{pad}first 5={}", format_values(head(&a.values, 5), a.dtype))?;
        writeln!(out, "{pad}last 5={}", format_values(tail(&a.values, 5), a.dtype))?;
        writeln!(
            out,
            "{pad}min={:.6}, max={:.6}, mean={:.6}",
            stats::min(&a.values),
            stats::max(&a.values),
            stats::mean(&a.values)
        )?;
    }
    Ok(())
}

fn write_metric_summary<W: Write>(out: &mut W, title: &str, mean_label: &str, values: &[f64]) -> io::Result<()> {
    writeln!(out, "\n{title}:")?;
    writeln!(out, "  count: {}", values.len())?;
    writeln!(out, "  {mean_label}: {:.6}", stats::mean(values))?;
    writeln!(out, "  std: {:.6}", stats::std(values))?;
    writeln!(out, "  min: {:.6}", stats::min(values))?;
    writeln!(out, "  max: {:.6}", stats::max(values))
}

/// Write the full human-readable inspection report.
pub fn write_report<W: Write>(bundle: &MetricsBundle, out: &mut W) -> io::Result<()> {
    banner(out, &format!("Inspecting: {}", bundle.source.display()))?;

    writeln!(out, "\nKeys:")?;
    writeln!(out, "{}", "-".repeat(RULE_WIDTH))?;
    for a in bundle.arrays() {
        write_key_listing(out, a)?;
    }

    banner(out, "Summary:")?;

    if let Some(centers) = bundle.get(CENTERS_KEY) {
        let v = &centers.values;
        writeln!(out, "\nCenters (label centers):")?;
        writeln!(out, "  count: {}", centers.len())?;
        writeln!(out, "  range: [{:.6}, {:.6}]", stats::min(v), stats::max(v))?;
        writeln!(out, "  first 5: {}", format_values(head(v, 5), centers.dtype))?;
        if centers.len() > 5 {
            writeln!(out, "  last 5: {}", format_values(tail(v, 5), centers.dtype))?;
        }
    }

    if let Some(fids) = bundle.get(FIDS_KEY) {
        write_metric_summary(out, "FIDs (Fréchet Inception Distance)", "mean (SFID)", &fids.values)?;
    }
    if let Some(ls) = bundle.get(LABELSCORES_KEY) {
        write_metric_summary(out, "Label Scores (label prediction accuracy)", "mean", &ls.values)?;
    }
    if let Some(ent) = bundle.get(ENTROPIES_KEY) {
        write_metric_summary(out, "Entropies (generation diversity)", "mean", &ent.values)?;
    }

    if let Some(nreal) = bundle.get(NREALIMGS_KEY) {
        let v = &nreal.values;
        writeln!(out, "\nNRealImgs (real images per center):")?;
        writeln!(out, "  count: {}", nreal.len())?;
        writeln!(out, "  total real images: {}", stats::sum(v) as i64)?;
        writeln!(out, "  mean per center: {:.2}", stats::mean(v))?;
        writeln!(out, "  min: {}", stats::min(v) as i64)?;
        writeln!(out, "  max: {}", stats::max(v) as i64)?;
    }

    banner(out, "Length consistency:")?;
    match check_lengths(bundle) {
        LengthCheck::Inconsistent { lengths } => {
            writeln!(out, "WARNING: array lengths differ!")?;
            for (key, n) in lengths {
                writeln!(out, "  {key}: {n}")?;
            }
        }
        LengthCheck::Consistent { length } => {
            writeln!(out, "OK: all arrays share one length")?;
            if let Some(n) = length {
                writeln!(out, "  common length: {n}")?;
            }
        }
    }

    writeln!(out, "\n{}\n", "=".repeat(RULE_WIDTH))
}

// ---------------------------------------------------------------------------
// Command entry-point
// ---------------------------------------------------------------------------

/// Inspect one bundle. A missing path is reported and nothing is printed.
pub fn run(path: &Path, json: bool) -> Result<()> {
    if !path.exists() {
        log::error!("File does not exist: {}", path.display());
        return Ok(());
    }

    let bundle = load_file(path).with_context(|| format!("loading {}", path.display()))?;
    log::info!("Loaded {} arrays from {}", bundle.len(), path.display());

    if let LengthCheck::Inconsistent { lengths } = check_lengths(&bundle) {
        log::warn!("Inconsistent array lengths in {}: {lengths:?}", path.display());
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if json {
        serde_json::to_writer_pretty(&mut out, &summarize_bundle(&bundle))
            .context("writing JSON summary")?;
        writeln!(out)?;
    } else {
        write_report(&bundle, &mut out)?;
    }
    Ok(())
}
