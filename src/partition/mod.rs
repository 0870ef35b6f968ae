//! ID/OOD dataset partitioning.
//!
//! ```text
//!  source.h5 ──► read_source ──► split(..) ──► id / ood / all   (split mode)
//!                      │
//!                      └──► indx_train ──► mix(..) ──► images/labels  (mixed mode)
//! ```
//!
//! Both modes draw from one `ChaCha8Rng` seeded once per run, visiting
//! distinct OOD labels in ascending order.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ndarray::Array1;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::data::filter::Interval;
use crate::data::stats;
use crate::inspect::format_shape;
use crate::render::histogram::DistributionFigure;
use crate::render::{fonts, save_figure};

pub mod dataset;
pub mod sampling;

use dataset::{IMAGES, LABELS, LabeledImages, TRAIN_INDICES};
use sampling::{distinct_labels, sample_per_label};

const RULE: usize = 80;

fn rule<W: Write>(out: &mut W) -> io::Result<()> {
    writeln!(out, "{}", "=".repeat(RULE))
}

// ---------------------------------------------------------------------------
// Split mode
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct SplitConfig {
    pub train: Interval,
    pub test: Interval,
    /// Per-label cap on the OOD part; `None` keeps everything.
    pub ood_samples_per_label: Option<usize>,
    pub seed: u64,
}

pub struct SplitOutcome {
    pub id: LabeledImages,
    pub ood: LabeledImages,
    /// OOD size before the quota was applied.
    pub ood_before_quota: usize,
}

/// Slice the ID and OOD parts out of `data`. Both intervals are applied to
/// the full set independently, so they may share samples.
pub fn split(data: &LabeledImages, cfg: &SplitConfig) -> SplitOutcome {
    let labels = data.labels();
    let id = data.select(&cfg.train.indices(labels));
    let mut ood = data.select(&cfg.test.indices(labels));
    let ood_before_quota = ood.len();

    if let Some(quota) = cfg.ood_samples_per_label {
        let mut rng = ChaCha8Rng::seed_from_u64(cfg.seed);
        let kept = sample_per_label(ood.labels(), quota, &mut rng);
        ood = ood.select(&kept);
    }

    SplitOutcome {
        id,
        ood,
        ood_before_quota,
    }
}

pub fn write_split(path: &Path, all: &LabeledImages, outcome: &SplitOutcome, cfg: &SplitConfig) -> Result<()> {
    let file = dataset::create_output(path)?;
    dataset::write_pair(&file, "id_images", "id_labels", &outcome.id)?;
    dataset::write_pair(&file, "ood_images", "ood_labels", &outcome.ood)?;
    dataset::write_pair(&file, "all_images", "all_labels", all)?;

    dataset::write_attr(&file, "train_min", cfg.train.min)?;
    dataset::write_attr(&file, "train_max", cfg.train.max)?;
    dataset::write_attr(&file, "test_min", cfg.test.min)?;
    dataset::write_attr(&file, "test_max", cfg.test.max)?;
    dataset::write_attr(&file, "id_samples", outcome.id.len() as i64)?;
    dataset::write_attr(&file, "ood_samples", outcome.ood.len() as i64)?;
    Ok(())
}

pub fn write_split_report<W: Write>(out: &mut W, cfg: &SplitConfig, outcome: &SplitOutcome) -> io::Result<()> {
    writeln!(out, "ID region {}: {} samples", cfg.train, outcome.id.len())?;
    writeln!(out, "OOD region {}: {} samples", cfg.test, outcome.ood_before_quota)?;
    if cfg.ood_samples_per_label.is_some() {
        writeln!(out, "  -> after per-label sampling: {} samples", outcome.ood.len())?;
    }
    writeln!(out, "\nLabel distribution:")?;
    writeln!(out, "  ID region - distinct labels: {}", distinct_labels(outcome.id.labels()).len())?;
    writeln!(out, "  OOD region - distinct labels: {}", distinct_labels(outcome.ood.labels()).len())
}

/// Figure path next to the split file: `x.h5` → `x_distribution.png`.
pub fn distribution_path(output: &Path) -> PathBuf {
    let s = output.to_string_lossy();
    if s.contains(".h5") {
        PathBuf::from(s.replace(".h5", "_distribution.png"))
    } else {
        PathBuf::from(format!("{s}_distribution.png"))
    }
}

/// Render ID/OOD label histograms from a written split file.
pub fn visualize_split(split_path: &Path, figure_path: &Path, label_name: &str, font: Option<&Path>) -> Result<()> {
    let file = hdf5::File::open(split_path).with_context(|| format!("opening {}", split_path.display()))?;
    let id_labels = file.dataset("id_labels")?.read_raw::<f64>()?;
    let ood_labels = file.dataset("ood_labels")?.read_raw::<f64>()?;
    let train = Interval::closed(
        dataset::read_attr::<f64>(&file, "train_min")?,
        dataset::read_attr::<f64>(&file, "train_max")?,
    );

    fonts::ensure_font(font)?;
    let figure = DistributionFigure {
        id_labels: &id_labels,
        ood_labels: &ood_labels,
        train,
        label_name,
        bins: 50,
    };
    save_figure(&figure, figure_path)?;
    println!("Saved distribution figure to: {}", figure_path.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// Mixed mode
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct MixedConfig {
    /// `[id_min, id_max]`
    pub id: Interval,
    /// `(ood_min, ood_max]`: a label equal to `ood_min` is never OOD.
    pub ood: Interval,
    /// Per-label cap on the OOD part, always applied.
    pub ood_samples_per_label: usize,
    pub seed: u64,
}

impl MixedConfig {
    pub fn new(id_min: f64, id_max: f64, ood_min: f64, ood_max: f64, ood_samples_per_label: usize, seed: u64) -> Self {
        Self {
            id: Interval::closed(id_min, id_max),
            ood: Interval::left_open(ood_min, ood_max),
            ood_samples_per_label,
            seed,
        }
    }
}

pub struct MixedOutcome {
    pub id_count: usize,
    pub ood_count: usize,
    /// ID samples first, then the sampled OOD samples.
    pub mixed: LabeledImages,
}

/// Build the combined training set from the training rows of `data`.
pub fn mix(data: &LabeledImages, train_indices: Option<&[usize]>, cfg: &MixedConfig) -> Result<MixedOutcome> {
    let train = match train_indices {
        Some(idx) => data.select(idx),
        None => data.clone(),
    };
    let labels = train.labels();

    let id = train.select(&cfg.id.indices(labels));
    let ood_all = train.select(&cfg.ood.indices(labels));

    let mut rng = ChaCha8Rng::seed_from_u64(cfg.seed);
    let kept = sample_per_label(ood_all.labels(), cfg.ood_samples_per_label, &mut rng);
    let ood = ood_all.select(&kept);

    Ok(MixedOutcome {
        id_count: id.len(),
        ood_count: ood.len(),
        mixed: id.concat(&ood)?,
    })
}

pub fn write_mixed(path: &Path, outcome: &MixedOutcome, cfg: &MixedConfig) -> Result<()> {
    let file = dataset::create_output(path)?;
    dataset::write_pair(&file, IMAGES, LABELS, &outcome.mixed)?;
    let all: Array1<i64> = (0..outcome.mixed.len() as i64).collect();
    dataset::write_indices(&file, TRAIN_INDICES, &all)?;

    dataset::write_attr(&file, "id_min", cfg.id.min)?;
    dataset::write_attr(&file, "id_max", cfg.id.max)?;
    dataset::write_attr(&file, "ood_min", cfg.ood.min)?;
    dataset::write_attr(&file, "ood_max", cfg.ood.max)?;
    dataset::write_attr(&file, "ood_samples_per_label", cfg.ood_samples_per_label as i64)?;
    dataset::write_attr(&file, "num_id_samples", outcome.id_count as i64)?;
    dataset::write_attr(&file, "num_ood_samples", outcome.ood_count as i64)?;
    dataset::write_attr(&file, "total_samples", outcome.mixed.len() as i64)?;
    Ok(())
}

pub fn write_mixed_report<W: Write>(out: &mut W, cfg: &MixedConfig, outcome: &MixedOutcome) -> io::Result<()> {
    writeln!(out, "ID region {}: {} samples (all)", cfg.id, outcome.id_count)?;
    writeln!(out, "OOD region {}: {} samples (sampled)", cfg.ood, outcome.ood_count)?;
    writeln!(out, "\nMixed training set: {} samples", outcome.mixed.len())?;
    writeln!(out, "  - ID: {}", outcome.id_count)?;
    writeln!(out, "  - OOD: {}", outcome.ood_count)
}

// ---------------------------------------------------------------------------
// Command entry-points
// ---------------------------------------------------------------------------

pub struct VisualizeOptions {
    pub label_name: String,
    pub font: Option<PathBuf>,
}

fn describe_source<W: Write>(out: &mut W, data: &LabeledImages) -> io::Result<()> {
    writeln!(
        out,
        "Loaded images {}, labels in [{:.1}, {:.1}]",
        format_shape(data.images.shape()),
        stats::min(data.labels()),
        stats::max(data.labels())
    )
}

/// Split mode. A missing source is reported and nothing is written.
pub fn run_split(data_path: &Path, output_path: &Path, cfg: &SplitConfig, visualize: Option<&VisualizeOptions>) -> Result<()> {
    if !data_path.exists() {
        log::error!("Dataset does not exist: {}", data_path.display());
        return Ok(());
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    rule(&mut out)?;
    writeln!(out, "Preparing ID/OOD split:")?;
    writeln!(out, "  ID (training) region: {}", cfg.train)?;
    writeln!(out, "  OOD (test) region: {}", cfg.test)?;
    if let Some(quota) = cfg.ood_samples_per_label {
        writeln!(out, "  OOD samples per label: {quota}")?;
    }
    rule(&mut out)?;

    let source = dataset::read_source(data_path)?;
    describe_source(&mut out, &source.data)?;

    let outcome = split(&source.data, cfg);
    write_split(output_path, &source.data, &outcome, cfg)?;
    writeln!(out, "\nSaved to: {}", output_path.display())?;
    write_split_report(&mut out, cfg, &outcome)?;
    rule(&mut out)?;
    drop(out);

    if let Some(v) = visualize {
        let figure_path = distribution_path(output_path);
        visualize_split(output_path, &figure_path, &v.label_name, v.font.as_deref())?;
    }
    Ok(())
}

/// Mixed mode. A missing source is reported and nothing is written.
pub fn run_mixed(data_path: &Path, output_path: &Path, cfg: &MixedConfig) -> Result<()> {
    if !data_path.exists() {
        log::error!("Dataset does not exist: {}", data_path.display());
        return Ok(());
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    rule(&mut out)?;
    writeln!(out, "Creating mixed training set:")?;
    writeln!(out, "  ID region (all samples): {}", cfg.id)?;
    writeln!(
        out,
        "  OOD region (sampled): {}, {} per label",
        cfg.ood, cfg.ood_samples_per_label
    )?;
    rule(&mut out)?;

    let source = dataset::read_source(data_path)?;
    describe_source(&mut out, &source.data)?;
    match &source.train_indices {
        Some(idx) => log::info!("Restricting to {} training indices", idx.len()),
        None => log::warn!("No {TRAIN_INDICES} in {}; using every sample", data_path.display()),
    }

    let outcome = mix(&source.data, source.train_indices.as_deref(), cfg)?;
    write_mixed_report(&mut out, cfg, &outcome)?;
    write_mixed(output_path, &outcome, cfg)?;
    writeln!(out, "\nSaved to: {}", output_path.display())?;
    rule(&mut out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array, IxDyn};

    fn data(labels: &[f64]) -> LabeledImages {
        let images = Array::from_shape_fn(IxDyn(&[labels.len(), 1, 2, 2]), |ix| ix[0] as u8);
        LabeledImages::new(images, Array1::from(labels.to_vec())).unwrap()
    }

    fn split_cfg(quota: Option<usize>) -> SplitConfig {
        SplitConfig {
            train: Interval::closed(1.0, 2.0),
            test: Interval::closed(2.0, 5.0),
            ood_samples_per_label: quota,
            seed: 2025,
        }
    }

    #[test]
    fn split_quota_keeps_one_per_label() {
        let d = data(&[1.0, 1.0, 2.0, 2.0, 2.0, 5.0, 5.0]);
        let outcome = split(&d, &split_cfg(Some(1)));

        assert_eq!(outcome.ood_before_quota, 5);
        assert_eq!(outcome.ood.len(), 2);
        let mut kept = outcome.ood.labels().to_vec();
        kept.sort_by(f64::total_cmp);
        assert_eq!(kept, vec![2.0, 5.0]);
    }

    #[test]
    fn split_quota_zero_empties_ood() {
        let d = data(&[1.0, 1.0, 2.0, 2.0, 2.0, 5.0, 5.0]);
        let outcome = split(&d, &split_cfg(Some(0)));

        assert_eq!(outcome.ood_before_quota, 5);
        assert!(outcome.ood.is_empty());
        assert_eq!(outcome.ood.images.shape()[0], 0);
        assert_eq!(outcome.id.len(), 5);

        // mixed mode reads the same value the same way
        let mixed = mix(&d, None, &MixedConfig::new(1.0, 1.0, 1.0, 5.0, 0, 2025)).unwrap();
        assert_eq!(mixed.ood_count, 0);
    }

    #[test]
    fn split_parts_stay_aligned() {
        let d = data(&[1.0, 1.0, 2.0, 2.0, 2.0, 5.0, 5.0]);
        let outcome = split(&d, &split_cfg(None));

        // [1, 2] overlaps [2, 5] on label 2
        assert_eq!(outcome.id.len(), 5);
        assert_eq!(outcome.id.images.shape()[0], outcome.id.labels.len());
        assert_eq!(outcome.ood.len(), 5);
        assert_eq!(outcome.ood.images.shape()[0], outcome.ood.labels.len());
        // image rows travel with their labels
        for (row, &label) in outcome.ood.labels().iter().enumerate() {
            let src = outcome.ood.images[[row, 0, 0, 0]] as usize;
            assert_eq!(d.labels()[src], label);
        }
    }

    #[test]
    fn split_is_reproducible_for_a_seed() {
        let labels: Vec<f64> = (0..300).map(|i| (i % 30) as f64 + 1.0).collect();
        let d = data(&labels);
        let cfg = SplitConfig {
            train: Interval::closed(1.0, 10.0),
            test: Interval::closed(10.0, 30.0),
            ood_samples_per_label: Some(3),
            seed: 7,
        };
        let a = split(&d, &cfg);
        let b = split(&d, &cfg);
        assert_eq!(a.ood, b.ood);
        assert_eq!(a.ood.len(), 21 * 3);
    }

    #[test]
    fn mixed_excludes_samples_at_ood_min() {
        // label 30 sits on ood_min: in ID, never in OOD
        let d = data(&[10.0, 30.0, 30.0, 31.0, 45.0, 60.0, 61.0]);
        let cfg = MixedConfig::new(1.0, 30.0, 30.0, 60.0, 5, 2025);
        let outcome = mix(&d, None, &cfg).unwrap();

        assert_eq!(outcome.id_count, 3);
        assert_eq!(outcome.ood_count, 3);
        let ood_part = &outcome.mixed.labels()[outcome.id_count..];
        assert!(!ood_part.contains(&30.0));
        assert_eq!(ood_part, &[31.0, 45.0, 60.0]);
        assert_eq!(&outcome.mixed.labels()[..outcome.id_count], &[10.0, 30.0, 30.0]);
    }

    #[test]
    fn mixed_uses_only_training_rows() {
        let d = data(&[5.0, 40.0, 40.0, 50.0]);
        let cfg = MixedConfig::new(1.0, 30.0, 30.0, 60.0, 1, 2025);
        let outcome = mix(&d, Some(&[1, 2, 3][..]), &cfg).unwrap();

        assert_eq!(outcome.id_count, 0);
        assert_eq!(outcome.ood_count, 2);
        assert_eq!(outcome.mixed.len(), 2);
    }

    #[test]
    fn split_file_has_datasets_and_attributes() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("out/split.h5");
        let d = data(&[1.0, 1.0, 2.0, 2.0, 2.0, 5.0, 5.0]);
        let cfg = split_cfg(Some(1));
        let outcome = split(&d, &cfg);
        write_split(&out, &d, &outcome, &cfg).unwrap();

        let f = hdf5::File::open(&out).unwrap();
        assert_eq!(f.dataset("all_labels").unwrap().shape(), vec![7]);
        assert_eq!(f.dataset("id_images").unwrap().shape(), vec![5, 1, 2, 2]);
        assert_eq!(dataset::read_attr::<i64>(&f, "ood_samples").unwrap(), 2);
        assert_eq!(dataset::read_attr::<f64>(&f, "test_max").unwrap(), 5.0);
    }

    #[test]
    fn mixed_file_has_synthesized_train_indices() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("mixed.h5");
        let d = data(&[10.0, 31.0, 31.0, 45.0]);
        let cfg = MixedConfig::new(1.0, 30.0, 30.0, 60.0, 1, 2025);
        let outcome = mix(&d, None, &cfg).unwrap();
        write_mixed(&out, &outcome, &cfg).unwrap();

        let src = dataset::read_source(&out).unwrap();
        assert_eq!(src.data.len(), 3);
        assert_eq!(src.train_indices, Some(vec![0, 1, 2]));
        let f = hdf5::File::open(&out).unwrap();
        assert_eq!(dataset::read_attr::<i64>(&f, "total_samples").unwrap(), 3);
        assert_eq!(dataset::read_attr::<i64>(&f, "num_ood_samples").unwrap(), 2);
    }

    #[test]
    fn distribution_path_replaces_extension() {
        assert_eq!(distribution_path(Path::new("a/split.h5")), PathBuf::from("a/split_distribution.png"));
        assert_eq!(distribution_path(Path::new("a/split")), PathBuf::from("a/split_distribution.png"));
    }

    #[test]
    fn missing_source_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("never.h5");
        run_split(Path::new("/nonexistent/src.h5"), &out, &split_cfg(Some(1)), None).unwrap();
        assert!(!out.exists());
    }
}
