//! Reference NIQE model training.
//!
//! The training images are exported to a scoped temporary directory and an
//! external engine fits and saves the model. The export directory is removed
//! and the engine session closed on every exit path.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use ndarray::ArrayD;

use crate::data::filter::Interval;
use crate::partition::dataset::{self, LabeledImages};
use crate::partition::sampling::distinct_labels;

pub mod engine;
pub mod export;
pub mod matlab;
pub mod params;

use engine::{EngineError, EngineSession, FitRequest, QualityEngine};
use matlab::MatlabEngine;
use params::{DatasetName, ImbalanceType, NiqeParams};

pub struct TrainOptions {
    pub data_name: DatasetName,
    pub imb_type: ImbalanceType,
    pub root_path: PathBuf,
    pub data_path: PathBuf,
    pub min_label: f64,
    pub max_label: f64,
    pub img_size: u32,
    pub num_channels: usize,
    pub matlab_bin: PathBuf,
    pub scratch_dir: Option<PathBuf>,
    pub seed: u64,
}

/// Training rows of the dataset at `path`: restricted to `indx_train` when
/// present, then to labels in `labels`.
pub fn load_training_split(path: &Path, labels: Interval) -> Result<LabeledImages> {
    let source = dataset::read_source(path)?;
    let train = match &source.train_indices {
        Some(idx) => source.data.select(idx),
        None => source.data,
    };
    Ok(train.select(&labels.indices(train.labels())))
}

fn check_layout(images: &ArrayD<u8>, channels: usize, size: u32) -> Result<()> {
    let size = size as usize;
    match images.shape() {
        [_, c, h, w] if *c == channels && *h == size && *w == size => Ok(()),
        shape => bail!("expected N x {channels} x {size} x {size} images, got {shape:?}"),
    }
}

fn fit_and_save<S: EngineSession>(
    session: &mut S,
    images: &ArrayD<u8>,
    params: &NiqeParams,
    output: &Path,
    scratch: Option<&Path>,
) -> Result<()> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("niqe_export_");
    let export_dir = match scratch {
        Some(dir) => builder.tempdir_in(dir),
        None => builder.tempdir(),
    }
    .context("creating export directory")?;

    let paths = export::export_images(images, export_dir.path())?;
    log::info!("Exported {} images to {}", paths.len(), export_dir.path().display());

    session.build_collection(&paths).context("building image collection")?;
    session
        .fit(&FitRequest {
            block_size: params.block_size,
            sharpness_threshold: params.sharpness_threshold,
        })
        .context("fitting NIQE model")?;
    session
        .save_model(output)
        .with_context(|| format!("saving model to {}", output.display()))?;
    Ok(())
}

/// Fit a model on `images` and write it to `output`.
///
/// The session is closed even when a step fails; the first error wins.
pub fn train_model<E: QualityEngine>(
    engine: &E,
    images: &ArrayD<u8>,
    params: &NiqeParams,
    output: &Path,
    scratch: Option<&Path>,
) -> Result<()> {
    let mut session = engine.open().context("starting quality engine")?;
    let result = fit_and_save(&mut session, images, params, output, scratch);
    let closed: Result<(), EngineError> = session.close();
    result?;
    closed.context("closing quality engine")
}

/// `train-niqe` command.
pub fn run(opts: &TrainOptions) -> Result<()> {
    let params = params::lookup(opts.data_name, opts.img_size)?;

    if !opts.data_path.exists() {
        log::error!("Dataset does not exist: {}", opts.data_path.display());
        return Ok(());
    }
    log::info!("{} at {}x{}, seed {}", opts.data_name, opts.img_size, opts.img_size, opts.seed);

    let train = load_training_split(&opts.data_path, Interval::closed(opts.min_label, opts.max_label))?;
    check_layout(&train.images, opts.num_channels, opts.img_size)?;
    if train.is_empty() {
        bail!(
            "no training images with labels in [{}, {}]",
            opts.min_label,
            opts.max_label
        );
    }
    log::info!(
        "Training split: {} images, {} distinct labels",
        train.len(),
        distinct_labels(train.labels()).len()
    );

    let output = params::model_path(&opts.root_path, opts.data_name, opts.imb_type, opts.img_size);
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }

    log::info!(
        "Fitting NIQE: block size {0}x{0}, sharpness threshold {1}",
        params.block_size,
        params.sharpness_threshold
    );
    let engine = MatlabEngine::new(&opts.matlab_bin);
    train_model(&engine, &train.images, &params, &output, opts.scratch_dir.as_deref())?;
    println!("NIQE model saved to: {}", output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    use ndarray::{Array1, IxDyn};

    #[derive(Default)]
    struct Log {
        calls: Vec<String>,
        export_dir: Option<PathBuf>,
        files_seen: usize,
    }

    struct MockEngine {
        log: Rc<RefCell<Log>>,
        fail_fit: bool,
    }

    struct MockSession {
        log: Rc<RefCell<Log>>,
        fail_fit: bool,
    }

    impl QualityEngine for MockEngine {
        type Session = MockSession;

        fn open(&self) -> Result<MockSession, EngineError> {
            self.log.borrow_mut().calls.push("open".into());
            Ok(MockSession {
                log: Rc::clone(&self.log),
                fail_fit: self.fail_fit,
            })
        }
    }

    impl EngineSession for MockSession {
        fn build_collection(&mut self, paths: &[PathBuf]) -> Result<(), EngineError> {
            let mut log = self.log.borrow_mut();
            log.calls.push("collection".into());
            log.export_dir = paths.first().and_then(|p| p.parent()).map(Path::to_path_buf);
            log.files_seen = paths.iter().filter(|p| p.is_file()).count();
            Ok(())
        }

        fn fit(&mut self, request: &FitRequest) -> Result<(), EngineError> {
            self.log.borrow_mut().calls.push(format!("fit {}", request.block_size));
            if self.fail_fit {
                return Err(EngineError::Command {
                    command: "fitniqe".into(),
                    message: "out of memory".into(),
                });
            }
            Ok(())
        }

        fn save_model(&mut self, path: &Path) -> Result<(), EngineError> {
            self.log.borrow_mut().calls.push("save".into());
            std::fs::write(path, b"model")?;
            Ok(())
        }

        fn close(self) -> Result<(), EngineError> {
            self.log.borrow_mut().calls.push("close".into());
            Ok(())
        }
    }

    fn images(n: usize) -> ArrayD<u8> {
        ArrayD::from_elem(IxDyn(&[n, 3, 4, 4]), 128)
    }

    fn params() -> NiqeParams {
        params::lookup(DatasetName::Rc49, 64).unwrap()
    }

    #[test]
    fn successful_fit_writes_model_and_cleans_up() {
        let tmp = tempfile::tempdir().unwrap();
        let output = tmp.path().join("model.mat");
        let log = Rc::new(RefCell::new(Log::default()));
        let engine = MockEngine { log: Rc::clone(&log), fail_fit: false };

        train_model(&engine, &images(3), &params(), &output, Some(tmp.path())).unwrap();

        let log = log.borrow();
        assert_eq!(log.calls, vec!["open", "collection", "fit 8", "save", "close"]);
        assert_eq!(log.files_seen, 3);
        let export_dir = log.export_dir.as_ref().unwrap();
        assert!(export_dir.starts_with(tmp.path()));
        assert!(!export_dir.exists());
        assert!(output.exists());
    }

    #[test]
    fn failed_fit_still_closes_and_cleans_up() {
        let tmp = tempfile::tempdir().unwrap();
        let output = tmp.path().join("model.mat");
        let log = Rc::new(RefCell::new(Log::default()));
        let engine = MockEngine { log: Rc::clone(&log), fail_fit: true };

        let err = train_model(&engine, &images(2), &params(), &output, Some(tmp.path())).unwrap_err();
        assert!(format!("{err:#}").contains("out of memory"));

        let log = log.borrow();
        assert_eq!(log.calls, vec!["open", "collection", "fit 8", "close"]);
        assert!(!log.export_dir.as_ref().unwrap().exists());
        assert!(!output.exists());
    }

    #[test]
    fn training_split_honours_indices_and_label_range() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("src.h5");
        {
            let f = dataset::create_output(&path).unwrap();
            let data = LabeledImages::new(images(4), Array1::from(vec![0.0, 10.0, 50.0, 95.0])).unwrap();
            dataset::write_pair(&f, dataset::IMAGES, dataset::LABELS, &data).unwrap();
            dataset::write_indices(&f, dataset::TRAIN_INDICES, &Array1::from(vec![1i64, 2, 3])).unwrap();
        }
        let train = load_training_split(&path, Interval::closed(0.0, 90.0)).unwrap();
        assert_eq!(train.labels(), &[10.0, 50.0]);
    }

    #[test]
    fn layout_must_match_size_and_channels() {
        assert!(check_layout(&images(1), 3, 4).is_ok());
        assert!(check_layout(&images(1), 1, 4).is_err());
        assert!(check_layout(&images(1), 3, 64).is_err());
    }
}
