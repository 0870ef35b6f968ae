use std::fmt;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use thiserror::Error;

/// Sharpness threshold used for every dataset.
pub const SHARPNESS_THRESHOLD: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DatasetName {
    #[value(name = "RC-49")]
    Rc49,
    #[value(name = "RC-49_imb")]
    Rc49Imb,
    #[value(name = "UTKFace")]
    UtkFace,
    #[value(name = "SteeringAngle")]
    SteeringAngle,
    #[value(name = "Cell200")]
    Cell200,
}

impl DatasetName {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetName::Rc49 => "RC-49",
            DatasetName::Rc49Imb => "RC-49_imb",
            DatasetName::UtkFace => "UTKFace",
            DatasetName::SteeringAngle => "SteeringAngle",
            DatasetName::Cell200 => "Cell200",
        }
    }
}

impl fmt::Display for DatasetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Label imbalance variant; only part of the model name for `RC-49_imb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ImbalanceType {
    Unimodal,
    Dualmodal,
    Trimodal,
    Standard,
    None,
}

impl ImbalanceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImbalanceType::Unimodal => "unimodal",
            ImbalanceType::Dualmodal => "dualmodal",
            ImbalanceType::Trimodal => "trimodal",
            ImbalanceType::Standard => "standard",
            ImbalanceType::None => "none",
        }
    }
}

/// Hyperparameters handed to the model fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NiqeParams {
    /// Square block edge in pixels.
    pub block_size: u32,
    pub sharpness_threshold: f64,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("no NIQE block size for {dataset} at {img_size}x{img_size}")]
pub struct NiqeParamsError {
    pub dataset: DatasetName,
    pub img_size: u32,
}

/// Look up the block size for a dataset and image resolution.
pub fn lookup(dataset: DatasetName, img_size: u32) -> Result<NiqeParams, NiqeParamsError> {
    use DatasetName::*;
    let block_size = match (dataset, img_size) {
        (Rc49 | Rc49Imb, 64) => 8,
        (Rc49 | Rc49Imb, 128) => 16,
        (Rc49 | Rc49Imb, 256) => 32,
        (UtkFace, 64) => 8,
        (UtkFace, 128) => 16,
        (UtkFace, 192) => 24,
        (SteeringAngle, 64) => 8,
        (SteeringAngle, 128) => 32,
        (Cell200, 64) => 8,
        _ => return Err(NiqeParamsError { dataset, img_size }),
    };
    Ok(NiqeParams {
        block_size,
        sharpness_threshold: SHARPNESS_THRESHOLD,
    })
}

/// `<root>/niqe_models/<name>/niqe_model_<name>[_<imb>]_<size>.mat`
pub fn model_path(root: &Path, dataset: DatasetName, imb: ImbalanceType, img_size: u32) -> PathBuf {
    let file = match dataset {
        DatasetName::Rc49Imb => format!("niqe_model_{dataset}_{}_{img_size}.mat", imb.as_str()),
        _ => format!("niqe_model_{dataset}_{img_size}.mat"),
    };
    root.join("niqe_models").join(dataset.as_str()).join(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_entries() {
        assert_eq!(lookup(DatasetName::Rc49Imb, 256).unwrap().block_size, 32);
        assert_eq!(lookup(DatasetName::UtkFace, 192).unwrap().block_size, 24);
        assert_eq!(lookup(DatasetName::SteeringAngle, 128).unwrap().block_size, 32);
        assert_eq!(lookup(DatasetName::Cell200, 64).unwrap().sharpness_threshold, 0.1);
    }

    #[test]
    fn unknown_resolution_is_an_error() {
        let err = lookup(DatasetName::Cell200, 128).unwrap_err();
        assert_eq!(err, NiqeParamsError { dataset: DatasetName::Cell200, img_size: 128 });
        assert_eq!(err.to_string(), "no NIQE block size for Cell200 at 128x128");
    }

    #[test]
    fn model_names() {
        let root = Path::new("/out");
        assert_eq!(
            model_path(root, DatasetName::Rc49, ImbalanceType::Unimodal, 64),
            PathBuf::from("/out/niqe_models/RC-49/niqe_model_RC-49_64.mat")
        );
        assert_eq!(
            model_path(root, DatasetName::Rc49Imb, ImbalanceType::Trimodal, 128),
            PathBuf::from("/out/niqe_models/RC-49_imb/niqe_model_RC-49_imb_trimodal_128.mat")
        );
    }
}
