use std::path::Path;

use anyhow::{Context, Result, bail};
use hdf5::H5Type;
use ndarray::{Array1, ArrayD, Axis, concatenate};

pub const IMAGES: &str = "images";
pub const LABELS: &str = "labels";
pub const TRAIN_INDICES: &str = "indx_train";

/// Images (`N x C x H x W`, 8-bit) with one continuous label each.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledImages {
    pub images: ArrayD<u8>,
    pub labels: Array1<f64>,
}

impl LabeledImages {
    pub fn new(images: ArrayD<u8>, labels: Array1<f64>) -> Result<Self> {
        let n = images.shape().first().copied().unwrap_or(0);
        if n != labels.len() {
            bail!("{n} images but {} labels", labels.len());
        }
        Ok(Self { images, labels })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> &[f64] {
        self.labels.as_slice().unwrap_or(&[])
    }

    /// Rows at `indices`, in that order.
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            images: self.images.select(Axis(0), indices),
            labels: self.labels.select(Axis(0), indices),
        }
    }

    /// `self` followed by `other`.
    pub fn concat(&self, other: &Self) -> Result<Self> {
        let images = concatenate(Axis(0), &[self.images.view(), other.images.view()])
            .context("image shapes differ")?;
        let labels = concatenate(Axis(0), &[self.labels.view(), other.labels.view()])
            .context("label shapes differ")?;
        Ok(Self { images, labels })
    }
}

// ---------------------------------------------------------------------------
// HDF5 I/O
// ---------------------------------------------------------------------------

/// Source dataset as stored: the image set plus optional training indices.
pub struct SourceFile {
    pub data: LabeledImages,
    pub train_indices: Option<Vec<usize>>,
}

fn read_pair(file: &hdf5::File, images: &str, labels: &str) -> Result<LabeledImages> {
    let imgs = file
        .dataset(images)
        .with_context(|| format!("missing dataset '{images}'"))?
        .read_dyn::<u8>()
        .with_context(|| format!("reading '{images}'"))?;
    let lbls = file
        .dataset(labels)
        .with_context(|| format!("missing dataset '{labels}'"))?
        .read_1d::<f64>()
        .with_context(|| format!("reading '{labels}'"))?;
    LabeledImages::new(imgs, lbls)
}

/// Read `images`, `labels` and, when present, `indx_train`.
pub fn read_source(path: &Path) -> Result<SourceFile> {
    let file = hdf5::File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let data = read_pair(&file, IMAGES, LABELS)?;

    let train_indices = if file.link_exists(TRAIN_INDICES) {
        let raw = file
            .dataset(TRAIN_INDICES)?
            .read_1d::<i64>()
            .with_context(|| format!("reading '{TRAIN_INDICES}'"))?;
        let mut out = Vec::with_capacity(raw.len());
        for &i in &raw {
            if i < 0 || i as usize >= data.len() {
                bail!("{TRAIN_INDICES} entry {i} is out of range for {} samples", data.len());
            }
            out.push(i as usize);
        }
        Some(out)
    } else {
        None
    };

    Ok(SourceFile { data, train_indices })
}

/// Create `path` (and its parent directory), truncating any existing file.
pub fn create_output(path: &Path) -> Result<hdf5::File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    hdf5::File::create(path).with_context(|| format!("creating {}", path.display()))
}

pub fn write_pair(file: &hdf5::File, images: &str, labels: &str, data: &LabeledImages) -> Result<()> {
    file.new_dataset_builder()
        .with_data(&data.images)
        .create(images)
        .with_context(|| format!("writing '{images}'"))?;
    file.new_dataset_builder()
        .with_data(&data.labels)
        .create(labels)
        .with_context(|| format!("writing '{labels}'"))?;
    Ok(())
}

pub fn write_indices(file: &hdf5::File, name: &str, values: &Array1<i64>) -> Result<()> {
    file.new_dataset_builder()
        .with_data(values)
        .create(name)
        .with_context(|| format!("writing '{name}'"))?;
    Ok(())
}

/// Scalar attribute on the file root.
pub fn write_attr<T: H5Type>(file: &hdf5::File, name: &str, value: T) -> Result<()> {
    file.new_attr::<T>()
        .shape(())
        .create(name)
        .and_then(|a| a.write_scalar(&value))
        .with_context(|| format!("writing attribute '{name}'"))
}

pub fn read_attr<T: H5Type>(file: &hdf5::File, name: &str) -> Result<T> {
    file.attr(name)
        .and_then(|a| a.read_scalar::<T>())
        .with_context(|| format!("reading attribute '{name}'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array, IxDyn};

    fn fixture(labels: &[f64]) -> LabeledImages {
        let n = labels.len();
        let images = Array::from_shape_fn(IxDyn(&[n, 3, 2, 2]), |ix| ix[0] as u8);
        LabeledImages::new(images, Array1::from(labels.to_vec())).unwrap()
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let images = ArrayD::<u8>::zeros(IxDyn(&[2, 1, 2, 2]));
        assert!(LabeledImages::new(images, Array1::from(vec![1.0])).is_err());
    }

    #[test]
    fn select_and_concat_keep_rows_together() {
        let d = fixture(&[10.0, 20.0, 30.0]);
        let picked = d.select(&[2, 0]);
        assert_eq!(picked.labels.to_vec(), vec![30.0, 10.0]);
        assert_eq!(picked.images[[0, 0, 0, 0]], 2);

        let joined = picked.concat(&d.select(&[1])).unwrap();
        assert_eq!(joined.len(), 3);
        assert_eq!(joined.images.shape(), &[3, 3, 2, 2]);
        assert_eq!(joined.images[[2, 1, 1, 1]], 1);
    }

    #[test]
    fn hdf5_source_round_trip_with_indices() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested/src.h5");
        let d = fixture(&[1.0, 2.0, 3.0]);
        {
            let f = create_output(&path).unwrap();
            write_pair(&f, IMAGES, LABELS, &d).unwrap();
            write_indices(&f, TRAIN_INDICES, &Array1::from(vec![0i64, 2])).unwrap();
            write_attr(&f, "total_samples", 3i64).unwrap();
        }
        let src = read_source(&path).unwrap();
        assert_eq!(src.data, d);
        assert_eq!(src.train_indices, Some(vec![0, 2]));
        let f = hdf5::File::open(&path).unwrap();
        assert_eq!(read_attr::<i64>(&f, "total_samples").unwrap(), 3);
    }

    #[test]
    fn out_of_range_train_index_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("bad.h5");
        {
            let f = create_output(&path).unwrap();
            write_pair(&f, IMAGES, LABELS, &fixture(&[1.0])).unwrap();
            write_indices(&f, TRAIN_INDICES, &Array1::from(vec![5i64])).unwrap();
        }
        assert!(read_source(&path).is_err());
    }
}
