use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use image::{GrayImage, RgbImage};
use ndarray::{ArrayD, Axis, Ix4};

/// Write every `C x H x W` image of `images` (`N x C x H x W`) to
/// `dir/train_<i>.png`, converted to `H x W x C`. Three channels are written
/// as RGB, one as grayscale.
pub fn export_images(images: &ArrayD<u8>, dir: &Path) -> Result<Vec<PathBuf>> {
    let images = images
        .view()
        .into_dimensionality::<Ix4>()
        .with_context(|| format!("expected N x C x H x W images, got shape {:?}", images.shape()))?;
    let (n, c, h, w) = images.dim();
    if c != 1 && c != 3 {
        bail!("cannot export images with {c} channels");
    }

    let mut paths = Vec::with_capacity(n);
    for (i, chw) in images.axis_iter(Axis(0)).enumerate() {
        let hwc: Vec<u8> = chw.permuted_axes([1, 2, 0]).iter().copied().collect();
        let path = dir.join(format!("train_{i}.png"));
        let saved = if c == 3 {
            RgbImage::from_raw(w as u32, h as u32, hwc).map(|img| img.save(&path))
        } else {
            GrayImage::from_raw(w as u32, h as u32, hwc).map(|img| img.save(&path))
        };
        match saved {
            Some(r) => r.with_context(|| format!("writing {}", path.display()))?,
            None => bail!("image {i} does not fill a {w}x{h} buffer"),
        }
        paths.push(path);
    }
    log::debug!("Exported {n} images to {}", dir.display());
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array, IxDyn};

    #[test]
    fn channel_first_is_written_channel_last() {
        let tmp = tempfile::tempdir().unwrap();
        // pixel value encodes (channel, row, col)
        let images = Array::from_shape_fn(IxDyn(&[2, 3, 2, 4]), |ix| (ix[1] * 100 + ix[2] * 10 + ix[3]) as u8);
        let paths = export_images(&images, tmp.path()).unwrap();

        assert_eq!(paths.len(), 2);
        assert!(paths[1].ends_with("train_1.png"));
        let img = image::open(&paths[0]).unwrap().to_rgb8();
        assert_eq!(img.dimensions(), (4, 2));
        assert_eq!(img.get_pixel(3, 1).0, [13, 113, 213]);
    }

    #[test]
    fn grayscale_images() {
        let tmp = tempfile::tempdir().unwrap();
        let images = ArrayD::<u8>::from_elem(IxDyn(&[1, 1, 3, 3]), 77);
        let paths = export_images(&images, tmp.path()).unwrap();
        let img = image::open(&paths[0]).unwrap().to_luma8();
        assert_eq!(img.get_pixel(2, 2).0, [77]);
    }

    #[test]
    fn unsupported_layout_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(export_images(&ArrayD::<u8>::zeros(IxDyn(&[1, 2, 2, 2])), tmp.path()).is_err());
        assert!(export_images(&ArrayD::<u8>::zeros(IxDyn(&[4, 4])), tmp.path()).is_err());
    }
}
