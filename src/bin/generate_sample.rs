use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ndarray::{Array1, Array4};
use ndarray_npy::NpzWriter;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use oodlab::partition::dataset::{self, IMAGES, LABELS, LabeledImages, TRAIN_INDICES};
use oodlab::visualize::compare::BUNDLE_FILE_NAME;

/// Box-Muller transform for a normal sample
fn gauss<R: Rng>(rng: &mut R, mean: f64, std_dev: f64) -> f64 {
    let u1: f64 = rng.gen::<f64>().max(1e-15);
    let u2: f64 = rng.gen();
    let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    mean + std_dev * z
}

/// Smooth step from 0 (inside the ID range) to 1 (far into OOD).
fn ood_ramp(center: f64, boundary: f64, width: f64) -> f64 {
    1.0 / (1.0 + (-(center - boundary) / width).exp())
}

struct Profile {
    name: &'static str,
    /// How much the experiment degrades past the boundary (0 = not at all).
    degradation: f64,
    noise: f64,
}

const PROFILES: [Profile; 4] = [
    Profile { name: "baseline_id_only", degradation: 1.0, noise: 0.04 },
    Profile { name: "simple_mix_5", degradation: 0.6, noise: 0.05 },
    Profile { name: "simple_mix_10", degradation: 0.4, noise: 0.05 },
    Profile { name: "oracle", degradation: 0.05, noise: 0.03 },
];

fn write_bundle(dir: &Path, profile: &Profile, rng: &mut ChaCha8Rng) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

    let centers: Vec<f64> = (0..90).map(|i| i as f64).collect();
    let mut fids = Vec::with_capacity(centers.len());
    let mut scores = Vec::with_capacity(centers.len());
    let mut entropies = Vec::with_capacity(centers.len());
    let mut nreal = Vec::with_capacity(centers.len());

    for &c in &centers {
        let r = ood_ramp(c, 45.0, 4.0) * profile.degradation;
        fids.push((0.35 + 1.4 * r) * (1.0 + gauss(rng, 0.0, profile.noise)));
        scores.push((2.0 + 9.0 * r) * (1.0 + gauss(rng, 0.0, profile.noise)));
        entropies.push(1.1 - 0.5 * r + gauss(rng, 0.0, profile.noise * 0.5));
        nreal.push(if c <= 45.0 { rng.gen_range(20..60) } else { 0i64 });
    }

    let path = dir.join(BUNDLE_FILE_NAME);
    let mut npz = NpzWriter::new(File::create(&path).with_context(|| format!("creating {}", path.display()))?);
    npz.add_array("centers", &Array1::from(centers))?;
    npz.add_array("fids", &Array1::from(fids))?;
    npz.add_array("labelscores", &Array1::from(scores))?;
    npz.add_array("entropies", &Array1::from(entropies))?;
    npz.add_array("nrealimgs", &Array1::from(nreal))?;
    npz.finish()?;
    Ok(path)
}

fn write_dataset(path: &Path, rng: &mut ChaCha8Rng) -> Result<usize> {
    const N: usize = 600;
    const TRAIN: usize = 500;
    const SIZE: usize = 16;

    let labels: Vec<f64> = (0..N).map(|_| rng.gen_range(1..=80) as f64).collect();
    // brightness follows the label so partitions are visibly different
    let images = Array4::from_shape_fn((N, 3, SIZE, SIZE), |(n, c, y, x)| {
        let base = labels[n] * 3.0 + (c * 20) as f64;
        (base + ((x + y) % 8) as f64 * 4.0).min(255.0) as u8
    });
    let data = LabeledImages::new(images.into_dyn(), Array1::from(labels))?;

    let file = dataset::create_output(path)?;
    dataset::write_pair(&file, IMAGES, LABELS, &data)?;
    let train: Array1<i64> = (0..TRAIN as i64).collect();
    dataset::write_indices(&file, TRAIN_INDICES, &train)?;
    Ok(N)
}

fn main() -> Result<()> {
    env_logger::init();

    let root = std::env::args().nth(1).map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
    let mut rng = ChaCha8Rng::seed_from_u64(42);

    for profile in &PROFILES {
        let dir = root.join("sample_eval").join(profile.name).join("eval_0");
        let path = write_bundle(&dir, profile, &mut rng)?;
        println!("Wrote {}", path.display());
    }

    let h5 = root.join("sample_data.h5");
    let n = write_dataset(&h5, &mut rng)?;
    println!("Wrote {n} labelled 3x16x16 images to {}", h5.display());
    Ok(())
}
