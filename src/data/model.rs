use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

// ---------------------------------------------------------------------------
// ElementType – the on-disk dtype of a bundle array
// ---------------------------------------------------------------------------

/// Element type of an array as stored in the source file.
///
/// Values are always widened to `f64` once loaded; the original type is kept
/// so the inspector can report it the way NumPy names it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    Float64,
    Float32,
    Int64,
    Int32,
    Int16,
    Int8,
    UInt64,
    UInt32,
    UInt16,
    UInt8,
    Bool,
}

impl ElementType {
    /// NumPy-style dtype name.
    pub fn name(&self) -> &'static str {
        match self {
            ElementType::Float64 => "float64",
            ElementType::Float32 => "float32",
            ElementType::Int64 => "int64",
            ElementType::Int32 => "int32",
            ElementType::Int16 => "int16",
            ElementType::Int8 => "int8",
            ElementType::UInt64 => "uint64",
            ElementType::UInt32 => "uint32",
            ElementType::UInt16 => "uint16",
            ElementType::UInt8 => "uint8",
            ElementType::Bool => "bool",
        }
    }

    /// Whether values of this type are whole numbers.
    pub fn is_integral(&self) -> bool {
        !matches!(self, ElementType::Float64 | ElementType::Float32)
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// NamedArray – one entry of a metrics bundle
// ---------------------------------------------------------------------------

/// A named n-dimensional numeric array, stored flat in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedArray {
    pub name: String,
    pub dtype: ElementType,
    pub shape: Vec<usize>,
    pub values: Vec<f64>,
}

impl NamedArray {
    pub fn new(name: impl Into<String>, dtype: ElementType, shape: Vec<usize>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            dtype,
            shape,
            values,
        }
    }

    /// One-dimensional float64 array.
    pub fn vector(name: impl Into<String>, values: Vec<f64>) -> Self {
        let shape = vec![values.len()];
        Self::new(name, ElementType::Float64, shape, values)
    }

    /// Length along the first axis (a 0-d array counts as one element).
    pub fn len(&self) -> usize {
        self.shape.first().copied().unwrap_or(self.values.len())
    }

    /// Total number of elements.
    pub fn size(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// ---------------------------------------------------------------------------
// MetricsBundle – a loaded bundle file
// ---------------------------------------------------------------------------

pub const CENTERS_KEY: &str = "centers";
pub const FIDS_KEY: &str = "fids";
pub const LABELSCORES_KEY: &str = "labelscores";
pub const ENTROPIES_KEY: &str = "entropies";
pub const NREALIMGS_KEY: &str = "nrealimgs";

/// The per-label keys the tools understand, in reporting order.
pub const KNOWN_KEYS: [&str; 5] = [
    CENTERS_KEY,
    FIDS_KEY,
    LABELSCORES_KEY,
    ENTROPIES_KEY,
    NREALIMGS_KEY,
];

/// All arrays of one bundle file, keyed by name (sorted).
#[derive(Debug, Clone)]
pub struct MetricsBundle {
    pub source: PathBuf,
    arrays: BTreeMap<String, NamedArray>,
}

impl MetricsBundle {
    pub fn from_arrays(source: &Path, arrays: Vec<NamedArray>) -> Self {
        let arrays = arrays
            .into_iter()
            .map(|a| (a.name.clone(), a))
            .collect();
        Self {
            source: source.to_path_buf(),
            arrays,
        }
    }

    pub fn get(&self, key: &str) -> Option<&NamedArray> {
        self.arrays.get(key)
    }

    /// Arrays in sorted key order.
    pub fn arrays(&self) -> impl Iterator<Item = &NamedArray> {
        self.arrays.values()
    }

    pub fn len(&self) -> usize {
        self.arrays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arrays.is_empty()
    }

    /// `(key, len)` for every known per-label key present, in [`KNOWN_KEYS`] order.
    pub fn known_lengths(&self) -> Vec<(&'static str, usize)> {
        KNOWN_KEYS
            .iter()
            .filter_map(|&k| self.get(k).map(|a| (k, a.len())))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// MetricKind – the three plotted metrics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    Fid,
    LabelScore,
    Entropy,
}

impl MetricKind {
    pub const ALL: [MetricKind; 3] = [MetricKind::Fid, MetricKind::LabelScore, MetricKind::Entropy];

    /// Bundle key holding this metric.
    pub fn key(&self) -> &'static str {
        match self {
            MetricKind::Fid => FIDS_KEY,
            MetricKind::LabelScore => LABELSCORES_KEY,
            MetricKind::Entropy => ENTROPIES_KEY,
        }
    }

    /// Short tag used in annotations and load summaries.
    pub fn abbreviation(&self) -> &'static str {
        match self {
            MetricKind::Fid => "FID",
            MetricKind::LabelScore => "LS",
            MetricKind::Entropy => "Entropy",
        }
    }

    pub fn axis_label(&self) -> &'static str {
        match self {
            MetricKind::Fid => "FID",
            MetricKind::LabelScore => "Label Score",
            MetricKind::Entropy => "Entropy",
        }
    }

    pub fn panel_title(&self) -> &'static str {
        match self {
            MetricKind::Fid => "FID (Fréchet Inception Distance) - Lower is Better",
            MetricKind::LabelScore => "Label Score (Label Prediction Accuracy) - Higher is Better",
            MetricKind::Entropy => "Entropy (Diversity) - Moderate is Best",
        }
    }

    pub fn comparison_title(&self) -> &'static str {
        match self {
            MetricKind::Fid => "FID Comparison - Lower is Better",
            MetricKind::LabelScore => "Label Score Comparison - Higher is Better",
            MetricKind::Entropy => "Entropy Comparison - Moderate is Best",
        }
    }
}

// ---------------------------------------------------------------------------
// EvalMetrics – the per-center evaluation record
// ---------------------------------------------------------------------------

/// Per-center evaluation results. Every metric is independently optional.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalMetrics {
    pub centers: Vec<f64>,
    /// True when the bundle had no `centers` array and indices were used.
    pub centers_synthesized: bool,
    pub fid: Option<Vec<f64>>,
    pub label_score: Option<Vec<f64>>,
    pub entropy: Option<Vec<f64>>,
    pub nrealimgs: Option<Vec<f64>>,
}

impl EvalMetrics {
    /// Extract the record from a bundle.
    ///
    /// Missing `centers` are replaced by `0..n` where `n` is the length of
    /// the first metric present (fids, labelscores, entropies). Returns
    /// `None` when neither centers nor any metric exist.
    pub fn from_bundle(bundle: &MetricsBundle) -> Option<Self> {
        let take = |key: &str| bundle.get(key).map(|a| a.values.clone());

        let fid = take(FIDS_KEY);
        let label_score = take(LABELSCORES_KEY);
        let entropy = take(ENTROPIES_KEY);
        let nrealimgs = take(NREALIMGS_KEY);

        let (centers, centers_synthesized) = match take(CENTERS_KEY) {
            Some(c) => (c, false),
            None => {
                let n = [&fid, &label_score, &entropy]
                    .into_iter()
                    .find_map(|m| m.as_ref().map(Vec::len))?;
                ((0..n).map(|i| i as f64).collect(), true)
            }
        };

        Some(Self {
            centers,
            centers_synthesized,
            fid,
            label_score,
            entropy,
            nrealimgs,
        })
    }

    pub fn metric(&self, kind: MetricKind) -> Option<&[f64]> {
        match kind {
            MetricKind::Fid => self.fid.as_deref(),
            MetricKind::LabelScore => self.label_score.as_deref(),
            MetricKind::Entropy => self.entropy.as_deref(),
        }
    }

    pub fn has_any_metric(&self) -> bool {
        MetricKind::ALL.iter().any(|&k| self.metric(k).is_some())
    }

    /// `(key, len)` of each metric present, in fids/labelscores/entropies order.
    pub fn metric_lengths(&self) -> Vec<(&'static str, usize)> {
        MetricKind::ALL
            .iter()
            .filter_map(|&k| self.metric(k).map(|v| (k.key(), v.len())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle(arrays: Vec<NamedArray>) -> MetricsBundle {
        MetricsBundle::from_arrays(Path::new("mem.npz"), arrays)
    }

    #[test]
    fn centers_are_synthesized_from_first_metric() {
        let b = bundle(vec![
            NamedArray::vector("labelscores", vec![0.5, 0.4, 0.3]),
            NamedArray::vector("entropies", vec![1.0, 1.0]),
        ]);
        let m = EvalMetrics::from_bundle(&b).unwrap();
        assert!(m.centers_synthesized);
        assert_eq!(m.centers, vec![0.0, 1.0, 2.0]);
        assert!(m.fid.is_none());
    }

    #[test]
    fn bundle_without_centers_or_metrics_yields_nothing() {
        let b = bundle(vec![NamedArray::vector("nrealimgs", vec![3.0])]);
        assert!(EvalMetrics::from_bundle(&b).is_none());
    }

    #[test]
    fn known_lengths_follow_reporting_order() {
        let b = bundle(vec![
            NamedArray::vector("nrealimgs", vec![1.0, 2.0]),
            NamedArray::vector("centers", vec![0.0, 1.0, 2.0]),
            NamedArray::vector("extra", vec![9.0]),
        ]);
        assert_eq!(b.known_lengths(), vec![("centers", 3), ("nrealimgs", 2)]);
    }

    #[test]
    fn len_uses_first_axis() {
        let a = NamedArray::new("m", ElementType::Int32, vec![2, 3], vec![0.0; 6]);
        assert_eq!(a.len(), 2);
        assert_eq!(a.size(), 6);
        assert!(a.dtype.is_integral());
    }
}
