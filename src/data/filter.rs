use std::fmt;

use serde::Serialize;

// ---------------------------------------------------------------------------
// Interval predicate on label values
// ---------------------------------------------------------------------------

/// A label range. The upper bound is always inclusive; the lower bound is
/// inclusive unless built with [`Interval::left_open`].
///
/// No validation: `min > max` simply matches nothing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Interval {
    pub min: f64,
    pub max: f64,
    pub lower_inclusive: bool,
}

impl Interval {
    /// `[min, max]`
    pub fn closed(min: f64, max: f64) -> Self {
        Self {
            min,
            max,
            lower_inclusive: true,
        }
    }

    /// `(min, max]`
    pub fn left_open(min: f64, max: f64) -> Self {
        Self {
            min,
            max,
            lower_inclusive: false,
        }
    }

    pub fn contains(&self, v: f64) -> bool {
        let above = if self.lower_inclusive {
            v >= self.min
        } else {
            v > self.min
        };
        above && v <= self.max
    }

    /// Boolean mask over `values`.
    pub fn mask(&self, values: &[f64]) -> Vec<bool> {
        values.iter().map(|&v| self.contains(v)).collect()
    }

    /// Positions of `values` inside the interval, in order.
    pub fn indices(&self, values: &[f64]) -> Vec<usize> {
        values
            .iter()
            .enumerate()
            .filter(|(_, &v)| self.contains(v))
            .map(|(i, _)| i)
            .collect()
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let open = if self.lower_inclusive { '[' } else { '(' };
        write!(f, "{open}{:?}, {:?}]", self.min, self.max)
    }
}

// ---------------------------------------------------------------------------
// ID / OOD region masks over label centers
// ---------------------------------------------------------------------------

/// ID and OOD masks over one `centers` array. The two masks are computed
/// independently and may overlap.
#[derive(Debug, Clone)]
pub struct RegionMasks {
    pub id: Interval,
    pub ood: Interval,
    pub id_mask: Vec<bool>,
    pub ood_mask: Vec<bool>,
}

impl RegionMasks {
    pub fn new(centers: &[f64], id: Interval, ood: Interval) -> Self {
        Self {
            id,
            ood,
            id_mask: id.mask(centers),
            ood_mask: ood.mask(centers),
        }
    }

    pub fn any_id(&self) -> bool {
        self.id_mask.iter().any(|&m| m)
    }

    pub fn any_ood(&self) -> bool {
        self.ood_mask.iter().any(|&m| m)
    }
}

/// Values of `values` whose mask entry is set. Pairs position by position and
/// stops at the shorter of the two.
pub fn masked(values: &[f64], mask: &[bool]) -> Vec<f64> {
    values
        .iter()
        .zip(mask)
        .filter(|(_, &m)| m)
        .map(|(&v, _)| v)
        .collect()
}

/// `(center, value)` pairs selected by `mask`, skipping non-finite values.
pub fn masked_points(centers: &[f64], values: &[f64], mask: &[bool]) -> Vec<(f64, f64)> {
    centers
        .iter()
        .zip(values)
        .zip(mask)
        .filter(|&((_, v), &m)| m && v.is_finite())
        .map(|((&c, &v), _)| (c, v))
        .collect()
}

/// Mean / min / max of the masked values of one region.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RegionSummary {
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

/// Summarize the masked subset; `None` when the mask selects nothing.
pub fn summarize(values: &[f64], mask: &[bool]) -> Option<RegionSummary> {
    let selected = masked(values, mask);
    if selected.is_empty() {
        return None;
    }
    Some(RegionSummary {
        count: selected.len(),
        mean: super::stats::mean(&selected),
        min: super::stats::min(&selected),
        max: super::stats::max(&selected),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_boundary_lands_in_both_regions() {
        let centers = [0.0, 10.0, 20.0, 30.0, 40.0, 50.0];
        let fids = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let masks = RegionMasks::new(&centers, Interval::closed(0.0, 20.0), Interval::closed(20.0, 50.0));

        assert_eq!(masks.id.indices(&centers), vec![0, 1, 2]);
        assert_eq!(masks.ood.indices(&centers), vec![2, 3, 4, 5]);

        let id = summarize(&fids, &masks.id_mask).unwrap();
        let ood = summarize(&fids, &masks.ood_mask).unwrap();
        assert_eq!(id.mean, 2.0);
        assert_eq!(ood.mean, 4.5);
        assert_eq!((ood.min, ood.max), (3.0, 6.0));
    }

    #[test]
    fn left_open_interval_excludes_its_lower_bound() {
        let ood = Interval::left_open(30.0, 60.0);
        assert!(!ood.contains(30.0));
        assert!(ood.contains(30.5));
        assert!(ood.contains(60.0));
        assert_eq!(ood.to_string(), "(30.0, 60.0]");
    }

    #[test]
    fn inverted_bounds_select_nothing() {
        let centers = [1.0, 2.0, 3.0];
        let masks = RegionMasks::new(&centers, Interval::closed(3.0, 1.0), Interval::closed(2.0, 2.0));
        assert!(!masks.any_id());
        assert!(masks.any_ood());
        assert!(summarize(&centers, &masks.id_mask).is_none());
    }

    #[test]
    fn masked_pairs_only_common_prefix() {
        assert_eq!(masked(&[1.0, 2.0], &[true, true, true]), vec![1.0, 2.0]);
        assert_eq!(masked(&[1.0, 2.0, 3.0], &[false, true]), vec![2.0]);
    }

    #[test]
    fn masked_points_skip_unselected_and_nan() {
        let centers = [0.0, 10.0, 20.0, 30.0];
        let values = [0.5, f64::NAN, 0.7, 0.8];
        let pts = masked_points(&centers, &values, &[true, true, true, false]);
        assert_eq!(pts, vec![(0.0, 0.5), (20.0, 0.7)]);
    }
}
