use rand::Rng;
use rand::seq::index;

/// Distinct values of `labels` in ascending order (NaN excluded).
pub fn distinct_labels(labels: &[f64]) -> Vec<f64> {
    let mut out: Vec<f64> = labels.iter().copied().filter(|v| !v.is_nan()).collect();
    out.sort_by(f64::total_cmp);
    out.dedup();
    out
}

/// Cap every distinct label at `quota` samples.
///
/// Labels are visited in ascending order. A label with more than `quota`
/// samples gets `quota` positions drawn uniformly without replacement from
/// `rng`; smaller groups are kept whole in their original order. Returns
/// positions into `labels`, grouped label by label in draw order.
pub fn sample_per_label<R: Rng + ?Sized>(labels: &[f64], quota: usize, rng: &mut R) -> Vec<usize> {
    let mut kept = Vec::new();
    for label in distinct_labels(labels) {
        let positions: Vec<usize> = labels
            .iter()
            .enumerate()
            .filter(|&(_, &l)| l == label)
            .map(|(i, _)| i)
            .collect();

        if positions.len() > quota {
            kept.extend(index::sample(rng, positions.len(), quota).into_iter().map(|j| positions[j]));
        } else {
            kept.extend(positions);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::{BTreeMap, HashSet};

    fn counts(labels: &[f64], kept: &[usize]) -> BTreeMap<i64, usize> {
        let mut m = BTreeMap::new();
        for &i in kept {
            *m.entry(labels[i] as i64).or_insert(0) += 1;
        }
        m
    }

    #[test]
    fn one_per_label_out_of_five() {
        let ood = [2.0, 2.0, 2.0, 5.0, 5.0];
        let mut rng = ChaCha8Rng::seed_from_u64(2025);
        let kept = sample_per_label(&ood, 1, &mut rng);
        assert_eq!(kept.len(), 2);
        assert_eq!(counts(&ood, &kept), BTreeMap::from([(2, 1), (5, 1)]));
        // ascending label order
        assert!(ood[kept[0]] < ood[kept[1]]);
    }

    #[test]
    fn kept_count_is_min_of_count_and_quota() {
        let labels: Vec<f64> = (0..60).map(|i| (i % 7) as f64).chain([100.0]).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let kept = sample_per_label(&labels, 5, &mut rng);

        let before = counts(&labels, &(0..labels.len()).collect::<Vec<_>>());
        let after = counts(&labels, &kept);
        for (label, n) in before {
            assert_eq!(after[&label], n.min(5));
        }
        let unique: HashSet<_> = kept.iter().collect();
        assert_eq!(unique.len(), kept.len());
    }

    #[test]
    fn same_seed_same_selection() {
        let labels: Vec<f64> = (0..200).map(|i| (i % 10) as f64).collect();
        let a = sample_per_label(&labels, 3, &mut ChaCha8Rng::seed_from_u64(2025));
        let b = sample_per_label(&labels, 3, &mut ChaCha8Rng::seed_from_u64(2025));
        let c = sample_per_label(&labels, 3, &mut ChaCha8Rng::seed_from_u64(2026));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn small_groups_keep_original_order() {
        let labels = [3.0, 1.0, 3.0];
        let kept = sample_per_label(&labels, 5, &mut ChaCha8Rng::seed_from_u64(0));
        assert_eq!(kept, vec![1, 0, 2]);
    }

    #[test]
    fn labels_draw_from_one_stream_in_ascending_order() {
        // label 5 comes first in the data but 2 is drawn first
        let labels = [5.0, 5.0, 5.0, 2.0, 2.0, 2.0];
        let kept = sample_per_label(&labels, 2, &mut ChaCha8Rng::seed_from_u64(11));

        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let twos = [3, 4, 5];
        let fives = [0, 1, 2];
        let mut expected: Vec<usize> = index::sample(&mut rng, 3, 2).into_iter().map(|j| twos[j]).collect();
        expected.extend(index::sample(&mut rng, 3, 2).into_iter().map(|j| fives[j]));

        assert_eq!(kept, expected);
    }

    #[test]
    fn zero_quota_keeps_nothing() {
        let labels = [1.0, 2.0];
        assert!(sample_per_label(&labels, 0, &mut ChaCha8Rng::seed_from_u64(0)).is_empty());
    }
}
