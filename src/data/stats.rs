//! Descriptive statistics over `f64` slices. Empty input yields NaN (the sum
//! of nothing is 0), and a NaN anywhere in the input makes every statistic NaN.

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
pub fn std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

pub fn min(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values
        .iter()
        .copied()
        .try_fold(f64::INFINITY, |acc, v| if v.is_nan() { None } else { Some(acc.min(v)) })
        .unwrap_or(f64::NAN)
}

pub fn max(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values
        .iter()
        .copied()
        .try_fold(f64::NEG_INFINITY, |acc, v| if v.is_nan() { None } else { Some(acc.max(v)) })
        .unwrap_or(f64::NAN)
}

pub fn sum(values: &[f64]) -> f64 {
    values.iter().sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn population_std() {
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(mean(&v), 5.0);
        assert_eq!(std(&v), 2.0);
        assert_eq!((min(&v), max(&v)), (2.0, 9.0));
    }

    #[test]
    fn empty_is_nan() {
        assert!(mean(&[]).is_nan());
        assert!(std(&[]).is_nan());
        assert_eq!(sum(&[]), 0.0);
    }

    #[test]
    fn nan_poisons_every_statistic() {
        let v = [1.0, f64::NAN, 3.0];
        assert!(mean(&v).is_nan());
        assert!(std(&v).is_nan());
        assert!(min(&v).is_nan());
        assert!(max(&v).is_nan());
        assert!(sum(&v).is_nan());

        // position does not matter
        assert!(min(&[f64::NAN, 1.0]).is_nan());
        assert!(max(&[1.0, f64::NAN]).is_nan());
    }
}
