//! Order statistics over finite values.

use std::cmp::Ordering;

fn sorted_finite(values: &[f64]) -> Vec<f64> {
    let mut v: Vec<f64> = values.iter().copied().filter(|x| x.is_finite()).collect();
    v.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    v
}

fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let q = q.clamp(0.0, 1.0);
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let t = pos - lo as f64;
    Some(sorted[lo] + t * (sorted[hi] - sorted[lo]))
}

/// Quantile with linear interpolation between order statistics.
///
/// Non-finite values are ignored; `None` when nothing finite remains.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    quantile_sorted(&sorted_finite(values), q)
}

pub fn median(values: &[f64]) -> Option<f64> {
    quantile(values, 0.5)
}

/// Interquartile range `q75 - q25`
pub fn iqr(values: &[f64]) -> Option<f64> {
    let sorted = sorted_finite(values);
    Some(quantile_sorted(&sorted, 0.75)? - quantile_sorted(&sorted, 0.25)?)
}

/// `(min, max)` of the finite values
pub fn finite_range(values: &[f64]) -> Option<(f64, f64)> {
    values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_median_odd_even() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), Some(2.5));
        assert_eq!(median(&[]), None);
        assert_eq!(median(&[f64::NAN, 5.0]), Some(5.0));
    }

    #[test]
    fn test_quantile_and_iqr() {
        let v: Vec<f64> = (1..=5).map(|i| i as f64).collect();
        assert_relative_eq!(quantile(&v, 0.25).unwrap(), 2.0);
        assert_relative_eq!(quantile(&v, 0.75).unwrap(), 4.0);
        assert_relative_eq!(iqr(&v).unwrap(), 2.0);
        assert_relative_eq!(quantile(&[10.0, 20.0], 0.5).unwrap(), 15.0);
    }

    #[test]
    fn test_finite_range() {
        assert_eq!(finite_range(&[2.0, f64::INFINITY, -1.0, f64::NAN]), Some((-1.0, 2.0)));
        assert_eq!(finite_range(&[f64::NAN]), None);
    }
}
