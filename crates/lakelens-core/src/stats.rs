//! Small numeric helpers shared by the analyzers. Percentiles use linear
//! interpolation between closest ranks, matching the platform's PERCENTILE
//! SQL aggregate closely enough for threshold classification.

/// Percentile of `values` with `p` in 0..=100. Returns 0.0 for an empty
/// slice; callers gate on sample counts before drawing conclusions.
pub fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let rank = (p / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let weight = rank - lo as f64;
        sorted[lo] * (1.0 - weight) + sorted[hi] * weight
    }
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentile_of_empty_is_zero() {
        assert_eq!(percentile(&[], 50.0), 0.0);
    }

    #[test]
    fn percentile_interpolates() {
        let values = [10.0, 20.0, 30.0, 40.0];
        assert_eq!(percentile(&values, 0.0), 10.0);
        assert_eq!(percentile(&values, 100.0), 40.0);
        assert!((percentile(&values, 50.0) - 25.0).abs() < 1e-9);
    }

    #[test]
    fn percentiles_are_monotone() {
        // P50 <= P90 <= P95 must hold for any sample set.
        let sets: Vec<Vec<f64>> = vec![
            vec![1.0],
            vec![5.0, 5.0, 5.0],
            vec![0.0, 100.0, 50.0, 25.0, 75.0],
            (0..97).map(|i| (i * 7 % 100) as f64).collect(),
        ];
        for values in sets {
            let p50 = percentile(&values, 50.0);
            let p90 = percentile(&values, 90.0);
            let p95 = percentile(&values, 95.0);
            assert!(p50 <= p90, "p50 {p50} > p90 {p90}");
            assert!(p90 <= p95, "p90 {p90} > p95 {p95}");
        }
    }

    #[test]
    fn mean_handles_empty() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(mean(&[2.0, 4.0]), 3.0);
    }
}
