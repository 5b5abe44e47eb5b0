/// Median of a sample, computed on a sorted copy.
pub fn median_i32(data: &[i32]) -> Option<f64> {
    if data.is_empty() {
        return None;
    }
    let mut sorted = data.to_vec();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) as f64 / 2.0)
    } else {
        Some(sorted[mid] as f64)
    }
}

/// Upper median absolute deviation: the median of `{x - med : x > med}`.
/// Returns 0 when no sample exceeds the median.
pub fn upper_mad(data: &[i32], med: f64) -> f64 {
    let above: Vec<i32> = data
        .iter()
        .filter(|&&x| (x as f64) > med)
        .map(|&x| (x as f64 - med).round() as i32)
        .collect();
    median_i32(&above).unwrap_or(0.0)
}

pub fn mean_stdev(data: &[i32]) -> (f64, f64) {
    if data.is_empty() {
        return (0.0, 0.0);
    }
    let n = data.len() as f64;
    let mean = data.iter().map(|&x| x as f64).sum::<f64>() / n;
    let var = data
        .iter()
        .map(|&x| {
            let d = x as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    (mean, var.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_odd() {
        assert_eq!(median_i32(&[3, 1, 2]), Some(2.0));
    }

    #[test]
    fn test_median_even() {
        assert_eq!(median_i32(&[4, 1, 3, 2]), Some(2.5));
    }

    #[test]
    fn test_median_empty() {
        assert_eq!(median_i32(&[]), None);
    }

    #[test]
    fn test_upper_mad() {
        // median 3, values above: 4, 5 -> deviations 1, 2 -> median 1.5
        assert_eq!(upper_mad(&[1, 2, 3, 4, 5], 3.0), 1.5);
    }

    #[test]
    fn test_upper_mad_no_values_above() {
        assert_eq!(upper_mad(&[3, 3, 3], 3.0), 0.0);
    }

    #[test]
    fn test_mean_stdev() {
        let (mean, stdev) = mean_stdev(&[2, 4, 4, 4, 5, 5, 7, 9]);
        assert_eq!(mean, 5.0);
        assert_eq!(stdev, 2.0);
    }
}
