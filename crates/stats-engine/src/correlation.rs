use statrs::statistics::Statistics;

/// Pairwise Pearson correlation between two equally indexed series.
/// Returns None when lengths differ, fewer than 3 points overlap, or
/// either series is flat.
pub fn pearson(a: &[f64], b: &[f64]) -> Option<f64> {
    if a.len() != b.len() || a.len() < 3 {
        return None;
    }

    let mean_a = a.mean();
    let mean_b = b.mean();

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for i in 0..a.len() {
        let da = a[i] - mean_a;
        let db = b[i] - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }

    if var_a == 0.0 || var_b == 0.0 {
        return None;
    }

    Some(cov / (var_a.sqrt() * var_b.sqrt()))
}

/// Upper-triangle correlation matrix used by the daily validation pass.
/// Input is (indicator id, aligned daily values); output is one entry per
/// indicator pair with a defined correlation.
pub fn correlation_pairs(series: &[(String, Vec<f64>)]) -> Vec<(String, String, f64)> {
    let mut pairs = Vec::new();
    for i in 0..series.len() {
        for j in (i + 1)..series.len() {
            if let Some(r) = pearson(&series[i].1, &series[j].1) {
                pairs.push((series[i].0.clone(), series[j].0.clone(), r));
            }
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfectly_correlated() {
        let a = [1.0, 2.0, 3.0, 4.0];
        let b = [2.0, 4.0, 6.0, 8.0];
        let r = pearson(&a, &b).unwrap();
        assert!((r - 1.0).abs() < 1e-9);
    }

    #[test]
    fn perfectly_anticorrelated() {
        let a = [1.0, 2.0, 3.0];
        let b = [3.0, 2.0, 1.0];
        let r = pearson(&a, &b).unwrap();
        assert!((r + 1.0).abs() < 1e-9);
    }

    #[test]
    fn flat_series_has_no_correlation() {
        let a = [1.0, 1.0, 1.0];
        let b = [1.0, 2.0, 3.0];
        assert!(pearson(&a, &b).is_none());
    }

    #[test]
    fn pairs_cover_upper_triangle() {
        let series = vec![
            ("a".to_string(), vec![1.0, 2.0, 3.0]),
            ("b".to_string(), vec![2.0, 4.0, 6.0]),
            ("c".to_string(), vec![3.0, 2.0, 1.0]),
        ];
        let pairs = correlation_pairs(&series);
        assert_eq!(pairs.len(), 3);
    }
}
