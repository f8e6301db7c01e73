//! Daily regime discovery: clusters z-score + volatility feature vectors
//! with seeded k-means and assigns {Calm, Normal, Stress} labels by
//! stress-ordering the centroids, so reruns over identical data produce
//! identical rows.

mod features;
mod kmeans;

pub use features::{build_frame, FeatureFrame, IndicatorSeries};
pub use kmeans::{euclidean, kmeans, KMeansFit};

use pxi_core::{DiscoveredRegime, PxiError, RegimeRow};

pub const DEFAULT_K: usize = 3;
pub const DEFAULT_SEED: u64 = 42;
pub const MAX_ITERATIONS: usize = 100;
pub const CONVERGENCE_TOLERANCE: f64 = 1e-9;

/// The clustering pass. `stress_proxies` name the two z columns whose
/// centroid sum orders the clusters from calm to stressed.
pub struct RegimeDetector {
    pub k: usize,
    pub seed: u64,
    pub stress_proxies: (String, String),
}

impl Default for RegimeDetector {
    fn default() -> Self {
        Self {
            k: DEFAULT_K,
            seed: DEFAULT_SEED,
            stress_proxies: ("z_vix".to_string(), "z_hy_oas".to_string()),
        }
    }
}

impl RegimeDetector {
    pub fn new(k: usize, seed: u64, stress_proxies: (String, String)) -> Self {
        Self { k, seed, stress_proxies }
    }

    /// Cluster the frame and emit one labeled row per date.
    pub fn detect(&self, frame: &FeatureFrame) -> Result<Vec<RegimeRow>, PxiError> {
        if frame.rows.len() < self.k {
            return Err(PxiError::InsufficientHistory(format!(
                "{} feature days, need at least {}",
                frame.rows.len(),
                self.k
            )));
        }

        let proxy_a = frame.column_index(&self.stress_proxies.0).ok_or_else(|| {
            PxiError::Config(format!("stress proxy column {} missing", self.stress_proxies.0))
        })?;
        let proxy_b = frame.column_index(&self.stress_proxies.1).ok_or_else(|| {
            PxiError::Config(format!("stress proxy column {} missing", self.stress_proxies.1))
        })?;

        let fit = kmeans(&frame.rows, self.k, self.seed, MAX_ITERATIONS, CONVERGENCE_TOLERANCE)
            .ok_or_else(|| {
                PxiError::InsufficientHistory("not enough rows for clustering".to_string())
            })?;

        // Ascending stress score -> Calm, Normal, Stress.
        let mut order: Vec<usize> = (0..self.k).collect();
        order.sort_by(|&a, &b| {
            let sa = fit.centroids[a][proxy_a] + fit.centroids[a][proxy_b];
            let sb = fit.centroids[b][proxy_a] + fit.centroids[b][proxy_b];
            sa.partial_cmp(&sb).unwrap_or(std::cmp::Ordering::Equal)
        });
        let mut labels = vec![DiscoveredRegime::Normal; self.k];
        let names = [DiscoveredRegime::Calm, DiscoveredRegime::Normal, DiscoveredRegime::Stress];
        for (rank, &cluster) in order.iter().enumerate() {
            labels[cluster] = names[rank.min(names.len() - 1)];
        }

        let rows = frame
            .dates
            .iter()
            .zip(&frame.rows)
            .zip(&fit.assignments)
            .map(|((date, row), &cluster)| {
                let distances: Vec<f64> = fit
                    .centroids
                    .iter()
                    .map(|c| euclidean(c, row))
                    .collect();
                RegimeRow {
                    date: *date,
                    regime: labels[cluster],
                    cluster_id: cluster as i64,
                    features: row.clone(),
                    centroid: fit.centroids[cluster].clone(),
                    probabilities: soft_membership(&distances),
                }
            })
            .collect();

        Ok(rows)
    }
}

/// Inverse-distance soft membership over the distance vector to every
/// centroid. A zero distance collapses to a one-hot vector.
fn soft_membership(distances: &[f64]) -> Vec<f64> {
    if let Some(hit) = distances.iter().position(|&d| d < 1e-12) {
        let mut probs = vec![0.0; distances.len()];
        probs[hit] = 1.0;
        return probs;
    }
    let inverse: Vec<f64> = distances.iter().map(|d| 1.0 / d).collect();
    let total: f64 = inverse.iter().sum();
    inverse.into_iter().map(|w| w / total).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn frame() -> FeatureFrame {
        // 30 days alternating between three well-separated stress levels.
        let mut dates = Vec::new();
        let mut rows = Vec::new();
        for i in 0..30u32 {
            dates.push(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap() + chrono::Duration::days(i as i64));
            let level = i % 3;
            let (z, vol) = match level {
                0 => (-1.5, 0.01),
                1 => (0.0, 0.02),
                _ => (2.5, 0.08),
            };
            rows.push(vec![z, vol, z * 0.8, vol * 1.5]);
        }
        FeatureFrame {
            dates,
            columns: vec![
                "z_vix".to_string(),
                "vol_vix".to_string(),
                "z_hy_oas".to_string(),
                "vol_hy_oas".to_string(),
            ],
            rows,
        }
    }

    #[test]
    fn labels_follow_stress_ordering() {
        let detector = RegimeDetector::default();
        let rows = detector.detect(&frame()).unwrap();
        // Day 0 (z = -1.5 on both proxies) is the calmest cluster.
        assert_eq!(rows[0].regime, DiscoveredRegime::Calm);
        // Day 2 (z = 2.5) is the most stressed.
        assert_eq!(rows[2].regime, DiscoveredRegime::Stress);
        assert_eq!(rows[1].regime, DiscoveredRegime::Normal);
    }

    #[test]
    fn reruns_are_byte_identical() {
        let detector = RegimeDetector::default();
        let frame = frame();
        let a = detector.detect(&frame).unwrap();
        let b = detector.detect(&frame).unwrap();
        let ja = serde_json::to_string(&a).unwrap();
        let jb = serde_json::to_string(&b).unwrap();
        assert_eq!(ja, jb);
    }

    #[test]
    fn probabilities_sum_to_one() {
        let detector = RegimeDetector::default();
        let rows = detector.detect(&frame()).unwrap();
        for row in rows {
            let sum: f64 = row.probabilities.iter().sum();
            assert!((sum - 1.0).abs() < 1e-9);
            assert_eq!(row.probabilities.len(), DEFAULT_K);
        }
    }

    #[test]
    fn too_few_days_is_insufficient() {
        let detector = RegimeDetector::default();
        let mut small = frame();
        small.dates.truncate(2);
        small.rows.truncate(2);
        assert!(matches!(
            detector.detect(&small),
            Err(PxiError::InsufficientHistory(_))
        ));
    }

    #[test]
    fn missing_proxy_column_is_config_error() {
        let detector = RegimeDetector::new(3, 42, ("z_nope".to_string(), "z_vix".to_string()));
        assert!(matches!(detector.detect(&frame()), Err(PxiError::Config(_))));
    }
}
