//! Assembles the weighted composite (PXI) from per-indicator z-scores:
//! dynamic weighting, cap-and-redistribute normalization, threshold
//! regime classification, and alert emission. Pure computation; the
//! scheduler owns all persistence and per-tick continuity state.

mod alerts;
mod weights;

pub use alerts::{emit_alerts, AlertContext, COMPOSITE_BREACH_THRESHOLD, DEVIATION_THRESHOLD,
    HIGH_Z_THRESHOLD, PXI_JUMP_THRESHOLD};
pub use weights::{cap_and_redistribute, magnitude_multiplier, normalize};

use chrono::{DateTime, Utc};
use pxi_core::{CompositeRow, IndicatorDefinition, MetricContribution, ThresholdRegime};

/// Default per-indicator share cap (`MAX_METRIC_CONTRIBUTION`).
pub const DEFAULT_CONTRIBUTION_CAP: f64 = 0.25;

/// Display bounds of the composite scale.
pub const PXI_CLAMP: f64 = 3.0;

/// One indicator's inputs to the composite: its definition, the latest
/// canonical value, the rolling z-score, and the signal-multiplier
/// override (1.0 when no override applies).
#[derive(Debug, Clone)]
pub struct CompositeInput {
    pub def: &'static IndicatorDefinition,
    pub value: f64,
    pub z: f64,
    pub signal_multiplier: f64,
}

impl CompositeInput {
    pub fn effective_weight(&self) -> f64 {
        self.def.weight * magnitude_multiplier(self.z) * self.signal_multiplier
    }
}

pub fn classify_threshold_regime(pxi: f64) -> ThresholdRegime {
    if pxi > 2.0 {
        ThresholdRegime::StrongPamp
    } else if pxi > 1.0 {
        ThresholdRegime::ModeratePamp
    } else if pxi >= -1.0 {
        ThresholdRegime::Normal
    } else if pxi >= -2.0 {
        ThresholdRegime::ElevatedStress
    } else {
        ThresholdRegime::Crisis
    }
}

/// Build the composite row for one tick. Indicators with a zero base
/// weight or a non-finite z are excluded (they are still z-scored and
/// stored upstream). Returns None when nothing participates.
pub fn compute_composite(
    inputs: &[CompositeInput],
    cap: f64,
    calculated_at: DateTime<Utc>,
) -> Option<CompositeRow> {
    let participants: Vec<&CompositeInput> = inputs
        .iter()
        .filter(|i| i.def.weight > 0.0 && i.z.is_finite())
        .collect();

    if participants.is_empty() {
        return None;
    }

    let mut shares: Vec<f64> = participants.iter().map(|i| i.effective_weight()).collect();
    let total_weight: f64 = shares.iter().sum();
    normalize(&mut shares);
    cap_and_redistribute(&mut shares, cap);

    let mut metrics = Vec::with_capacity(participants.len());
    let mut raw_pxi = 0.0;
    let mut pamp_count = 0i64;
    let mut stress_count = 0i64;

    for (input, share) in participants.iter().zip(&shares) {
        let contribution = share * input.z * input.def.risk_direction.sign();
        raw_pxi += contribution;
        if contribution > 0.0 {
            pamp_count += 1;
        } else if contribution < 0.0 {
            stress_count += 1;
        }
        metrics.push(MetricContribution {
            id: input.def.id.to_string(),
            value: input.value,
            z: input.z,
            normalized_weight: *share,
            contribution,
        });
    }

    let pxi = raw_pxi.clamp(-PXI_CLAMP, PXI_CLAMP);

    Some(CompositeRow {
        calculated_at,
        raw_pxi,
        pxi,
        metrics,
        regime: classify_threshold_regime(pxi),
        total_weight,
        pamp_count,
        stress_count,
    })
}

/// Round to the 3-decimal display precision; the raw value is retained
/// alongside for downstream analysis.
pub fn display_pxi(pxi: f64) -> f64 {
    (pxi * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pxi_core::indicator;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap()
    }

    fn input(id: &str, z: f64) -> CompositeInput {
        CompositeInput {
            def: indicator(id).unwrap(),
            value: 1.0,
            z,
            signal_multiplier: 1.0,
        }
    }

    #[test]
    fn normalized_weights_sum_to_one() {
        let inputs = vec![
            input("vix", 1.2),
            input("hy_oas", -0.4),
            input("usd_index", 2.3),
            input("nfci", 0.1),
            input("btc_return", -1.6),
        ];
        let row = compute_composite(&inputs, DEFAULT_CONTRIBUTION_CAP, at()).unwrap();
        let sum: f64 = row.metrics.iter().map(|m| m.normalized_weight).sum();
        assert!((sum - 1.0).abs() < 1e-4);
        assert!((row.pxi - row.metrics.iter().map(|m| m.contribution).sum::<f64>()).abs() < 1e-9);
    }

    #[test]
    fn cap_invariant_holds_with_full_panel() {
        let inputs: Vec<CompositeInput> = pxi_core::indicator_registry()
            .iter()
            .map(|d| CompositeInput { def: d, value: 1.0, z: 0.5, signal_multiplier: 1.0 })
            .collect();
        let row = compute_composite(&inputs, DEFAULT_CONTRIBUTION_CAP, at()).unwrap();
        let max = row
            .metrics
            .iter()
            .map(|m| m.normalized_weight)
            .fold(f64::NEG_INFINITY, f64::max);
        assert!(max <= DEFAULT_CONTRIBUTION_CAP + 1e-9);
        let sum: f64 = row.metrics.iter().map(|m| m.normalized_weight).sum();
        assert!((sum - 1.0).abs() < 1e-4);
    }

    #[test]
    fn higher_is_more_risk_contributes_negative_when_elevated() {
        let inputs = vec![input("vix", 2.0), input("btc_return", 2.0)];
        let row = compute_composite(&inputs, DEFAULT_CONTRIBUTION_CAP, at()).unwrap();
        let vix = row.metrics.iter().find(|m| m.id == "vix").unwrap();
        let btc = row.metrics.iter().find(|m| m.id == "btc_return").unwrap();
        assert!(vix.contribution <= 0.0);
        assert!(btc.contribution > 0.0);
    }

    #[test]
    fn regime_thresholds() {
        assert_eq!(classify_threshold_regime(-1.8), ThresholdRegime::ElevatedStress);
        assert_eq!(classify_threshold_regime(-2.5), ThresholdRegime::Crisis);
        assert_eq!(classify_threshold_regime(1.2), ThresholdRegime::ModeratePamp);
        assert_eq!(classify_threshold_regime(2.4), ThresholdRegime::StrongPamp);
        assert_eq!(classify_threshold_regime(0.0), ThresholdRegime::Normal);
        assert_eq!(classify_threshold_regime(-1.0), ThresholdRegime::Normal);
        assert_eq!(classify_threshold_regime(-2.0), ThresholdRegime::ElevatedStress);
    }

    #[test]
    fn pxi_is_clamped_raw_is_not() {
        // A single stress indicator with an extreme z saturates the scale.
        let inputs = vec![input("vix", 8.0)];
        let row = compute_composite(&inputs, 1.0, at()).unwrap();
        assert!(row.raw_pxi < -PXI_CLAMP);
        assert_eq!(row.pxi, -PXI_CLAMP);
    }

    #[test]
    fn zero_weight_indicators_are_excluded() {
        let mut zero = indicator("vix").unwrap().clone();
        zero.weight = 0.0;
        let leaked: &'static pxi_core::IndicatorDefinition = Box::leak(Box::new(zero));
        let inputs = vec![
            CompositeInput { def: leaked, value: 1.0, z: 3.0, signal_multiplier: 1.0 },
            input("hy_oas", 0.5),
        ];
        let row = compute_composite(&inputs, DEFAULT_CONTRIBUTION_CAP, at()).unwrap();
        assert_eq!(row.metrics.len(), 1);
        assert_eq!(row.metrics[0].id, "hy_oas");
    }

    #[test]
    fn no_participants_yields_none() {
        assert!(compute_composite(&[], DEFAULT_CONTRIBUTION_CAP, at()).is_none());
    }

    #[test]
    fn display_rounding() {
        assert_eq!(display_pxi(1.23456), 1.235);
        assert_eq!(display_pxi(-0.0004), -0.0);
    }
}
