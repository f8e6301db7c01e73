use std::collections::HashMap;

use pxi_core::{Alert, AlertType, CompositeRow, Severity};

use crate::CompositeInput;

pub const HIGH_Z_THRESHOLD: f64 = 1.5;
pub const HIGH_Z_CRITICAL: f64 = 2.5;
pub const DEVIATION_THRESHOLD: f64 = 0.10;
pub const COMPOSITE_BREACH_THRESHOLD: f64 = 1.0;
pub const COMPOSITE_BREACH_CRITICAL: f64 = 2.0;
pub const PXI_JUMP_THRESHOLD: f64 = 0.5;

/// Per-tick continuity handed in by the scheduler. The engine never
/// stores anything itself.
#[derive(Debug, Default)]
pub struct AlertContext<'a> {
    /// PXI from the previous successful tick; None on cold start, in
    /// which case no pxi_change alert can fire.
    pub prev_pxi: Option<f64>,
    /// Previous raw value per indicator.
    pub prev_values: Option<&'a HashMap<String, f64>>,
    /// deviation_review alerts per indicator over the past 30 days,
    /// queried from the store before the tick.
    pub deviation_counts: Option<&'a HashMap<String, i64>>,
    /// Deviation alerts within 30 days before a bound widening is
    /// suggested.
    pub suggestion_threshold: i64,
}

/// Derive the tick's durable alerts from the freshly computed composite.
pub fn emit_alerts(
    row: &CompositeRow,
    inputs: &[CompositeInput],
    ctx: &AlertContext<'_>,
) -> Vec<Alert> {
    let mut alerts = Vec::new();
    let at = row.calculated_at;

    for input in inputs {
        let id = input.def.id.to_string();

        if input.z.abs() > HIGH_Z_THRESHOLD {
            let severity = if input.z.abs() > HIGH_Z_CRITICAL {
                Severity::Critical
            } else {
                Severity::Warning
            };
            alerts.push(Alert {
                alert_type: AlertType::HighZScore,
                indicator_id: Some(id.clone()),
                timestamp: at,
                raw_value: Some(input.value),
                z: Some(input.z),
                threshold: Some(HIGH_Z_THRESHOLD),
                message: format!(
                    "{} z-score {:.2} beyond ±{}",
                    input.def.label, input.z, HIGH_Z_THRESHOLD
                ),
                severity,
                acknowledged: false,
            });
        }

        let prev = ctx.prev_values.and_then(|m| m.get(&id)).copied();
        if let Some(prev) = prev {
            if prev.abs() > f64::EPSILON {
                let change = ((input.value - prev) / prev).abs();
                if change > DEVIATION_THRESHOLD {
                    alerts.push(Alert {
                        alert_type: AlertType::DeviationReview,
                        indicator_id: Some(id.clone()),
                        timestamp: at,
                        raw_value: Some(input.value),
                        z: Some(input.z),
                        threshold: Some(DEVIATION_THRESHOLD),
                        message: format!(
                            "{} moved {:.1}% since the previous tick ({} -> {})",
                            input.def.label,
                            change * 100.0,
                            prev,
                            input.value
                        ),
                        severity: Severity::Info,
                        acknowledged: false,
                    });

                    let recent = ctx
                        .deviation_counts
                        .and_then(|m| m.get(&id))
                        .copied()
                        .unwrap_or(0);
                    if ctx.suggestion_threshold > 0 && recent >= ctx.suggestion_threshold {
                        let lower = input.def.lower_bound * 0.8;
                        let upper = input.def.upper_bound * 1.2;
                        alerts.push(Alert {
                            alert_type: AlertType::BoundSuggestion,
                            indicator_id: Some(id.clone()),
                            timestamp: at,
                            raw_value: Some(input.value),
                            z: None,
                            threshold: Some(DEVIATION_THRESHOLD),
                            message: format!(
                                "{} deviated {} times in 30 days; consider widening bounds to [{:.4}, {:.4}]",
                                input.def.label, recent, lower, upper
                            ),
                            severity: Severity::Info,
                            acknowledged: false,
                        });
                    }
                }
            }
        }
    }

    if row.pxi.abs() > COMPOSITE_BREACH_THRESHOLD {
        let severity = if row.pxi.abs() > COMPOSITE_BREACH_CRITICAL {
            Severity::Critical
        } else {
            Severity::Warning
        };
        alerts.push(Alert {
            alert_type: AlertType::CompositeBreach,
            indicator_id: None,
            timestamp: at,
            raw_value: Some(row.pxi),
            z: None,
            threshold: Some(COMPOSITE_BREACH_THRESHOLD),
            message: format!("PXI {:.3} breached ±{}", row.pxi, COMPOSITE_BREACH_THRESHOLD),
            severity,
            acknowledged: false,
        });
    }

    if let Some(prev_pxi) = ctx.prev_pxi {
        let jump = (row.pxi - prev_pxi).abs();
        if jump > PXI_JUMP_THRESHOLD {
            alerts.push(Alert {
                alert_type: AlertType::PxiChange,
                indicator_id: None,
                timestamp: at,
                raw_value: Some(row.pxi),
                z: None,
                threshold: Some(PXI_JUMP_THRESHOLD),
                message: format!(
                    "PXI jumped {:.3} -> {:.3} (|delta| {:.3})",
                    prev_pxi, row.pxi, jump
                ),
                severity: Severity::Warning,
                acknowledged: false,
            });
        }
    }

    alerts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{compute_composite, DEFAULT_CONTRIBUTION_CAP};
    use chrono::{TimeZone, Utc};
    use pxi_core::indicator;

    fn row_with_pxi(pxi: f64) -> CompositeRow {
        CompositeRow {
            calculated_at: Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap(),
            raw_pxi: pxi,
            pxi,
            metrics: vec![],
            regime: crate::classify_threshold_regime(pxi),
            total_weight: 1.0,
            pamp_count: 0,
            stress_count: 0,
        }
    }

    fn input(id: &str, value: f64, z: f64) -> CompositeInput {
        CompositeInput {
            def: indicator(id).unwrap(),
            value,
            z,
            signal_multiplier: 1.0,
        }
    }

    #[test]
    fn high_z_severity_bands() {
        let ctx = AlertContext::default();
        let alerts = emit_alerts(&row_with_pxi(0.0), &[input("vix", 30.0, 1.8)], &ctx);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertType::HighZScore);
        assert_eq!(alerts[0].severity, Severity::Warning);

        let alerts = emit_alerts(&row_with_pxi(0.0), &[input("vix", 45.0, -2.8)], &ctx);
        assert_eq!(alerts[0].severity, Severity::Critical);
    }

    #[test]
    fn pxi_change_sequence() {
        // Tick T: 0.2, T+1: 0.8 -> one pxi_change warning.
        let mut ctx = AlertContext::default();
        ctx.prev_pxi = Some(0.2);
        let alerts = emit_alerts(&row_with_pxi(0.8), &[], &ctx);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertType::PxiChange);
        assert_eq!(alerts[0].severity, Severity::Warning);

        // T+2: 1.1 with delta 0.3 -> no change alert, but a breach warning.
        ctx.prev_pxi = Some(0.8);
        let alerts = emit_alerts(&row_with_pxi(1.1), &[], &ctx);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertType::CompositeBreach);
        assert_eq!(alerts[0].severity, Severity::Warning);
    }

    #[test]
    fn no_pxi_change_on_cold_start() {
        let ctx = AlertContext::default();
        let alerts = emit_alerts(&row_with_pxi(3.0), &[], &ctx);
        assert!(alerts.iter().all(|a| a.alert_type != AlertType::PxiChange));
    }

    #[test]
    fn composite_breach_critical_beyond_two() {
        let ctx = AlertContext::default();
        let alerts = emit_alerts(&row_with_pxi(-2.4), &[], &ctx);
        assert_eq!(alerts[0].alert_type, AlertType::CompositeBreach);
        assert_eq!(alerts[0].severity, Severity::Critical);
    }

    #[test]
    fn deviation_review_and_bound_suggestion() {
        let mut prev = HashMap::new();
        prev.insert("vix".to_string(), 20.0);
        let mut counts = HashMap::new();
        counts.insert("vix".to_string(), 3i64);

        let ctx = AlertContext {
            prev_pxi: None,
            prev_values: Some(&prev),
            deviation_counts: Some(&counts),
            suggestion_threshold: 3,
        };
        let alerts = emit_alerts(&row_with_pxi(0.0), &[input("vix", 23.0, 0.5)], &ctx);
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].alert_type, AlertType::DeviationReview);
        assert_eq!(alerts[0].severity, Severity::Info);
        assert_eq!(alerts[1].alert_type, AlertType::BoundSuggestion);
    }

    #[test]
    fn small_deviation_is_quiet() {
        let mut prev = HashMap::new();
        prev.insert("vix".to_string(), 20.0);
        let ctx = AlertContext {
            prev_pxi: None,
            prev_values: Some(&prev),
            deviation_counts: None,
            suggestion_threshold: 3,
        };
        let alerts = emit_alerts(&row_with_pxi(0.0), &[input("vix", 21.0, 0.5)], &ctx);
        assert!(alerts.is_empty());
    }

    #[test]
    fn full_tick_composite_emits_consistent_alerts() {
        let inputs = vec![input("vix", 40.0, 2.6), input("hy_oas", 0.08, 2.2)];
        let row = compute_composite(
            &inputs,
            DEFAULT_CONTRIBUTION_CAP,
            Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap(),
        )
        .unwrap();
        let ctx = AlertContext::default();
        let alerts = emit_alerts(&row, &inputs, &ctx);
        // Two high-z alerts plus a composite breach (both stress z's push
        // PXI well below -1).
        assert_eq!(
            alerts
                .iter()
                .filter(|a| a.alert_type == AlertType::HighZScore)
                .count(),
            2
        );
        assert!(alerts.iter().any(|a| a.alert_type == AlertType::CompositeBreach));
    }
}
