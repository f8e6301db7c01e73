//! Drives the statistical engine into the composite engine the way a
//! scheduler tick does: history -> rolling z -> weighted composite ->
//! alerts, across consecutive ticks with carried-over state.

use std::collections::HashMap;

use chrono::{DateTime, TimeZone, Utc};
use composite_engine::{
    compute_composite, emit_alerts, AlertContext, CompositeInput, DEFAULT_CONTRIBUTION_CAP,
};
use pxi_core::{indicator, AlertType, ThresholdRegime};
use stats_engine::{compute_z, DEFAULT_SPARSE_THRESHOLD};

fn ts(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, day, 16, 0, 0).unwrap()
}

fn history(values: &[f64]) -> Vec<(DateTime<Utc>, f64)> {
    values
        .iter()
        .enumerate()
        .map(|(i, &v)| (ts(1 + i as u32), v))
        .collect()
}

fn input_from_history(id: &str, past: &[f64], latest: f64) -> CompositeInput {
    let comp = compute_z(&history(past), latest, DEFAULT_SPARSE_THRESHOLD)
        .expect("enough history for a defined z");
    CompositeInput {
        def: indicator(id).expect("indicator in registry"),
        value: latest,
        z: comp.z,
        signal_multiplier: 1.0,
    }
}

#[test]
fn elevated_vix_drives_the_composite_into_stress() {
    // VIX jumps well above its rolling baseline while credit is calm.
    let vix = input_from_history("vix", &[15.0, 16.0, 17.0, 18.0, 19.0], 26.0);
    let hy = input_from_history(
        "hy_oas",
        &[0.041, 0.0405, 0.0395, 0.040, 0.0405],
        0.0402,
    );

    assert!(vix.z > 2.0, "vix z should flag a strong move, got {}", vix.z);
    assert!(hy.z.abs() < 1.0);

    let row = compute_composite(&[vix, hy], DEFAULT_CONTRIBUTION_CAP, ts(10)).unwrap();

    // A stress indicator with positive z pulls the composite down.
    assert!(row.pxi < 0.0);
    assert_eq!(row.stress_count, 1);
    let sum: f64 = row.metrics.iter().map(|m| m.normalized_weight).sum();
    assert!((sum - 1.0).abs() < 1e-4);
}

#[test]
fn flat_panel_is_quiet() {
    let vix = input_from_history("vix", &[18.0; 6], 18.0);
    let hy = input_from_history("hy_oas", &[0.04; 6], 0.04);
    assert_eq!(vix.z, 0.0);
    assert_eq!(hy.z, 0.0);

    let row = compute_composite(&[vix, hy], DEFAULT_CONTRIBUTION_CAP, ts(10)).unwrap();
    assert_eq!(row.pxi, 0.0);
    assert_eq!(row.regime, ThresholdRegime::Normal);

    let alerts = emit_alerts(&row, &[], &AlertContext::default());
    assert!(alerts.is_empty());
}

#[test]
fn consecutive_ticks_carry_state_for_jump_alerts() {
    // Tick 1: calm panel.
    let calm = vec![
        input_from_history("vix", &[15.0, 16.0, 17.0, 18.0, 19.0], 17.5),
        input_from_history("hy_oas", &[0.040, 0.041, 0.039, 0.040, 0.041], 0.0405),
    ];
    let tick1 = compute_composite(&calm, DEFAULT_CONTRIBUTION_CAP, ts(10)).unwrap();

    let mut prev_values = HashMap::new();
    for input in &calm {
        prev_values.insert(input.def.id.to_string(), input.value);
    }

    // Tick 2: both stress indicators spike; the PXI lurches downward.
    let stressed = vec![
        input_from_history("vix", &[15.0, 16.0, 17.0, 18.0, 19.0], 28.0),
        input_from_history("hy_oas", &[0.040, 0.041, 0.039, 0.040, 0.041], 0.055),
    ];
    let tick2 = compute_composite(&stressed, DEFAULT_CONTRIBUTION_CAP, ts(11)).unwrap();
    assert!(tick2.pxi < tick1.pxi - 0.5, "expected a PXI jump");

    let ctx = AlertContext {
        prev_pxi: Some(tick1.pxi),
        prev_values: Some(&prev_values),
        deviation_counts: None,
        suggestion_threshold: 3,
    };
    let alerts = emit_alerts(&tick2, &stressed, &ctx);

    assert!(alerts.iter().any(|a| a.alert_type == AlertType::PxiChange));
    // HY OAS moved ~36% tick over tick; that deserves a review.
    assert!(alerts
        .iter()
        .any(|a| a.alert_type == AlertType::DeviationReview
            && a.indicator_id.as_deref() == Some("hy_oas")));
    // Both indicators blew past the high-z threshold.
    assert_eq!(
        alerts
            .iter()
            .filter(|a| a.alert_type == AlertType::HighZScore)
            .count(),
        2
    );
}

#[test]
fn short_history_indicator_sits_out_while_others_compute() {
    let err = compute_z(&history(&[1.0, 2.0]), 3.0, DEFAULT_SPARSE_THRESHOLD);
    assert!(err.is_err());

    // The rest of the panel still produces a composite.
    let vix = input_from_history("vix", &[15.0, 16.0, 17.0, 18.0, 19.0], 20.0);
    let row = compute_composite(&[vix], DEFAULT_CONTRIBUTION_CAP, ts(10)).unwrap();
    assert_eq!(row.metrics.len(), 1);
    assert!((row.metrics[0].normalized_weight - 1.0).abs() < 1e-9);
}
