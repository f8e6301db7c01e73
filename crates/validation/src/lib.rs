//! Hard-limit and cross-indicator business-rule checks over one ingest
//! batch. Validation is all-or-nothing: the first offending rule fails
//! the whole batch, and the caller decides whether to drop it.

use pxi_core::{indicator, PxiError, Sample};

/// Check a batch of samples. Succeeds silently or fails naming the first
/// offending rule. Indicators missing from the batch are tolerated, as
/// are ids without hard bounds in the registry.
pub fn validate_batch(samples: &[Sample]) -> Result<(), PxiError> {
    for sample in samples {
        if !sample.value.is_finite() {
            return Err(PxiError::Validation(format!(
                "non-finite value for {}: {}",
                sample.indicator_id, sample.value
            )));
        }

        let Some(def) = indicator(&sample.indicator_id) else {
            continue;
        };

        if sample.value < def.hard_min || sample.value > def.hard_max {
            return Err(PxiError::Validation(format!(
                "{} value {} outside hard bounds [{}, {}]",
                sample.indicator_id, sample.value, def.hard_min, def.hard_max
            )));
        }
    }

    let hy = samples.iter().find(|s| s.indicator_id == "hy_oas");
    let ig = samples.iter().find(|s| s.indicator_id == "ig_oas");
    if let (Some(hy), Some(ig)) = (hy, ig) {
        if hy.value <= ig.value {
            return Err(PxiError::Validation(format!(
                "HY OAS ({}) must exceed IG OAS ({})",
                hy.value, ig.value
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pxi_core::SignalOverrides;

    fn sample(id: &str, value: f64) -> Sample {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap();
        Sample {
            indicator_id: id.to_string(),
            value,
            unit: "decimal".to_string(),
            source_timestamp: now,
            ingested_at: now,
            overrides: SignalOverrides::default(),
        }
    }

    #[test]
    fn clean_batch_passes() {
        let batch = vec![sample("hy_oas", 0.045), sample("ig_oas", 0.012), sample("vix", 18.0)];
        assert!(validate_batch(&batch).is_ok());
    }

    #[test]
    fn nan_is_rejected() {
        let batch = vec![sample("vix", f64::NAN)];
        let err = validate_batch(&batch).unwrap_err();
        assert!(err.to_string().contains("non-finite"));
    }

    #[test]
    fn infinity_is_rejected() {
        let batch = vec![sample("vix", f64::INFINITY)];
        assert!(validate_batch(&batch).is_err());
    }

    #[test]
    fn hard_bounds_are_enforced() {
        let batch = vec![sample("vix", 400.0)];
        let err = validate_batch(&batch).unwrap_err();
        assert!(err.to_string().contains("hard bounds"));
    }

    #[test]
    fn hy_must_exceed_ig() {
        let batch = vec![sample("hy_oas", 0.010), sample("ig_oas", 0.012)];
        let err = validate_batch(&batch).unwrap_err();
        assert!(err.to_string().contains("must exceed"));
    }

    #[test]
    fn cross_rule_skipped_when_one_leg_missing() {
        let batch = vec![sample("ig_oas", 0.012)];
        assert!(validate_batch(&batch).is_ok());
    }

    #[test]
    fn unregistered_indicator_is_tolerated() {
        let batch = vec![sample("mystery", 1.0), sample("vix", 18.0)];
        assert!(validate_batch(&batch).is_ok());
    }

    #[test]
    fn first_violation_wins() {
        // The NaN on vix is hit before the HY/IG cross-check.
        let batch = vec![sample("vix", f64::NAN), sample("hy_oas", 0.01), sample("ig_oas", 0.02)];
        let err = validate_batch(&batch).unwrap_err();
        assert!(err.to_string().contains("non-finite"));
    }
}
