/// Strong moves get amplified weight: 2.0 beyond |z| = 2, 1.5 beyond
/// |z| = 1, neutral otherwise.
pub fn magnitude_multiplier(z: f64) -> f64 {
    let abs = z.abs();
    if abs > 2.0 {
        2.0
    } else if abs > 1.0 {
        1.5
    } else {
        1.0
    }
}

/// Scale weights so they sum to 1. Leaves an all-zero slice untouched.
pub fn normalize(weights: &mut [f64]) {
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return;
    }
    for w in weights.iter_mut() {
        *w /= total;
    }
}

/// Clamp shares above `cap` and hand the excess to the indicators still
/// strictly below it, proportionally to their current share. Repeats while
/// some share crossed the cap and a below-cap receiver remains; when no
/// receiver has headroom left the distribution is final even if the last
/// recipients sit above the cap (there is nowhere else for the weight to
/// go while keeping the total at 1).
pub fn cap_and_redistribute(shares: &mut [f64], cap: f64) {
    if cap <= 0.0 {
        return;
    }

    loop {
        let excess: f64 = shares.iter().filter(|&&s| s > cap).map(|s| s - cap).sum();
        if excess <= 0.0 {
            return;
        }

        let receiver_total: f64 = shares.iter().filter(|&&s| s < cap).sum();
        if receiver_total <= 0.0 {
            return;
        }

        for share in shares.iter_mut() {
            if *share > cap {
                *share = cap;
            } else if *share < cap {
                *share += excess * *share / receiver_total;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magnitude_bands() {
        assert_eq!(magnitude_multiplier(0.5), 1.0);
        assert_eq!(magnitude_multiplier(-1.2), 1.5);
        assert_eq!(magnitude_multiplier(2.5), 2.0);
        assert_eq!(magnitude_multiplier(1.0), 1.0);
        assert_eq!(magnitude_multiplier(2.0), 1.5);
    }

    #[test]
    fn normalize_sums_to_one() {
        let mut w = vec![3.0, 1.0, 1.0];
        normalize(&mut w);
        assert!((w.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!((w[0] - 0.6).abs() < 1e-12);
    }

    #[test]
    fn cap_redistribution_scenario() {
        // Effective weights {A:3, B:1, C:1} -> shares 0.6/0.2/0.2, cap 0.25.
        // A clamps to 0.25; the 0.35 excess splits evenly over B and C.
        let mut shares = vec![3.0, 1.0, 1.0];
        normalize(&mut shares);
        cap_and_redistribute(&mut shares, 0.25);
        assert!((shares[0] - 0.25).abs() < 1e-9);
        assert!((shares[1] - 0.375).abs() < 1e-9);
        assert!((shares[2] - 0.375).abs() < 1e-9);
        assert!((shares.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn cap_exactly_at_share_is_untouched() {
        let mut shares = vec![0.25, 0.25, 0.25, 0.25];
        cap_and_redistribute(&mut shares, 0.25);
        assert_eq!(shares, vec![0.25, 0.25, 0.25, 0.25]);
    }

    #[test]
    fn redistribution_that_crosses_cap_repeats() {
        // Excess from A pushes B over the cap; B's overflow then lands on
        // C and D, which settle exactly at the cap.
        let mut shares = vec![0.6, 0.22, 0.09, 0.09];
        cap_and_redistribute(&mut shares, 0.25);
        for s in &shares {
            assert!(*s <= 0.25 + 1e-9);
        }
        assert!((shares.iter().sum::<f64>() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn feasible_case_honors_cap_invariant() {
        let mut shares = vec![0.40, 0.30, 0.10, 0.10, 0.05, 0.05];
        cap_and_redistribute(&mut shares, 0.25);
        let max = shares.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        assert!(max <= 0.25 + 1e-9);
        assert!((shares.iter().sum::<f64>() - 1.0).abs() < 1e-4);
    }
}
