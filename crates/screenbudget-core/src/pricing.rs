//! Buy-back pricing model.
//!
//! Pure arithmetic used when a user "skips the wait" and buys early access:
//! a discount multiplier derived from how long the exercise lasted, and a
//! penalty percentage for the minutes bought back. Advisory only -- nothing
//! here touches the ledger.

/// Largest discount an exercise can earn (multiplier floor `1 - 0.3`).
pub const MAX_DISCOUNT: f64 = 0.3;

/// Penalty slope: buying back the full window costs 20%.
pub const MAX_PENALTY: f64 = 0.2;

/// Exercise duration (and buy-back window) at which pricing saturates.
pub const SATURATION_MINUTES: f64 = 15.0;

/// Map an exercise duration to a discount multiplier in `[0.7, 1.0]`.
///
/// Monotonic non-increasing in duration, saturating at 15 minutes. A zero
/// or negative duration earns no discount and yields exactly `1.0`.
pub fn discount_multiplier(total_seconds: i64) -> f64 {
    if total_seconds <= 0 {
        return 1.0;
    }
    let minutes = (total_seconds as f64 / 60.0).max(1.0);
    let normalized = (minutes / SATURATION_MINUTES).min(1.0);
    (1.0 - MAX_DISCOUNT * normalized).clamp(1.0 - MAX_DISCOUNT, 1.0)
}

/// Map requested buy-back minutes, clamped to `[1, 15]`, to an integer
/// penalty percentage of at most 20.
pub fn penalty_percent(minutes: i64) -> u32 {
    let clamped = minutes.clamp(1, 15) as f64;
    (MAX_PENALTY * (clamped / SATURATION_MINUTES) * 100.0).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_duration_yields_no_discount() {
        assert_eq!(discount_multiplier(0), 1.0);
        assert_eq!(discount_multiplier(-30), 1.0);
    }

    #[test]
    fn full_discount_at_fifteen_minutes() {
        assert_eq!(discount_multiplier(900), 0.7);
    }

    #[test]
    fn discount_saturates_past_fifteen_minutes() {
        assert_eq!(discount_multiplier(1800), 0.7);
        assert_eq!(discount_multiplier(10 * 3600), 0.7);
    }

    #[test]
    fn multiplier_is_monotonic_non_increasing() {
        let mut last = f64::MAX;
        for seconds in (60..=1800).step_by(60) {
            let m = discount_multiplier(seconds);
            assert!(m <= last, "multiplier rose at {seconds}s");
            assert!((0.7..=1.0).contains(&m));
            last = m;
        }
    }

    #[test]
    fn sub_minute_durations_floor_to_one_minute() {
        assert_eq!(discount_multiplier(10), discount_multiplier(60));
    }

    #[test]
    fn penalty_clamps_to_window() {
        assert_eq!(penalty_percent(15), 20);
        assert_eq!(penalty_percent(30), 20);
        assert_eq!(penalty_percent(0), penalty_percent(1));
        assert_eq!(penalty_percent(-5), penalty_percent(1));
    }

    #[test]
    fn penalty_rounds_to_whole_percent() {
        // 5 of 15 minutes: 0.2 * (5/15) * 100 = 6.66.. -> 7
        assert_eq!(penalty_percent(5), 7);
    }
}
