//! Reward tiers and badge ids.

pub const BADGE_FIRST_STUDY: &str = "first_study_complete";
pub const BADGE_FIVE_STUDIES: &str = "five_studies_complete";
pub const BADGE_PERFECT_ATTENDANCE: &str = "perfect_attendance_1";

/// Map an attendance rate in `[0, 1]` to an `(ink, pen)` credit.
///
/// Thresholds are inclusive lower bounds.
pub fn reward_for_rate(rate: f64) -> (i64, i64) {
    if rate >= 1.0 {
        (10, 2)
    } else if rate >= 0.9 {
        (5, 1)
    } else if rate >= 0.7 {
        (2, 0)
    } else {
        (0, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_boundaries_are_inclusive_lower_bounds() {
        assert_eq!(reward_for_rate(1.0), (10, 2));
        assert_eq!(reward_for_rate(0.9999), (5, 1));
        assert_eq!(reward_for_rate(0.9), (5, 1));
        assert_eq!(reward_for_rate(0.8999), (2, 0));
        assert_eq!(reward_for_rate(0.7), (2, 0));
        assert_eq!(reward_for_rate(0.6999), (0, 0));
        assert_eq!(reward_for_rate(0.0), (0, 0));
    }
}
