//! FMCSA property-carrying-driver Hours-of-Service policy constants.
//!
//! These are the federal limits the scheduler enforces. They never change
//! per-request — the table exists so the scheduler reads named constants
//! instead of magic numbers, and so a future rule change (e.g. a different
//! cycle limit for a different jurisdiction) is a one-place edit.

/// Immutable HOS policy. All values are in hours unless noted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleTable {
    /// Maximum driving time allowed per on-duty window.
    pub driving_limit: f64,
    /// Maximum elapsed on-duty + driving span from window open.
    pub on_duty_window: f64,
    /// Cumulative driving time since the last qualifying break before a
    /// 30-minute break becomes mandatory.
    pub break_after: f64,
    /// Length of the mandatory break.
    pub break_duration: f64,
    /// Consecutive off-duty/sleeper time that resets daily counters.
    pub off_duty_reset: f64,
    /// Rolling cycle cap.
    pub cycle_limit: f64,
    /// Width of the rolling cycle window, in days (informational — this
    /// implementation tracks the cycle as a single scalar, see
    /// `SchedulerState::cycle_used`).
    pub cycle_window_days: u32,
    /// Consecutive off-duty time that resets the cycle to zero.
    pub restart_duration: f64,
    /// Distance between mandatory fuel stops, in miles.
    pub fuel_interval_miles: f64,
    pub pre_trip: f64,
    pub post_trip: f64,
    pub pickup: f64,
    pub dropoff: f64,
    pub fueling: f64,
}

impl RuleTable {
    pub const fn property_carrying() -> Self {
        Self {
            driving_limit: 11.0,
            on_duty_window: 14.0,
            break_after: 8.0,
            break_duration: 0.5,
            off_duty_reset: 10.0,
            cycle_limit: 70.0,
            cycle_window_days: 8,
            restart_duration: 34.0,
            fuel_interval_miles: 1000.0,
            pre_trip: 0.5,
            post_trip: 0.5,
            pickup: 1.0,
            dropoff: 1.0,
            fueling: 0.5,
        }
    }
}

impl Default for RuleTable {
    fn default() -> Self {
        Self::property_carrying()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_carrying_matches_fmcsa_70_8() {
        let rules = RuleTable::property_carrying();
        assert_eq!(rules.driving_limit, 11.0);
        assert_eq!(rules.on_duty_window, 14.0);
        assert_eq!(rules.break_after, 8.0);
        assert_eq!(rules.break_duration, 0.5);
        assert_eq!(rules.off_duty_reset, 10.0);
        assert_eq!(rules.cycle_limit, 70.0);
        assert_eq!(rules.cycle_window_days, 8);
        assert_eq!(rules.restart_duration, 34.0);
        assert_eq!(rules.fuel_interval_miles, 1000.0);
    }

    #[test]
    fn default_is_property_carrying() {
        assert_eq!(RuleTable::default(), RuleTable::property_carrying());
    }
}
