//! # Travel Booking Testing
//!
//! Testing utilities for the travel booking engine.
//!
//! This crate provides:
//! - A fixed clock so cancellation windows are deterministic
//! - The Given/When/Then [`ReducerTest`] harness
//! - Assertion helpers for effects
//!
//! ## Example
//!
//! ```ignore
//! use travel_booking_testing::{clock_on, ReducerTest};
//!
//! ReducerTest::new(BookingLifecycleReducer::new())
//!     .with_env(environment_with(clock_on(2025, 3, 1)))
//!     .given_state(state_with(confirmed_booking_on(2025, 3, 4)))
//!     .when_action(LifecycleAction::CancelBooking { booking_id, session })
//!     .then_effects(assertions::assert_has_future_effect)
//!     .run();
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use travel_booking_core::environment::Clock;

mod reducer_test;

pub use reducer_test::{assertions, ReducerTest};

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, NaiveDate, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use travel_booking_testing::mocks::FixedClock;
    /// use travel_booking_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }

        /// A clock pinned to noon (UTC) on the given calendar date
        ///
        /// Noon keeps "today" stable regardless of how the date is later
        /// normalized to midnight.
        #[must_use]
        pub fn on_date(date: NaiveDate) -> Self {
            let noon = date.and_hms_opt(12, 0, 0).unwrap_or_default();
            Self::new(noon.and_utc())
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(DateTime::from_timestamp(20_089 * 86_400, 0).unwrap_or_default())
    }

    /// A fixed clock at noon on `year-month-day`
    ///
    /// Falls back to the Unix epoch for an impossible date, which no test
    /// relies on.
    #[must_use]
    pub fn clock_on(year: i32, month: u32, day: u32) -> FixedClock {
        FixedClock::on_date(NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default())
    }
}

// Re-export commonly used items
pub use mocks::{clock_on, test_clock, FixedClock};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        assert_eq!(clock.now(), clock.now());
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2025, 1, 1).unwrap_or_default());
    }

    #[test]
    fn test_clock_on_reports_calendar_date() {
        let clock = clock_on(2025, 3, 14);
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2025, 3, 14).unwrap_or_default());
    }
}
