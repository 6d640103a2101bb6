//! Availability evaluation against a fixed per-date capacity.

use crate::backend::BoxFuture;
use crate::error::BookingResult;
use crate::types::{ActivityId, AvailabilityVerdict, PackageId};
use chrono::NaiveDate;
use std::sync::Arc;

/// External capacity query
pub trait CapacityService: Send + Sync {
    /// Capacity snapshot for an activity/package on a date
    ///
    /// # Errors
    ///
    /// Returns [`crate::BookingError::Transient`] on network or service failure.
    fn check_availability(
        &self,
        activity_id: ActivityId,
        package_id: PackageId,
        date: NaiveDate,
    ) -> BoxFuture<AvailabilityVerdict>;
}

/// Gate in front of the capacity service
///
/// Consulted once when a date is picked and again, authoritatively, right
/// before a reservation is submitted.
#[derive(Clone)]
pub struct AvailabilityGate {
    capacity: Arc<dyn CapacityService>,
}

impl AvailabilityGate {
    /// Creates a gate over a capacity service
    #[must_use]
    pub fn new(capacity: Arc<dyn CapacityService>) -> Self {
        Self { capacity }
    }

    /// Queries capacity for a date
    ///
    /// The verdict's `available` flag means at least one spot is left.
    /// A query failure is an error, never an "unavailable" verdict.
    ///
    /// # Errors
    ///
    /// Returns [`crate::BookingError::Transient`] when the query fails.
    #[tracing::instrument(skip(self))]
    pub async fn check(
        &self,
        activity_id: ActivityId,
        package_id: PackageId,
        date: NaiveDate,
    ) -> BookingResult<AvailabilityVerdict> {
        let mut verdict = self
            .capacity
            .check_availability(activity_id, package_id, date)
            .await
            .inspect_err(|error| tracing::warn!(%error, "Availability query failed"))?;

        verdict.available_spots = verdict.total_availability.saturating_sub(verdict.booked_count);
        verdict.available = verdict.available_spots >= 1;

        tracing::debug!(
            available_spots = verdict.available_spots,
            booked = verdict.booked_count,
            total = verdict.total_availability,
            "Availability checked"
        );
        Ok(verdict)
    }

    /// Whether the remaining spots cover the requested headcount
    #[must_use]
    pub const fn check_sufficient(verdict: &AvailabilityVerdict, requested: u32) -> bool {
        verdict.available_spots >= requested
    }
}
