//! Booking lifecycle: cancellation eligibility and the traveler's booking list.
//!
//! Confirmation and completion are made by an external authority. The only
//! transition originated here is the traveler's cancellation request, which
//! is gated locally before the store is ever contacted.

use crate::backend::Session;
use crate::environment::BookingEnvironment;
use crate::error::BookingError;
use crate::types::{Booking, BookingId, BookingStatus};
use chrono::NaiveDate;
use std::collections::HashSet;
use travel_booking_core::{effect::Effect, reducer::Reducer, smallvec, SmallVec};

/// Minimum whole calendar days between today and the travel date for a cancellation
pub const CANCELLATION_WINDOW_DAYS: i64 = 3;

/// Whole calendar days from `today` until `travel_date` (negative once past)
#[must_use]
pub fn days_until(today: NaiveDate, travel_date: NaiveDate) -> i64 {
    travel_date.signed_duration_since(today).num_days()
}

/// Whether `booking` may be cancelled on `today`
///
/// Only `PENDING` and `CONFIRMED` bookings at least three calendar days
/// ahead qualify.
#[must_use]
pub fn can_cancel(booking: &Booking, today: NaiveDate) -> bool {
    ineligibility(booking, today).is_none()
}

fn ineligibility(booking: &Booking, today: NaiveDate) -> Option<String> {
    if !booking.status.can_transition_to(BookingStatus::Cancelled) {
        return Some(format!(
            "Booking {} is {} and can no longer be cancelled",
            booking.id, booking.status
        ));
    }

    let days = days_until(today, booking.booking_date);
    if days < CANCELLATION_WINDOW_DAYS {
        return Some(format!(
            "Cancellations must be made at least {CANCELLATION_WINDOW_DAYS} days before the activity \
             ({days} days remaining)"
        ));
    }
    None
}

// ============================================================================
// State
// ============================================================================

/// Number of bookings per status
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatusCounts {
    /// `PENDING`
    pub pending: usize,
    /// `CONFIRMED`
    pub confirmed: usize,
    /// `COMPLETED`
    pub completed: usize,
    /// `CANCELLED`
    pub cancelled: usize,
}

impl StatusCounts {
    /// Counts a booking list
    #[must_use]
    pub fn from_bookings(bookings: &[Booking]) -> Self {
        bookings.iter().fold(Self::default(), |mut counts, booking| {
            match booking.status {
                BookingStatus::Pending => counts.pending += 1,
                BookingStatus::Confirmed => counts.confirmed += 1,
                BookingStatus::Completed => counts.completed += 1,
                BookingStatus::Cancelled => counts.cancelled += 1,
            }
            counts
        })
    }

    /// Count for one status
    #[must_use]
    pub const fn get(&self, status: BookingStatus) -> usize {
        match status {
            BookingStatus::Pending => self.pending,
            BookingStatus::Confirmed => self.confirmed,
            BookingStatus::Completed => self.completed,
            BookingStatus::Cancelled => self.cancelled,
        }
    }

    /// Sum over all statuses
    #[must_use]
    pub const fn total(&self) -> usize {
        self.pending + self.confirmed + self.completed + self.cancelled
    }

    /// Moves one booking from `from` to `to`
    pub fn shift(&mut self, from: BookingStatus, to: BookingStatus) {
        let source = self.slot(from);
        *source = source.saturating_sub(1);
        *self.slot(to) += 1;
    }

    fn slot(&mut self, status: BookingStatus) -> &mut usize {
        match status {
            BookingStatus::Pending => &mut self.pending,
            BookingStatus::Confirmed => &mut self.confirmed,
            BookingStatus::Completed => &mut self.completed,
            BookingStatus::Cancelled => &mut self.cancelled,
        }
    }
}

/// A traveler's bookings as last read from the store
#[derive(Clone, Debug, Default)]
pub struct LifecycleState {
    /// Bookings, in store order
    pub bookings: Vec<Booking>,
    /// Status filter of the last load; `None` when `bookings` is the full list
    pub filter: Option<BookingStatus>,
    /// Aggregate over the traveler's full list
    ///
    /// Only an unfiltered load recomputes it; a filtered view would
    /// otherwise report zero for every other status.
    pub counts: StatusCounts,
    /// Bookings with a cancellation request in flight
    pub cancelling: HashSet<BookingId>,
    /// Last error (for UI feedback)
    pub last_error: Option<BookingError>,
}

impl LifecycleState {
    /// Creates an empty state
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a booking
    #[must_use]
    pub fn get(&self, booking_id: &BookingId) -> Option<&Booking> {
        self.bookings.iter().find(|booking| &booking.id == booking_id)
    }

    /// Bookings with a given status
    pub fn with_status(&self, status: BookingStatus) -> impl Iterator<Item = &Booking> {
        self.bookings.iter().filter(move |booking| booking.status == status)
    }

    /// Whether a cancellation for `booking_id` is in flight
    #[must_use]
    pub fn is_cancelling(&self, booking_id: &BookingId) -> bool {
        self.cancelling.contains(booking_id)
    }

    fn refresh_counts(&mut self) {
        self.counts = StatusCounts::from_bookings(&self.bookings);
    }
}

// ============================================================================
// Actions
// ============================================================================

/// Actions for the booking lifecycle
#[derive(Clone, Debug)]
pub enum LifecycleAction {
    // Commands
    /// Read the traveler's bookings from the store
    LoadBookings {
        /// Caller identity
        session: Session,
        /// Optional status filter
        status: Option<BookingStatus>,
    },

    /// Ask the store to cancel a booking
    CancelBooking {
        /// Booking to cancel
        booking_id: BookingId,
        /// Caller identity
        session: Session,
    },

    // Events
    /// The store returned the traveler's bookings
    BookingsLoaded {
        /// Bookings read from the store
        bookings: Vec<Booking>,
        /// Filter the list was read with
        status: Option<BookingStatus>,
    },

    /// The booking list could not be read
    LoadFailed {
        /// Failure
        error: BookingError,
    },

    /// The store acknowledged a cancellation
    CancellationConfirmed {
        /// Updated record from the store
        booking: Booking,
    },

    /// The store rejected or failed a cancellation
    CancellationFailed {
        /// Booking whose cancellation failed
        booking_id: BookingId,
        /// Failure
        error: BookingError,
    },

    /// The cancellation was refused locally
    CancellationRejected {
        /// Booking the traveler tried to cancel
        booking_id: BookingId,
        /// Why it was refused
        error: BookingError,
    },
}

// ============================================================================
// Reducer
// ============================================================================

/// Reducer for the traveler's booking list and cancellations
#[derive(Clone, Debug)]
pub struct BookingLifecycleReducer;

impl BookingLifecycleReducer {
    /// Creates a new `BookingLifecycleReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn validate_cancel(state: &LifecycleState, booking_id: &BookingId, today: NaiveDate) -> Result<(), BookingError> {
        let Some(booking) = state.get(booking_id) else {
            return Err(BookingError::NotFound {
                booking_id: booking_id.clone(),
            });
        };

        if state.is_cancelling(booking_id) {
            return Err(BookingError::validation(format!(
                "Cancellation of {booking_id} is already in progress"
            )));
        }

        match ineligibility(booking, today) {
            Some(reason) => Err(BookingError::CancellationIneligible { reason }),
            None => Ok(()),
        }
    }

    fn apply_event(state: &mut LifecycleState, action: &LifecycleAction) {
        match action {
            // In-flight cancellations survive a reload; only their outcome clears them
            LifecycleAction::BookingsLoaded { bookings, status } => {
                state.bookings.clone_from(bookings);
                state.filter = *status;
                if status.is_none() {
                    state.refresh_counts();
                }
                state.last_error = None;
            },
            LifecycleAction::LoadFailed { error } => {
                state.last_error = Some(error.clone());
            },
            LifecycleAction::CancellationConfirmed { booking } => {
                state.cancelling.remove(&booking.id);
                let mut cancelled = booking.clone();
                cancelled.status = BookingStatus::Cancelled;
                let previous = match state.bookings.iter_mut().find(|existing| existing.id == booking.id) {
                    Some(existing) => Some(std::mem::replace(existing, cancelled).status),
                    None => {
                        if state.filter.is_none_or(|filter| filter == BookingStatus::Cancelled) {
                            state.bookings.push(cancelled);
                        }
                        None
                    },
                };
                match (state.filter, previous) {
                    (None, _) => state.refresh_counts(),
                    (Some(_), Some(previous)) => state.counts.shift(previous, BookingStatus::Cancelled),
                    (Some(_), None) => {},
                }
                state.last_error = None;
            },
            LifecycleAction::CancellationFailed { booking_id, error } => {
                state.cancelling.remove(booking_id);
                state.last_error = Some(error.clone());
            },
            LifecycleAction::CancellationRejected { error, .. } => {
                state.last_error = Some(error.clone());
            },
            // Commands don't modify state
            LifecycleAction::LoadBookings { .. } | LifecycleAction::CancelBooking { .. } => {},
        }
    }
}

impl Default for BookingLifecycleReducer {
    fn default() -> Self {
        Self::new()
    }
}

impl Reducer for BookingLifecycleReducer {
    type State = LifecycleState;
    type Action = LifecycleAction;
    type Environment = BookingEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            LifecycleAction::LoadBookings { session, status } => {
                let store = env.store.clone();
                smallvec![Effect::future(async move {
                    match store.list_bookings(&session, status).await {
                        Ok(bookings) => Some(LifecycleAction::BookingsLoaded { bookings, status }),
                        Err(error) => {
                            tracing::warn!(%error, "Failed to load bookings");
                            Some(LifecycleAction::LoadFailed { error })
                        },
                    }
                })]
            },

            LifecycleAction::CancelBooking { booking_id, session } => {
                let today = env.clock.today();
                if let Err(error) = Self::validate_cancel(state, &booking_id, today) {
                    tracing::info!(%booking_id, %error, "Cancellation refused locally");
                    Self::apply_event(state, &LifecycleAction::CancellationRejected { booking_id, error });
                    return SmallVec::new();
                }

                state.cancelling.insert(booking_id.clone());
                state.last_error = None;
                tracing::info!(%booking_id, "Requesting cancellation");

                let store = env.store.clone();
                smallvec![Effect::future(async move {
                    match store.cancel_booking(&session, &booking_id).await {
                        Ok(booking) => {
                            metrics::counter!("booking.cancellations.total").increment(1);
                            Some(LifecycleAction::CancellationConfirmed { booking })
                        },
                        Err(error) => {
                            tracing::warn!(%booking_id, %error, "Cancellation failed");
                            Some(LifecycleAction::CancellationFailed { booking_id, error })
                        },
                    }
                })]
            },

            event @ (LifecycleAction::BookingsLoaded { .. }
            | LifecycleAction::LoadFailed { .. }
            | LifecycleAction::CancellationConfirmed { .. }
            | LifecycleAction::CancellationFailed { .. }
            | LifecycleAction::CancellationRejected { .. }) => {
                Self::apply_event(state, &event);
                SmallVec::new()
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::memory::InMemoryBackend;
    use crate::test_support::{booking_on, session};
    use std::sync::Arc;
    use travel_booking_testing::{assertions, clock_on, ReducerTest};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
    }

    fn env() -> BookingEnvironment {
        BookingEnvironment::from_backend(Arc::new(InMemoryBackend::new()), Arc::new(clock_on(2025, 3, 1)))
    }

    fn state_with(bookings: Vec<Booking>) -> LifecycleState {
        let mut state = LifecycleState::new();
        BookingLifecycleReducer::apply_event(&mut state, &LifecycleAction::BookingsLoaded {
            bookings,
            status: None,
        });
        state
    }

    #[test]
    fn test_pending_three_days_ahead_can_cancel() {
        let booking = booking_on("TICK-1", BookingStatus::Pending, today() + chrono::Days::new(3));
        assert!(can_cancel(&booking, today()));
    }

    #[test]
    fn test_confirmed_two_days_ahead_cannot_cancel() {
        let booking = booking_on("TICK-1", BookingStatus::Confirmed, today() + chrono::Days::new(2));
        assert!(!can_cancel(&booking, today()));
    }

    #[test]
    fn test_terminal_bookings_never_cancel() {
        let far = today() + chrono::Days::new(30);
        assert!(!can_cancel(&booking_on("TICK-1", BookingStatus::Cancelled, far), today()));
        assert!(!can_cancel(&booking_on("TICK-2", BookingStatus::Completed, far), today()));
    }

    #[test]
    fn test_status_counts() {
        let date = today() + chrono::Days::new(10);
        let counts = StatusCounts::from_bookings(&[
            booking_on("TICK-1", BookingStatus::Pending, date),
            booking_on("TICK-2", BookingStatus::Confirmed, date),
            booking_on("TICK-3", BookingStatus::Confirmed, date),
            booking_on("TICK-4", BookingStatus::Cancelled, date),
        ]);
        assert_eq!(counts.get(BookingStatus::Confirmed), 2);
        assert_eq!(counts.completed, 0);
        assert_eq!(counts.total(), 4);
    }

    #[test]
    fn test_ineligible_cancel_is_rejected_without_effects() {
        let booking_id = BookingId::new("TICK-1");
        let state = state_with(vec![booking_on(
            "TICK-1",
            BookingStatus::Confirmed,
            today() + chrono::Days::new(2),
        )]);

        ReducerTest::new(BookingLifecycleReducer::new())
            .with_env(env())
            .given_state(state)
            .when_action(LifecycleAction::CancelBooking {
                booking_id: booking_id.clone(),
                session: session(),
            })
            .then_state(move |state| {
                assert!(matches!(
                    state.last_error,
                    Some(BookingError::CancellationIneligible { .. })
                ));
                assert!(!state.is_cancelling(&booking_id));
                assert_eq!(state.counts.confirmed, 1);
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn test_eligible_cancel_marks_in_flight_and_calls_store() {
        let booking_id = BookingId::new("TICK-1");
        let state = state_with(vec![booking_on(
            "TICK-1",
            BookingStatus::Pending,
            today() + chrono::Days::new(3),
        )]);

        ReducerTest::new(BookingLifecycleReducer::new())
            .with_env(env())
            .given_state(state)
            .when_action(LifecycleAction::CancelBooking {
                booking_id: booking_id.clone(),
                session: session(),
            })
            .then_state(move |state| {
                assert!(state.is_cancelling(&booking_id));
                assert_eq!(state.get(&booking_id).unwrap().status, BookingStatus::Pending);
            })
            .then_effects(assertions::assert_has_future_effect)
            .run();
    }

    #[test]
    fn test_second_cancel_while_in_flight_is_rejected() {
        let booking_id = BookingId::new("TICK-1");
        let mut state = state_with(vec![booking_on(
            "TICK-1",
            BookingStatus::Pending,
            today() + chrono::Days::new(5),
        )]);
        state.cancelling.insert(booking_id.clone());

        ReducerTest::new(BookingLifecycleReducer::new())
            .with_env(env())
            .given_state(state)
            .when_action(LifecycleAction::CancelBooking {
                booking_id,
                session: session(),
            })
            .then_state(|state| {
                assert!(matches!(state.last_error, Some(BookingError::Validation(_))));
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn test_confirmation_transitions_and_refreshes_counts() {
        let date = today() + chrono::Days::new(7);
        let booking = booking_on("TICK-1", BookingStatus::Confirmed, date);
        let mut state = state_with(vec![booking.clone(), booking_on("TICK-2", BookingStatus::Pending, date)]);
        state.cancelling.insert(booking.id.clone());

        ReducerTest::new(BookingLifecycleReducer::new())
            .with_env(env())
            .given_state(state)
            .when_action(LifecycleAction::CancellationConfirmed { booking })
            .then_state(|state| {
                let id = BookingId::new("TICK-1");
                assert_eq!(state.get(&id).unwrap().status, BookingStatus::Cancelled);
                assert!(!state.is_cancelling(&id));
                assert_eq!(state.counts.confirmed, 0);
                assert_eq!(state.counts.cancelled, 1);
                assert_eq!(state.counts.pending, 1);
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn test_failed_cancellation_leaves_status_unchanged() {
        let booking_id = BookingId::new("TICK-1");
        let mut state = state_with(vec![booking_on(
            "TICK-1",
            BookingStatus::Confirmed,
            today() + chrono::Days::new(7),
        )]);
        state.cancelling.insert(booking_id.clone());

        ReducerTest::new(BookingLifecycleReducer::new())
            .with_env(env())
            .given_state(state)
            .when_action(LifecycleAction::CancellationFailed {
                booking_id: booking_id.clone(),
                error: BookingError::transient(crate::error::Collaborator::BookingStore, "503"),
            })
            .then_state(move |state| {
                assert_eq!(state.get(&booking_id).unwrap().status, BookingStatus::Confirmed);
                assert!(!state.is_cancelling(&booking_id));
                assert!(state.last_error.as_ref().unwrap().is_retryable());
            })
            .run();
    }

    #[test]
    fn test_filtered_load_keeps_full_counts() {
        let date = today() + chrono::Days::new(10);
        let cancelled = booking_on("TICK-4", BookingStatus::Cancelled, date);
        let state = state_with(vec![
            booking_on("TICK-1", BookingStatus::Pending, date),
            booking_on("TICK-2", BookingStatus::Confirmed, date),
            booking_on("TICK-3", BookingStatus::Confirmed, date),
            cancelled.clone(),
        ]);

        ReducerTest::new(BookingLifecycleReducer::new())
            .with_env(env())
            .given_state(state)
            .when_action(LifecycleAction::BookingsLoaded {
                bookings: vec![cancelled],
                status: Some(BookingStatus::Cancelled),
            })
            .then_state(|state| {
                assert_eq!(state.bookings.len(), 1);
                assert_eq!(state.filter, Some(BookingStatus::Cancelled));
                assert_eq!(state.counts.pending, 1);
                assert_eq!(state.counts.confirmed, 2);
                assert_eq!(state.counts.cancelled, 1);
                assert_eq!(state.counts.total(), 4);
            })
            .run();
    }

    #[test]
    fn test_confirmation_in_filtered_view_shifts_counts() {
        let date = today() + chrono::Days::new(10);
        let pending = booking_on("TICK-1", BookingStatus::Pending, date);
        let mut state = state_with(vec![
            pending.clone(),
            booking_on("TICK-2", BookingStatus::Confirmed, date),
        ]);
        BookingLifecycleReducer::apply_event(
            &mut state,
            &LifecycleAction::BookingsLoaded {
                bookings: vec![pending.clone()],
                status: Some(BookingStatus::Pending),
            },
        );
        state.cancelling.insert(pending.id.clone());

        ReducerTest::new(BookingLifecycleReducer::new())
            .with_env(env())
            .given_state(state)
            .when_action(LifecycleAction::CancellationConfirmed { booking: pending })
            .then_state(|state| {
                assert_eq!(state.counts.pending, 0);
                assert_eq!(state.counts.confirmed, 1);
                assert_eq!(state.counts.cancelled, 1);
                assert_eq!(state.counts.total(), 2);
            })
            .run();
    }

    #[test]
    fn test_reload_keeps_cancellation_in_flight() {
        let booking_id = BookingId::new("TICK-1");
        let booking = booking_on("TICK-1", BookingStatus::Confirmed, today() + chrono::Days::new(7));
        let mut state = state_with(vec![booking.clone()]);
        state.cancelling.insert(booking_id.clone());
        BookingLifecycleReducer::apply_event(
            &mut state,
            &LifecycleAction::BookingsLoaded {
                bookings: vec![booking],
                status: None,
            },
        );
        assert!(state.is_cancelling(&booking_id));

        ReducerTest::new(BookingLifecycleReducer::new())
            .with_env(env())
            .given_state(state)
            .when_action(LifecycleAction::CancelBooking {
                booking_id: booking_id.clone(),
                session: session(),
            })
            .then_state(move |state| {
                assert!(state.is_cancelling(&booking_id));
                assert!(matches!(state.last_error, Some(BookingError::Validation(_))));
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }
}
