//! In-memory collaborators for demos and tests.
//!
//! [`InMemoryBackend`] plays all three external parties: the capacity
//! service, the promotions service and the booking store. It also stands in
//! for the external authority that confirms and completes bookings, and can
//! be told to fail any call.

use crate::availability::CapacityService;
use crate::backend::{BookingStore, BoxFuture, ReservationRequest, Session};
use crate::error::{BookingError, BookingResult};
use crate::offers::OfferService;
use crate::ticket::derive_payload;
use crate::types::{
    ActivityId, AvailabilityVerdict, Booking, BookingId, BookingStatus, ContactDetails, Offer, PackageId,
};
use chrono::NaiveDate;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use travel_booking_core::environment::{Clock, SystemClock};

/// A collaborator call, as recorded by the backend
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `CapacityService::check_availability`
    CheckAvailability,
    /// `OfferService::check_package_offer`
    CheckOffer,
    /// `BookingStore::create_reservation`
    CreateReservation,
    /// `BookingStore::get_booking`
    GetBooking,
    /// `BookingStore::list_bookings`
    ListBookings,
    /// `BookingStore::cancel_booking`
    CancelBooking,
}

/// A promotion as configured by an operator
#[derive(Clone, Debug, PartialEq)]
pub struct OfferRecord {
    /// Activity the offer belongs to
    pub activity_id: ActivityId,
    /// Packages the offer applies to
    pub package_ids: Vec<PackageId>,
    /// Percentage off
    pub discount_percentage: f64,
    /// Promotional title
    pub title: String,
    /// Operator switch
    pub active: bool,
    /// First valid day (inclusive)
    pub valid_from: NaiveDate,
    /// Last valid day (inclusive)
    pub valid_until: NaiveDate,
}

impl OfferRecord {
    fn applies(&self, activity_id: ActivityId, package_id: PackageId, today: NaiveDate) -> bool {
        self.active
            && self.activity_id == activity_id
            && self.valid_from <= today
            && today <= self.valid_until
            && self.package_ids.contains(&package_id)
    }
}

#[derive(Default)]
struct Inner {
    capacities: HashMap<ActivityId, u32>,
    offers: Vec<OfferRecord>,
    bookings: Vec<(String, Booking)>,
    next_id: u64,
    failures: HashMap<Operation, VecDeque<BookingError>>,
    calls: Vec<Operation>,
}

impl Inner {
    fn record(&mut self, operation: Operation) -> BookingResult<()> {
        self.calls.push(operation);
        match self.failures.get_mut(&operation).and_then(VecDeque::pop_front) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn booked_count(&self, activity_id: ActivityId, date: NaiveDate) -> u32 {
        self.bookings
            .iter()
            .map(|(_, booking)| booking)
            .filter(|booking| {
                booking.activity_id == activity_id
                    && booking.booking_date == date
                    && booking.status != BookingStatus::Cancelled
            })
            .fold(0_u32, |acc, booking| acc.saturating_add(booking.party_size()))
    }

    fn owned_mut(&mut self, session: &Session, booking_id: &BookingId) -> BookingResult<&mut Booking> {
        self.bookings
            .iter_mut()
            .find(|(owner, booking)| owner == &session.traveler_email && &booking.id == booking_id)
            .map(|(_, booking)| booking)
            .ok_or_else(|| BookingError::NotFound {
                booking_id: booking_id.clone(),
            })
    }

    fn any_mut(&mut self, booking_id: &BookingId) -> BookingResult<&mut Booking> {
        self.bookings
            .iter_mut()
            .map(|(_, booking)| booking)
            .find(|booking| &booking.id == booking_id)
            .ok_or_else(|| BookingError::NotFound {
                booking_id: booking_id.clone(),
            })
    }
}

/// In-memory capacity, offer and booking-store backend
#[derive(Clone)]
pub struct InMemoryBackend {
    inner: Arc<Mutex<Inner>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryBackend {
    /// Creates an empty backend on the system clock
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates an empty backend on the given clock
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                next_id: 1,
                ..Inner::default()
            })),
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sets an activity's per-date capacity
    #[must_use]
    pub fn with_capacity(self, activity_id: ActivityId, total: u32) -> Self {
        self.set_capacity(activity_id, total);
        self
    }

    /// Sets an activity's per-date capacity
    pub fn set_capacity(&self, activity_id: ActivityId, total: u32) {
        self.lock().capacities.insert(activity_id, total);
    }

    /// Registers a promotion
    pub fn add_offer(&self, offer: OfferRecord) {
        self.lock().offers.push(offer);
    }

    /// Stores a booking as if it had been created earlier
    pub fn insert_booking(&self, traveler_email: &str, booking: Booking) {
        self.lock().bookings.push((traveler_email.to_string(), booking));
    }

    /// Makes the next call of `operation` fail with `error`
    ///
    /// Queued failures are consumed in order, one per call.
    pub fn fail_next(&self, operation: Operation, error: BookingError) {
        self.lock().failures.entry(operation).or_default().push_back(error);
    }

    /// Drops every queued failure
    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    /// Every collaborator call so far, in call order
    #[must_use]
    pub fn calls(&self) -> Vec<Operation> {
        self.lock().calls.clone()
    }

    /// People booked on a date (non-cancelled bookings)
    #[must_use]
    pub fn booked_count(&self, activity_id: ActivityId, date: NaiveDate) -> u32 {
        self.lock().booked_count(activity_id, date)
    }

    /// Confirms a pending booking, as the external authority would
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::NotFound`] for an unknown id and
    /// [`BookingError::Validation`] when the booking is not `PENDING`.
    pub fn confirm(&self, booking_id: &BookingId) -> BookingResult<Booking> {
        self.transition(booking_id, BookingStatus::Confirmed)
    }

    /// Marks a confirmed booking as completed
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::NotFound`] for an unknown id and
    /// [`BookingError::Validation`] when the booking is not `CONFIRMED`.
    pub fn complete(&self, booking_id: &BookingId) -> BookingResult<Booking> {
        self.transition(booking_id, BookingStatus::Completed)
    }

    fn transition(&self, booking_id: &BookingId, next: BookingStatus) -> BookingResult<Booking> {
        let mut inner = self.lock();
        let booking = inner.any_mut(booking_id)?;
        if !booking.status.can_transition_to(next) {
            return Err(BookingError::validation(format!(
                "Cannot move booking {booking_id} from {} to {next}",
                booking.status
            )));
        }
        booking.status = next;
        tracing::info!(%booking_id, status = %next, "Booking status changed");
        Ok(booking.clone())
    }

    fn create(&self, session: &Session, request: ReservationRequest) -> BookingResult<Booking> {
        let now = self.clock.now();
        let mut inner = self.lock();
        inner.record(Operation::CreateReservation)?;

        let requested = request.headcounts.total();
        if requested == 0 {
            return Err(BookingError::validation("At least one traveler is required"));
        }
        let total = inner
            .capacities
            .get(&request.activity_id)
            .copied()
            .ok_or_else(|| BookingError::validation("Activity not found"))?;
        let available = total.saturating_sub(inner.booked_count(request.activity_id, request.booking_date));
        if available < requested {
            return Err(BookingError::AvailabilityConflict { available, requested });
        }

        let sequence = inner.next_id;
        inner.next_id += 1;

        let mut booking = Booking {
            id: BookingId::new(format!("TICK-{sequence}")),
            order_number: Some(format!("ORD-{sequence}")),
            activity_id: request.activity_id,
            package_id: Some(request.package_id),
            package_name: Some(request.package_name),
            title: request.title,
            location: request.location,
            booking_date: request.booking_date,
            booked_at: Some(now.naive_utc()),
            status: BookingStatus::Pending,
            price: Some(request.price),
            total_price: request.price.total,
            total_persons: requested,
            headcounts: request.headcounts,
            payment_method: request.payment_method,
            contact: ContactDetails {
                email: request.contact_email.or_else(|| Some(session.traveler_email.clone())),
                phone: request.contact_phone,
            },
            description: request.description,
            ticket_instructions: request.ticket_instructions,
            itinerary: request.itinerary,
            cancellation_policy: request.cancellation_policy,
            qr_code_data: None,
        };
        booking.qr_code_data = Some(derive_payload(&booking));

        tracing::info!(booking_id = %booking.id, requested, available, "Reservation stored");
        inner.bookings.push((session.traveler_email.clone(), booking.clone()));
        Ok(booking)
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CapacityService for InMemoryBackend {
    fn check_availability(
        &self,
        activity_id: ActivityId,
        _package_id: PackageId,
        date: NaiveDate,
    ) -> BoxFuture<AvailabilityVerdict> {
        let today = self.clock.today();
        let result = {
            let mut inner = self.lock();
            inner.record(Operation::CheckAvailability).and_then(|()| {
                if date < today {
                    return Err(BookingError::validation("Cannot book for past dates"));
                }
                let total = inner
                    .capacities
                    .get(&activity_id)
                    .copied()
                    .ok_or_else(|| BookingError::validation("Activity not found"))?;
                Ok(AvailabilityVerdict::from_counts(
                    total,
                    inner.booked_count(activity_id, date),
                    1,
                ))
            })
        };
        Box::pin(async move { result })
    }
}

impl OfferService for InMemoryBackend {
    fn check_package_offer(&self, activity_id: ActivityId, package_id: PackageId) -> BoxFuture<Option<Offer>> {
        let today = self.clock.today();
        let result = {
            let mut inner = self.lock();
            inner.record(Operation::CheckOffer).map(|()| {
                inner
                    .offers
                    .iter()
                    .filter(|offer| offer.applies(activity_id, package_id, today))
                    .max_by(|a, b| a.discount_percentage.total_cmp(&b.discount_percentage))
                    .map(|best| Offer::percent(best.discount_percentage, best.title.clone()))
            })
        };
        Box::pin(async move { result })
    }
}

impl BookingStore for InMemoryBackend {
    fn create_reservation(&self, session: &Session, request: ReservationRequest) -> BoxFuture<Booking> {
        let result = self.create(session, request);
        Box::pin(async move { result })
    }

    fn get_booking(&self, session: &Session, booking_id: &BookingId) -> BoxFuture<Booking> {
        let result = {
            let mut inner = self.lock();
            inner
                .record(Operation::GetBooking)
                .and_then(|()| inner.owned_mut(session, booking_id).map(|booking| booking.clone()))
        };
        Box::pin(async move { result })
    }

    fn list_bookings(&self, session: &Session, status: Option<BookingStatus>) -> BoxFuture<Vec<Booking>> {
        let result = {
            let mut inner = self.lock();
            inner.record(Operation::ListBookings).map(|()| {
                inner
                    .bookings
                    .iter()
                    .rev()
                    .filter(|(owner, booking)| {
                        owner == &session.traveler_email && status.is_none_or(|wanted| booking.status == wanted)
                    })
                    .map(|(_, booking)| booking.clone())
                    .collect()
            })
        };
        Box::pin(async move { result })
    }

    fn cancel_booking(&self, session: &Session, booking_id: &BookingId) -> BoxFuture<Booking> {
        let result = {
            let mut inner = self.lock();
            inner.record(Operation::CancelBooking).and_then(|()| {
                let booking = inner.owned_mut(session, booking_id)?;
                if !booking.status.can_transition_to(BookingStatus::Cancelled) {
                    return Err(BookingError::CancellationIneligible {
                        reason: format!("Booking {booking_id} is already {}", booking.status),
                    });
                }
                booking.status = BookingStatus::Cancelled;
                Ok(booking.clone())
            })
        };
        Box::pin(async move { result })
    }
}
