//! Collaborator seams shared by every backend.
//!
//! The booking record lives in an external booking store. The engine talks
//! to it, and to the capacity and offer services, through the traits in
//! this crate. Each call takes the caller's [`Session`] explicitly; nothing
//! here reads an ambient "current user".

use crate::error::BookingResult;
use crate::types::{
    ActivityId, Booking, BookingId, BookingStatus, HeadcountSelection, Offer, PackageId, PriceBreakdown,
};
use chrono::NaiveDate;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by collaborator traits
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = BookingResult<T>> + Send>>;

/// Caller identity passed into every store call
#[derive(Clone, Debug)]
pub struct Session {
    /// Traveler's email, used by the store to scope bookings
    pub traveler_email: String,
    /// Bearer token
    pub token: SecretString,
}

impl Session {
    /// Creates a session
    #[must_use]
    pub fn new(traveler_email: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            traveler_email: traveler_email.into(),
            token: SecretString::from(token.into()),
        }
    }
}

/// Everything the store needs to create a reservation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReservationRequest {
    /// Activity being booked
    pub activity_id: ActivityId,
    /// Package being booked
    pub package_id: PackageId,
    /// Package display name
    pub package_name: String,
    /// Activity title
    pub title: String,
    /// Activity location
    pub location: String,
    /// Travel date
    pub booking_date: NaiveDate,
    /// Party by category
    pub headcounts: HeadcountSelection,
    /// Price as computed at submission
    pub price: PriceBreakdown,
    /// Offer applied to `price`
    pub offer: Option<Offer>,
    /// Display-only payment method label
    pub payment_method: Option<String>,
    /// Contact email
    pub contact_email: Option<String>,
    /// Contact phone
    pub contact_phone: Option<String>,
    /// Activity description
    pub description: Option<String>,
    /// Itinerary text
    pub itinerary: Option<String>,
    /// Visitor instructions
    pub ticket_instructions: Option<String>,
    /// Cancellation policy text
    pub cancellation_policy: Option<String>,
}

/// External booking store
pub trait BookingStore: Send + Sync {
    /// Creates a reservation; the store assigns id, order number and `PENDING` status
    ///
    /// # Errors
    ///
    /// Returns [`crate::BookingError::Transient`] when the store cannot be reached.
    fn create_reservation(&self, session: &Session, request: ReservationRequest) -> BoxFuture<Booking>;

    /// Reads one booking
    ///
    /// # Errors
    ///
    /// Returns [`crate::BookingError::NotFound`] for an unknown id.
    fn get_booking(&self, session: &Session, booking_id: &BookingId) -> BoxFuture<Booking>;

    /// Lists the session's bookings, optionally filtered by status
    ///
    /// # Errors
    ///
    /// Returns [`crate::BookingError::Transient`] when the store cannot be reached.
    fn list_bookings(&self, session: &Session, status: Option<BookingStatus>) -> BoxFuture<Vec<Booking>>;

    /// Cancels a booking and returns the updated record
    ///
    /// # Errors
    ///
    /// Returns [`crate::BookingError::NotFound`] for an unknown id, or
    /// [`crate::BookingError::Transient`] when the store cannot be reached.
    fn cancel_booking(&self, session: &Session, booking_id: &BookingId) -> BoxFuture<Booking>;
}
