//! # Travel Booking
//!
//! Reservation, pricing, cancellation and ticket engine for time-boxed
//! travel activities, built on the reducer architecture of
//! [`travel_booking_core`] and [`travel_booking_runtime`].
//!
//! - **Pricing**: category-weighted subtotal, 5% service fee and 15% tax on
//!   the undiscounted subtotal, offer discount on the subtotal only.
//! - **Availability**: a fixed per-date capacity, checked when a date is
//!   picked and again right before the reservation is created.
//! - **Lifecycle**: `PENDING → CONFIRMED → COMPLETED`, with cancellation
//!   allowed up to three calendar days before travel.
//! - **Tickets**: a reproducible scan payload and a printable document,
//!   shown only once the booking is confirmed.
//!
//! # Architecture
//!
//! ```text
//!   CheckoutReducer ───────┐                        ┌── CapacityService
//!                          ├── BookingEnvironment ──┼── OfferService
//!   BookingLifecycleReducer┘                        └── BookingStore
//!                                                          │
//!                                         HttpBackend / InMemoryBackend
//!
//!   TicketArtifactGenerator: Booking → TicketDocument (pure)
//! ```
//!
//! Every store call takes an explicit [`Session`]; no module reads an
//! ambient "current user".

#![forbid(unsafe_code)]

pub mod availability;
pub mod backend;
pub mod checkout;
pub mod config;
pub mod environment;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod memory;
pub mod offers;
pub mod pricing;
pub mod ticket;
pub mod types;

#[cfg(test)]
mod test_support;

pub use availability::{AvailabilityGate, CapacityService};
pub use backend::{BookingStore, BoxFuture, ReservationRequest, Session};
pub use checkout::{CheckoutAction, CheckoutReducer, CheckoutState};
pub use config::Config;
pub use environment::BookingEnvironment;
pub use error::{BookingError, BookingResult, Collaborator};
pub use http::HttpBackend;
pub use lifecycle::{BookingLifecycleReducer, LifecycleAction, LifecycleState, StatusCounts, can_cancel};
pub use memory::{InMemoryBackend, OfferRecord, Operation};
pub use offers::{OfferResolver, OfferService};
pub use pricing::PriceCalculator;
pub use ticket::{PayloadSource, ScanRejection, TicketArtifactGenerator, TicketDocument, verify_scan};
pub use types::{
    ActivityId, Amount, AvailabilityVerdict, Booking, BookingId, BookingStatus, ContactDetails, HeadcountSelection,
    Offer, Package, PackageId, PriceBreakdown, RateCard, TravelerCategory,
};
