//! Environment injected into the booking reducers.

use crate::availability::{AvailabilityGate, CapacityService};
use crate::backend::BookingStore;
use crate::offers::{OfferResolver, OfferService};
use std::sync::Arc;
use travel_booking_core::environment::Clock;

/// Collaborators and clock shared by the checkout and lifecycle reducers
#[derive(Clone)]
pub struct BookingEnvironment {
    /// Availability gate over the capacity service
    pub availability: AvailabilityGate,
    /// Offer resolver over the promotions service
    pub offers: OfferResolver,
    /// External booking store
    pub store: Arc<dyn BookingStore>,
    /// Clock for cancellation windows
    pub clock: Arc<dyn Clock>,
}

impl BookingEnvironment {
    /// Creates a `BookingEnvironment`
    #[must_use]
    pub fn new(
        capacity: Arc<dyn CapacityService>,
        offers: Arc<dyn OfferService>,
        store: Arc<dyn BookingStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            availability: AvailabilityGate::new(capacity),
            offers: OfferResolver::new(offers),
            store,
            clock,
        }
    }

    /// Wires every collaborator to one backend implementing all three seams
    #[must_use]
    pub fn from_backend<B>(backend: Arc<B>, clock: Arc<dyn Clock>) -> Self
    where
        B: CapacityService + OfferService + BookingStore + 'static,
    {
        let capacity: Arc<B> = Arc::clone(&backend);
        let offers: Arc<B> = Arc::clone(&backend);
        Self::new(capacity, offers, backend, clock)
    }
}
