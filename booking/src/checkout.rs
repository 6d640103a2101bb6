//! Checkout: from package selection to a reservation in the booking store.
//!
//! The offer and availability are looked up when the traveler picks a
//! package and a date. On submit the availability is checked again and the
//! reservation is only created once that second check has passed. Both
//! calls run inside one effect, so they cannot race each other.

use crate::availability::AvailabilityGate;
use crate::backend::{ReservationRequest, Session};
use crate::environment::BookingEnvironment;
use crate::error::BookingError;
use crate::pricing::PriceCalculator;
use crate::types::{
    AvailabilityVerdict, Booking, ContactDetails, HeadcountSelection, Offer, Package, PackageId, PriceBreakdown,
    TravelerCategory,
};
use chrono::NaiveDate;
use travel_booking_core::{effect::Effect, reducer::Reducer, smallvec, SmallVec};

// ============================================================================
// State
// ============================================================================

/// A traveler's checkout session
#[derive(Clone, Debug, Default)]
pub struct CheckoutState {
    /// Selected package
    pub package: Option<Package>,
    /// Offer resolved for the selected package
    pub offer: Option<Offer>,
    /// Selected travel date
    pub date: Option<NaiveDate>,
    /// Latest informational availability verdict for `date`
    pub availability: Option<AvailabilityVerdict>,
    /// Party by category
    pub headcounts: HeadcountSelection,
    /// Contact details for the reservation
    pub contact: ContactDetails,
    /// Display-only payment method label
    pub payment_method: Option<String>,
    /// An informational availability query is in flight
    pub checking_availability: bool,
    /// A submission is in flight
    pub submitting: bool,
    /// Reservation created by the booking store
    pub reservation: Option<Booking>,
    /// Last error (for UI feedback)
    pub last_error: Option<BookingError>,
}

impl CheckoutState {
    /// Creates an empty checkout
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current price, once a package is selected
    #[must_use]
    pub fn price(&self) -> Option<PriceBreakdown> {
        self.package
            .as_ref()
            .map(|package| PriceCalculator::compute(&self.headcounts, &package.rate_card, self.offer.as_ref()))
    }

    /// The created reservation, if any
    #[must_use]
    pub const fn reservation(&self) -> Option<&Booking> {
        self.reservation.as_ref()
    }

    /// Whether the checkout control should be enabled
    #[must_use]
    pub fn can_submit(&self) -> bool {
        !self.submitting
            && !self.checking_availability
            && self.reservation.is_none()
            && self.package.is_some()
            && self.date.is_some()
            && !self.headcounts.is_empty()
    }
}

// ============================================================================
// Actions
// ============================================================================

/// Actions for the checkout flow
#[derive(Clone, Debug)]
pub enum CheckoutAction {
    // Commands
    /// Pick a package; resolves its offer
    SelectPackage {
        /// Package listing
        package: Package,
    },

    /// Pick a travel date; checks availability
    SelectDate {
        /// Travel date
        date: NaiveDate,
    },

    /// Set the count for one traveler category
    SetHeadcount {
        /// Category
        category: TravelerCategory,
        /// New count
        count: u32,
    },

    /// Set contact details
    SetContact {
        /// Contact details
        contact: ContactDetails,
    },

    /// Set the display-only payment method label
    SetPaymentMethod {
        /// Label, e.g. "Visa ending 4242"
        label: String,
    },

    /// Re-check availability and create the reservation
    Submit {
        /// Caller identity
        session: Session,
    },

    // Events
    /// Offer lookup finished
    OfferResolved {
        /// Package the lookup was for
        package_id: PackageId,
        /// Applicable offer
        offer: Option<Offer>,
    },

    /// Offer lookup failed
    OfferLookupFailed {
        /// Package the lookup was for
        package_id: PackageId,
        /// Failure
        error: BookingError,
    },

    /// Informational availability check finished
    AvailabilityChecked {
        /// Date the check was for
        date: NaiveDate,
        /// Verdict
        verdict: AvailabilityVerdict,
    },

    /// Informational availability check failed
    AvailabilityCheckFailed {
        /// Date the check was for
        date: NaiveDate,
        /// Failure
        error: BookingError,
    },

    /// The booking store created the reservation
    ReservationCreated {
        /// Created booking
        booking: Booking,
    },

    /// Submission failed (re-check, capacity or store)
    CheckoutFailed {
        /// Failure
        error: BookingError,
    },

    /// A command was rejected before any call was made
    ValidationFailed {
        /// Why
        error: BookingError,
    },
}

// ============================================================================
// Reducer
// ============================================================================

/// Reducer for the checkout flow
#[derive(Clone, Debug)]
pub struct CheckoutReducer;

impl CheckoutReducer {
    /// Creates a new `CheckoutReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn ensure_idle(state: &CheckoutState) -> Result<(), BookingError> {
        if state.submitting {
            return Err(BookingError::validation("A checkout is already in progress"));
        }
        if state.reservation.is_some() {
            return Err(BookingError::validation("This checkout already has a reservation"));
        }
        Ok(())
    }

    fn validate_submit(state: &CheckoutState) -> Result<(&Package, NaiveDate), BookingError> {
        Self::ensure_idle(state)?;
        if state.checking_availability {
            return Err(BookingError::validation(
                "Availability is still being checked for the selected date",
            ));
        }
        let Some(package) = state.package.as_ref() else {
            return Err(BookingError::validation("Please select a package"));
        };
        let Some(date) = state.date else {
            return Err(BookingError::validation("Please select a travel date"));
        };
        if state.headcounts.is_empty() {
            return Err(BookingError::validation("Please add at least one traveler"));
        }
        package.rate_card.validate()?;
        Ok((package, date))
    }

    fn reservation_request(state: &CheckoutState, package: &Package, date: NaiveDate) -> ReservationRequest {
        ReservationRequest {
            activity_id: package.activity_id,
            package_id: package.id,
            package_name: package.name.clone(),
            title: package.activity_title.clone(),
            location: package.location.clone(),
            booking_date: date,
            headcounts: state.headcounts,
            price: PriceCalculator::compute(&state.headcounts, &package.rate_card, state.offer.as_ref()),
            offer: state.offer.clone(),
            payment_method: state.payment_method.clone(),
            contact_email: state.contact.email.clone(),
            contact_phone: state.contact.phone.clone(),
            description: package.description.clone(),
            itinerary: package.itinerary.clone(),
            ticket_instructions: None,
            cancellation_policy: None,
        }
    }

    fn apply_event(state: &mut CheckoutState, action: &CheckoutAction) {
        match action {
            CheckoutAction::OfferResolved { package_id, offer } => {
                if state.package.as_ref().is_some_and(|p| p.id == *package_id) {
                    state.offer.clone_from(offer);
                }
            },
            CheckoutAction::OfferLookupFailed { package_id, error } => {
                if state.package.as_ref().is_some_and(|p| p.id == *package_id) {
                    state.offer = None;
                    state.last_error = Some(error.clone());
                }
            },
            CheckoutAction::AvailabilityChecked { date, verdict } => {
                if state.date == Some(*date) {
                    state.checking_availability = false;
                    state.availability = Some(verdict.clone());
                    if !verdict.available {
                        state.date = None;
                    }
                    state.last_error = None;
                }
            },
            CheckoutAction::AvailabilityCheckFailed { date, error } => {
                if state.date == Some(*date) {
                    state.checking_availability = false;
                    state.last_error = Some(error.clone());
                }
            },
            CheckoutAction::ReservationCreated { booking } => {
                state.submitting = false;
                state.reservation = Some(booking.clone());
                state.last_error = None;
            },
            CheckoutAction::CheckoutFailed { error } => {
                state.submitting = false;
                state.last_error = Some(error.clone());
            },
            CheckoutAction::ValidationFailed { error } => {
                state.last_error = Some(error.clone());
            },
            // Commands are applied in `reduce`
            CheckoutAction::SelectPackage { .. }
            | CheckoutAction::SelectDate { .. }
            | CheckoutAction::SetHeadcount { .. }
            | CheckoutAction::SetContact { .. }
            | CheckoutAction::SetPaymentMethod { .. }
            | CheckoutAction::Submit { .. } => {},
        }
    }

    fn reject(state: &mut CheckoutState, error: BookingError) -> SmallVec<[Effect<CheckoutAction>; 4]> {
        tracing::debug!(%error, "Checkout command rejected");
        Self::apply_event(state, &CheckoutAction::ValidationFailed { error });
        SmallVec::new()
    }
}

impl Default for CheckoutReducer {
    fn default() -> Self {
        Self::new()
    }
}

impl Reducer for CheckoutReducer {
    type State = CheckoutState;
    type Action = CheckoutAction;
    type Environment = BookingEnvironment;

    #[allow(clippy::too_many_lines)] // One arm per checkout step
    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            CheckoutAction::SelectPackage { package } => {
                if let Err(error) = Self::ensure_idle(state) {
                    return Self::reject(state, error);
                }

                let activity_id = package.activity_id;
                let package_id = package.id;
                state.package = Some(package);
                state.offer = None;
                state.date = None;
                state.availability = None;
                state.checking_availability = false;
                state.last_error = None;

                let offers = env.offers.clone();
                smallvec![Effect::future(async move {
                    match offers.resolve(activity_id, package_id).await {
                        Ok(offer) => Some(CheckoutAction::OfferResolved { package_id, offer }),
                        Err(error) => Some(CheckoutAction::OfferLookupFailed { package_id, error }),
                    }
                })]
            },

            CheckoutAction::SelectDate { date } => {
                if let Err(error) = Self::ensure_idle(state) {
                    return Self::reject(state, error);
                }
                let Some(package) = state.package.as_ref() else {
                    return Self::reject(state, BookingError::validation("Please select a package first"));
                };
                if date < env.clock.today() {
                    return Self::reject(state, BookingError::validation("Cannot book for past dates"));
                }

                let activity_id = package.activity_id;
                let package_id = package.id;
                state.date = Some(date);
                state.availability = None;
                state.checking_availability = true;
                state.last_error = None;

                let gate = env.availability.clone();
                smallvec![Effect::future(async move {
                    match gate.check(activity_id, package_id, date).await {
                        Ok(verdict) => Some(CheckoutAction::AvailabilityChecked { date, verdict }),
                        Err(error) => Some(CheckoutAction::AvailabilityCheckFailed { date, error }),
                    }
                })]
            },

            CheckoutAction::SetHeadcount { category, count } => {
                if let Err(error) = Self::ensure_idle(state) {
                    return Self::reject(state, error);
                }
                state.headcounts.set(category, count);
                SmallVec::new()
            },

            CheckoutAction::SetContact { contact } => {
                if let Err(error) = Self::ensure_idle(state) {
                    return Self::reject(state, error);
                }
                state.contact = contact;
                SmallVec::new()
            },

            CheckoutAction::SetPaymentMethod { label } => {
                if let Err(error) = Self::ensure_idle(state) {
                    return Self::reject(state, error);
                }
                state.payment_method = Some(label);
                SmallVec::new()
            },

            CheckoutAction::Submit { session } => {
                let request = match Self::validate_submit(state) {
                    Ok((package, date)) => Self::reservation_request(state, package, date),
                    Err(error) => return Self::reject(state, error),
                };

                state.submitting = true;
                state.last_error = None;

                let requested = request.headcounts.total();
                tracing::info!(
                    activity_id = %request.activity_id,
                    package_id = %request.package_id,
                    date = %request.booking_date,
                    requested,
                    "Submitting checkout"
                );

                let gate = env.availability.clone();
                let store = env.store.clone();
                smallvec![Effect::future(async move {
                    let verdict = match gate
                        .check(request.activity_id, request.package_id, request.booking_date)
                        .await
                    {
                        Ok(verdict) => verdict,
                        Err(error) => return Some(CheckoutAction::CheckoutFailed { error }),
                    };

                    if !AvailabilityGate::check_sufficient(&verdict, requested) {
                        let available = verdict.available_spots;
                        tracing::warn!(available, requested, "Capacity changed before submission");
                        metrics::counter!("booking.checkout.conflicts").increment(1);
                        return Some(CheckoutAction::CheckoutFailed {
                            error: BookingError::AvailabilityConflict { available, requested },
                        });
                    }

                    match store.create_reservation(&session, request).await {
                        Ok(booking) => {
                            tracing::info!(booking_id = %booking.id, "Reservation created");
                            metrics::counter!("booking.reservations.created").increment(1);
                            Some(CheckoutAction::ReservationCreated { booking })
                        },
                        Err(error) => {
                            tracing::warn!(%error, "Reservation create failed");
                            Some(CheckoutAction::CheckoutFailed { error })
                        },
                    }
                })]
            },

            event @ (CheckoutAction::OfferResolved { .. }
            | CheckoutAction::OfferLookupFailed { .. }
            | CheckoutAction::AvailabilityChecked { .. }
            | CheckoutAction::AvailabilityCheckFailed { .. }
            | CheckoutAction::ReservationCreated { .. }
            | CheckoutAction::CheckoutFailed { .. }
            | CheckoutAction::ValidationFailed { .. }) => {
                Self::apply_event(state, &event);
                SmallVec::new()
            },
        }
    }
}
