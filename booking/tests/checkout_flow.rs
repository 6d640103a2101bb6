//! End-to-end checkout, confirmation, ticket and cancellation flows
//!
//! Every test drives the reducers through the runtime `Store` against the
//! in-memory backend, so collaborator call order is observable.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use chrono::NaiveDate;
use std::sync::Arc;
use travel_booking::memory::{InMemoryBackend, OfferRecord, Operation};
use travel_booking::ticket::{verify_scan, ScanCodeSection, TicketArtifactGenerator};
use travel_booking::{
    ActivityId, BookingEnvironment, BookingError, BookingLifecycleReducer, BookingStatus, CheckoutAction,
    CheckoutReducer, CheckoutState, Collaborator, LifecycleAction, LifecycleState, Package, PackageId, RateCard,
    Session, TravelerCategory,
};
use travel_booking_core::environment::Clock;
use travel_booking_runtime::Store;
use travel_booking_testing::clock_on;

type CheckoutStore = Store<CheckoutState, CheckoutAction, BookingEnvironment, CheckoutReducer>;
type LifecycleStore = Store<LifecycleState, LifecycleAction, BookingEnvironment, BookingLifecycleReducer>;

// ============================================================================
// Fixtures
// ============================================================================

const ACTIVITY: ActivityId = ActivityId::new(7);
const PACKAGE: PackageId = PackageId::new(70);

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
}

fn travel_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 15).unwrap()
}

fn backend(capacity: u32) -> Arc<InMemoryBackend> {
    let clock: Arc<dyn Clock> = Arc::new(clock_on(2025, 3, 1));
    Arc::new(InMemoryBackend::with_clock(clock).with_capacity(ACTIVITY, capacity))
}

fn environment(backend: &Arc<InMemoryBackend>) -> BookingEnvironment {
    BookingEnvironment::from_backend(Arc::clone(backend), Arc::new(clock_on(2025, 3, 1)))
}

fn package() -> Package {
    Package {
        id: PACKAGE,
        activity_id: ACTIVITY,
        name: "Sunrise".to_string(),
        activity_title: "Sigiriya Rock Climb".to_string(),
        location: "Sigiriya, Sri Lanka".to_string(),
        rate_card: RateCard::with_base(1000.0),
        description: None,
        itinerary: None,
    }
}

fn alice() -> Session {
    Session::new("alice@example.com", "alice-token")
}

fn bob() -> Session {
    Session::new("bob@example.com", "bob-token")
}

fn checkout(backend: &Arc<InMemoryBackend>) -> CheckoutStore {
    Store::new(CheckoutState::new(), CheckoutReducer::new(), environment(backend))
}

/// Picks the package and the travel date, then sets the foreign-adult count
async fn prepare(store: &CheckoutStore, foreign_adults: u32) {
    store.send(CheckoutAction::SelectPackage { package: package() }).await.unwrap();
    store
        .send(CheckoutAction::SelectDate { date: travel_date() })
        .await
        .unwrap();
    store
        .send(CheckoutAction::SetHeadcount {
            category: TravelerCategory::ForeignAdult,
            count: foreign_adults,
        })
        .await
        .unwrap();
}

// ============================================================================
// Checkout
// ============================================================================

#[tokio::test]
async fn test_checkout_rechecks_availability_before_creating() {
    let backend = backend(10);
    let store = checkout(&backend);

    prepare(&store, 2).await;
    store.send(CheckoutAction::Submit { session: alice() }).await.unwrap();

    let reservation = store.state(|s| s.reservation().cloned()).await.unwrap();
    assert_eq!(reservation.status, BookingStatus::Pending);
    assert_eq!(reservation.total_persons, 2);
    assert_eq!(reservation.total_price.rounded(), 2400.0);
    assert_eq!(backend.booked_count(ACTIVITY, travel_date()), 2);

    assert_eq!(
        backend.calls(),
        vec![
            Operation::CheckOffer,
            Operation::CheckAvailability,
            Operation::CheckAvailability,
            Operation::CreateReservation,
        ]
    );
    assert!(!store.state(CheckoutState::can_submit).await);
}

#[tokio::test]
async fn test_capacity_taken_between_selection_and_submit_is_a_conflict() {
    let backend = backend(4);
    let mine = checkout(&backend);
    let theirs = checkout(&backend);

    prepare(&mine, 2).await;
    assert!(mine.state(|s| s.availability.as_ref().unwrap().available).await);

    // Someone else books three of the four spots first
    prepare(&theirs, 3).await;
    theirs.send(CheckoutAction::Submit { session: bob() }).await.unwrap();
    assert!(theirs.state(|s| s.reservation().is_some()).await);

    mine.send(CheckoutAction::Submit { session: alice() }).await.unwrap();

    let (reservation, error, submitting) = mine
        .state(|s| (s.reservation().cloned(), s.last_error.clone(), s.submitting))
        .await;
    assert!(reservation.is_none());
    assert!(!submitting);
    assert_eq!(
        error,
        Some(BookingError::AvailabilityConflict {
            available: 1,
            requested: 2
        })
    );
    assert!(!error.unwrap().is_retryable());

    let creates = backend
        .calls()
        .into_iter()
        .filter(|op| *op == Operation::CreateReservation)
        .count();
    assert_eq!(creates, 1, "only the winning checkout reached the store");
    assert_eq!(backend.booked_count(ACTIVITY, travel_date()), 3);
}

#[tokio::test]
async fn test_transient_store_failure_can_be_resubmitted_once() {
    let backend = backend(10);
    let store = checkout(&backend);
    prepare(&store, 2).await;

    backend.fail_next(
        Operation::CreateReservation,
        BookingError::transient(Collaborator::BookingStore, "connection reset"),
    );
    store.send(CheckoutAction::Submit { session: alice() }).await.unwrap();

    let error = store.state(|s| s.last_error.clone()).await.unwrap();
    assert!(error.is_retryable());
    assert!(error.user_message().starts_with("Network problem"));
    assert!(store.state(CheckoutState::can_submit).await);

    store.send(CheckoutAction::Submit { session: alice() }).await.unwrap();
    assert!(store.state(|s| s.reservation().is_some()).await);
    assert_eq!(backend.booked_count(ACTIVITY, travel_date()), 2);

    // A reservation exists; further submissions are refused locally
    store.send(CheckoutAction::Submit { session: alice() }).await.unwrap();
    assert!(matches!(
        store.state(|s| s.last_error.clone()).await,
        Some(BookingError::Validation(_))
    ));
    assert_eq!(backend.booked_count(ACTIVITY, travel_date()), 2);
}

#[tokio::test]
async fn test_recheck_failure_never_reaches_the_store() {
    let backend = backend(10);
    let store = checkout(&backend);
    prepare(&store, 1).await;

    backend.fail_next(
        Operation::CheckAvailability,
        BookingError::transient(Collaborator::Capacity, "timeout"),
    );
    store.send(CheckoutAction::Submit { session: alice() }).await.unwrap();

    assert!(!backend.calls().contains(&Operation::CreateReservation));
    assert!(matches!(
        store.state(|s| s.last_error.clone()).await,
        Some(BookingError::Transient {
            collaborator: Collaborator::Capacity,
            ..
        })
    ));
}

#[tokio::test]
async fn test_fully_booked_date_is_deselected() {
    let backend = backend(3);
    let filler = checkout(&backend);
    prepare(&filler, 3).await;
    filler.send(CheckoutAction::Submit { session: bob() }).await.unwrap();

    let store = checkout(&backend);
    store.send(CheckoutAction::SelectPackage { package: package() }).await.unwrap();
    store
        .send(CheckoutAction::SelectDate { date: travel_date() })
        .await
        .unwrap();

    let (date, verdict) = store.state(|s| (s.date, s.availability.clone())).await;
    assert_eq!(date, None);
    let verdict = verdict.unwrap();
    assert!(!verdict.available);
    assert_eq!(verdict.available_spots, 0);
    assert_eq!(
        verdict.message.as_deref(),
        Some("This activity is fully booked for the selected date")
    );
}

#[tokio::test]
async fn test_active_offer_discounts_the_reservation() {
    let backend = backend(10);
    backend.add_offer(OfferRecord {
        activity_id: ACTIVITY,
        package_ids: vec![PACKAGE],
        discount_percentage: 10.0,
        title: "Early Riser".to_string(),
        active: true,
        valid_from: today(),
        valid_until: travel_date(),
    });
    let store = checkout(&backend);
    prepare(&store, 2).await;

    let price = store.state(CheckoutState::price).await.unwrap();
    assert_eq!(price.discount_amount.rounded(), 200.0);
    assert_eq!(price.total.rounded(), 2200.0);

    store.send(CheckoutAction::Submit { session: alice() }).await.unwrap();
    let reservation = store.state(|s| s.reservation().cloned()).await.unwrap();
    assert_eq!(reservation.price.unwrap().total.rounded(), 2200.0);
}

#[tokio::test]
async fn test_past_date_is_refused_before_querying_capacity() {
    let backend = backend(10);
    let store = checkout(&backend);
    store.send(CheckoutAction::SelectPackage { package: package() }).await.unwrap();
    store
        .send(CheckoutAction::SelectDate {
            date: NaiveDate::from_ymd_opt(2025, 2, 20).unwrap(),
        })
        .await
        .unwrap();

    let error = store.state(|s| s.last_error.clone()).await.unwrap();
    assert_eq!(error, BookingError::validation("Cannot book for past dates"));
    assert!(store.state(|s| s.date.is_none()).await);
    assert_eq!(backend.calls(), vec![Operation::CheckOffer]);
}

// ============================================================================
// Confirmation, ticket, cancellation
// ============================================================================

async fn reserved(backend: &Arc<InMemoryBackend>, foreign_adults: u32) -> travel_booking::Booking {
    let store = checkout(backend);
    prepare(&store, foreign_adults).await;
    store.send(CheckoutAction::Submit { session: alice() }).await.unwrap();
    store.state(|s| s.reservation().cloned()).await.unwrap()
}

fn lifecycle(backend: &Arc<InMemoryBackend>, clock_day: u32) -> LifecycleStore {
    let env = BookingEnvironment::from_backend(Arc::clone(backend), Arc::new(clock_on(2025, 3, clock_day)));
    Store::new(LifecycleState::new(), BookingLifecycleReducer::new(), env)
}

#[tokio::test]
async fn test_ticket_is_only_scannable_once_confirmed() {
    let backend = backend(10);
    let booking = reserved(&backend, 2).await;
    let generator = TicketArtifactGenerator::default();

    let pending = generator.render(&booking);
    assert_eq!(pending.scan_code, ScanCodeSection::AwaitingConfirmation);

    let confirmed = backend.confirm(&booking.id).unwrap();
    let document = generator.render(&confirmed);
    match &document.scan_code {
        ScanCodeSection::Active {
            payload, authoritative, ..
        } => {
            assert!(*authoritative);
            assert_eq!(Some(payload), confirmed.qr_code_data.as_ref());
            assert_eq!(verify_scan(&confirmed, payload), Ok(()));
        },
        other => panic!("expected an active code, got {other:?}"),
    }
    assert!(document.to_text().contains("Sigiriya Rock Climb"));
}

#[tokio::test]
async fn test_cancellation_inside_window_frees_capacity() {
    let backend = backend(10);
    let booking = reserved(&backend, 2).await;
    backend.confirm(&booking.id).unwrap();

    // Travel on the 15th, today is the 1st
    let store = lifecycle(&backend, 1);
    store
        .send(LifecycleAction::LoadBookings {
            session: alice(),
            status: None,
        })
        .await
        .unwrap();
    assert_eq!(store.state(|s| s.counts.get(BookingStatus::Confirmed)).await, 1);

    store
        .send(LifecycleAction::CancelBooking {
            booking_id: booking.id.clone(),
            session: alice(),
        })
        .await
        .unwrap();

    let (status, counts) = store
        .state(|s| (s.get(&booking.id).map(|b| b.status), s.counts))
        .await;
    assert_eq!(status, Some(BookingStatus::Cancelled));
    assert_eq!(counts.get(BookingStatus::Cancelled), 1);
    assert_eq!(counts.get(BookingStatus::Confirmed), 0);
    assert_eq!(backend.booked_count(ACTIVITY, travel_date()), 0);
}

#[tokio::test]
async fn test_cancellation_too_close_to_travel_is_refused_locally() {
    let backend = backend(10);
    let booking = reserved(&backend, 1).await;

    // Travel on the 15th, today is the 13th
    let store = lifecycle(&backend, 13);
    store
        .send(LifecycleAction::LoadBookings {
            session: alice(),
            status: None,
        })
        .await
        .unwrap();
    store
        .send(LifecycleAction::CancelBooking {
            booking_id: booking.id.clone(),
            session: alice(),
        })
        .await
        .unwrap();

    assert!(matches!(
        store.state(|s| s.last_error.clone()).await,
        Some(BookingError::CancellationIneligible { .. })
    ));
    assert!(!backend.calls().contains(&Operation::CancelBooking));
    assert_eq!(
        store.state(|s| s.get(&booking.id).map(|b| b.status)).await,
        Some(BookingStatus::Pending)
    );
}

#[tokio::test]
async fn test_bookings_are_scoped_to_the_session() {
    let backend = backend(10);
    reserved(&backend, 1).await;

    let store = lifecycle(&backend, 1);
    store
        .send(LifecycleAction::LoadBookings {
            session: bob(),
            status: None,
        })
        .await
        .unwrap();
    assert_eq!(store.state(|s| s.bookings.len()).await, 0);
}
