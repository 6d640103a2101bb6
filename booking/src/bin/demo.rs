//! Travel booking walkthrough against the in-memory backend.
//!
//! Picks a package, checks availability, submits a reservation, confirms it
//! as the travel authority would, prints the ticket and finally cancels.
//!
//! # Usage
//!
//! ```bash
//! RUST_LOG=travel_booking=debug cargo run --bin travel-booking-demo
//! ```

use anyhow::{anyhow, Context};
use chrono::Days;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use travel_booking::{
    ActivityId, BookingEnvironment, BookingError, BookingLifecycleReducer, BookingStore, CheckoutAction,
    CheckoutReducer, CheckoutState, Config, ContactDetails, InMemoryBackend, LifecycleAction, LifecycleState,
    OfferRecord, Package, PackageId, RateCard, Session, TicketArtifactGenerator, TravelerCategory,
};
use travel_booking_core::environment::{Clock, SystemClock};
use travel_booking_runtime::{retry::retry_with_predicate, Store};

const ACTIVITY: ActivityId = ActivityId::new(7);
const PACKAGE: PackageId = PackageId::new(70);

fn sunrise_package() -> Package {
    Package {
        id: PACKAGE,
        activity_id: ACTIVITY,
        name: "Sunrise Climb".to_string(),
        activity_title: "Sigiriya Rock Climb".to_string(),
        location: "Sigiriya, Sri Lanka".to_string(),
        rate_card: RateCard::with_base(1000.0).with_rate(TravelerCategory::LocalAdult, 600.0),
        description: Some("Guided climb of the Lion Rock fortress at first light.".to_string()),
        itinerary: Some("05:00 meet at the west gate\n06:15 summit\n08:00 descent".to_string()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_new(&config.log_level)
                .unwrap_or_else(|_| "travel_booking=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(api = %config.api.base_url, "Starting travel booking demo (in-memory backend)");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let today = clock.today();
    let travel_date = today
        .checked_add_days(Days::new(10))
        .ok_or_else(|| anyhow!("travel date out of range"))?;

    let backend = Arc::new(InMemoryBackend::with_clock(Arc::clone(&clock)).with_capacity(ACTIVITY, 12));
    backend.add_offer(OfferRecord {
        activity_id: ACTIVITY,
        package_ids: vec![PACKAGE],
        discount_percentage: 10.0,
        title: "Early Riser".to_string(),
        active: true,
        valid_from: today,
        valid_until: travel_date,
    });

    let env = BookingEnvironment::from_backend(Arc::clone(&backend), Arc::clone(&clock));
    let session = Session::new("traveler@example.com", "demo-token");

    // Checkout
    let checkout = Store::new(CheckoutState::new(), CheckoutReducer::new(), env.clone());
    checkout.send(CheckoutAction::SelectPackage { package: sunrise_package() }).await?;
    checkout.send(CheckoutAction::SelectDate { date: travel_date }).await?;
    checkout
        .send(CheckoutAction::SetHeadcount {
            category: TravelerCategory::ForeignAdult,
            count: 2,
        })
        .await?;
    checkout
        .send(CheckoutAction::SetHeadcount {
            category: TravelerCategory::LocalKid,
            count: 1,
        })
        .await?;
    checkout
        .send(CheckoutAction::SetContact {
            contact: ContactDetails {
                email: Some("traveler@example.com".to_string()),
                phone: Some("+94 77 123 4567".to_string()),
            },
        })
        .await?;
    checkout
        .send(CheckoutAction::SetPaymentMethod {
            label: "Visa ending 4242".to_string(),
        })
        .await?;

    if let Some(price) = checkout.state(CheckoutState::price).await {
        info!(subtotal = %price.subtotal, discount = %price.discount_amount, total = %price.total, "Quoted price");
    }

    checkout.send(CheckoutAction::Submit { session: session.clone() }).await?;
    let reservation = checkout
        .state(|s| s.reservation().cloned().ok_or_else(|| s.last_error.clone()))
        .await
        .map_err(|error| anyhow!(error.map_or_else(|| "no reservation".to_string(), |e| e.user_message())))?;
    info!(booking_id = %reservation.id, status = %reservation.status, "Reservation created");

    // The travel authority confirms out of band
    backend.confirm(&reservation.id).context("confirming reservation")?;

    let policy = config.retry_policy();
    let confirmed = retry_with_predicate(
        &policy,
        || backend.get_booking(&session, &reservation.id),
        BookingError::is_retryable,
    )
    .await?;

    let generator = TicketArtifactGenerator::new(config.ticket_defaults());
    let ticket = generator.render(&confirmed);
    if let Some(error) = ticket.render_error() {
        tracing::warn!(%error, "Ticket rendered without a scan code");
    }
    println!("{}", ticket.to_text());

    // Booking list and cancellation
    let lifecycle = Store::new(LifecycleState::new(), BookingLifecycleReducer::new(), env);
    lifecycle
        .send(LifecycleAction::LoadBookings {
            session: session.clone(),
            status: None,
        })
        .await?;
    lifecycle
        .send(LifecycleAction::CancelBooking {
            booking_id: confirmed.id.clone(),
            session,
        })
        .await?;

    let (counts, error) = lifecycle.state(|s| (s.counts, s.last_error.clone())).await;
    match error {
        Some(error) => info!(%error, "Cancellation did not go through"),
        None => info!(?counts, "Cancellation confirmed"),
    }
    info!(
        booked = backend.booked_count(ACTIVITY, travel_date),
        "Remaining bookings on the travel date"
    );

    checkout.shutdown();
    lifecycle.shutdown();
    Ok(())
}
