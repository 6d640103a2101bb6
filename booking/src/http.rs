//! HTTP client for the capacity, offer and booking-store services.
//!
//! Every endpoint answers with the `{ success, status, message, data }`
//! envelope. Failures are mapped onto [`BookingError`]:
//!
//! - connection errors, timeouts, undecodable bodies and 5xx: `Transient`
//! - 404 on a booking read: `NotFound`
//! - 404 (or an empty `data`) on the offer lookup: no offer
//! - any other 4xx, including envelopes whose `status` carries one: `Validation`

use crate::availability::CapacityService;
use crate::backend::{BookingStore, BoxFuture, ReservationRequest, Session};
use crate::error::{BookingError, BookingResult, Collaborator};
use crate::offers::OfferService;
use crate::types::{
    ActivityId, Amount, AvailabilityVerdict, Booking, BookingId, BookingStatus, ContactDetails, HeadcountSelection,
    Offer, PackageId, PriceBreakdown,
};
use chrono::{NaiveDate, NaiveDateTime};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{RequestBuilder, StatusCode};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Header the booking store scopes reads and writes by
const USER_EMAIL_HEADER: &str = "X-User-Email";

// ============================================================================
// Wire types
// ============================================================================

#[derive(Deserialize)]
struct Envelope<T> {
    #[serde(default = "default_success")]
    success: bool,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default = "Option::default")]
    data: Option<T>,
}

const fn default_success() -> bool {
    true
}

impl<T> Envelope<T> {
    /// HTTP status code carried inside the body, e.g. `"404 NOT_FOUND"`
    fn embedded_status(&self) -> Option<StatusCode> {
        let code = self.status.as_deref()?.split_whitespace().next()?;
        code.parse::<u16>().ok().and_then(|code| StatusCode::from_u16(code).ok())
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AvailabilityWire {
    #[serde(default)]
    available: bool,
    #[serde(default)]
    total_availability: Option<u32>,
    #[serde(default)]
    booked_count: Option<u32>,
    #[serde(default)]
    available_spots: Option<u32>,
    #[serde(default)]
    message: Option<String>,
}

impl From<AvailabilityWire> for AvailabilityVerdict {
    fn from(wire: AvailabilityWire) -> Self {
        let total_availability = wire.total_availability.unwrap_or_default();
        let booked_count = wire.booked_count.unwrap_or_default();
        Self {
            available: wire.available,
            booked_count,
            total_availability,
            available_spots: wire
                .available_spots
                .unwrap_or_else(|| total_availability.saturating_sub(booked_count)),
            message: wire.message,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OfferWire {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    discount_percentage: Option<f64>,
    #[serde(default)]
    active: Option<bool>,
}

impl From<OfferWire> for Offer {
    fn from(wire: OfferWire) -> Self {
        Self {
            has_offer: wire.active.unwrap_or(true),
            discount_percentage: wire.discount_percentage.unwrap_or_default(),
            title: wire.title,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BookingRequestWire<'a> {
    activity_id: ActivityId,
    activity_title: &'a str,
    activity_location: &'a str,
    description: Option<&'a str>,
    booking_date: NaiveDate,
    package_id: PackageId,
    package_name: &'a str,
    base_price: f64,
    service_fee: f64,
    tax: f64,
    total_price: f64,
    total_persons: u32,
    payment_method: Option<&'a str>,
    people_counts: HeadcountSelection,
    contact_email: Option<&'a str>,
    contact_phone: Option<&'a str>,
    ticket_instructions: Option<&'a str>,
    itinerary: Option<&'a str>,
    cancellation_policy: Option<&'a str>,
    has_discount: bool,
    discount_percentage: f64,
    offer_title: Option<&'a str>,
}

impl<'a> From<&'a ReservationRequest> for BookingRequestWire<'a> {
    fn from(request: &'a ReservationRequest) -> Self {
        let offer = request.offer.as_ref().filter(|offer| offer.is_applicable());
        Self {
            activity_id: request.activity_id,
            activity_title: &request.title,
            activity_location: &request.location,
            description: request.description.as_deref(),
            booking_date: request.booking_date,
            package_id: request.package_id,
            package_name: &request.package_name,
            base_price: request.price.subtotal.rounded(),
            service_fee: request.price.service_fee.rounded(),
            tax: request.price.tax.rounded(),
            total_price: request.price.total.rounded(),
            total_persons: request.headcounts.total(),
            payment_method: request.payment_method.as_deref(),
            people_counts: request.headcounts,
            contact_email: request.contact_email.as_deref(),
            contact_phone: request.contact_phone.as_deref(),
            ticket_instructions: request.ticket_instructions.as_deref(),
            itinerary: request.itinerary.as_deref(),
            cancellation_policy: request.cancellation_policy.as_deref(),
            has_discount: offer.is_some(),
            discount_percentage: offer.map_or(0.0, |offer| offer.discount_percentage),
            offer_title: offer.and_then(|offer| offer.title.as_deref()),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BookingWire {
    id: String,
    #[serde(default)]
    order_number: Option<String>,
    #[serde(default)]
    activity_id: Option<u32>,
    #[serde(default)]
    package_id: Option<u64>,
    #[serde(default)]
    package_name: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    location: Option<String>,
    booking_date: String,
    #[serde(default)]
    booking_time: Option<String>,
    status: String,
    #[serde(default)]
    base_price: Option<f64>,
    #[serde(default)]
    service_fee: Option<f64>,
    #[serde(default)]
    tax: Option<f64>,
    #[serde(default)]
    total_price: Option<f64>,
    #[serde(default)]
    total_persons: Option<u32>,
    #[serde(default)]
    people_counts: Option<HeadcountSelection>,
    #[serde(default)]
    payment_method: Option<String>,
    #[serde(default)]
    contact_email: Option<String>,
    #[serde(default)]
    contact_phone: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    ticket_instructions: Option<String>,
    #[serde(default)]
    itinerary: Option<String>,
    #[serde(default)]
    cancellation_policy: Option<String>,
    #[serde(default)]
    qr_code_data: Option<String>,
}

impl BookingWire {
    /// Itemized price when the store kept every component
    fn price(&self) -> Option<PriceBreakdown> {
        let subtotal = self.base_price.filter(|value| *value > 0.0)?;
        let service_fee = self.service_fee?;
        let tax = self.tax?;
        let total = self.total_price?;
        let discount = (subtotal + service_fee + tax - total).max(0.0);
        Some(PriceBreakdown {
            subtotal: Amount::new(subtotal),
            service_fee: Amount::new(service_fee),
            tax: Amount::new(tax),
            discount_amount: Amount::new(discount),
            total: Amount::new(total),
        })
    }

    fn into_booking(self) -> BookingResult<Booking> {
        let malformed = |what: &str, value: &str| {
            BookingError::transient(
                Collaborator::BookingStore,
                format!("booking {} has malformed {what}: {value}", self.id),
            )
        };

        let booking_date = NaiveDate::parse_from_str(&self.booking_date, "%Y-%m-%d")
            .map_err(|_| malformed("bookingDate", &self.booking_date))?;
        let status = self
            .status
            .parse::<BookingStatus>()
            .map_err(|_| malformed("status", &self.status))?;
        // Timestamps are display-only; an unparseable one is dropped.
        let booked_at = self.booking_time.as_deref().and_then(|raw| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
                .ok()
        });
        let price = self.price();

        Ok(Booking {
            id: BookingId::new(self.id),
            order_number: self.order_number,
            activity_id: ActivityId::new(self.activity_id.unwrap_or_default()),
            package_id: self.package_id.map(PackageId::new),
            package_name: self.package_name,
            title: self.title.unwrap_or_default(),
            location: self.location.unwrap_or_default(),
            booking_date,
            booked_at,
            status,
            price,
            total_price: Amount::new(self.total_price.unwrap_or_default()),
            total_persons: self.total_persons.unwrap_or_default(),
            headcounts: self.people_counts.unwrap_or_default(),
            payment_method: self.payment_method,
            contact: ContactDetails {
                email: self.contact_email,
                phone: self.contact_phone,
            },
            description: self.description,
            ticket_instructions: self.ticket_instructions,
            itinerary: self.itinerary,
            cancellation_policy: self.cancellation_policy,
            qr_code_data: self.qr_code_data,
        })
    }
}

// ============================================================================
// Client
// ============================================================================

/// Outcome of a call whose 404 is meaningful to the caller
enum Reply<T> {
    Found(T),
    Missing,
}

/// Backend that talks to the travel-authority REST API
#[derive(Clone)]
pub struct HttpBackend {
    http: reqwest::Client,
    base_url: Url,
}

impl HttpBackend {
    /// Builds a client with a per-request timeout
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Validation`] when `base_url` is not an
    /// absolute URL or the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> BookingResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BookingError::validation(format!("invalid HTTP client configuration: {e}")))?;
        Self::from_reqwest(base_url, http)
    }

    /// Wraps an existing `reqwest::Client`
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Validation`] when `base_url` is not an
    /// absolute URL.
    pub fn from_reqwest(base_url: &str, http: reqwest::Client) -> BookingResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| BookingError::validation(format!("invalid base URL {base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(BookingError::validation(format!("base URL {base_url} cannot carry a path")));
        }
        Ok(Self { http, base_url })
    }

    /// Base URL requests are issued against
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // Checked in the constructor.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn session_headers(session: &Session) -> BookingResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", session.token.expose_secret()))
            .map_err(|e| BookingError::validation(format!("invalid session token: {e}")))?;
        bearer.set_sensitive(true);
        headers.insert(AUTHORIZATION, bearer);
        let email = HeaderValue::from_str(&session.traveler_email)
            .map_err(|e| BookingError::validation(format!("invalid traveler email: {e}")))?;
        headers.insert(USER_EMAIL_HEADER, email);
        Ok(headers)
    }

    /// Sends a request and unwraps the envelope
    ///
    /// `Ok(Reply::Missing)` covers a 404 status, a 404 carried in the
    /// envelope and a successful envelope without `data`.
    async fn send<T: DeserializeOwned>(
        collaborator: Collaborator,
        request: RequestBuilder,
    ) -> BookingResult<Reply<T>> {
        let response = request
            .send()
            .await
            .map_err(|e| BookingError::transient(collaborator, describe(&e)))?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Ok(Reply::Missing);
        }
        if status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(BookingError::transient(collaborator, format!("HTTP {status}: {body}")));
        }
        if status.is_client_error() {
            let message = response
                .json::<Envelope<serde_json::Value>>()
                .await
                .ok()
                .and_then(|envelope| envelope.message)
                .unwrap_or_else(|| format!("HTTP {status}"));
            return Err(BookingError::validation(message));
        }

        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| BookingError::transient(collaborator, format!("unreadable response: {e}")))?;

        match envelope.embedded_status() {
            Some(StatusCode::NOT_FOUND) => return Ok(Reply::Missing),
            Some(code) if code.is_client_error() => {
                return Err(BookingError::validation(
                    envelope.message.unwrap_or_else(|| format!("HTTP {code}")),
                ));
            }
            _ => {}
        }
        if !envelope.success {
            return Err(BookingError::transient(
                collaborator,
                envelope.message.unwrap_or_else(|| "request was not successful".to_string()),
            ));
        }

        Ok(envelope.data.map_or(Reply::Missing, Reply::Found))
    }

    async fn fetch_availability(
        &self,
        activity_id: ActivityId,
        package_id: PackageId,
        date: NaiveDate,
    ) -> BookingResult<AvailabilityVerdict> {
        let url = self.url(&["api", "v1", "activity", "check-availability"]);
        debug!("GET {url}");
        let request = self.http.get(url).query(&[
            ("activityId", activity_id.to_string()),
            ("packageId", package_id.to_string()),
            ("date", date.format("%Y-%m-%d").to_string()),
        ]);

        match Self::send::<AvailabilityWire>(Collaborator::Capacity, request).await? {
            Reply::Found(wire) => Ok(wire.into()),
            Reply::Missing => Err(BookingError::validation("Activity not found")),
        }
    }

    async fn fetch_offer(&self, activity_id: ActivityId, package_id: PackageId) -> BookingResult<Option<Offer>> {
        let url = self.url(&["api", "v1", "offers", "check-package"]);
        debug!("GET {url}");
        let request = self.http.get(url).query(&[
            ("activityId", activity_id.to_string()),
            ("packageId", package_id.to_string()),
        ]);

        match Self::send::<OfferWire>(Collaborator::Offers, request).await? {
            Reply::Found(wire) => Ok(Some(wire.into())),
            Reply::Missing => Ok(None),
        }
    }

    async fn post_reservation(&self, session: &Session, request: &ReservationRequest) -> BookingResult<Booking> {
        let url = self.url(&["api", "v1", "bookings"]);
        debug!("POST {url}");
        let builder = self
            .http
            .post(url)
            .headers(Self::session_headers(session)?)
            .json(&BookingRequestWire::from(request));

        match Self::send::<BookingWire>(Collaborator::BookingStore, builder).await? {
            Reply::Found(wire) => wire.into_booking(),
            Reply::Missing => Err(BookingError::transient(
                Collaborator::BookingStore,
                "reservation response carried no booking",
            )),
        }
    }

    async fn fetch_booking(&self, session: &Session, booking_id: &BookingId) -> BookingResult<Booking> {
        let url = self.url(&["api", "v1", "bookings", booking_id.as_str()]);
        debug!("GET {url}");
        let builder = self.http.get(url).headers(Self::session_headers(session)?);

        match Self::send::<BookingWire>(Collaborator::BookingStore, builder).await? {
            Reply::Found(wire) => wire.into_booking(),
            Reply::Missing => Err(BookingError::NotFound {
                booking_id: booking_id.clone(),
            }),
        }
    }

    async fn fetch_bookings(&self, session: &Session, status: Option<BookingStatus>) -> BookingResult<Vec<Booking>> {
        let url = self.url(&["api", "v1", "bookings"]);
        debug!("GET {url} status={status:?}");
        let mut builder = self.http.get(url).headers(Self::session_headers(session)?);
        if let Some(status) = status {
            builder = builder.query(&[("status", status.as_str())]);
        }

        match Self::send::<Vec<BookingWire>>(Collaborator::BookingStore, builder).await? {
            Reply::Found(wires) => wires.into_iter().map(BookingWire::into_booking).collect(),
            Reply::Missing => Ok(Vec::new()),
        }
    }

    async fn put_cancel(&self, session: &Session, booking_id: &BookingId) -> BookingResult<Booking> {
        let url = self.url(&["api", "v1", "bookings", booking_id.as_str(), "cancel"]);
        debug!("PUT {url}");
        let builder = self.http.put(url).headers(Self::session_headers(session)?);

        match Self::send::<BookingWire>(Collaborator::BookingStore, builder).await? {
            Reply::Found(wire) => wire.into_booking(),
            Reply::Missing => Err(BookingError::NotFound {
                booking_id: booking_id.clone(),
            }),
        }
    }
}

fn describe(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        format!("request timed out: {error}")
    } else if error.is_connect() {
        format!("connection failed: {error}")
    } else {
        error.to_string()
    }
}

// ============================================================================
// Collaborator traits
// ============================================================================

impl CapacityService for HttpBackend {
    fn check_availability(
        &self,
        activity_id: ActivityId,
        package_id: PackageId,
        date: NaiveDate,
    ) -> BoxFuture<AvailabilityVerdict> {
        let this = self.clone();
        Box::pin(async move { this.fetch_availability(activity_id, package_id, date).await })
    }
}

impl OfferService for HttpBackend {
    fn check_package_offer(&self, activity_id: ActivityId, package_id: PackageId) -> BoxFuture<Option<Offer>> {
        let this = self.clone();
        Box::pin(async move { this.fetch_offer(activity_id, package_id).await })
    }
}

impl BookingStore for HttpBackend {
    fn create_reservation(&self, session: &Session, request: ReservationRequest) -> BoxFuture<Booking> {
        let this = self.clone();
        let session = session.clone();
        Box::pin(async move { this.post_reservation(&session, &request).await })
    }

    fn get_booking(&self, session: &Session, booking_id: &BookingId) -> BoxFuture<Booking> {
        let this = self.clone();
        let session = session.clone();
        let booking_id = booking_id.clone();
        Box::pin(async move { this.fetch_booking(&session, &booking_id).await })
    }

    fn list_bookings(&self, session: &Session, status: Option<BookingStatus>) -> BoxFuture<Vec<Booking>> {
        let this = self.clone();
        let session = session.clone();
        Box::pin(async move { this.fetch_bookings(&session, status).await })
    }

    fn cancel_booking(&self, session: &Session, booking_id: &BookingId) -> BoxFuture<Booking> {
        let this = self.clone();
        let session = session.clone();
        let booking_id = booking_id.clone();
        Box::pin(async move { this.put_cancel(&session, &booking_id).await })
    }
}
