//! Ticket artifacts: the scannable verification payload and the printable document.
//!
//! A payload issued by the booking store is authoritative and is used
//! verbatim forever. Only bookings without one get a derived payload, built
//! deterministically from the booking so that regenerating a document never
//! invalidates a ticket already in a traveler's hands.

use crate::error::BookingError;
use crate::types::{Amount, Booking, BookingId, BookingStatus, PriceBreakdown, TravelerCategory};
use chrono::{NaiveDate, NaiveDateTime};
use qrcode::render::{svg, unicode};
use qrcode::QrCode;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// Support email printed when a booking carries none
pub const DEFAULT_SUPPORT_EMAIL: &str = "info@tickets.lk";

/// Support phone printed when a booking carries none
pub const DEFAULT_SUPPORT_PHONE: &str = "+94 11 234 5678";

/// Cancellation clause printed when a booking carries none
pub const DEFAULT_CANCELLATION_POLICY: &str = "Free cancellation up to 24 hours before the scheduled \
                                               activity. After that, no refunds will be provided.";

/// Instructions printed on every ticket, ahead of the booking's own
pub const STANDARD_INSTRUCTIONS: [&str; 4] = [
    "Please arrive 15 minutes before the scheduled time",
    "Bring a valid ID for verification",
    "Show this ticket and QR code at the venue",
    "Keep this ticket safe for the duration of your visit",
];

// ============================================================================
// Payload
// ============================================================================

/// Where a ticket's scannable payload comes from, resolved once per render
#[derive(Clone, Debug, PartialEq)]
pub enum PayloadSource<'a> {
    /// Issued by the booking store; never regenerated
    Authoritative(&'a str),
    /// No issued payload; derived from the booking snapshot
    ///
    /// The derived text embeds the booking status and changes on
    /// cancellation. A cancelled booking never exposes a code and venue
    /// verification refuses it. Only an authoritative payload stays
    /// byte-identical across status changes.
    Derived(&'a Booking),
}

impl<'a> PayloadSource<'a> {
    /// Picks the store's payload when it has issued a non-empty one
    #[must_use]
    pub fn resolve(booking: &'a Booking) -> Self {
        match booking.qr_code_data.as_deref() {
            Some(issued) if !issued.trim().is_empty() => Self::Authoritative(issued),
            _ => Self::Derived(booking),
        }
    }

    /// The payload text
    #[must_use]
    pub fn payload(&self) -> String {
        match self {
            Self::Authoritative(issued) => (*issued).to_string(),
            Self::Derived(booking) => derived_payload(booking),
        }
    }

    /// Whether the payload was issued by the store
    #[must_use]
    pub const fn is_authoritative(&self) -> bool {
        matches!(self, Self::Authoritative(_))
    }
}

/// The scannable payload for a booking
///
/// Identical booking data always yields byte-identical text.
#[must_use]
pub fn derive_payload(booking: &Booking) -> String {
    PayloadSource::resolve(booking).payload()
}

/// `VER-<ticketId>-<epoch millis of the travel date at midnight UTC>`
#[must_use]
pub fn verification_code(booking_id: &BookingId, travel_date: NaiveDate) -> String {
    let millis = travel_date.and_time(chrono::NaiveTime::MIN).and_utc().timestamp_millis();
    format!("VER-{booking_id}-{millis}")
}

fn derived_payload(booking: &Booking) -> String {
    let mut fields = Map::new();
    fields.insert("ticketId".into(), Value::from(booking.id.as_str()));
    fields.insert("eventTitle".into(), Value::from(booking.title.as_str()));
    fields.insert("date".into(), Value::from(booking.booking_date.to_string()));
    fields.insert("persons".into(), Value::from(booking.party_size()));
    if let Some(order_number) = &booking.order_number {
        fields.insert("orderNumber".into(), Value::from(order_number.as_str()));
    }
    fields.insert("status".into(), Value::from(booking.status.as_str()));
    fields.insert(
        "verificationCode".into(),
        Value::from(verification_code(&booking.id, booking.booking_date)),
    );
    Value::Object(fields).to_string()
}

// ============================================================================
// Scan verification
// ============================================================================

/// Why a scanned payload was refused at the venue
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScanRejection {
    /// Nothing was scanned
    #[error("QR code data is empty")]
    Empty,
    /// The payload is not a ticket payload
    #[error("Invalid QR code format: {0}")]
    Malformed(String),
    /// The payload belongs to a different booking
    #[error("QR code is for ticket {scanned}, not {expected}")]
    WrongTicket {
        /// Ticket id in the payload
        scanned: String,
        /// Booking being checked
        expected: BookingId,
    },
    /// A payload field disagrees with the booking
    #[error("QR code {field} does not match booking")]
    Mismatch {
        /// Disagreeing field
        field: &'static str,
    },
    /// The booking was cancelled
    #[error("This ticket has been cancelled and is not valid")]
    Cancelled,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScannedPayload {
    ticket_id: Option<String>,
    verification_code: Option<String>,
    event_title: Option<String>,
    date: Option<String>,
    persons: Option<u32>,
    order_number: Option<String>,
}

/// Checks a scanned payload against the booking it claims to be for
///
/// # Errors
///
/// Returns the first [`ScanRejection`] that applies.
pub fn verify_scan(booking: &Booking, scanned: &str) -> Result<(), ScanRejection> {
    if scanned.trim().is_empty() {
        return Err(ScanRejection::Empty);
    }

    let payload: ScannedPayload =
        serde_json::from_str(scanned).map_err(|e| ScanRejection::Malformed(e.to_string()))?;

    let (Some(ticket_id), Some(code)) = (payload.ticket_id, payload.verification_code) else {
        return Err(ScanRejection::Malformed("missing required fields".to_string()));
    };

    if ticket_id != booking.id.as_str() {
        return Err(ScanRejection::WrongTicket {
            scanned: ticket_id,
            expected: booking.id.clone(),
        });
    }
    if payload.event_title.as_deref() != Some(booking.title.as_str()) {
        return Err(ScanRejection::Mismatch { field: "event title" });
    }
    if payload.date.as_deref() != Some(booking.booking_date.to_string().as_str()) {
        return Err(ScanRejection::Mismatch { field: "date" });
    }
    if payload.persons != Some(booking.party_size()) {
        return Err(ScanRejection::Mismatch { field: "person count" });
    }
    if let Some(order_number) = &booking.order_number {
        if payload.order_number.as_ref() != Some(order_number) {
            return Err(ScanRejection::Mismatch { field: "order number" });
        }
    }

    match PayloadSource::resolve(booking) {
        PayloadSource::Authoritative(issued) if issued != scanned => {
            return Err(ScanRejection::Mismatch { field: "payload" });
        },
        PayloadSource::Derived(_) if code != verification_code(&booking.id, booking.booking_date) => {
            return Err(ScanRejection::Mismatch { field: "verification code" });
        },
        _ => {},
    }

    if booking.status == BookingStatus::Cancelled {
        return Err(ScanRejection::Cancelled);
    }

    tracing::info!(booking_id = %booking.id, status = %booking.status, "Ticket verified");
    Ok(())
}

// ============================================================================
// Document
// ============================================================================

/// Title, location and status
#[derive(Clone, Debug, PartialEq)]
pub struct IdentitySection {
    /// Activity title
    pub title: String,
    /// Activity location
    pub location: String,
    /// Booking status
    pub status: BookingStatus,
}

/// Booking identity and party
#[derive(Clone, Debug, PartialEq)]
pub struct BookingMetaSection {
    /// Ticket id
    pub booking_id: BookingId,
    /// Order number
    pub order_number: Option<String>,
    /// When the reservation was made
    pub booked_at: Option<NaiveDateTime>,
    /// Travel date
    pub travel_date: NaiveDate,
    /// Party size
    pub party_size: u32,
    /// Categories with a non-zero count
    pub party: Vec<(TravelerCategory, u32)>,
}

/// Itemized price
#[derive(Clone, Debug, PartialEq)]
pub struct PriceSection {
    /// Values shown on the ticket
    pub breakdown: PriceBreakdown,
    /// Reconstructed from a total-only legacy record
    pub legacy: bool,
}

/// The scannable code, or why there is none
#[derive(Clone, Debug, PartialEq)]
pub enum ScanCodeSection {
    /// Confirmed booking with a rendered code
    Active {
        /// Encoded payload
        payload: String,
        /// Payload came from the booking store
        authoritative: bool,
        /// SVG image
        svg: String,
        /// Terminal rendering
        terminal: String,
    },
    /// Booking is pending; no code yet
    AwaitingConfirmation,
    /// Cancelled or completed; no active code
    Withheld {
        /// Status that withholds the code
        status: BookingStatus,
    },
    /// The code could not be rendered
    RenderFailed {
        /// Renderer failure
        reason: String,
    },
}

impl ScanCodeSection {
    /// Whether a scannable code is exposed
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Active { .. })
    }
}

/// Support contact
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContactSection {
    /// Email
    pub email: String,
    /// Phone
    pub phone: String,
}

/// A rendered ticket, sections in presentation order
#[derive(Clone, Debug, PartialEq)]
pub struct TicketDocument {
    /// Title, location, status
    pub identity: IdentitySection,
    /// Ids, dates, party
    pub meta: BookingMetaSection,
    /// Display-only payment method
    pub payment_method: Option<String>,
    /// Itemized price
    pub price: PriceSection,
    /// Scannable code
    pub scan_code: ScanCodeSection,
    /// Standard plus booking-specific instructions
    pub instructions: Vec<String>,
    /// Itinerary text
    pub itinerary: Option<String>,
    /// Cancellation policy text
    pub cancellation_policy: String,
    /// Support contact
    pub contact: ContactSection,
}

impl TicketDocument {
    /// The rendering failure behind a placeholder code, if any
    #[must_use]
    pub fn render_error(&self) -> Option<BookingError> {
        match &self.scan_code {
            ScanCodeSection::RenderFailed { reason } => Some(BookingError::DocumentRender {
                reason: reason.clone(),
            }),
            _ => None,
        }
    }

    /// Plain-text rendering
    #[must_use]
    pub fn to_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for TicketDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "E-TICKET")?;
        writeln!(f, "{}", self.identity.title)?;
        writeln!(f, "{}", self.identity.location)?;
        writeln!(f, "Status: {}", self.identity.status)?;
        writeln!(f)?;

        writeln!(f, "Booking Information")?;
        writeln!(f, "  Booking ID:     {}", self.meta.booking_id)?;
        if let Some(order_number) = &self.meta.order_number {
            writeln!(f, "  Order Number:   {order_number}")?;
        }
        if let Some(booked_at) = self.meta.booked_at {
            writeln!(f, "  Booked On:      {}", booked_at.format("%Y-%m-%d %H:%M"))?;
        }
        writeln!(f, "  Travel Date:    {}", self.meta.travel_date.format("%B %-d, %Y"))?;
        let noun = if self.meta.party_size == 1 { "Person" } else { "Persons" };
        writeln!(f, "  Travelers:      {} {noun}", self.meta.party_size)?;
        for (category, count) in &self.meta.party {
            writeln!(f, "    {category}: {count}")?;
        }
        if let Some(method) = &self.payment_method {
            writeln!(f, "  Payment Method: {method}")?;
        }
        writeln!(f)?;

        let price = &self.price.breakdown;
        writeln!(f, "Price Details")?;
        writeln!(f, "  Base Price:     {}", price.subtotal)?;
        writeln!(f, "  Service Fee:    {}", price.service_fee)?;
        writeln!(f, "  Taxes:          {}", price.tax)?;
        if price.discount_amount > Amount::ZERO {
            writeln!(f, "  Discount:      -{}", price.discount_amount)?;
        }
        writeln!(f, "  Total Amount:   {}", price.total)?;
        writeln!(f)?;

        writeln!(f, "Ticket QR Code")?;
        match &self.scan_code {
            ScanCodeSection::Active { terminal, .. } => {
                write!(f, "{terminal}")?;
                writeln!(f)?;
                writeln!(f, "  Scan this code at the venue")?;
            },
            ScanCodeSection::AwaitingConfirmation => {
                writeln!(f, "  Awaiting confirmation: your QR code will be issued once the booking is confirmed.")?;
            },
            ScanCodeSection::Withheld { status } => {
                writeln!(f, "  No active QR code: this booking is {status}.")?;
            },
            ScanCodeSection::RenderFailed { .. } => {
                writeln!(f, "  [QR CODE ERROR] Present your Ticket ID at the venue.")?;
            },
        }
        writeln!(f, "  Ticket ID: {}", self.meta.booking_id)?;
        writeln!(f)?;

        writeln!(f, "Important Instructions")?;
        for instruction in &self.instructions {
            writeln!(f, "  - {instruction}")?;
        }
        if let Some(itinerary) = &self.itinerary {
            writeln!(f)?;
            writeln!(f, "Itinerary")?;
            for line in itinerary.lines() {
                writeln!(f, "  {line}")?;
            }
        }
        writeln!(f)?;

        writeln!(f, "Cancellation Policy")?;
        writeln!(f, "  {}", self.cancellation_policy)?;
        writeln!(f)?;
        write!(f, "{} | {}", self.contact.email, self.contact.phone)
    }
}

// ============================================================================
// Generator
// ============================================================================

/// Fallback texts printed when a booking carries none
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TicketDefaults {
    /// Support email
    pub support_email: String,
    /// Support phone
    pub support_phone: String,
    /// Cancellation clause
    pub cancellation_policy: String,
}

impl Default for TicketDefaults {
    fn default() -> Self {
        Self {
            support_email: DEFAULT_SUPPORT_EMAIL.to_string(),
            support_phone: DEFAULT_SUPPORT_PHONE.to_string(),
            cancellation_policy: DEFAULT_CANCELLATION_POLICY.to_string(),
        }
    }
}

/// Builds ticket documents from bookings
#[derive(Clone, Debug, Default)]
pub struct TicketArtifactGenerator {
    defaults: TicketDefaults,
}

impl TicketArtifactGenerator {
    /// Creates a generator with the given fallback texts
    #[must_use]
    pub const fn new(defaults: TicketDefaults) -> Self {
        Self { defaults }
    }

    /// The scannable payload for a booking
    #[must_use]
    pub fn derive_payload(&self, booking: &Booking) -> String {
        derive_payload(booking)
    }

    /// Renders a booking into a ticket document
    ///
    /// Always completes: a code that cannot be rendered becomes a
    /// [`ScanCodeSection::RenderFailed`] placeholder.
    #[tracing::instrument(skip_all, fields(booking_id = %booking.id, status = %booking.status))]
    pub fn render(&self, booking: &Booking) -> TicketDocument {
        let scan_code = match booking.status {
            BookingStatus::Confirmed => Self::scan_code(PayloadSource::resolve(booking)),
            BookingStatus::Pending => ScanCodeSection::AwaitingConfirmation,
            status @ (BookingStatus::Cancelled | BookingStatus::Completed) => ScanCodeSection::Withheld { status },
        };

        let price = booking.price.map_or_else(
            || PriceSection {
                breakdown: PriceBreakdown::reconstruct_legacy(booking.total_price),
                legacy: true,
            },
            |breakdown| PriceSection {
                breakdown,
                legacy: false,
            },
        );

        let mut instructions: Vec<String> = STANDARD_INSTRUCTIONS.iter().map(ToString::to_string).collect();
        if let Some(extra) = booking.ticket_instructions.as_deref().filter(|text| !text.trim().is_empty()) {
            instructions.push(extra.to_string());
        }

        TicketDocument {
            identity: IdentitySection {
                title: booking.title.clone(),
                location: booking.location.clone(),
                status: booking.status,
            },
            meta: BookingMetaSection {
                booking_id: booking.id.clone(),
                order_number: booking.order_number.clone(),
                booked_at: booking.booked_at,
                travel_date: booking.booking_date,
                party_size: booking.party_size(),
                party: booking.headcounts.non_zero().collect(),
            },
            payment_method: booking.payment_method.clone(),
            price,
            scan_code,
            instructions,
            itinerary: booking.itinerary.clone(),
            cancellation_policy: non_blank(booking.cancellation_policy.as_deref())
                .unwrap_or(&self.defaults.cancellation_policy)
                .to_string(),
            contact: ContactSection {
                email: non_blank(booking.contact.email.as_deref())
                    .unwrap_or(&self.defaults.support_email)
                    .to_string(),
                phone: non_blank(booking.contact.phone.as_deref())
                    .unwrap_or(&self.defaults.support_phone)
                    .to_string(),
            },
        }
    }

    fn scan_code(source: PayloadSource<'_>) -> ScanCodeSection {
        let payload = source.payload();
        match render_code(&payload) {
            Ok((svg, terminal)) => ScanCodeSection::Active {
                payload,
                authoritative: source.is_authoritative(),
                svg,
                terminal,
            },
            Err(error) => {
                tracing::warn!(%error, "Scan code rendering failed, using placeholder");
                let reason = match error {
                    BookingError::DocumentRender { reason } => reason,
                    other => other.to_string(),
                };
                ScanCodeSection::RenderFailed { reason }
            },
        }
    }
}

fn non_blank(text: Option<&str>) -> Option<&str> {
    text.filter(|value| !value.trim().is_empty())
}

/// Encodes a payload as an SVG image and a terminal block drawing
fn render_code(payload: &str) -> Result<(String, String), BookingError> {
    let code = QrCode::new(payload.as_bytes()).map_err(|e| BookingError::DocumentRender {
        reason: e.to_string(),
    })?;

    let svg = code
        .render::<svg::Color>()
        .min_dimensions(200, 200)
        .quiet_zone(true)
        .build();
    let terminal = code
        .render::<unicode::Dense1x2>()
        .dark_color(unicode::Dense1x2::Light)
        .light_color(unicode::Dense1x2::Dark)
        .build();

    Ok((svg, terminal))
}
