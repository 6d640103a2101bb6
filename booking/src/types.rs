//! Domain types for the booking engine.
//!
//! Value objects (identifiers, amounts, headcounts, rate cards, offers) and
//! the booking record as the engine sees it. The canonical booking lives in
//! the external booking store; these types are the engine's read model of it.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Identifiers
// ============================================================================

/// Identifier of a bookable activity
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActivityId(u32);

impl ActivityId {
    /// Creates an `ActivityId`
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw id
    #[must_use]
    pub const fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ActivityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a package (a purchasable configuration of an activity)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageId(u64);

impl PackageId {
    /// Creates a `PackageId`
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw id
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier assigned to a booking by the booking store (e.g. `TICK-1718000000000`)
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookingId(String);

impl BookingId {
    /// Creates a `BookingId`
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BookingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Money
// ============================================================================

/// A monetary amount in the activity's currency (LKR).
///
/// Arithmetic stays in unrounded `f64`; rounding to two decimals happens
/// only when a value is presented (see [`Amount::rounded`] and `Display`).
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(f64);

impl Amount {
    /// Zero
    pub const ZERO: Self = Self(0.0);

    /// Creates an `Amount`
    #[must_use]
    pub const fn new(value: f64) -> Self {
        Self(value)
    }

    /// The unrounded value
    #[must_use]
    pub const fn value(&self) -> f64 {
        self.0
    }

    /// The value rounded half away from zero to two decimals
    #[must_use]
    pub fn rounded(&self) -> f64 {
        (self.0 * 100.0).round() / 100.0
    }

    /// Finite and non-negative
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.0.is_finite() && self.0 >= 0.0
    }

    /// Scales the amount by a factor
    #[must_use]
    pub fn scale(self, factor: f64) -> Self {
        Self(self.0 * factor)
    }

    /// Multiplies by a headcount
    #[must_use]
    pub fn times(self, count: u32) -> Self {
        Self(self.0 * f64::from(count))
    }
}

impl std::ops::Add for Amount {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Amount {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl std::iter::Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, amount| acc + amount)
    }
}

impl fmt::Display for Amount {
    /// `Rs. 3,240.00`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fixed = format!("{:.2}", self.rounded().abs());
        let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

        let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
        for (i, digit) in whole.chars().enumerate() {
            if i > 0 && (whole.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(digit);
        }

        let sign = if self.rounded() < 0.0 { "-" } else { "" };
        write!(f, "Rs. {sign}{grouped}.{cents}")
    }
}

// ============================================================================
// Traveler categories and headcounts
// ============================================================================

/// The four headcount categories, each priced independently
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TravelerCategory {
    /// Foreign adult (priced at the package base rate by default)
    ForeignAdult,
    /// Foreign child
    #[serde(rename = "foreignKids")]
    ForeignKid,
    /// Local adult
    LocalAdult,
    /// Local child
    #[serde(rename = "localKids")]
    LocalKid,
}

impl TravelerCategory {
    /// All categories in presentation order
    pub const ALL: [Self; 4] = [
        Self::ForeignAdult,
        Self::ForeignKid,
        Self::LocalAdult,
        Self::LocalKid,
    ];

    /// Key used by the booking store's `peopleCounts` map
    #[must_use]
    pub const fn key(&self) -> &'static str {
        match self {
            Self::ForeignAdult => "foreignAdult",
            Self::ForeignKid => "foreignKids",
            Self::LocalAdult => "localAdult",
            Self::LocalKid => "localKids",
        }
    }

    /// Human-readable label
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::ForeignAdult => "Foreign Adults",
            Self::ForeignKid => "Foreign Kids",
            Self::LocalAdult => "Local Adults",
            Self::LocalKid => "Local Kids",
        }
    }
}

impl fmt::Display for TravelerCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Number of travelers per category
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HeadcountSelection {
    /// Foreign adults
    pub foreign_adult: u32,
    /// Foreign kids
    pub foreign_kids: u32,
    /// Local adults
    pub local_adult: u32,
    /// Local kids
    pub local_kids: u32,
}

impl HeadcountSelection {
    /// Creates a selection from the four counts, in `TravelerCategory::ALL` order
    #[must_use]
    pub const fn new(foreign_adult: u32, foreign_kids: u32, local_adult: u32, local_kids: u32) -> Self {
        Self {
            foreign_adult,
            foreign_kids,
            local_adult,
            local_kids,
        }
    }

    /// Count for one category
    #[must_use]
    pub const fn get(&self, category: TravelerCategory) -> u32 {
        match category {
            TravelerCategory::ForeignAdult => self.foreign_adult,
            TravelerCategory::ForeignKid => self.foreign_kids,
            TravelerCategory::LocalAdult => self.local_adult,
            TravelerCategory::LocalKid => self.local_kids,
        }
    }

    /// Sets the count for one category
    pub fn set(&mut self, category: TravelerCategory, count: u32) {
        match category {
            TravelerCategory::ForeignAdult => self.foreign_adult = count,
            TravelerCategory::ForeignKid => self.foreign_kids = count,
            TravelerCategory::LocalAdult => self.local_adult = count,
            TravelerCategory::LocalKid => self.local_kids = count,
        }
    }

    /// Sum of all four categories (saturating)
    #[must_use]
    pub fn total(&self) -> u32 {
        TravelerCategory::ALL
            .iter()
            .fold(0_u32, |acc, category| acc.saturating_add(self.get(*category)))
    }

    /// True when nobody is selected
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Categories with a count above zero, in presentation order
    pub fn non_zero(&self) -> impl Iterator<Item = (TravelerCategory, u32)> + '_ {
        TravelerCategory::ALL
            .into_iter()
            .map(|category| (category, self.get(category)))
            .filter(|(_, count)| *count > 0)
    }
}

// ============================================================================
// Pricing inputs and outputs
// ============================================================================

/// Per-package pricing: a base rate plus optional explicit per-category rates
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateCard {
    /// Package base rate
    pub base_rate: Amount,
    /// Explicit foreign-adult rate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_adult: Option<Amount>,
    /// Explicit foreign-kid rate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_kid: Option<Amount>,
    /// Explicit local-adult rate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_adult: Option<Amount>,
    /// Explicit local-kid rate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_kid: Option<Amount>,
}

impl RateCard {
    /// A rate card with only a base rate
    #[must_use]
    pub const fn with_base(base_rate: f64) -> Self {
        Self {
            base_rate: Amount::new(base_rate),
            foreign_adult: None,
            foreign_kid: None,
            local_adult: None,
            local_kid: None,
        }
    }

    /// Sets an explicit rate for one category
    #[must_use]
    pub const fn with_rate(mut self, category: TravelerCategory, rate: f64) -> Self {
        let rate = Some(Amount::new(rate));
        match category {
            TravelerCategory::ForeignAdult => self.foreign_adult = rate,
            TravelerCategory::ForeignKid => self.foreign_kid = rate,
            TravelerCategory::LocalAdult => self.local_adult = rate,
            TravelerCategory::LocalKid => self.local_kid = rate,
        }
        self
    }

    /// The explicit rate for a category, if the package defines one
    #[must_use]
    pub const fn explicit(&self, category: TravelerCategory) -> Option<Amount> {
        match category {
            TravelerCategory::ForeignAdult => self.foreign_adult,
            TravelerCategory::ForeignKid => self.foreign_kid,
            TravelerCategory::LocalAdult => self.local_adult,
            TravelerCategory::LocalKid => self.local_kid,
        }
    }
}

/// A purchasable configuration of an activity, as listed to the traveler
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    /// Package id
    pub id: PackageId,
    /// Owning activity
    pub activity_id: ActivityId,
    /// Package display name
    pub name: String,
    /// Activity title
    pub activity_title: String,
    /// Activity location
    pub location: String,
    /// Pricing
    pub rate_card: RateCard,
    /// Activity description
    #[serde(default)]
    pub description: Option<String>,
    /// Itinerary text
    #[serde(default)]
    pub itinerary: Option<String>,
}

/// A promotional discount for an activity/package pair
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Offer {
    /// Whether an offer applies at all
    pub has_offer: bool,
    /// Percentage off the subtotal, 0–100
    pub discount_percentage: f64,
    /// Promotional title
    #[serde(default, alias = "offerTitle", skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Offer {
    /// An active percentage offer
    #[must_use]
    pub fn percent(discount_percentage: f64, title: impl Into<String>) -> Self {
        Self {
            has_offer: true,
            discount_percentage,
            title: Some(title.into()),
        }
    }

    /// Whether this offer reduces the price
    #[must_use]
    pub fn is_applicable(&self) -> bool {
        self.has_offer && self.discount_percentage > 0.0
    }
}

/// Itemized price of a reservation
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceBreakdown {
    /// Σ resolved rate × headcount, before fees and discount
    pub subtotal: Amount,
    /// 5% of the undiscounted subtotal
    pub service_fee: Amount,
    /// 15% of the undiscounted subtotal
    pub tax: Amount,
    /// Offer discount on the subtotal
    pub discount_amount: Amount,
    /// subtotal + fee + tax − discount
    pub total: Amount,
}

// ============================================================================
// Availability
// ============================================================================

/// Capacity snapshot for an activity/package on a date
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityVerdict {
    /// Whether the date can take at least the requested headcount
    pub available: bool,
    /// People already booked (non-cancelled bookings)
    pub booked_count: u32,
    /// Fixed per-date capacity
    pub total_availability: u32,
    /// `total_availability − booked_count`
    pub available_spots: u32,
    /// Collaborator-supplied explanation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl AvailabilityVerdict {
    /// Builds a verdict from raw counts for a requested headcount
    ///
    /// Spots never go below zero even when the date is overbooked.
    #[must_use]
    pub fn from_counts(total_availability: u32, booked_count: u32, requested: u32) -> Self {
        let available_spots = total_availability.saturating_sub(booked_count);
        let available = available_spots >= requested.max(1);
        let message = if available_spots == 0 {
            "This activity is fully booked for the selected date"
        } else if available {
            "Available"
        } else {
            "Not enough availability for the requested number of people"
        };

        Self {
            available,
            booked_count,
            total_availability,
            available_spots,
            message: Some(message.to_string()),
        }
    }
}

// ============================================================================
// Bookings
// ============================================================================

/// Booking status as reported by the booking store
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    /// Created by the store, awaiting confirmation
    Pending,
    /// Confirmed by the external authority
    Confirmed,
    /// Activity took place
    Completed,
    /// Cancelled by the traveler
    Cancelled,
}

impl BookingStatus {
    /// All statuses
    pub const ALL: [Self; 4] = [Self::Pending, Self::Confirmed, Self::Completed, Self::Cancelled];

    /// Wire representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// No transition leaves a terminal status
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Legal transitions:
    /// `PENDING → CONFIRMED → COMPLETED`, `PENDING → CANCELLED`, `CONFIRMED → CANCELLED`
    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Confirmed | Self::Cancelled)
                | (Self::Confirmed, Self::Completed | Self::Cancelled)
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown booking status: {s}"))
    }
}

/// Traveler contact details recorded on a booking
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactDetails {
    /// Contact email
    pub email: Option<String>,
    /// Contact phone
    pub phone: Option<String>,
}

/// A booking as read from the booking store
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    /// Store-assigned id
    pub id: BookingId,
    /// Store-assigned order number
    pub order_number: Option<String>,
    /// Booked activity
    pub activity_id: ActivityId,
    /// Booked package
    pub package_id: Option<PackageId>,
    /// Package display name
    pub package_name: Option<String>,
    /// Activity title
    pub title: String,
    /// Activity location
    pub location: String,
    /// Travel date
    pub booking_date: NaiveDate,
    /// When the reservation was made
    pub booked_at: Option<NaiveDateTime>,
    /// Current status
    pub status: BookingStatus,
    /// Itemized price, absent on legacy records that only carry a total
    pub price: Option<PriceBreakdown>,
    /// Total charged
    pub total_price: Amount,
    /// Party size as recorded by the store
    pub total_persons: u32,
    /// Party size by category (all zero on legacy records)
    pub headcounts: HeadcountSelection,
    /// Display-only payment method label
    pub payment_method: Option<String>,
    /// Contact details
    pub contact: ContactDetails,
    /// Activity description
    pub description: Option<String>,
    /// Visitor instructions
    pub ticket_instructions: Option<String>,
    /// Itinerary
    pub itinerary: Option<String>,
    /// Cancellation policy text
    pub cancellation_policy: Option<String>,
    /// Scan payload issued by the store, authoritative once present
    pub qr_code_data: Option<String>,
}

impl Booking {
    /// Party size shown on tickets and encoded in payloads
    #[must_use]
    pub fn party_size(&self) -> u32 {
        if self.total_persons > 0 {
            self.total_persons
        } else {
            self.headcounts.total()
        }
    }
}
