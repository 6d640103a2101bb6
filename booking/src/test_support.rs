//! Fixtures shared by unit tests.

use crate::backend::Session;
use crate::types::{
    ActivityId, Amount, Booking, BookingId, BookingStatus, ContactDetails, HeadcountSelection, PackageId,
};
use chrono::NaiveDate;

pub fn session() -> Session {
    Session::new("traveler@example.com", "test-token")
}

pub fn booking_on(id: &str, status: BookingStatus, booking_date: NaiveDate) -> Booking {
    Booking {
        id: BookingId::new(id),
        order_number: None,
        activity_id: ActivityId::new(7),
        package_id: Some(PackageId::new(70)),
        package_name: Some("Sunrise".to_string()),
        title: "Sigiriya Rock Climb".to_string(),
        location: "Sigiriya, Sri Lanka".to_string(),
        booking_date,
        booked_at: None,
        status,
        price: None,
        total_price: Amount::new(1200.0),
        total_persons: 1,
        headcounts: HeadcountSelection::new(1, 0, 0, 0),
        payment_method: None,
        contact: ContactDetails::default(),
        description: None,
        ticket_instructions: None,
        itinerary: None,
        cancellation_policy: None,
        qr_code_data: None,
    }
}
