//! Error taxonomy for the booking engine.

use crate::types::BookingId;
use thiserror::Error;

/// Result alias used throughout the booking engine
pub type BookingResult<T> = Result<T, BookingError>;

/// External collaborator that produced a transient failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collaborator {
    /// Capacity (availability) query
    Capacity,
    /// Promotions (offer) query
    Offers,
    /// External booking store
    BookingStore,
}

impl std::fmt::Display for Collaborator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Capacity => write!(f, "availability service"),
            Self::Offers => write!(f, "offer service"),
            Self::BookingStore => write!(f, "booking store"),
        }
    }
}

/// Errors surfaced by the booking engine
///
/// Capacity and network failures stay distinct all the way to the traveler:
/// [`BookingError::user_message`] never phrases one as the other.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BookingError {
    /// Malformed or insufficient input (e.g. zero headcount, no date chosen)
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The authoritative re-check found fewer spots than requested
    #[error("Not enough availability: {available} spots left, {requested} requested")]
    AvailabilityConflict {
        /// Spots still available
        available: u32,
        /// Headcount the traveler asked for
        requested: u32,
    },

    /// Network or service failure from a collaborator; safe to retry
    #[error("{collaborator} unavailable: {message}")]
    Transient {
        /// Which collaborator failed
        collaborator: Collaborator,
        /// Underlying failure
        message: String,
    },

    /// Cancellation outside the window or on a terminal booking
    #[error("Booking cannot be cancelled: {reason}")]
    CancellationIneligible {
        /// Why the booking is ineligible
        reason: String,
    },

    /// Scan-code rendering failed
    #[error("Ticket rendering failed: {reason}")]
    DocumentRender {
        /// Renderer failure
        reason: String,
    },

    /// The booking store has no such booking
    #[error("Booking {booking_id} not found")]
    NotFound {
        /// Requested booking
        booking_id: BookingId,
    },
}

impl BookingError {
    /// Shorthand for a validation error
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Shorthand for a transient collaborator error
    #[must_use]
    pub fn transient(collaborator: Collaborator, message: impl Into<String>) -> Self {
        Self::Transient {
            collaborator,
            message: message.into(),
        }
    }

    /// Only collaborator failures are worth retrying
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// Message suitable for showing to the traveler
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::AvailabilityConflict { available: 0, .. } => {
                "This activity is fully booked for the selected date.".to_string()
            },
            Self::AvailabilityConflict {
                available,
                requested,
            } => format!(
                "Only {available} spots are left for this date, but {requested} were requested. \
                 Please reduce your party size."
            ),
            Self::Transient { collaborator, .. } => format!(
                "Network problem while contacting the {collaborator}. Please try again."
            ),
            Self::CancellationIneligible { reason } => reason.clone(),
            Self::DocumentRender { .. } => {
                "The ticket code could not be generated. Please contact support.".to_string()
            },
            Self::NotFound { booking_id } => format!("Booking {booking_id} was not found."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transient_errors_are_retryable() {
        assert!(BookingError::transient(Collaborator::Capacity, "timeout").is_retryable());
        assert!(!BookingError::validation("no date").is_retryable());
        assert!(
            !BookingError::AvailabilityConflict {
                available: 1,
                requested: 3
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_capacity_and_network_messages_are_distinct() {
        let capacity = BookingError::AvailabilityConflict {
            available: 2,
            requested: 3,
        }
        .user_message();
        let network = BookingError::transient(Collaborator::Capacity, "connection reset").user_message();

        assert!(capacity.contains("2 spots"));
        assert!(capacity.contains('3'));
        assert!(network.contains("Network"));
        assert!(!capacity.contains("Network"));
        assert!(!network.contains("spots"));
    }

    #[test]
    fn test_fully_booked_message() {
        let message = BookingError::AvailabilityConflict {
            available: 0,
            requested: 2,
        }
        .user_message();
        assert!(message.contains("fully booked"));
    }
}
