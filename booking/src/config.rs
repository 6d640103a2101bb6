//! Configuration management for the booking engine.
//!
//! Loads configuration from environment variables with sensible defaults.
//! Pricing rates and the cancellation window are constants, not settings.

use crate::ticket::{DEFAULT_CANCELLATION_POLICY, DEFAULT_SUPPORT_EMAIL, DEFAULT_SUPPORT_PHONE, TicketDefaults};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use travel_booking_runtime::retry::RetryPolicy;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Travel-authority API configuration
    pub api: ApiConfig,
    /// Retry configuration for callers that retry transient failures
    pub retry: RetryConfig,
    /// Ticket document configuration
    pub ticket: TicketConfig,
    /// Log filter (`RUST_LOG` syntax)
    pub log_level: String,
}

/// Travel-authority API configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL, e.g. `http://localhost:8080`
    pub base_url: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

/// Retry configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: usize,
    /// Delay before the first retry in milliseconds
    pub initial_delay_ms: u64,
}

/// Ticket document configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketConfig {
    /// Support email printed on tickets
    pub support_email: String,
    /// Support phone printed on tickets
    pub support_phone: String,
    /// Cancellation clause used when a booking carries none
    pub cancellation_policy: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Unset or unparseable values fall back to their defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let parsed = |key: &str| lookup(key).and_then(|s| s.trim().parse().ok());

        Self {
            api: ApiConfig {
                base_url: lookup("BOOKING_API_BASE_URL").unwrap_or_else(|| "http://localhost:8080".to_string()),
                timeout_secs: parsed("BOOKING_API_TIMEOUT_SECS").unwrap_or(10),
            },
            retry: RetryConfig {
                max_retries: lookup("BOOKING_RETRY_MAX")
                    .and_then(|s| s.trim().parse().ok())
                    .unwrap_or(3),
                initial_delay_ms: parsed("BOOKING_RETRY_INITIAL_DELAY_MS").unwrap_or(200),
            },
            ticket: TicketConfig {
                support_email: lookup("TICKET_SUPPORT_EMAIL").unwrap_or_else(|| DEFAULT_SUPPORT_EMAIL.to_string()),
                support_phone: lookup("TICKET_SUPPORT_PHONE").unwrap_or_else(|| DEFAULT_SUPPORT_PHONE.to_string()),
                cancellation_policy: lookup("TICKET_CANCELLATION_POLICY")
                    .unwrap_or_else(|| DEFAULT_CANCELLATION_POLICY.to_string()),
            },
            log_level: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        }
    }

    /// Per-request API timeout
    #[must_use]
    pub const fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    /// Retry policy for transient collaborator failures
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::builder()
            .max_retries(self.retry.max_retries)
            .initial_delay(Duration::from_millis(self.retry.initial_delay_ms))
            .build()
    }

    /// Defaults for ticket documents
    #[must_use]
    pub fn ticket_defaults(&self) -> TicketDefaults {
        TicketDefaults {
            support_email: self.ticket.support_email.clone(),
            support_phone: self.ticket.support_phone.clone(),
            cancellation_policy: self.ticket.cancellation_policy.clone(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}
