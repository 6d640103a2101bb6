//! Category-weighted price computation.
//!
//! Fees and tax are charged on the undiscounted subtotal; an offer only ever
//! reduces the subtotal share. All arithmetic is unrounded.

use crate::error::{BookingError, BookingResult};
use crate::types::{Amount, HeadcountSelection, Offer, PriceBreakdown, RateCard, TravelerCategory};

/// Service fee as a fraction of the subtotal
pub const SERVICE_FEE_RATE: f64 = 0.05;

/// Tax as a fraction of the subtotal
pub const TAX_RATE: f64 = 0.15;

impl TravelerCategory {
    /// Fraction of the base rate used when a package defines no explicit rate
    #[must_use]
    pub const fn fallback_ratio(&self) -> f64 {
        match self {
            Self::ForeignAdult => 1.0,
            Self::ForeignKid => 0.70,
            Self::LocalAdult => 0.75,
            Self::LocalKid => 0.50,
        }
    }
}

impl RateCard {
    /// Rate charged for one traveler of `category`
    ///
    /// An explicit rate wins, including an explicit zero.
    #[must_use]
    pub fn resolved_rate(&self, category: TravelerCategory) -> Amount {
        self.explicit(category)
            .unwrap_or_else(|| self.base_rate.scale(category.fallback_ratio()))
    }

    /// All four resolved rates in `TravelerCategory::ALL` order
    #[must_use]
    pub fn resolved_rates(&self) -> [Amount; 4] {
        TravelerCategory::ALL.map(|category| self.resolved_rate(category))
    }

    /// Rejects negative or non-finite rates
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Validation`] naming the first offending rate.
    pub fn validate(&self) -> BookingResult<()> {
        if !self.base_rate.is_valid() {
            return Err(BookingError::validation(format!(
                "Package base rate must be a non-negative number (got {})",
                self.base_rate.value()
            )));
        }
        for category in TravelerCategory::ALL {
            let rate = self.resolved_rate(category);
            if !rate.is_valid() {
                return Err(BookingError::validation(format!(
                    "Rate for {category} must be a non-negative number (got {})",
                    rate.value()
                )));
            }
        }
        Ok(())
    }
}

impl PriceBreakdown {
    /// Reconstructs an itemized view from a legacy record that only stored a total
    ///
    /// Legacy tickets printed `base = total/1.2 × 0.9`, `fee = total/1.2 × 0.1`
    /// and `tax = total − total/1.2`. The split is display-only and unrelated
    /// to [`PriceCalculator::compute`].
    #[must_use]
    pub fn reconstruct_legacy(total: Amount) -> Self {
        let net = total.value() / 1.2;
        Self {
            subtotal: Amount::new(net * 0.9),
            service_fee: Amount::new(net * 0.1),
            tax: Amount::new(total.value() - net),
            discount_amount: Amount::ZERO,
            total,
        }
    }
}

/// Pure price calculator
#[derive(Clone, Copy, Debug, Default)]
pub struct PriceCalculator;

impl PriceCalculator {
    /// Itemizes the price of a headcount against a rate card and optional offer
    ///
    /// Inputs are assumed validated (see [`RateCard::validate`]).
    #[must_use]
    pub fn compute(
        headcounts: &HeadcountSelection,
        rate_card: &RateCard,
        offer: Option<&Offer>,
    ) -> PriceBreakdown {
        let subtotal: Amount = TravelerCategory::ALL
            .into_iter()
            .map(|category| rate_card.resolved_rate(category).times(headcounts.get(category)))
            .sum();

        let service_fee = subtotal.scale(SERVICE_FEE_RATE);
        let tax = subtotal.scale(TAX_RATE);

        let discount_amount = match offer {
            Some(offer) if offer.is_applicable() => {
                subtotal.scale(offer.discount_percentage.min(100.0) / 100.0)
            },
            _ => Amount::ZERO,
        };

        PriceBreakdown {
            subtotal,
            service_fee,
            tax,
            discount_amount,
            total: subtotal + service_fee + tax - discount_amount,
        }
    }
}
