//! Promotional offer lookup.

use crate::backend::BoxFuture;
use crate::error::BookingResult;
use crate::types::{ActivityId, Offer, PackageId};
use std::sync::Arc;

/// External promotions query
pub trait OfferService: Send + Sync {
    /// The best active offer for an activity/package pair, if any
    ///
    /// # Errors
    ///
    /// Returns [`crate::BookingError::Transient`] on network or service failure.
    fn check_package_offer(&self, activity_id: ActivityId, package_id: PackageId) -> BoxFuture<Option<Offer>>;
}

/// Resolves the offer that applies to a package selection
#[derive(Clone)]
pub struct OfferResolver {
    offers: Arc<dyn OfferService>,
}

impl OfferResolver {
    /// Creates a resolver over an offer service
    #[must_use]
    pub fn new(offers: Arc<dyn OfferService>) -> Self {
        Self { offers }
    }

    /// The applicable offer, or `None` when nothing reduces the price
    ///
    /// Offers reported with `hasOffer = false` or a zero discount are
    /// normalized to `None`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::BookingError::Transient`] when the lookup fails.
    #[tracing::instrument(skip(self))]
    pub async fn resolve(&self, activity_id: ActivityId, package_id: PackageId) -> BookingResult<Option<Offer>> {
        let offer = self
            .offers
            .check_package_offer(activity_id, package_id)
            .await
            .inspect_err(|error| tracing::warn!(%error, "Offer lookup failed"))?
            .filter(Offer::is_applicable)
            .map(|mut offer| {
                offer.discount_percentage = offer.discount_percentage.clamp(0.0, 100.0);
                offer
            });

        match &offer {
            Some(found) => tracing::debug!(
                discount = found.discount_percentage,
                title = found.title.as_deref().unwrap_or_default(),
                "Offer applies"
            ),
            None => tracing::debug!("No offer for package"),
        }
        Ok(offer)
    }
}
