//! # Services
//!
//! One service per component. Each borrows the shared [`crate::Commerce`] state and
//! is created on demand through its accessor (`commerce.catalog()`, ...).
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Service method                                                         │
//! │    1. require(caller)          → UNAUTHENTICATED                        │
//! │    2. load entities            → NOT_FOUND                              │
//! │    3. access rules (core)      → PERMISSION                             │
//! │    4. input rules (core)       → VALIDATION / BUSINESS_RULE             │
//! │    5. repository write (db)    → CONFLICT / BUSINESS_RULE               │
//! │    6. info!(...)                                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

mod catalog;
mod checkout;
mod collab;
mod discover;
mod events;
mod qr;
mod reviews;
mod settlement;
mod venues;

pub use catalog::{ArtifactPatch, CatalogService, NewArtifact};
pub use checkout::{CartLine, CheckoutResult, CheckoutService};
pub use collab::{AgreementCreated, AgreementPatch, CollabService, NewAgreement, SplitInput};
pub use discover::{DiscoveryFeed, DiscoveryService};
pub use events::{EventDetail, EventService, NewEvent};
pub use qr::QrService;
pub use reviews::{NewReview, ReviewService};
pub use settlement::{
    ConfirmationOutcome, PaymentConfirmation, SettlementService, PAYMENT_SUCCEEDED,
};
pub use venues::{NewCatalogItem, NewVenue, VenueDetail, VenueService};

use serde::{Deserialize, Deserializer};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::identity::Principal;

/// The caller, or `UNAUTHENTICATED`.
pub(crate) fn require(caller: Option<&Principal>) -> ApiResult<&Principal> {
    caller.ok_or_else(ApiError::unauthenticated)
}

/// An authenticated caller verified to be of legal age.
pub(crate) fn require_of_age(caller: Option<&Principal>) -> ApiResult<&Principal> {
    let principal = require(caller)?;
    if !principal.is_of_age {
        return Err(ApiError::permission("Age verification required"));
    }
    Ok(principal)
}

pub(crate) fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Lets a patch tell "absent" (`None`) from "explicitly null" (`Some(None)`).
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
