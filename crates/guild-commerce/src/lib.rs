//! # guild-commerce: Service Layer for Guild Commerce
//!
//! Every operation an HTTP boundary exposes lives here, on top of the rules
//! in `guild-core` and the transactions in `guild-db`.
//!
//! ## Module Organization
//! ```text
//! guild_commerce/
//! ├── lib.rs          ◄─── You are here (Commerce state & service accessors)
//! ├── config.rs       ◄─── Environment configuration
//! ├── error.rs        ◄─── ApiError / ErrorCode
//! ├── telemetry.rs    ◄─── tracing subscriber setup
//! ├── identity.rs     ◄─── IdentityProvider, JWT implementation
//! ├── gateway.rs      ◄─── PaymentGateway, mock implementation
//! ├── notary.rs       ◄─── ReceiptNotary contract
//! ├── dispatcher.rs   ◄─── Background receipt delivery
//! └── services/
//!     ├── catalog.rs  ◄─── Artifacts
//!     ├── collab.rs   ◄─── Revenue-split agreements
//!     ├── checkout.rs ◄─── Orders and payment intents
//!     ├── settlement.rs ◄─ Payment confirmations
//!     ├── events.rs   ◄─── Events and tickets
//!     ├── venues.rs   ◄─── Venues and seller catalog
//!     ├── qr.rs       ◄─── QR slug resolution
//!     ├── reviews.rs  ◄─── Artifact reviews
//!     └── discover.rs ◄─── Discovery feeds
//! ```
//!
//! ## Calling Convention
//! Every service method takes the caller as `Option<&Principal>`; `None` is
//! an anonymous request. Operations that need a user fail with
//! `UNAUTHENTICATED`, purchases by callers not verified of age with
//! `PERMISSION`.
//!
//! ```rust,ignore
//! let caller = commerce.authenticate(headers.get("authorization")).await;
//! let created = commerce.checkout().create_order(caller.as_ref(), &lines).await?;
//! ```

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod gateway;
pub mod identity;
pub mod notary;
pub mod services;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::info;

use guild_db::{Database, DbConfig};

pub use config::{CommerceConfig, ConfigError};
pub use dispatcher::{DispatchReport, ReceiptDispatcher, ReceiptDispatcherHandle};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use gateway::{MockPaymentGateway, PaymentGateway, PaymentIntent};
pub use identity::{extract_bearer_token, IdentityProvider, JwtIdentityProvider, Principal};
pub use notary::{LoggingNotary, NotaryError, ReceiptNotary};

use services::{
    CatalogService, CheckoutService, CollabService, DiscoveryService, EventService, QrService,
    ReviewService, SettlementService, VenueService,
};

/// Shared state behind every service.
///
/// Cheap to clone; clones share the pool, collaborators and dispatcher.
#[derive(Clone)]
pub struct Commerce {
    db: Database,
    config: Arc<CommerceConfig>,
    identity: Arc<dyn IdentityProvider>,
    gateway: Arc<dyn PaymentGateway>,
    receipts: ReceiptDispatcherHandle,
}

impl Commerce {
    /// Assembles the state from already-built parts.
    pub fn new(
        db: Database,
        config: CommerceConfig,
        identity: Arc<dyn IdentityProvider>,
        gateway: Arc<dyn PaymentGateway>,
        receipts: ReceiptDispatcherHandle,
    ) -> Self {
        Commerce {
            db,
            config: Arc::new(config),
            identity,
            gateway,
            receipts,
        }
    }

    /// Opens the database, wires the JWT identity provider and spawns the
    /// receipt dispatcher.
    ///
    /// ## Startup Sequence
    /// 1. Connect to `config.database_path` and run migrations
    /// 2. JwtIdentityProvider from `config.jwt_secret`
    /// 3. Spawn ReceiptDispatcher on the current runtime
    pub async fn start(
        config: CommerceConfig,
        gateway: Arc<dyn PaymentGateway>,
        notary: Arc<dyn ReceiptNotary>,
    ) -> ApiResult<(Self, JoinHandle<()>)> {
        let db = Database::new(DbConfig::new(config.database_path.clone())).await?;

        let (dispatcher, receipts) = ReceiptDispatcher::new(db.clone(), notary, &config);
        let task = tokio::spawn(dispatcher.run());

        let identity = Arc::new(JwtIdentityProvider::new(config.jwt_secret.clone()));

        info!(
            path = %config.database_path.display(),
            fee_bps = config.platform_fee.bps(),
            "Commerce core started"
        );

        Ok((Commerce::new(db, config, identity, gateway, receipts), task))
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &CommerceConfig {
        &self.config
    }

    /// Resolves an `Authorization` header value to a caller.
    pub async fn authenticate(&self, authorization: Option<&str>) -> Option<Principal> {
        let token = extract_bearer_token(authorization?)?;
        self.identity.authenticate(token).await
    }

    pub(crate) fn gateway(&self) -> &dyn PaymentGateway {
        self.gateway.as_ref()
    }

    pub(crate) fn receipts(&self) -> &ReceiptDispatcherHandle {
        &self.receipts
    }

    // =========================================================================
    // Services
    // =========================================================================

    pub fn catalog(&self) -> CatalogService<'_> {
        CatalogService::new(self)
    }

    pub fn collabs(&self) -> CollabService<'_> {
        CollabService::new(self)
    }

    pub fn checkout(&self) -> CheckoutService<'_> {
        CheckoutService::new(self)
    }

    pub fn settlement(&self) -> SettlementService<'_> {
        SettlementService::new(self)
    }

    pub fn events(&self) -> EventService<'_> {
        EventService::new(self)
    }

    pub fn venues(&self) -> VenueService<'_> {
        VenueService::new(self)
    }

    pub fn qr(&self) -> QrService<'_> {
        QrService::new(self)
    }

    pub fn reviews(&self) -> ReviewService<'_> {
        ReviewService::new(self)
    }

    pub fn discovery(&self) -> DiscoveryService<'_> {
        DiscoveryService::new(self)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::testing::{harness, TEST_SECRET};

    #[tokio::test]
    async fn test_authenticate_authorization_header() {
        let h = harness().await;
        let token = JwtIdentityProvider::new(TEST_SECRET)
            .issue_token("user-1", NaiveDate::from_ymd_opt(1990, 5, 17))
            .unwrap();

        let caller = h.commerce.authenticate(Some(&format!("Bearer {token}"))).await;
        assert_eq!(caller, Some(Principal::new("user-1", true)));

        assert!(h.commerce.authenticate(None).await.is_none());
        assert!(h.commerce.authenticate(Some(&token)).await.is_none());
        assert!(h.commerce.authenticate(Some("Bearer forged")).await.is_none());
    }
}
