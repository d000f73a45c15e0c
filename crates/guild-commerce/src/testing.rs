//! Fixtures shared by the service tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use guild_core::{Artifact, ArtifactKind, SupplyClass, Visibility};
use guild_db::{Database, DbConfig};

use crate::config::CommerceConfig;
use crate::dispatcher::ReceiptDispatcher;
use crate::gateway::MockPaymentGateway;
use crate::identity::{JwtIdentityProvider, Principal};
use crate::notary::{NotaryError, ReceiptNotary};
use crate::services::NewArtifact;
use crate::Commerce;

pub const TEST_SECRET: &str = "test-secret";

/// Notary that remembers deliveries and can be switched to failing.
#[derive(Default)]
pub struct RecordingNotary {
    delivered: Mutex<Vec<String>>,
    failing: AtomicBool,
}

impl RecordingNotary {
    pub fn delivered(&self) -> Vec<String> {
        self.delivered.lock().unwrap().clone()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl ReceiptNotary for RecordingNotary {
    async fn notify(&self, order_id: &str) -> Result<(), NotaryError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotaryError::Unavailable("notary offline".into()));
        }
        self.delivered.lock().unwrap().push(order_id.to_string());
        Ok(())
    }
}

/// A wired [`Commerce`] whose dispatcher is driven by hand.
pub struct Harness {
    pub commerce: Commerce,
    pub dispatcher: ReceiptDispatcher,
    pub notary: Arc<RecordingNotary>,
}

pub async fn harness() -> Harness {
    harness_with(Database::new(DbConfig::in_memory()).await.unwrap(), CommerceConfig::new(TEST_SECRET))
}

pub fn harness_with(db: Database, config: CommerceConfig) -> Harness {
    let notary = Arc::new(RecordingNotary::default());
    let (dispatcher, receipts) = ReceiptDispatcher::new(db.clone(), notary.clone(), &config);

    let commerce = Commerce::new(
        db,
        config,
        Arc::new(JwtIdentityProvider::new(TEST_SECRET)),
        Arc::new(MockPaymentGateway),
        receipts,
    );

    Harness {
        commerce,
        dispatcher,
        notary,
    }
}

pub fn adult(user_id: &str) -> Principal {
    Principal::new(user_id, true)
}

pub fn minor(user_id: &str) -> Principal {
    Principal::new(user_id, false)
}

/// Creates a public IMAGE artifact owned by `owner`.
pub async fn listed(
    commerce: &Commerce,
    owner: &str,
    class: SupplyClass,
    limit: Option<i64>,
    price_cents: i64,
) -> Artifact {
    commerce
        .catalog()
        .create(
            Some(&adult(owner)),
            NewArtifact {
                title: Some(format!("{owner}'s piece")),
                kind: Some(ArtifactKind::Image),
                supply_class: Some(class),
                supply_limit: limit,
                price_cents: Some(price_cents),
                visibility: Some(Visibility::Public),
                ..Default::default()
            },
        )
        .await
        .unwrap()
}
