//! # Domain Types
//!
//! Core domain types used throughout Guild Commerce.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Artifact     │   │ CollabAgreement │   │     Order       │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │◄──│  artifact_id    │   │  id (UUID)      │       │
//! │  │  owner_id       │   │  splits[]       │   │  items[]        │       │
//! │  │  supply_class   │   │  status         │   │  payment_intent │       │
//! │  │  qr_slug?       │   └─────────────────┘   │  status         │       │
//! │  └─────────────────┘                         └────────┬────────┘       │
//! │                                                       │ settles into   │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌────────▼────────┐       │
//! │  │     Event       │   │     Ticket      │   │     Payout      │       │
//! │  │  capacity?      │◄──│  qr_code        │   │  recipient_id   │       │
//! │  │  qr_slug?       │   │  status         │   │  amount_cents   │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │     Venue       │   │     QrScan      │   │     Review      │       │
//! │  │  qr_slug?       │   │  append-only    │   │  three ratings  │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wire Format
//! Structs serialize in `camelCase`; enum values serialize in
//! `SCREAMING_SNAKE_CASE` and are stored the same way in SQLite.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::{Money, Rate};

// =============================================================================
// Artifact Enums
// =============================================================================

/// What kind of creative work an artifact is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArtifactKind {
    Text,
    Image,
    Video,
    Audio,
    Code,
    #[serde(rename = "MODEL3D")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "MODEL3D"))]
    Model3d,
    Physical,
}

/// How many units of an artifact may ever be sold.
///
/// ```text
/// COMMON   → unlimited, supply_limit always cleared
/// RARE     → capped by supply_limit
/// LIMITED  → capped by supply_limit
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SupplyClass {
    Common,
    Rare,
    Limited,
}

impl SupplyClass {
    /// Whether artifacts of this class carry a supply limit.
    #[inline]
    pub const fn is_constrained(&self) -> bool {
        !matches!(self, SupplyClass::Common)
    }
}

/// Who may see an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Visibility {
    /// Owner and collaborators only.
    Private,
    /// Anyone, listed in discovery.
    Public,
    /// Owner and collaborators only (friend graph lives outside this core).
    Friends,
    /// Anyone with the link.
    Unlisted,
}

impl Default for Visibility {
    fn default() -> Self {
        Visibility::Private
    }
}

/// Print-on-demand fulfilment partner for physical artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PodProvider {
    Printful,
    Printify,
    None,
}

impl Default for PodProvider {
    fn default() -> Self {
        PodProvider::None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum License {
    CcBy,
    CcByNc,
    Proprietary,
}

// =============================================================================
// Artifact
// =============================================================================

/// A sellable creative work.
///
/// Invariant: `supply_sold <= supply_limit` whenever `supply_limit` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Creator who owns the artifact and receives the fallback payout.
    pub owner_id: String,

    /// Users who share view and edit rights with the owner.
    pub collaborators: Vec<String>,

    pub title: String,
    pub kind: ArtifactKind,
    pub description: Option<String>,
    pub media_urls: Vec<String>,
    pub source_repo_url: Option<String>,

    pub supply_class: SupplyClass,

    /// Cap on units sold. Always `None` for COMMON.
    pub supply_limit: Option<i64>,

    /// Units sold so far (incremented at settlement, never at checkout).
    pub supply_sold: i64,

    pub pod_provider: PodProvider,

    /// Unit price in cents. `None` means the artifact is not for sale.
    pub price_cents: Option<i64>,

    pub currency: String,
    pub visibility: Visibility,
    pub reviews_enabled: bool,
    pub license: Option<License>,

    /// Slug in the shared QR namespace.
    pub qr_slug: Option<String>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Artifact {
    /// Returns the price as Money, if the artifact is for sale.
    #[inline]
    pub fn price(&self) -> Option<Money> {
        self.price_cents.map(Money::from_cents)
    }
}

// =============================================================================
// Collaboration Agreement
// =============================================================================

/// Lifecycle of a revenue-split agreement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgreementStatus {
    Draft,
    /// The agreement that governs settlement for its artifact.
    Active,
    Archived,
}

impl Default for AgreementStatus {
    fn default() -> Self {
        AgreementStatus::Draft
    }
}

/// One recipient's share of an agreement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CollabSplit {
    pub user_id: String,
    /// Share in basis points (7000 = 70%).
    pub percent_bps: u32,
}

impl CollabSplit {
    pub fn new(user_id: impl Into<String>, percent: Rate) -> Self {
        CollabSplit {
            user_id: user_id.into(),
            percent_bps: percent.bps(),
        }
    }

    /// The single split used when an artifact has no ACTIVE agreement.
    pub fn sole_owner(owner_id: impl Into<String>) -> Self {
        CollabSplit::new(owner_id, Rate::FULL)
    }

    #[inline]
    pub fn percent(&self) -> Rate {
        Rate::from_bps(self.percent_bps)
    }
}

/// A revenue-split contract attached to an artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CollabAgreement {
    pub id: String,
    pub artifact_id: String,
    /// Order matters: it decides who absorbs the rounding remainder on ties.
    pub splits: Vec<CollabSplit>,
    pub terms_url: Option<String>,
    pub status: AgreementStatus,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Order
// =============================================================================

/// The status of an order.
///
/// ```text
/// PENDING ──(payment confirmed, exactly once)──► PAID
///    │
///    └──► CANCELLED            PAID ──► REFUNDED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Paid,
    Cancelled,
    Refunded,
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Pending
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Paid => "PAID",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Refunded => "REFUNDED",
        };
        f.write_str(s)
    }
}

/// A line item in an order.
/// Uses the snapshot pattern: the unit price is frozen at checkout time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub artifact_id: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
}

impl OrderItem {
    /// `unit_price × quantity`, or a validation error if it overflows.
    pub fn line_total(&self) -> Result<Money, ValidationError> {
        Money::from_cents(self.unit_price_cents)
            .multiply_quantity(self.quantity)
            .ok_or_else(|| ValidationError::amount_overflow("quantity"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub buyer_id: String,
    pub items: Vec<OrderItem>,
    pub subtotal_cents: i64,
    /// Estimated at checkout; replaced by the exact per-line fee sum at settlement.
    pub fees_cents: i64,
    pub total_cents: i64,
    pub payment_intent_id: Option<String>,
    pub status: OrderStatus,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Payout
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayoutStatus {
    Queued,
    Sent,
    Failed,
}

/// Money owed to one recipient for one settled order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Payout {
    pub id: String,
    pub order_id: String,
    pub recipient_id: String,
    pub amount_cents: i64,
    pub status: PayoutStatus,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Payout {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

// =============================================================================
// Events & Tickets
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub organizer_id: String,
    pub title: String,
    pub description: Option<String>,
    pub venue_id: Option<String>,
    #[ts(as = "String")]
    pub start_time: DateTime<Utc>,
    #[ts(as = "String")]
    pub end_time: DateTime<Utc>,
    /// `None` means tickets are not on sale.
    pub ticket_price_cents: Option<i64>,
    /// `None` means unlimited.
    pub capacity: Option<i64>,
    pub qr_slug: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// Ticket lifecycle.
///
/// ```text
/// VALID ──scan──► USED
///   │               │
///   └────refund─────┴──► REFUNDED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    Valid,
    Used,
    Refunded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: String,
    pub event_id: String,
    pub buyer_id: String,
    pub status: TicketStatus,
    /// Opaque unique payload encoded in the ticket's QR code.
    pub qr_code: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Venues
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Venue {
    pub id: String,
    pub name: String,
    pub contact_email: String,
    pub address: Option<String>,
    pub qr_slug: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShippingMode {
    SelfShip,
    Pod,
}

/// An artifact stocked by a venue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SellerCatalogItem {
    pub id: String,
    /// The venue selling the item.
    pub seller_id: String,
    pub artifact_id: String,
    pub local_inventory: Option<i64>,
    pub price_cents: i64,
    pub shipping_mode: ShippingMode,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// QR Directory
// =============================================================================

/// Which entity set a QR slug belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QrEntityType {
    Artifact,
    Event,
    Venue,
}

impl QrEntityType {
    /// Client route a scan of this entity redirects to.
    pub fn redirect_url(&self, entity_id: &str) -> String {
        match self {
            QrEntityType::Artifact => format!("/artifacts/{entity_id}"),
            QrEntityType::Event => format!("/events/{entity_id}"),
            QrEntityType::Venue => format!("/venues/{entity_id}"),
        }
    }
}

/// Append-only audit record of a slug resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct QrScan {
    pub id: String,
    pub slug: String,
    pub entity_type: QrEntityType,
    pub entity_id: String,
    #[ts(as = "String")]
    pub scanned_at: DateTime<Utc>,
}

/// Result of resolving a slug.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct QrResolution {
    pub entity_type: QrEntityType,
    pub entity_id: String,
    pub redirect_url: String,
}

// =============================================================================
// Reviews & Discovery
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: String,
    pub artifact_id: String,
    pub reviewer_id: String,
    pub rating_quality: i64,
    pub rating_style: i64,
    pub rating_skill_impact: i64,
    pub comment: Option<String>,
    pub tags: Vec<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Perspective a caller browses discovery from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscoveryRole {
    Explorer,
    Creator,
    Client,
    Producer,
    #[serde(other)]
    Other,
}

impl Default for DiscoveryRole {
    fn default() -> Self {
        DiscoveryRole::Explorer
    }
}

// =============================================================================
// Receipt Outbox
// =============================================================================

/// A pending settlement receipt notification.
/// Uses the outbox pattern so a slow notary never blocks settlement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptOutboxEntry {
    pub id: String,
    pub order_id: String,
    /// Number of delivery attempts.
    pub attempts: i64,
    /// Last error message if delivery failed.
    pub last_error: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub attempted_at: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub sent_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Unit Tests
// =============================================================================
