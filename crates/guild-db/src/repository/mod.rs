//! # Repository Module
//!
//! One repository per aggregate.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  guild-commerce service                                                 │
//! │       │                                                                 │
//! │       │  db.orders().settle("pi_…", fee_rate)                          │
//! │       ▼                                                                 │
//! │  OrderRepository                                                       │
//! │  ├── insert(&self, order)                                              │
//! │  ├── get_by_payment_intent(&self, intent)                              │
//! │  └── settle(&self, intent, fee_rate)  ← one transaction                │
//! │       │                                                                 │
//! │       │  borrows the transaction connection                            │
//! │       ▼                                                                 │
//! │  ArtifactRepository::fetch_in / take_supply                             │
//! │  CollabRepository::active_for_artifact                                 │
//! │  ReceiptOutboxRepository::enqueue_in                                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Helpers that take `&mut SqliteConnection` run inside a caller's
//! transaction. Every write transaction starts with a write statement, so
//! SQLite takes the write lock up front and concurrent writers wait on the
//! busy timeout instead of failing with a lock upgrade error.
//!
//! ## Available Repositories
//!
//! - [`ArtifactRepository`](artifact::ArtifactRepository) - Artifact catalog
//! - [`CollabRepository`](collab::CollabRepository) - Revenue-split agreements
//! - [`OrderRepository`](order::OrderRepository) - Orders, settlement, payouts
//! - [`EventRepository`](event::EventRepository) - Events and tickets
//! - [`VenueRepository`](venue::VenueRepository) - Venues and seller catalog
//! - [`QrRepository`](qr::QrRepository) - Shared slug namespace and scan log
//! - [`ReviewRepository`](review::ReviewRepository) - Artifact reviews
//! - [`ReceiptOutboxRepository`](receipt::ReceiptOutboxRepository) - Receipt queue

pub mod artifact;
pub mod collab;
pub mod event;
pub mod order;
pub mod qr;
pub mod receipt;
pub mod review;
pub mod venue;
