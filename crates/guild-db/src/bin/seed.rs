//! # Seed Data Generator
//!
//! Populates a database with a small demo catalog for local development.
//!
//! ## Usage
//! ```bash
//! # Seed ./guild_dev.db
//! cargo run -p guild-db --bin seed
//!
//! # Specify database path
//! cargo run -p guild-db --bin seed -- --db ./data/guild.db
//! ```
//!
//! ## Generated Data
//! - One artifact per supply class, one of them QR-slugged
//! - An ACTIVE 70/30 agreement on the limited print
//! - A venue stocking the print
//! - An event with capacity 50 at that venue

use chrono::{Duration, Utc};
use std::env;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use guild_core::{
    AgreementStatus, Artifact, ArtifactKind, CollabAgreement, CollabSplit, Event, License,
    PodProvider, Rate, SellerCatalogItem, ShippingMode, SupplyClass, Venue, Visibility,
    DEFAULT_CURRENCY,
};
use guild_db::{ArtifactFilter, Database, DbConfig};

const OWNER_ID: &str = "demo-owner";
const COLLABORATOR_ID: &str = "demo-collaborator";

/// (title, kind, supply class, supply limit, price in cents, qr slug)
const ARTIFACTS: &[(&str, ArtifactKind, SupplyClass, Option<i64>, i64, Option<&str>)] = &[
    ("Aurora Over the Fjord", ArtifactKind::Image, SupplyClass::Limited, Some(10), 500, Some("aurora")),
    ("Tidal Loops", ArtifactKind::Audio, SupplyClass::Rare, Some(3), 2000, None),
    ("Pocket Shaders", ArtifactKind::Code, SupplyClass::Common, None, 900, None),
    ("Lantern Bust", ArtifactKind::Model3d, SupplyClass::Limited, Some(25), 4500, None),
];

fn artifact(
    title: &str,
    kind: ArtifactKind,
    supply_class: SupplyClass,
    supply_limit: Option<i64>,
    price_cents: i64,
    qr_slug: Option<&str>,
) -> Artifact {
    let now = Utc::now();
    Artifact {
        id: Uuid::new_v4().to_string(),
        owner_id: OWNER_ID.to_string(),
        collaborators: vec![COLLABORATOR_ID.to_string()],
        title: title.to_string(),
        kind,
        description: None,
        media_urls: vec![],
        source_repo_url: None,
        supply_class,
        supply_limit,
        supply_sold: 0,
        pod_provider: PodProvider::None,
        price_cents: Some(price_cents),
        currency: DEFAULT_CURRENCY.to_string(),
        visibility: Visibility::Public,
        reviews_enabled: true,
        license: Some(License::CcByNc),
        qr_slug: qr_slug.map(str::to_string),
        created_at: now,
        updated_at: now,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = env::args().collect();
    let mut db_path = String::from("./guild_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Guild Commerce Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./guild_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Guild Commerce Seed Data Generator");
    println!("=====================================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.artifacts().list(&ArtifactFilter::default()).await?;
    if !existing.is_empty() {
        println!("⚠ Database already has {} artifacts", existing.len());
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let mut artifacts = Vec::with_capacity(ARTIFACTS.len());
    for &(title, kind, class, limit, price, slug) in ARTIFACTS {
        let a = artifact(title, kind, class, limit, price, slug);
        db.artifacts().insert(&a).await?;
        info!(id = %a.id, title = %a.title, "Seeded artifact");
        artifacts.push(a);
    }

    let print = &artifacts[0];
    let now = Utc::now();

    db.collabs()
        .insert(&CollabAgreement {
            id: Uuid::new_v4().to_string(),
            artifact_id: print.id.clone(),
            splits: vec![
                CollabSplit::new(OWNER_ID, Rate::from_bps(7000)),
                CollabSplit::new(COLLABORATOR_ID, Rate::from_bps(3000)),
            ],
            terms_url: None,
            status: AgreementStatus::Active,
            created_at: now,
            updated_at: now,
        })
        .await?;
    println!("✓ Agreement: 70/30 on '{}'", print.title);

    let venue = Venue {
        id: Uuid::new_v4().to_string(),
        name: "Harbor Street Gallery".to_string(),
        contact_email: "hello@harbor.example".to_string(),
        address: Some("12 Harbor Street".to_string()),
        qr_slug: Some("harbor".to_string()),
        created_at: now,
    };
    db.venues().insert(&venue).await?;
    db.venues()
        .add_catalog_item(&SellerCatalogItem {
            id: Uuid::new_v4().to_string(),
            seller_id: venue.id.clone(),
            artifact_id: print.id.clone(),
            local_inventory: Some(4),
            price_cents: 650,
            shipping_mode: ShippingMode::SelfShip,
            created_at: now,
        })
        .await?;
    println!("✓ Venue: {}", venue.name);

    let start = now + Duration::days(14);
    let event = Event {
        id: Uuid::new_v4().to_string(),
        organizer_id: OWNER_ID.to_string(),
        title: "Night Market".to_string(),
        description: Some("Prints, zines and live sets".to_string()),
        venue_id: Some(venue.id.clone()),
        start_time: start,
        end_time: start + Duration::hours(5),
        ticket_price_cents: Some(1500),
        capacity: Some(50),
        qr_slug: Some("night-market".to_string()),
        created_at: now,
        updated_at: now,
    };
    db.events().insert(&event).await?;
    println!("✓ Event: {} (capacity 50)", event.title);

    println!();
    println!("✓ Seed complete! {} artifacts", artifacts.len());

    Ok(())
}
