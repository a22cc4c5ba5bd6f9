//! Client-side cart sessions persisted to disk.
//!
//! Exercises `CartSession` over the CLI's `FileStorage`: every mutation is
//! written through, and a fresh session restores what the last one left.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::num::NonZeroU32;

use tempfile::TempDir;

use pg_closets_cli::FileStorage;
use pg_closets_core::cart::CART_STORAGE_KEY;
use pg_closets_core::{
    CartPersistence, CartSession, Customization, Money, PricingPolicy, ProductId, PromoCatalog,
    Storage,
};

fn open(dir: &TempDir) -> CartSession<FileStorage> {
    let persistence = CartPersistence::new(FileStorage::new(dir.path()));
    CartSession::open(persistence, PricingPolicy::default())
}

fn qty(n: u32) -> NonZeroU32 {
    NonZeroU32::new(n).unwrap()
}

#[test]
fn test_session_restores_lines_and_promo() {
    let dir = TempDir::new().unwrap();

    let mut session = open(&dir);
    let oak = Customization::none().with("finish", "oak");
    let line = session.add(
        ProductId::new("bypass-door"),
        Money::from_dollars(459),
        qty(1),
        oak.clone(),
    );
    session.set_installation(line, true);
    session
        .apply_promo(&PromoCatalog::builtin(), "WELCOME10")
        .unwrap();
    let before = session.summary();

    let restored = open(&dir);
    let items = restored.cart().items();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, line);
    assert_eq!(items[0].customization, oak);
    assert!(items[0].installation);
    assert_eq!(
        restored.cart().promo_code().map(|p| p.code.as_str()),
        Some("WELCOME10")
    );
    assert_eq!(restored.summary(), before);
}

#[test]
fn test_drawer_state_is_not_persisted() {
    let dir = TempDir::new().unwrap();

    let mut session = open(&dir);
    session.add(
        ProductId::new("bifold-door"),
        Money::from_dollars(299),
        qty(2),
        Customization::none(),
    );
    session.open_drawer();
    assert!(session.cart().is_open());

    let restored = open(&dir);
    assert!(!restored.cart().is_open());
    assert_eq!(restored.totals().item_count, 2);
}

#[test]
fn test_clear_persists_empty_cart() {
    let dir = TempDir::new().unwrap();

    let mut session = open(&dir);
    session.add(
        ProductId::new("bifold-door"),
        Money::from_dollars(299),
        qty(1),
        Customization::none(),
    );
    session.clear();

    assert!(open(&dir).cart().is_empty());
}

#[test]
fn test_corrupt_file_yields_empty_cart() {
    let dir = TempDir::new().unwrap();
    let storage = FileStorage::new(dir.path());
    storage.write(CART_STORAGE_KEY, "{not json").unwrap();

    let mut session = open(&dir);
    assert!(session.cart().is_empty());

    // The next mutation overwrites the bad snapshot
    session.add(
        ProductId::new("mirror-door"),
        Money::from_dollars(120),
        qty(1),
        Customization::none(),
    );
    assert_eq!(open(&dir).cart().items().len(), 1);
}

#[test]
fn test_stored_duplicates_are_merged_on_load() {
    let dir = TempDir::new().unwrap();
    let storage = FileStorage::new(dir.path());
    let snapshot = r#"{
        "version": 1,
        "items": [
            {"id": "6f1c2a9e-1d2b-4c3d-9e8f-0a1b2c3d4e5f", "productId": "door",
             "quantity": 1, "unitPrice": 10000, "customization": {"width": "36"}},
            {"id": "7a2d3b0f-2e3c-4d4e-8f90-1b2c3d4e5f60", "productId": "door",
             "quantity": 2, "unitPrice": 10000, "customization": {"width": "36"}},
            {"id": "8b3e4c10-3f4d-4e5f-9012-2c3d4e5f6071", "productId": "door",
             "quantity": 0, "unitPrice": 10000}
        ]
    }"#;
    storage.write(CART_STORAGE_KEY, snapshot).unwrap();

    let session = open(&dir);
    let items = session.cart().items();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].quantity, 3);
    assert_eq!(session.totals().subtotal, Money::from_dollars(300));
    // 13% of $300
    assert_eq!(session.totals().tax, Money::from_dollars(39));
}

#[test]
fn test_shared_line_ids_are_split_on_load() {
    let dir = TempDir::new().unwrap();
    let storage = FileStorage::new(dir.path());
    let snapshot = r#"{
        "version": 1,
        "items": [
            {"id": "6f1c2a9e-1d2b-4c3d-9e8f-0a1b2c3d4e5f", "productId": "bypass-door",
             "quantity": 1, "unitPrice": 45900},
            {"id": "6f1c2a9e-1d2b-4c3d-9e8f-0a1b2c3d4e5f", "productId": "bifold-door",
             "quantity": 1, "unitPrice": 29900, "customization": null}
        ],
        "promoCode": "SAVE50"
    }"#;
    storage.write(CART_STORAGE_KEY, snapshot).unwrap();

    let mut session = open(&dir);
    let shared = session.cart().items()[0].id;
    assert_ne!(session.cart().items()[1].id, shared);
    assert_eq!(session.summary().discount, Money::from_dollars(50));

    session.remove(shared);
    let items = open(&dir).cart().items().to_vec();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].product_id, ProductId::new("bifold-door"));
}

#[test]
fn test_unknown_snapshot_version_is_discarded() {
    let dir = TempDir::new().unwrap();
    let storage = FileStorage::new(dir.path());
    storage
        .write(CART_STORAGE_KEY, r#"{"version": 99, "items": []}"#)
        .unwrap();

    let persistence = CartPersistence::new(FileStorage::new(dir.path()));
    assert!(persistence.try_load().is_err());
    assert!(persistence.load().is_empty());
}
