use std::sync::Arc;

use assert_matches::assert_matches;

use doctor_cell::models::SlotError;
use doctor_cell::services::{doctor::DoctorService, slots::SlotRegistry};
use shared_database::{Collection, DocumentStore, MemoryStore};
use shared_utils::test_utils::MockSupabaseResponses;

async fn store_with_doctor(id: &str, slots: &[(&str, bool)]) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store
        .set(&Collection::Doctors, id, MockSupabaseResponses::doctor_profile(id, slots))
        .await
        .unwrap();
    store
}

#[tokio::test]
async fn marked_slot_is_no_longer_available() {
    let store = store_with_doctor("d1", &[("09-10", false), ("10-11", false)]).await;
    let registry = SlotRegistry::new(store.clone());

    assert!(registry.is_available("d1", "09-10").await.unwrap());
    registry.mark_booked("d1", "09-10").await.unwrap();
    assert!(!registry.is_available("d1", "09-10").await.unwrap());

    let doctor = DoctorService::new(store).get_doctor("d1").await.unwrap();
    assert_eq!(SlotRegistry::available_slots(&doctor), vec!["10-11"]);
}

#[tokio::test]
async fn second_mark_is_rejected() {
    let store = store_with_doctor("d1", &[("09-10", false)]).await;
    let registry = SlotRegistry::new(store);

    registry.mark_booked("d1", "09-10").await.unwrap();
    assert_matches!(
        registry.mark_booked("d1", "09-10").await,
        Err(SlotError::SlotAlreadyBooked { slot, .. }) if slot == "09-10"
    );
}

#[tokio::test]
async fn unknown_labels_and_doctors_are_distinguished() {
    let store = store_with_doctor("d1", &[("09-10", false)]).await;
    let registry = SlotRegistry::new(store);

    assert!(!registry.is_available("d1", "23-24").await.unwrap());
    assert_matches!(
        registry.mark_booked("d1", "23-24").await,
        Err(SlotError::UnknownSlot { .. })
    );
    assert_matches!(
        registry.mark_booked("ghost", "09-10").await,
        Err(SlotError::DoctorNotFound(id)) if id == "ghost"
    );
    assert_matches!(
        registry.is_available("ghost", "09-10").await,
        Err(SlotError::DoctorNotFound(_))
    );
}

#[tokio::test]
async fn reset_releases_a_booked_slot() {
    let store = store_with_doctor("d1", &[("09-10", true)]).await;
    let registry = SlotRegistry::new(store);

    registry.reset_slot("d1", "09-10").await.unwrap();
    assert!(registry.is_available("d1", "09-10").await.unwrap());

    // Releasing an already free slot is harmless.
    registry.reset_slot("d1", "09-10").await.unwrap();
    registry.mark_booked("d1", "09-10").await.unwrap();
}

#[tokio::test]
async fn concurrent_marks_have_exactly_one_winner() {
    let store = store_with_doctor("d1", &[("09-10", false)]).await;
    let registry = Arc::new(SlotRegistry::new(store));

    let attempts: Vec<_> = (0..10)
        .map(|_| {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move { registry.mark_booked("d1", "09-10").await })
        })
        .collect();

    let mut winners = 0;
    let mut losers = 0;
    for attempt in attempts {
        match attempt.await.unwrap() {
            Ok(()) => winners += 1,
            Err(SlotError::SlotAlreadyBooked { .. }) => losers += 1,
            Err(other) => panic!("unexpected error: {}", other),
        }
    }
    assert_eq!(winners, 1);
    assert_eq!(losers, 9);
}

#[tokio::test]
async fn available_doctors_need_a_free_slot() {
    let store = Arc::new(MemoryStore::new());
    store
        .set(&Collection::Doctors, "busy", MockSupabaseResponses::doctor_profile("busy", &[("09-10", true)]))
        .await
        .unwrap();
    store
        .set(&Collection::Doctors, "free", MockSupabaseResponses::doctor_profile("free", &[("09-10", false)]))
        .await
        .unwrap();

    let service = DoctorService::new(store);
    assert_eq!(service.list_doctors().await.unwrap().len(), 2);

    let available = service.available_doctors().await.unwrap();
    assert_eq!(available.len(), 1);
    assert_eq!(available[0].user_id, "free");
}
