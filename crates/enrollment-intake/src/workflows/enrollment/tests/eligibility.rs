use super::common::*;
use std::sync::Arc;
use std::time::Duration;

use crate::workflows::enrollment::domain::{AgeBracket, AgeBracketId};
use crate::workflows::enrollment::eligibility::{is_eligible, AgeValidator, CachePolicy};
use crate::workflows::enrollment::repository::AgeBracketStore;
use crate::workflows::enrollment::{AgeBracketService, IntakeError};

fn stored(id: &str, min_age: u32, max_age: u32) -> AgeBracket {
    AgeBracket {
        id: AgeBracketId(id.to_string()),
        min_age,
        max_age,
    }
}

#[test]
fn eligibility_requires_some_inclusive_bracket() {
    let brackets = vec![stored("teens", 13, 19), stored("twenties", 20, 29)];

    assert!(is_eligible(13, &brackets));
    assert!(is_eligible(19, &brackets));
    assert!(is_eligible(29, &brackets));
    assert!(!is_eligible(12, &brackets));
    assert!(!is_eligible(30, &brackets));
    assert!(!is_eligible(25, &[]));
}

#[test]
fn disabled_policy_reads_store_on_every_check() {
    let store = Arc::new(CountingBracketStore::default());
    let validator = AgeValidator::new(store.clone(), CachePolicy::Disabled);

    assert!(!validator.check(25).expect("check succeeds"));
    store.create(bracket(20, 30)).expect("bracket created");
    assert!(validator.check(25).expect("check succeeds"));
    assert_eq!(store.list_calls(), 2);
}

#[test]
fn lazy_policy_keeps_snapshot_taken_before_bracket_change() {
    let store = Arc::new(CountingBracketStore::default());
    store.create(bracket(20, 30)).expect("bracket created");
    let validator = AgeValidator::new(store.clone(), CachePolicy::Lazy);

    assert!(!validator.check(45).expect("check succeeds"));

    let created = store.create(bracket(40, 50)).expect("bracket created");
    assert!(
        !validator.check(45).expect("check succeeds"),
        "snapshot predates the new bracket"
    );

    assert_eq!(store.list_calls(), 1);

    validator.invalidate();
    assert!(validator.check(45).expect("check succeeds"));
    assert_eq!(store.list_calls(), 2);
    assert!(store
        .inner
        .list()
        .expect("list")
        .iter()
        .any(|stored| stored.id == created.id));
}

#[test]
fn lazy_policy_sees_changes_made_before_first_use() {
    let store = Arc::new(CountingBracketStore::default());
    let validator = AgeValidator::new(store.clone(), CachePolicy::Lazy);

    store.create(bracket(20, 30)).expect("bracket created");

    assert!(validator.check(25).expect("check succeeds"));
    assert!(validator.check(26).expect("check succeeds"));
    assert_eq!(store.list_calls(), 1);
}

#[test]
fn lazy_policy_keeps_accepting_deleted_bracket_until_invalidated() {
    let store = Arc::new(CountingBracketStore::default());
    let created = store.create(bracket(20, 30)).expect("bracket created");
    let validator = AgeValidator::new(store.clone(), CachePolicy::Lazy);

    assert!(validator.check(25).expect("check succeeds"));
    store.delete(&created.id).expect("bracket deleted");
    assert!(validator.check(25).expect("stale snapshot still answers"));

    validator.invalidate();
    assert!(!validator.check(25).expect("check succeeds"));
}

#[test]
fn ttl_policy_refreshes_expired_snapshots() {
    let store = Arc::new(CountingBracketStore::default());
    let expiring = AgeValidator::new(store.clone(), CachePolicy::Ttl(Duration::ZERO));
    assert!(!expiring.check(25).expect("check succeeds"));
    store.create(bracket(20, 30)).expect("bracket created");
    assert!(expiring.check(25).expect("expired snapshot reloads"));

    let long_lived = AgeValidator::new(store.clone(), CachePolicy::Ttl(Duration::from_secs(3600)));
    assert!(!long_lived.check(45).expect("check succeeds"));
    store.create(bracket(40, 50)).expect("bracket created");
    assert!(!long_lived.check(45).expect("snapshot still fresh"));
}

#[test]
fn bracket_service_invalidates_local_snapshot() {
    let harness = build_harness(CachePolicy::Lazy);

    match harness.intake.request(jane()) {
        Err(IntakeError::InvalidAge { age: 25 }) => {}
        other => panic!("expected invalid age, got {other:?}"),
    }

    harness
        .brackets
        .create_bracket(bracket(20, 30))
        .expect("bracket created");
    harness
        .intake
        .request(jane())
        .expect("local snapshot was invalidated");
}

#[test]
fn out_of_band_bracket_changes_stay_invisible_to_lazy_instance() {
    let harness = build_harness(CachePolicy::Lazy);
    assert!(harness.intake.request(jane()).is_err());

    // Another instance registers the bracket directly against the shared store.
    harness.store.create(bracket(20, 30)).expect("bracket created");
    assert!(matches!(
        harness.intake.request(jane()),
        Err(IntakeError::InvalidAge { .. })
    ));

    harness.validator.invalidate();
    assert!(harness.intake.request(jane()).is_ok());
}

#[test]
fn bracket_change_during_reload_is_not_overwritten_by_stale_snapshot() {
    let store = Arc::new(InterleavingBracketStore::default());
    let validator = Arc::new(AgeValidator::new(store.clone(), CachePolicy::Lazy));
    let service = Arc::new(AgeBracketService::new(store.clone(), validator.clone()));

    let weak_service = Arc::downgrade(&service);
    store.during_first_list(move || {
        if let Some(service) = weak_service.upgrade() {
            service
                .create_bracket(bracket(40, 50))
                .expect("bracket created");
        }
    });

    // The in-flight read predates the new bracket, so this answer is stale.
    assert!(!validator.check(45).expect("check succeeds"));
    assert!(
        validator.check(45).expect("check succeeds"),
        "reload that raced the invalidation must not be cached"
    );
}
