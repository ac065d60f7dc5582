#![forbid(unsafe_code)]
mod common;

use common::{at, FlakyStorage, Fixture};
use shiftcover::{
    ConflictPolicy, EngineOptions, Role, SchedError, Scheduler, Storage, User, UserStatus,
};
use std::sync::Arc;

#[test]
fn ranks_staff_for_a_day_shift() {
    let fx = Fixture::new();
    let ann = fx.user("ann@example.com", Role::Staff);
    let bob = fx.user("bob@example.com", Role::Staff);
    let carol = fx.user("carol@example.com", Role::Staff);
    let dave = fx.user("dave@example.com", Role::Staff);
    fx.user("boss@example.com", Role::Manager);

    fx.busy(&carol, 10, 12);
    // scores posés après l'acceptation, qui recalcule la fiabilité
    fx.set_score(&bob, 0.95);
    fx.set_score(&carol, 0.85);
    fx.set_score(&dave, 0.5);
    fx.storage
        .update_user_with(&dave.id, &mut |u: &mut User| {
            u.active = false;
            u.status = UserStatus::Inactive;
        })
        .unwrap();

    let suggestion = fx
        .scheduler
        .suggest_staff("RN", at(9), at(17), Some(&ann.id))
        .unwrap();

    let ranked: Vec<_> = suggestion
        .recommended_staff
        .iter()
        .map(|m| (m.staff.email.as_str(), m.score))
        .collect();
    // bob 38+30+30+10 plafonné, carol 34+30+10, dave 20+30+30-50
    assert_eq!(
        ranked,
        vec![
            ("bob@example.com", 100),
            ("carol@example.com", 74),
            ("dave@example.com", 30),
        ]
    );
    assert!(suggestion
        .recommended_staff
        .iter()
        .all(|m| m.staff.id != ann.id));

    let carol_match = &suggestion.recommended_staff[1];
    assert!(carol_match.has_conflict);
    assert_eq!(carol_match.conflicting_shifts.len(), 1);
    assert_eq!(carol_match.conflicting_shifts[0].start, at(10));
    assert_eq!(carol_match.reasons[0], "Good reliability");
    assert_eq!(carol_match.reasons[2], "Has 1 conflicting shift(s)");

    assert_eq!(suggestion.total_available_staff, 1);
    assert_eq!(
        suggestion.conflict_warnings,
        vec!["1 staff member(s) have scheduling conflicts for this time slot".to_string()]
    );
    assert_eq!(
        suggestion.best_match.as_ref().map(|m| m.staff.id.clone()),
        Some(bob.id)
    );
}

#[test]
fn adjacent_shift_is_not_a_conflict() {
    let fx = Fixture::new();
    let bob = fx.user("bob@example.com", Role::Staff);
    fx.busy(&bob, 17, 19);

    let suggestion = fx.scheduler.suggest_staff("RN", at(9), at(17), None).unwrap();
    assert_eq!(suggestion.recommended_staff.len(), 1);
    assert!(!suggestion.recommended_staff[0].has_conflict);
    assert!(suggestion.conflict_warnings.is_empty());
}

#[test]
fn equal_scores_keep_storage_order() {
    let fx = Fixture::new();
    let emails: Vec<String> = (0..12).map(|i| format!("nurse{i:02}@example.com")).collect();
    for email in &emails {
        fx.user(email, Role::Staff);
    }

    for _ in 0..5 {
        let suggestion = fx.scheduler.suggest_staff("RN", at(9), at(17), None).unwrap();
        let order: Vec<_> = suggestion
            .recommended_staff
            .iter()
            .map(|m| m.staff.email.clone())
            .collect();
        assert_eq!(order, emails);
        assert_eq!(suggestion.total_available_staff, emails.len());
    }
}

#[test]
fn nobody_available_is_reported() {
    let fx = Fixture::new();
    let ann = fx.user("ann@example.com", Role::Staff);

    let suggestion = fx
        .scheduler
        .suggest_staff("RN", at(9), at(17), Some(&ann.id))
        .unwrap();
    assert!(suggestion.recommended_staff.is_empty());
    assert!(suggestion.best_match.is_none());
    assert_eq!(suggestion.total_available_staff, 0);
    assert_eq!(
        suggestion.conflict_warnings,
        vec!["No staff members are available without conflicts for this time slot".to_string()]
    );
}

#[test]
fn inverted_range_is_rejected() {
    let fx = Fixture::new();
    let err = fx.scheduler.suggest_staff("RN", at(17), at(9), None).unwrap_err();
    assert!(matches!(err, SchedError::InvalidTimeRange));
}

fn flaky_scheduler(policy: ConflictPolicy) -> (Arc<FlakyStorage>, Scheduler) {
    let storage = Arc::new(FlakyStorage::default());
    let scheduler = Scheduler::builder(storage.clone())
        .options(EngineOptions {
            max_workers: 2,
            conflict_policy: policy,
        })
        .build()
        .unwrap();
    (storage, scheduler)
}

#[test]
fn staff_pool_failure_becomes_a_warning() {
    let (storage, scheduler) = flaky_scheduler(ConflictPolicy::FailClosed);
    scheduler.register_user("bob@example.com", Role::Staff).unwrap();
    storage.break_staff_pool();

    let suggestion = scheduler.suggest_staff("RN", at(9), at(17), None).unwrap();
    assert!(suggestion.recommended_staff.is_empty());
    assert!(suggestion.best_match.is_none());
    assert_eq!(
        suggestion.conflict_warnings,
        vec!["Error loading staff suggestions: connection reset".to_string()]
    );
}

#[test]
fn unverifiable_schedule_fails_closed_by_default() {
    let (storage, scheduler) = flaky_scheduler(ConflictPolicy::default());
    let bob = scheduler.register_user("bob@example.com", Role::Staff).unwrap();
    storage.break_assignments();

    let report = scheduler.find_conflicts(&bob.id, at(9), at(17)).unwrap();
    assert!(report.has_conflict);
    assert!(report.degraded);
    assert!(report.conflicting_shifts.is_empty());

    let suggestion = scheduler.suggest_staff("RN", at(9), at(17), None).unwrap();
    let m = &suggestion.recommended_staff[0];
    // 40 + 30 + 10, sans les points d'absence de conflit
    assert_eq!(m.score, 80);
    assert_eq!(m.reasons[2], "Schedule could not be verified");
    assert_eq!(suggestion.total_available_staff, 0);
}

#[test]
fn fail_open_ignores_unverifiable_schedule() {
    let (storage, scheduler) = flaky_scheduler(ConflictPolicy::FailOpen);
    let bob = scheduler.register_user("bob@example.com", Role::Staff).unwrap();
    storage.break_assignments();

    let report = scheduler.find_conflicts(&bob.id, at(9), at(17)).unwrap();
    assert!(!report.has_conflict);
    assert!(report.degraded);

    let suggestion = scheduler.suggest_staff("RN", at(9), at(17), None).unwrap();
    assert_eq!(suggestion.recommended_staff[0].score, 100);
    assert_eq!(suggestion.total_available_staff, 1);
}
