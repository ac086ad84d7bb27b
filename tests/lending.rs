//! Lending state machine tests against the in-memory store

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use tokio_test::{assert_err, assert_ok};

use circulation_server::{
    clock::ManualClock,
    config::LendingConfig,
    error::AppError,
    models::{
        item::CreateItem, member::CreateMember, Item, ItemStatus, LoanStatus, Member, MemberStatus,
    },
    repository::MemoryLendingStore,
    services::lending::LendingService,
};

struct Harness {
    store: MemoryLendingStore,
    clock: Arc<ManualClock>,
    lending: LendingService,
}

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
}

fn harness(config: LendingConfig) -> Harness {
    let store = MemoryLendingStore::new();
    let clock = Arc::new(ManualClock::new(start()));
    let lending = LendingService::new(Arc::new(store.clone()), config, clock.clone());
    Harness {
        store,
        clock,
        lending,
    }
}

async fn add_item(store: &MemoryLendingStore, isbn: &str, copies: i32) -> Item {
    store
        .add_item(CreateItem {
            isbn: isbn.to_string(),
            title: format!("Title {}", isbn),
            author: "Ursula K. Le Guin".to_string(),
            category: "fiction".to_string(),
            total_copies: Some(copies),
            available_copies: None,
        })
        .await
        .unwrap()
}

async fn add_member(store: &MemoryLendingStore, email: &str) -> Member {
    store
        .add_member(CreateMember {
            name: "Test Member".to_string(),
            email: email.to_string(),
            membership_number: None,
        })
        .await
        .unwrap()
}

fn policy_reason(err: AppError) -> String {
    match err {
        AppError::PolicyViolation(reason) => reason,
        other => panic!("expected policy violation, got {:?}", other),
    }
}

#[tokio::test]
async fn test_borrow_and_return_same_day() {
    let h = harness(LendingConfig::default());
    let item = add_item(&h.store, "9780441478125", 2).await;
    let member = add_member(&h.store, "genly@example.org").await;

    let loan = assert_ok!(h.lending.borrow(item.id, member.id).await);
    assert_eq!(loan.status, LoanStatus::Active);
    assert_eq!(loan.borrowed_at, start());
    assert_eq!(loan.due_date, start() + Duration::days(14));

    let on_loan = h.store.item(item.id).await.unwrap();
    assert_eq!(on_loan.available_copies, 1);
    assert_eq!(on_loan.status, ItemStatus::Available);

    h.clock.advance(Duration::hours(3));
    let outcome = assert_ok!(h.lending.return_loan(loan.id).await);
    assert_eq!(outcome.loan.status, LoanStatus::Returned);
    assert_eq!(outcome.loan.returned_at, Some(start() + Duration::hours(3)));
    assert!(outcome.fine.is_none());

    let restored = h.store.item(item.id).await.unwrap();
    assert_eq!(restored.available_copies, 2);
    assert!(h.store.fines().await.is_empty());
}

#[tokio::test]
async fn test_last_copy_marks_item_loaned() {
    let h = harness(LendingConfig::default());
    let item = add_item(&h.store, "9780441478125", 1).await;
    let first = add_member(&h.store, "a@example.org").await;
    let second = add_member(&h.store, "b@example.org").await;

    let loan = assert_ok!(h.lending.borrow(item.id, first.id).await);
    let loaned = h.store.item(item.id).await.unwrap();
    assert_eq!(loaned.available_copies, 0);
    assert_eq!(loaned.status, ItemStatus::Loaned);

    let err = assert_err!(h.lending.borrow(item.id, second.id).await);
    assert_eq!(policy_reason(err), "item is loaned");

    assert_ok!(h.lending.return_loan(loan.id).await);
    let back = h.store.item(item.id).await.unwrap();
    assert_eq!(back.available_copies, 1);
    assert_eq!(back.status, ItemStatus::Available);
}

#[tokio::test]
async fn test_loan_limit() {
    let h = harness(LendingConfig::default());
    let member = add_member(&h.store, "reader@example.org").await;

    for isbn in ["0000000001", "0000000002", "0000000003"] {
        let item = add_item(&h.store, isbn, 1).await;
        assert_ok!(h.lending.borrow(item.id, member.id).await);
    }

    let fourth = add_item(&h.store, "0000000004", 1).await;
    let err = assert_err!(h.lending.borrow(fourth.id, member.id).await);
    assert_eq!(policy_reason(err), "loan limit exceeded");

    // Nothing was persisted by the refused borrow
    assert_eq!(h.store.loans().await.len(), 3);
    assert_eq!(h.store.item(fourth.id).await.unwrap().available_copies, 1);
}

#[tokio::test]
async fn test_eligibility_order_and_not_found() {
    let h = harness(LendingConfig::default());
    let item = add_item(&h.store, "9780060512750", 1).await;
    let member = add_member(&h.store, "shevek@example.org").await;

    let err = assert_err!(h.lending.check_eligibility(9999, member.id).await);
    assert!(matches!(err, AppError::NotFound(_)));
    let err = assert_err!(h.lending.check_eligibility(item.id, 9999).await);
    assert!(matches!(err, AppError::NotFound(_)));

    // Item status is checked before member standing
    h.store
        .set_item_status(item.id, ItemStatus::Maintenance)
        .await
        .unwrap();
    h.store
        .set_member_status(member.id, MemberStatus::Suspended)
        .await
        .unwrap();
    let eligibility = assert_ok!(h.lending.check_eligibility(item.id, member.id).await);
    assert_eq!(policy_reason(eligibility.into_result().unwrap_err()), "item is maintenance");

    h.store
        .set_item_status(item.id, ItemStatus::Available)
        .await
        .unwrap();
    let eligibility = assert_ok!(h.lending.check_eligibility(item.id, member.id).await);
    assert_eq!(policy_reason(eligibility.into_result().unwrap_err()), "member suspended");

    h.store
        .set_member_status(member.id, MemberStatus::Active)
        .await
        .unwrap();
    let eligibility = assert_ok!(h.lending.check_eligibility(item.id, member.id).await);
    assert!(eligibility.is_allowed());

    // The check has no side effects
    assert!(h.store.loans().await.is_empty());
    assert_eq!(h.store.item(item.id).await.unwrap().available_copies, 1);
}

#[tokio::test]
async fn test_late_return_fine() {
    let h = harness(LendingConfig::default());
    let item = add_item(&h.store, "9780553293357", 1).await;
    let member = add_member(&h.store, "hari@example.org").await;

    let loan = assert_ok!(h.lending.borrow(item.id, member.id).await);
    h.clock.set(start() + Duration::days(20));

    let outcome = assert_ok!(h.lending.return_loan(loan.id).await);
    let fine = outcome.fine.expect("late return is fined");
    assert_eq!(fine.amount, Decimal::new(300, 2));
    assert_eq!(fine.loan_id, loan.id);
    assert_eq!(fine.member_id, member.id);
    assert!(fine.paid_at.is_none());

    // The unpaid fine blocks the next borrow
    let err = assert_err!(h.lending.borrow(item.id, member.id).await);
    assert_eq!(policy_reason(err), "unpaid fines outstanding");

    let paid = assert_ok!(h.lending.pay_fine(fine.id).await);
    assert_eq!(paid.paid_at, Some(start() + Duration::days(20)));
    assert_ok!(h.lending.borrow(item.id, member.id).await);
}

#[tokio::test]
async fn test_partial_day_counts_as_full_day() {
    let h = harness(LendingConfig::default());
    let item = add_item(&h.store, "9780553293357", 1).await;
    let member = add_member(&h.store, "hari@example.org").await;

    let loan = assert_ok!(h.lending.borrow(item.id, member.id).await);
    h.clock.set(loan.due_date + Duration::minutes(1));

    let outcome = assert_ok!(h.lending.return_loan(loan.id).await);
    assert_eq!(outcome.fine.unwrap().amount, Decimal::new(50, 2));
}

#[tokio::test]
async fn test_return_on_due_date_is_not_fined() {
    let h = harness(LendingConfig::default());
    let item = add_item(&h.store, "9780553293357", 1).await;
    let member = add_member(&h.store, "hari@example.org").await;

    let loan = assert_ok!(h.lending.borrow(item.id, member.id).await);
    h.clock.set(loan.due_date);

    let outcome = assert_ok!(h.lending.return_loan(loan.id).await);
    assert!(outcome.fine.is_none());
}

#[tokio::test]
async fn test_double_return() {
    let h = harness(LendingConfig::default());
    let item = add_item(&h.store, "9780441013593", 2).await;
    let member = add_member(&h.store, "paul@example.org").await;

    let loan = assert_ok!(h.lending.borrow(item.id, member.id).await);
    h.clock.set(start() + Duration::days(16));
    assert_ok!(h.lending.return_loan(loan.id).await);

    let err = assert_err!(h.lending.return_loan(loan.id).await);
    assert!(matches!(err, AppError::InvalidState(ref msg) if msg == "already returned"));

    assert_eq!(h.store.item(item.id).await.unwrap().available_copies, 2);
    assert_eq!(h.store.fines().await.len(), 1);
}

#[tokio::test]
async fn test_missing_records() {
    let h = harness(LendingConfig::default());
    assert!(matches!(h.lending.return_loan(42).await, Err(AppError::NotFound(_))));
    assert!(matches!(h.lending.pay_fine(42).await, Err(AppError::NotFound(_))));
    assert!(matches!(h.lending.get_loan(42).await, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_double_payment() {
    let h = harness(LendingConfig::default());
    let item = add_item(&h.store, "9780441013593", 1).await;
    let member = add_member(&h.store, "paul@example.org").await;

    let loan = assert_ok!(h.lending.borrow(item.id, member.id).await);
    h.clock.set(start() + Duration::days(15));
    let fine = assert_ok!(h.lending.return_loan(loan.id).await).fine.unwrap();

    assert_ok!(h.lending.pay_fine(fine.id).await);
    let err = assert_err!(h.lending.pay_fine(fine.id).await);
    assert!(matches!(err, AppError::InvalidState(ref msg) if msg == "already paid"));
}

#[tokio::test]
async fn test_return_clears_admin_status() {
    let h = harness(LendingConfig::default());
    let item = add_item(&h.store, "9780441013593", 2).await;
    let member = add_member(&h.store, "paul@example.org").await;

    let loan = assert_ok!(h.lending.borrow(item.id, member.id).await);
    h.store
        .set_item_status(item.id, ItemStatus::Reserved)
        .await
        .unwrap();

    assert_ok!(h.lending.return_loan(loan.id).await);
    let item = h.store.item(item.id).await.unwrap();
    assert_eq!(item.status, ItemStatus::Available);
    assert_eq!(item.available_copies, 2);
}

#[tokio::test]
async fn test_sweep_reclassifies_once() {
    let h = harness(LendingConfig::default());
    let member = add_member(&h.store, "ged@example.org").await;
    let early = add_item(&h.store, "0000000001", 1).await;
    let late = add_item(&h.store, "0000000002", 1).await;

    let first = assert_ok!(h.lending.borrow(early.id, member.id).await);
    h.clock.advance(Duration::days(5));
    let second = assert_ok!(h.lending.borrow(late.id, member.id).await);

    // Only the first loan is past due
    h.clock.set(start() + Duration::days(15));
    let report = assert_ok!(h.lending.sweep().await);
    assert_eq!(report.examined, 1);
    assert_eq!(report.reclassified, vec![first.id]);
    assert!(report.suspended.is_empty());

    let after_first = h.store.loans().await;
    let member_after_first = h.store.member(member.id).await.unwrap();

    let again = assert_ok!(h.lending.sweep().await);
    assert_eq!(again.examined, 0);
    assert!(again.reclassified.is_empty());

    let after_second = h.store.loans().await;
    let statuses = |loans: &[circulation_server::models::Loan]| {
        loans.iter().map(|l| (l.id, l.status)).collect::<Vec<_>>()
    };
    assert_eq!(statuses(&after_first), statuses(&after_second));
    assert_eq!(
        h.store.member(member.id).await.unwrap().status,
        member_after_first.status
    );

    let overdue = assert_ok!(h.lending.overdue_loans().await);
    assert_eq!(overdue.len(), 1);
    assert_eq!(overdue[0].id, first.id);
    assert_eq!(
        assert_ok!(h.lending.get_loan(second.id).await).status,
        LoanStatus::Active
    );
}

#[tokio::test]
async fn test_overdue_listing_sweeps_first() {
    let h = harness(LendingConfig::default());
    let item = add_item(&h.store, "0000000001", 1).await;
    let member = add_member(&h.store, "ged@example.org").await;

    let loan = assert_ok!(h.lending.borrow(item.id, member.id).await);
    h.clock.set(start() + Duration::days(30));

    let overdue = assert_ok!(h.lending.overdue_loans().await);
    assert_eq!(overdue.len(), 1);
    assert_eq!(overdue[0].id, loan.id);
    assert_eq!(overdue[0].status, LoanStatus::Overdue);
}

#[tokio::test]
async fn test_overdue_trigger_suspends_and_reactivates() {
    let h = harness(LendingConfig::default());
    let member = add_member(&h.store, "tenar@example.org").await;

    let mut loans = Vec::new();
    for isbn in ["0000000001", "0000000002", "0000000003"] {
        let item = add_item(&h.store, isbn, 1).await;
        loans.push(assert_ok!(h.lending.borrow(item.id, member.id).await));
    }

    h.clock.set(start() + Duration::days(20));
    let report = assert_ok!(h.lending.sweep().await);
    assert_eq!(report.reclassified.len(), 3);
    assert_eq!(report.suspended, vec![member.id]);
    assert_eq!(
        h.store.member(member.id).await.unwrap().status,
        MemberStatus::Suspended
    );

    // Dropping below the threshold lifts the overdue suspension
    let outcome = assert_ok!(h.lending.return_loan(loans[0].id).await);
    assert_eq!(outcome.member_status, Some(MemberStatus::Active));
    assert_eq!(
        h.store.member(member.id).await.unwrap().status,
        MemberStatus::Active
    );
}

#[tokio::test]
async fn test_fine_payment_reactivates_suspended_member() {
    let h = harness(LendingConfig::default());
    let item = add_item(&h.store, "0000000001", 1).await;
    let member = add_member(&h.store, "tenar@example.org").await;

    let loan = assert_ok!(h.lending.borrow(item.id, member.id).await);
    h.clock.set(start() + Duration::days(17));
    let fine = assert_ok!(h.lending.return_loan(loan.id).await).fine.unwrap();

    h.store
        .set_member_status(member.id, MemberStatus::Suspended)
        .await
        .unwrap();

    assert_ok!(h.lending.pay_fine(fine.id).await);
    assert_eq!(
        h.store.member(member.id).await.unwrap().status,
        MemberStatus::Active
    );
}

#[tokio::test]
async fn test_fine_payment_keeps_overdue_suspension() {
    let config = LendingConfig {
        max_loans_per_member: 4,
        ..LendingConfig::default()
    };
    let h = harness(config);
    let member = add_member(&h.store, "arha@example.org").await;

    let mut loans = Vec::new();
    for isbn in ["0000000001", "0000000002", "0000000003", "0000000004"] {
        let item = add_item(&h.store, isbn, 1).await;
        loans.push(assert_ok!(h.lending.borrow(item.id, member.id).await));
    }

    h.clock.set(start() + Duration::days(18));
    assert_ok!(h.lending.sweep().await);

    // Three loans stay overdue, so the member stays suspended
    let outcome = assert_ok!(h.lending.return_loan(loans[0].id).await);
    assert_eq!(outcome.member_status, None);
    let fine = outcome.fine.unwrap();

    assert_ok!(h.lending.pay_fine(fine.id).await);
    assert_eq!(
        h.store.member(member.id).await.unwrap().status,
        MemberStatus::Suspended
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_borrows_of_last_copy() {
    let h = harness(LendingConfig::default());
    let item = add_item(&h.store, "9780765326355", 1).await;

    let mut members = Vec::new();
    for n in 0..16 {
        members.push(add_member(&h.store, &format!("reader{}@example.org", n)).await);
    }

    let mut handles = Vec::new();
    for member in members {
        let lending = h.lending.clone();
        let item_id = item.id;
        handles.push(tokio::spawn(async move { lending.borrow(item_id, member.id).await }));
    }

    let mut granted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => granted += 1,
            Err(AppError::PolicyViolation(_)) => {}
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }

    assert_eq!(granted, 1);
    let item = h.store.item(item.id).await.unwrap();
    assert_eq!(item.available_copies, 0);
    assert_eq!(item.status, ItemStatus::Loaned);
    assert_eq!(h.store.loans().await.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_borrows_respect_loan_cap() {
    let h = harness(LendingConfig::default());
    let member = add_member(&h.store, "greedy@example.org").await;

    let mut items = Vec::new();
    for n in 0..10 {
        items.push(add_item(&h.store, &format!("{:010}", n + 1), 1).await);
    }

    let mut handles = Vec::new();
    for item in items {
        let lending = h.lending.clone();
        let member_id = member.id;
        handles.push(tokio::spawn(async move { lending.borrow(item.id, member_id).await }));
    }

    let mut granted = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            granted += 1;
        }
    }

    assert_eq!(granted, 3);
    let open = h
        .store
        .loans()
        .await
        .into_iter()
        .filter(|l| l.member_id == member.id && l.status.is_open())
        .count();
    assert_eq!(open, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_borrow_and_return_keep_counts_in_range() {
    let h = harness(LendingConfig::default());
    let item = add_item(&h.store, "9780765326355", 3).await;

    let mut members = Vec::new();
    for n in 0..6 {
        members.push(add_member(&h.store, &format!("cycle{}@example.org", n)).await);
    }

    let mut handles = Vec::new();
    for member in members {
        let lending = h.lending.clone();
        let item_id = item.id;
        handles.push(tokio::spawn(async move {
            for _ in 0..5 {
                if let Ok(loan) = lending.borrow(item_id, member.id).await {
                    lending.return_loan(loan.id).await.unwrap();
                }
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let item = h.store.item(item.id).await.unwrap();
    assert_eq!(item.available_copies, 3);
    assert_eq!(item.status, ItemStatus::Available);
    assert!(h
        .store
        .loans()
        .await
        .iter()
        .all(|l| l.status == LoanStatus::Returned));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_sweep_races_return() {
    let h = harness(LendingConfig::default());
    let item = add_item(&h.store, "9780765326355", 1).await;
    let member = add_member(&h.store, "racer@example.org").await;

    let loan = assert_ok!(h.lending.borrow(item.id, member.id).await);
    h.clock.set(start() + Duration::days(15));

    let sweeper = {
        let lending = h.lending.clone();
        tokio::spawn(async move { lending.sweep().await })
    };
    let returner = {
        let lending = h.lending.clone();
        tokio::spawn(async move { lending.return_loan(loan.id).await })
    };

    assert_ok!(sweeper.await.unwrap());
    let outcome = assert_ok!(returner.await.unwrap());
    assert_eq!(outcome.loan.status, LoanStatus::Returned);

    // Whichever committed first, the loan ends returned with one fine
    let stored = h.lending.get_loan(loan.id).await.unwrap();
    assert_eq!(stored.status, LoanStatus::Returned);
    assert_eq!(h.store.fines().await.len(), 1);
    assert_eq!(
        h.store.member(member.id).await.unwrap().status,
        MemberStatus::Active
    );
}

#[tokio::test]
async fn test_configured_policy() {
    let config = LendingConfig {
        loan_period_days: 7,
        fine_per_day: Decimal::new(125, 2),
        ..LendingConfig::default()
    };
    let h = harness(config);
    let item = add_item(&h.store, "9780765326355", 1).await;
    let member = add_member(&h.store, "policy@example.org").await;

    let loan = assert_ok!(h.lending.borrow(item.id, member.id).await);
    assert_eq!(loan.due_date, start() + Duration::days(7));

    h.clock.set(start() + Duration::days(9));
    let fine = assert_ok!(h.lending.return_loan(loan.id).await).fine.unwrap();
    assert_eq!(fine.amount, Decimal::new(250, 2));
}

#[tokio::test]
async fn test_seeded_member_gets_generated_number() {
    let h = harness(LendingConfig::default());
    let first = add_member(&h.store, "one@example.org").await;
    let second = add_member(&h.store, "two@example.org").await;

    for member in [&first, &second] {
        assert!(member.membership_number.starts_with('M'));
        assert!(member.membership_number.len() > 14);
        assert!(member.membership_number[1..].chars().all(|c| c.is_ascii_digit()));
    }
    assert_ne!(first.membership_number, second.membership_number);
}
