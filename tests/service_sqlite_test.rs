use splitty::command::UndoOutcome;
use splitty::db::init_db;
use splitty::domain::{ParticipantProfile, ValidationError};
use splitty::{
    BroadcastNotifier, ChangeNotice, Currency, EventId, ExpenseDraft, LedgerError,
    LedgerService, LedgerSettings, Money, ParticipantId, Repository, Storage,
};
use std::sync::Arc;
use tempfile::TempDir;

struct TestService {
    service: LedgerService,
    repo: Arc<Repository>,
    notifier: Arc<BroadcastNotifier>,
    db_path: String,
    _temp: TempDir,
}

async fn open_service(temp: TempDir, history_limit: usize) -> TestService {
    let db_path = temp
        .path()
        .join("splitty.db")
        .to_string_lossy()
        .to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");
    let repo = Arc::new(Repository::new(pool));
    let notifier = Arc::new(BroadcastNotifier::new(64));
    let service = LedgerService::new(
        repo.clone(),
        notifier.clone(),
        LedgerSettings {
            default_currency: Currency::EUR,
            undo_history_limit: history_limit,
        },
    );
    TestService {
        service,
        repo,
        notifier,
        db_path,
        _temp: temp,
    }
}

async fn setup(history_limit: usize) -> TestService {
    open_service(TempDir::new().unwrap(), history_limit).await
}

async fn register(service: &LedgerService, username: &str) -> ParticipantId {
    service
        .register_participant(ParticipantProfile {
            username: username.to_string(),
            display_name: username.to_string(),
            ..Default::default()
        })
        .await
        .unwrap()
        .id
}

async fn event_with(service: &LedgerService, people: &[ParticipantId]) -> EventId {
    let event = service
        .create_event("Road trip", None, Some(people[0]))
        .await
        .unwrap();
    for person in &people[1..] {
        service.join_event(&event.invite_code, *person).await.unwrap();
    }
    event.id
}

fn euros(minor: i64) -> Money {
    Money::new(minor, Currency::EUR)
}

#[tokio::test]
async fn test_ledger_survives_restart() {
    let TestService {
        service,
        repo,
        db_path,
        _temp,
        ..
    } = setup(10).await;
    let a = register(&service, "a").await;
    let b = register(&service, "b").await;
    let c = register(&service, "c").await;
    let event_id = event_with(&service, &[a, b, c]).await;

    service
        .add_expense(event_id, ExpenseDraft::equal("Hut", a, euros(9_000), vec![a, b, c]))
        .await
        .unwrap();
    let removed = service
        .add_expense(event_id, ExpenseDraft::equal("Gas", b, euros(100), vec![a, b, c]))
        .await
        .unwrap();
    service.remove_expense(event_id, removed).await.unwrap();
    let before = service.get_balances(event_id).await.unwrap();

    drop(service);
    repo.find_event(event_id).await.unwrap().expect("event persisted");
    let reopened = open_service(_temp, 10).await;
    assert_eq!(reopened.db_path, db_path);

    let after = reopened.service.get_balances(event_id).await.unwrap();
    assert_eq!(before, after);
    assert_eq!(after[&a], euros(6_000));
    assert_eq!(after[&b], euros(-3_000));

    let expenses = reopened.service.list_expenses(event_id).await.unwrap();
    assert_eq!(expenses.len(), 1);
    assert_eq!(expenses[0].title, "Hut");
}

#[tokio::test]
async fn test_undo_restores_storage_and_ledger() {
    let t = setup(10).await;
    let a = register(&t.service, "a").await;
    let b = register(&t.service, "b").await;
    let event_id = event_with(&t.service, &[a, b]).await;

    let id = t
        .service
        .add_expense(event_id, ExpenseDraft::equal("Bread", a, euros(400), vec![a, b]))
        .await
        .unwrap();
    t.service
        .edit_expense(
            event_id,
            id,
            ExpenseDraft::equal("Bread and cheese", a, euros(1_000), vec![a, b]),
        )
        .await
        .unwrap();

    match t.service.undo_last(event_id).await.unwrap() {
        UndoOutcome::Undone(report) => assert_eq!(report.expense, Some(id)),
        UndoOutcome::Empty => panic!("expected an undone edit"),
    }
    let stored = t.repo.find_all_for_event(event_id).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].title, "Bread");
    assert_eq!(stored[0].amount, euros(400));

    t.service.undo_last(event_id).await.unwrap();
    assert!(t.repo.find_all_for_event(event_id).await.unwrap().is_empty());
    assert!(t.service.list_expenses(event_id).await.unwrap().is_empty());
    assert_eq!(
        t.service.undo_last(event_id).await.unwrap(),
        UndoOutcome::Empty
    );
}

#[tokio::test]
async fn test_history_limit_drops_oldest_commands() {
    let t = setup(2).await;
    let a = register(&t.service, "a").await;
    let event_id = event_with(&t.service, &[a]).await;

    for i in 1..=3 {
        t.service
            .add_expense(
                event_id,
                ExpenseDraft::equal(format!("item {}", i), a, euros(100 * i), vec![a]),
            )
            .await
            .unwrap();
    }

    assert!(matches!(
        t.service.undo_last(event_id).await.unwrap(),
        UndoOutcome::Undone(_)
    ));
    assert!(matches!(
        t.service.undo_last(event_id).await.unwrap(),
        UndoOutcome::Undone(_)
    ));
    assert_eq!(
        t.service.undo_last(event_id).await.unwrap(),
        UndoOutcome::Empty
    );

    let remaining = t.service.list_expenses(event_id).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].title, "item 1");
}

#[tokio::test]
async fn test_notices_follow_committed_changes() {
    let t = setup(10).await;
    let mut rx = t.notifier.subscribe();
    let a = register(&t.service, "a").await;
    let b = register(&t.service, "b").await;
    let event_id = event_with(&t.service, &[a, b]).await;

    let id = t
        .service
        .add_expense(event_id, ExpenseDraft::equal("Snacks", b, euros(300), vec![a, b]))
        .await
        .unwrap();
    // Rejected: the notice stream must not see it.
    let err = t
        .service
        .add_expense(event_id, ExpenseDraft::equal("", b, euros(300), vec![a, b]))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));
    t.service.remove_expense(event_id, id).await.unwrap();

    let mut seen = Vec::new();
    while let Ok((event, notice)) = rx.try_recv() {
        assert_eq!(event, event_id);
        seen.push(notice);
    }
    assert_eq!(
        seen,
        vec![
            ChangeNotice::ParticipantJoined { participant: a },
            ChangeNotice::ParticipantJoined { participant: b },
            ChangeNotice::EntryAdded { expense: id },
            ChangeNotice::EntryRemoved { expense: id },
        ]
    );
}

#[tokio::test]
async fn test_settlement_for_uneven_group() {
    let t = setup(10).await;
    let a = register(&t.service, "a").await;
    let b = register(&t.service, "b").await;
    let c = register(&t.service, "c").await;
    let d = register(&t.service, "d").await;
    let event_id = event_with(&t.service, &[a, b, c, d]).await;

    t.service
        .add_expense(event_id, ExpenseDraft::equal("Boat", a, euros(10_000), vec![a, b, c, d]))
        .await
        .unwrap();
    t.service
        .add_expense(event_id, ExpenseDraft::equal("Fish", b, euros(2_000), vec![c, d]))
        .await
        .unwrap();

    let debts = t.service.get_settlement(event_id).await.unwrap();
    assert!(debts.len() <= 3);
    let paid_to_a: i64 = debts
        .iter()
        .filter(|d| d.lender() == a)
        .map(|d| d.amount().minor())
        .sum();
    assert_eq!(paid_to_a, 7_500);
    assert!(debts.iter().all(|d| !d.is_collective()));
}

#[tokio::test]
async fn test_undo_after_sharer_left_keeps_event_loadable() {
    let TestService {
        service,
        repo,
        _temp,
        ..
    } = setup(10).await;
    let a = register(&service, "a").await;
    let b = register(&service, "b").await;
    let event_id = event_with(&service, &[a, b]).await;

    service
        .add_expense(event_id, ExpenseDraft::equal("Tent", a, euros(2_000), vec![a]))
        .await
        .unwrap();
    let shared = service
        .add_expense(event_id, ExpenseDraft::equal("Fuel", a, euros(600), vec![a, b]))
        .await
        .unwrap();
    service.remove_expense(event_id, shared).await.unwrap();
    service.leave_event(event_id, b).await.unwrap();
    let before = service.get_balances(event_id).await.unwrap();

    // A second attempt must fail the same way, not on a leftover row.
    for _ in 0..2 {
        let err = service.undo_last(event_id).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Validation(ValidationError::NotAMember(p)) if p == b
        ));
    }
    assert_eq!(repo.find_all_for_event(event_id).await.unwrap().len(), 1);
    assert_eq!(service.get_balances(event_id).await.unwrap(), before);

    drop(service);
    let reopened = open_service(_temp, 10).await;
    assert_eq!(reopened.service.get_balances(event_id).await.unwrap(), before);
    assert_eq!(reopened.service.list_expenses(event_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_undo_edit_after_sharer_left_keeps_edited_row() {
    let t = setup(10).await;
    let a = register(&t.service, "a").await;
    let b = register(&t.service, "b").await;
    let c = register(&t.service, "c").await;
    let event_id = event_with(&t.service, &[a, b, c]).await;

    let id = t
        .service
        .add_expense(event_id, ExpenseDraft::equal("Boat", a, euros(900), vec![a, b, c]))
        .await
        .unwrap();
    t.service
        .edit_expense(event_id, id, ExpenseDraft::equal("Boat", a, euros(900), vec![a, b]))
        .await
        .unwrap();
    t.service.leave_event(event_id, c).await.unwrap();

    let err = t.service.undo_last(event_id).await.unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));

    let stored = t.repo.find_all_for_event(event_id).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].sharers, vec![a, b]);
    let balances = t.service.get_balances(event_id).await.unwrap();
    assert_eq!(balances[&a], euros(450));
    assert_eq!(balances[&b], euros(-450));
}
