//! SQLite repository implementing [`Storage`].
//!
//! Queries are grouped by table:
//! - `events.rs` - participants, events and memberships
//! - `expenses.rs` - expense rows and their JSON-encoded split columns

mod events;
mod expenses;

use events::EventKey;

use crate::domain::{
    Event, EventId, Expense, ExpenseDraft, ExpenseId, NewEvent, Participant, ParticipantId,
    ParticipantProfile, TimeMs,
};
use crate::storage::{Storage, StorageError};
use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;

/// Repository for database operations.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }
}

/// Map a unique-constraint violation to `Conflict`, everything else to `Db`.
fn conflict_or_db(err: sqlx::Error, what: impl FnOnce() -> String) -> StorageError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return StorageError::Conflict(what());
        }
    }
    StorageError::Db(err)
}

#[async_trait]
impl Storage for Repository {
    async fn create_participant(
        &self,
        profile: &ParticipantProfile,
    ) -> Result<Participant, StorageError> {
        self.insert_participant(profile).await
    }

    async fn find_participant(
        &self,
        id: ParticipantId,
    ) -> Result<Option<Participant>, StorageError> {
        self.select_participant(id).await
    }

    async fn update_participant(&self, participant: &Participant) -> Result<(), StorageError> {
        self.write_participant(participant).await
    }

    async fn create_event(&self, event: &NewEvent) -> Result<Event, StorageError> {
        self.insert_event(event).await
    }

    async fn find_event(&self, id: EventId) -> Result<Option<Event>, StorageError> {
        self.select_event(EventKey::Id(id)).await
    }

    async fn find_event_by_invite_code(
        &self,
        code: &str,
    ) -> Result<Option<Event>, StorageError> {
        self.select_event(EventKey::InviteCode(code)).await
    }

    async fn delete_event(&self, id: EventId) -> Result<bool, StorageError> {
        self.remove_event(id).await
    }

    async fn add_member(
        &self,
        event_id: EventId,
        participant: ParticipantId,
    ) -> Result<(), StorageError> {
        self.insert_member(event_id, participant).await
    }

    async fn remove_member(
        &self,
        event_id: EventId,
        participant: ParticipantId,
    ) -> Result<(), StorageError> {
        self.delete_member(event_id, participant).await
    }

    async fn touch_event(&self, event_id: EventId, at: TimeMs) -> Result<(), StorageError> {
        self.set_last_activity(event_id, at).await
    }

    async fn save_expense(
        &self,
        event_id: EventId,
        draft: &ExpenseDraft,
    ) -> Result<Expense, StorageError> {
        self.insert_expense(event_id, draft).await
    }

    async fn restore_expense(&self, expense: &Expense) -> Result<(), StorageError> {
        self.reinsert_expense(expense).await
    }

    async fn update_expense(&self, expense: &Expense) -> Result<(), StorageError> {
        self.write_expense(expense).await
    }

    async fn delete_expense(&self, id: ExpenseId) -> Result<bool, StorageError> {
        self.remove_expense(id).await
    }

    async fn find_all_for_event(&self, event_id: EventId) -> Result<Vec<Expense>, StorageError> {
        self.select_expenses(event_id).await
    }

    async fn ping(&self) -> Result<(), StorageError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use crate::domain::{Currency, ExactShare, Money, SplitStrategy};
    use tempfile::TempDir;

    async fn setup_repo() -> (Repository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let pool = init_db(db_path.to_str().unwrap()).await.unwrap();
        (Repository::new(pool), temp_dir)
    }

    fn profile(username: &str) -> ParticipantProfile {
        ParticipantProfile {
            username: username.to_string(),
            display_name: format!("{} display", username),
            ..Default::default()
        }
    }

    fn new_event(code: &str) -> NewEvent {
        NewEvent {
            title: "Ski trip".to_string(),
            invite_code: code.to_string(),
            currency: Currency::CHF,
            created_at: TimeMs::new(1_700_000_000_000),
        }
    }

    #[tokio::test]
    async fn test_participant_roundtrip_and_update() {
        let (repo, _temp) = setup_repo().await;

        let mut created = repo.create_participant(&profile("alice")).await.unwrap();
        assert_eq!(created.language, "en");
        assert_eq!(
            repo.find_participant(created.id).await.unwrap(),
            Some(created.clone())
        );

        created.iban = Some("CH9300762011623852957".to_string());
        repo.update_participant(&created).await.unwrap();
        let found = repo.find_participant(created.id).await.unwrap().unwrap();
        assert_eq!(found.iban.as_deref(), Some("CH9300762011623852957"));

        assert!(repo.find_participant(ParticipantId(999)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ping() {
        let (repo, _temp) = setup_repo().await;
        repo.ping().await.unwrap();
        repo.pool.close().await;
        assert!(repo.ping().await.is_err());
    }

    #[tokio::test]
    async fn test_duplicate_username_conflicts() {
        let (repo, _temp) = setup_repo().await;
        repo.create_participant(&profile("bob")).await.unwrap();
        let err = repo.create_participant(&profile("bob")).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_event_members_keep_join_order() {
        let (repo, _temp) = setup_repo().await;
        let a = repo.create_participant(&profile("a")).await.unwrap();
        let b = repo.create_participant(&profile("b")).await.unwrap();
        let event = repo.create_event(&new_event("ABCD1234")).await.unwrap();

        repo.add_member(event.id, b.id).await.unwrap();
        repo.add_member(event.id, a.id).await.unwrap();
        // Joining twice is a no-op.
        repo.add_member(event.id, b.id).await.unwrap();

        let found = repo.find_event(event.id).await.unwrap().unwrap();
        assert_eq!(found.members, vec![b.id, a.id]);
        assert_eq!(found.currency, Currency::CHF);

        let by_code = repo
            .find_event_by_invite_code("ABCD1234")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_code, found);

        repo.remove_member(event.id, b.id).await.unwrap();
        let found = repo.find_event(event.id).await.unwrap().unwrap();
        assert_eq!(found.members, vec![a.id]);
    }

    #[tokio::test]
    async fn test_duplicate_invite_code_conflicts() {
        let (repo, _temp) = setup_repo().await;
        repo.create_event(&new_event("SAME0000")).await.unwrap();
        let err = repo.create_event(&new_event("SAME0000")).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_add_member_unknown_ids() {
        let (repo, _temp) = setup_repo().await;
        let a = repo.create_participant(&profile("a")).await.unwrap();
        let event = repo.create_event(&new_event("MEMB0000")).await.unwrap();

        let err = repo.add_member(EventId(42), a.id).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
        let err = repo
            .add_member(event.id, ParticipantId(42))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_expense_lifecycle_preserves_ids() {
        let (repo, _temp) = setup_repo().await;
        let a = repo.create_participant(&profile("a")).await.unwrap();
        let b = repo.create_participant(&profile("b")).await.unwrap();
        let event = repo.create_event(&new_event("EXPN0000")).await.unwrap();
        repo.add_member(event.id, a.id).await.unwrap();
        repo.add_member(event.id, b.id).await.unwrap();

        let draft = ExpenseDraft::equal(
            "Groceries",
            a.id,
            Money::new(4_550, Currency::CHF),
            vec![a.id, b.id],
        )
        .with_tag("food")
        .with_date(TimeMs::new(1_700_000_100_000));
        let first = repo.save_expense(event.id, &draft).await.unwrap();

        let exact = ExpenseDraft::equal("Fuel", b.id, Money::new(3_000, Currency::CHF), vec![a.id, b.id])
            .with_split(SplitStrategy::Exact {
                shares: vec![
                    ExactShare { participant: a.id, minor: 1_000 },
                    ExactShare { participant: b.id, minor: 2_000 },
                ],
            });
        let second = repo.save_expense(event.id, &exact).await.unwrap();
        assert!(second.id > first.id);

        let all = repo.find_all_for_event(event.id).await.unwrap();
        assert_eq!(all, vec![first.clone(), second.clone()]);

        assert!(repo.delete_expense(first.id).await.unwrap());
        assert!(!repo.delete_expense(first.id).await.unwrap());
        assert_eq!(repo.find_all_for_event(event.id).await.unwrap(), vec![second.clone()]);

        repo.restore_expense(&first).await.unwrap();
        assert_eq!(
            repo.find_all_for_event(event.id).await.unwrap(),
            vec![first.clone(), second.clone()]
        );
        let err = repo.restore_expense(&first).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));

        // A new expense never reuses an id, even after deletes.
        assert!(repo.delete_expense(second.id).await.unwrap());
        let third = repo.save_expense(event.id, &draft).await.unwrap();
        assert!(third.id > second.id);
    }

    #[tokio::test]
    async fn test_update_expense() {
        let (repo, _temp) = setup_repo().await;
        let a = repo.create_participant(&profile("a")).await.unwrap();
        let event = repo.create_event(&new_event("UPDT0000")).await.unwrap();
        repo.add_member(event.id, a.id).await.unwrap();

        let draft = ExpenseDraft::equal("Taxi", a.id, Money::new(1_200, Currency::CHF), vec![a.id]);
        let mut saved = repo.save_expense(event.id, &draft).await.unwrap();
        saved.title = "Taxi home".to_string();
        saved.amount = Money::new(1_500, Currency::CHF);
        repo.update_expense(&saved).await.unwrap();

        assert_eq!(repo.find_all_for_event(event.id).await.unwrap(), vec![saved.clone()]);

        let mut missing = saved.clone();
        missing.id = ExpenseId(777);
        let err = repo.update_expense(&missing).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_event_removes_expenses() {
        let (repo, _temp) = setup_repo().await;
        let a = repo.create_participant(&profile("a")).await.unwrap();
        let event = repo.create_event(&new_event("DELE0000")).await.unwrap();
        repo.add_member(event.id, a.id).await.unwrap();
        let draft = ExpenseDraft::equal("x", a.id, Money::new(100, Currency::CHF), vec![a.id]);
        repo.save_expense(event.id, &draft).await.unwrap();

        repo.touch_event(event.id, TimeMs::new(1_800_000_000_000))
            .await
            .unwrap();
        let touched = repo.find_event(event.id).await.unwrap().unwrap();
        assert_eq!(touched.last_activity, TimeMs::new(1_800_000_000_000));

        assert!(repo.delete_event(event.id).await.unwrap());
        assert!(!repo.delete_event(event.id).await.unwrap());
        assert!(repo.find_event(event.id).await.unwrap().is_none());
        assert!(repo.find_all_for_event(event.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_currency_is_reported() {
        let (repo, _temp) = setup_repo().await;
        let event = repo.create_event(&new_event("CORR0000")).await.unwrap();
        sqlx::query("UPDATE events SET currency = 'euro' WHERE id = ?")
            .bind(event.id.as_i64())
            .execute(&repo.pool)
            .await
            .unwrap();

        let err = repo.find_event(event.id).await.unwrap_err();
        assert!(matches!(err, StorageError::Corrupt(_)));
    }
}
