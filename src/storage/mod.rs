//! Storage abstraction for participants, events and expenses.
//!
//! The ledger core only talks to [`Storage`]; the SQLite repository in
//! [`crate::db`] and [`MemoryStorage`] are the two implementations.

use crate::domain::{
    Event, EventId, Expense, ExpenseDraft, ExpenseId, NewEvent, Participant, ParticipantId,
    ParticipantProfile, TimeMs,
};
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

pub mod memory;

pub use memory::MemoryStorage;

/// Persistence collaborator used by the ledger service.
///
/// Ids are assigned by the implementation. Expenses of one event are returned
/// in id order, which is also their ledger order.
#[async_trait]
pub trait Storage: Send + Sync + fmt::Debug {
    async fn create_participant(
        &self,
        profile: &ParticipantProfile,
    ) -> Result<Participant, StorageError>;

    async fn find_participant(
        &self,
        id: ParticipantId,
    ) -> Result<Option<Participant>, StorageError>;

    /// Overwrite a participant's profile. `NotFound` if the id is unknown.
    async fn update_participant(&self, participant: &Participant) -> Result<(), StorageError>;

    /// Create an event. `Conflict` if the invite code is already taken.
    async fn create_event(&self, event: &NewEvent) -> Result<Event, StorageError>;

    async fn find_event(&self, id: EventId) -> Result<Option<Event>, StorageError>;

    async fn find_event_by_invite_code(&self, code: &str)
        -> Result<Option<Event>, StorageError>;

    /// Delete an event together with its expenses. Returns false if absent.
    async fn delete_event(&self, id: EventId) -> Result<bool, StorageError>;

    async fn add_member(
        &self,
        event_id: EventId,
        participant: ParticipantId,
    ) -> Result<(), StorageError>;

    async fn remove_member(
        &self,
        event_id: EventId,
        participant: ParticipantId,
    ) -> Result<(), StorageError>;

    /// Record the time of the last change to an event.
    async fn touch_event(&self, event_id: EventId, at: TimeMs) -> Result<(), StorageError>;

    /// Persist a new expense and return it with its assigned id.
    async fn save_expense(
        &self,
        event_id: EventId,
        draft: &ExpenseDraft,
    ) -> Result<Expense, StorageError>;

    /// Re-insert a previously deleted expense under its original id.
    async fn restore_expense(&self, expense: &Expense) -> Result<(), StorageError>;

    /// Overwrite an existing expense. `NotFound` if the id is unknown.
    async fn update_expense(&self, expense: &Expense) -> Result<(), StorageError>;

    /// Returns false if the expense did not exist.
    async fn delete_expense(&self, id: ExpenseId) -> Result<bool, StorageError>;

    async fn find_all_for_event(&self, event_id: EventId) -> Result<Vec<Expense>, StorageError>;

    /// Cheap round trip used by readiness checks.
    async fn ping(&self) -> Result<(), StorageError>;
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error(transparent)]
    Db(#[from] sqlx::Error),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}
