//! In-process storage for tests and single-node runs.

use super::{Storage, StorageError};
use crate::domain::{
    Event, EventId, Expense, ExpenseDraft, ExpenseId, NewEvent, Participant, ParticipantId,
    ParticipantProfile, TimeMs,
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct State {
    last_participant_id: i64,
    last_event_id: i64,
    last_expense_id: i64,
    participants: BTreeMap<ParticipantId, Participant>,
    events: BTreeMap<EventId, Event>,
    expenses: BTreeMap<ExpenseId, Expense>,
}

/// Storage backed by in-memory maps.
///
/// `set_failing(true)` makes every call return `Unavailable`, which lets tests
/// exercise persistence failures.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    state: Mutex<State>,
    failing: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn state(&self) -> Result<MutexGuard<'_, State>, StorageError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("memory storage is failing".into()));
        }
        self.state
            .lock()
            .map_err(|_| StorageError::Unavailable("memory storage lock poisoned".into()))
    }
}

fn event_mut(state: &mut State, id: EventId) -> Result<&mut Event, StorageError> {
    state
        .events
        .get_mut(&id)
        .ok_or_else(|| StorageError::NotFound(format!("event {}", id)))
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn create_participant(
        &self,
        profile: &ParticipantProfile,
    ) -> Result<Participant, StorageError> {
        let mut state = self.state()?;
        if state
            .participants
            .values()
            .any(|p| p.username == profile.username.trim())
        {
            return Err(StorageError::Conflict(format!(
                "username {}",
                profile.username.trim()
            )));
        }
        state.last_participant_id += 1;
        let participant = profile
            .clone()
            .into_participant(ParticipantId(state.last_participant_id));
        state
            .participants
            .insert(participant.id, participant.clone());
        Ok(participant)
    }

    async fn find_participant(
        &self,
        id: ParticipantId,
    ) -> Result<Option<Participant>, StorageError> {
        Ok(self.state()?.participants.get(&id).cloned())
    }

    async fn update_participant(&self, participant: &Participant) -> Result<(), StorageError> {
        let mut state = self.state()?;
        match state.participants.get_mut(&participant.id) {
            Some(existing) => {
                *existing = participant.clone();
                Ok(())
            }
            None => Err(StorageError::NotFound(format!(
                "participant {}",
                participant.id
            ))),
        }
    }

    async fn create_event(&self, event: &NewEvent) -> Result<Event, StorageError> {
        let mut state = self.state()?;
        if state
            .events
            .values()
            .any(|e| e.invite_code == event.invite_code)
        {
            return Err(StorageError::Conflict(format!(
                "invite code {}",
                event.invite_code
            )));
        }
        state.last_event_id += 1;
        let created = Event {
            id: EventId(state.last_event_id),
            title: event.title.clone(),
            invite_code: event.invite_code.clone(),
            currency: event.currency,
            members: Vec::new(),
            created_at: event.created_at,
            last_activity: event.created_at,
        };
        state.events.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_event(&self, id: EventId) -> Result<Option<Event>, StorageError> {
        Ok(self.state()?.events.get(&id).cloned())
    }

    async fn find_event_by_invite_code(
        &self,
        code: &str,
    ) -> Result<Option<Event>, StorageError> {
        Ok(self
            .state()?
            .events
            .values()
            .find(|e| e.invite_code == code)
            .cloned())
    }

    async fn delete_event(&self, id: EventId) -> Result<bool, StorageError> {
        let mut state = self.state()?;
        if state.events.remove(&id).is_none() {
            return Ok(false);
        }
        state.expenses.retain(|_, e| e.event_id != id);
        Ok(true)
    }

    async fn add_member(
        &self,
        event_id: EventId,
        participant: ParticipantId,
    ) -> Result<(), StorageError> {
        let mut state = self.state()?;
        if !state.participants.contains_key(&participant) {
            return Err(StorageError::NotFound(format!("participant {}", participant)));
        }
        let event = event_mut(&mut state, event_id)?;
        if !event.members.contains(&participant) {
            event.members.push(participant);
        }
        Ok(())
    }

    async fn remove_member(
        &self,
        event_id: EventId,
        participant: ParticipantId,
    ) -> Result<(), StorageError> {
        let mut state = self.state()?;
        let event = event_mut(&mut state, event_id)?;
        event.members.retain(|m| *m != participant);
        Ok(())
    }

    async fn touch_event(&self, event_id: EventId, at: TimeMs) -> Result<(), StorageError> {
        let mut state = self.state()?;
        event_mut(&mut state, event_id)?.last_activity = at;
        Ok(())
    }

    async fn save_expense(
        &self,
        event_id: EventId,
        draft: &ExpenseDraft,
    ) -> Result<Expense, StorageError> {
        let mut state = self.state()?;
        event_mut(&mut state, event_id)?;
        state.last_expense_id += 1;
        let expense = draft
            .clone()
            .into_expense(ExpenseId(state.last_expense_id), event_id);
        state.expenses.insert(expense.id, expense.clone());
        Ok(expense)
    }

    async fn restore_expense(&self, expense: &Expense) -> Result<(), StorageError> {
        let mut state = self.state()?;
        event_mut(&mut state, expense.event_id)?;
        if state.expenses.contains_key(&expense.id) {
            return Err(StorageError::Conflict(format!("expense {}", expense.id)));
        }
        state.expenses.insert(expense.id, expense.clone());
        Ok(())
    }

    async fn update_expense(&self, expense: &Expense) -> Result<(), StorageError> {
        let mut state = self.state()?;
        match state.expenses.get_mut(&expense.id) {
            Some(existing) => {
                *existing = expense.clone();
                Ok(())
            }
            None => Err(StorageError::NotFound(format!("expense {}", expense.id))),
        }
    }

    async fn delete_expense(&self, id: ExpenseId) -> Result<bool, StorageError> {
        Ok(self.state()?.expenses.remove(&id).is_some())
    }

    async fn find_all_for_event(&self, event_id: EventId) -> Result<Vec<Expense>, StorageError> {
        Ok(self
            .state()?
            .expenses
            .values()
            .filter(|e| e.event_id == event_id)
            .cloned()
            .collect())
    }

    async fn ping(&self) -> Result<(), StorageError> {
        self.state().map(|_| ())
    }
}
