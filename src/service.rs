//! The ledger service: the operations the API exposes, with per-event
//! serialization of mutations and consistent snapshots for readers.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};

use crate::command::{
    AddExpense, Command, CommandContext, CommandHistory, CommandReport, EditExpense,
    RemoveExpense, UndoOutcome,
};
use crate::config::Config;
use crate::domain::event::{generate_invite_code, normalize_invite_code};
use crate::domain::{
    Currency, Debt, Event, EventId, Expense, ExpenseDraft, ExpenseId, NewEvent, Participant,
    ParticipantId, ParticipantProfile, TimeMs, ValidationError,
};
use crate::engine::ledger::Balances;
use crate::engine::{Ledger, LedgerError, SettlementEngine};
use crate::notify::{ChangeNotice, Notifier};
use crate::storage::{Storage, StorageError};

const INVITE_CODE_ATTEMPTS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerSettings {
    pub default_currency: Currency,
    pub undo_history_limit: usize,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            default_currency: Currency::EUR,
            undo_history_limit: 50,
        }
    }
}

impl From<&Config> for LedgerSettings {
    fn from(config: &Config) -> Self {
        Self {
            default_currency: config.default_currency,
            undo_history_limit: config.undo_history_limit,
        }
    }
}

/// Per-event state. `history` is the mutation lock; `ledger` is the snapshot
/// readers see, replaced wholesale after each successful mutation.
#[derive(Debug)]
struct EventSlot {
    history: Mutex<CommandHistory>,
    ledger: RwLock<Arc<Ledger>>,
}

impl EventSlot {
    fn new(ledger: Ledger, history_limit: usize) -> Self {
        Self {
            history: Mutex::new(CommandHistory::new(history_limit)),
            ledger: RwLock::new(Arc::new(ledger)),
        }
    }

    async fn snapshot(&self) -> Arc<Ledger> {
        self.ledger.read().await.clone()
    }

    async fn working_copy(&self) -> Ledger {
        let current = self.ledger.read().await;
        Ledger::clone(&current)
    }
}

#[derive(Debug)]
pub struct LedgerService {
    storage: Arc<dyn Storage>,
    notifier: Arc<dyn Notifier>,
    settings: LedgerSettings,
    settlement: SettlementEngine,
    slots: RwLock<HashMap<EventId, Arc<EventSlot>>>,
}

impl LedgerService {
    pub fn new(
        storage: Arc<dyn Storage>,
        notifier: Arc<dyn Notifier>,
        settings: LedgerSettings,
    ) -> Self {
        Self {
            storage,
            notifier,
            settings,
            settlement: SettlementEngine,
            slots: RwLock::new(HashMap::new()),
        }
    }

    // =========================================================================
    // Participants
    // =========================================================================

    pub async fn register_participant(
        &self,
        profile: ParticipantProfile,
    ) -> Result<Participant, LedgerError> {
        check_profile(&profile)?;
        let participant = self.storage.create_participant(&profile).await?;
        info!(participant_id = %participant.id, username = %participant.username, "participant registered");
        Ok(participant)
    }

    pub async fn get_participant(&self, id: ParticipantId) -> Result<Participant, LedgerError> {
        self.storage
            .find_participant(id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("participant {}", id)))
    }

    pub async fn update_participant(
        &self,
        id: ParticipantId,
        profile: ParticipantProfile,
    ) -> Result<Participant, LedgerError> {
        check_profile(&profile)?;
        self.get_participant(id).await?;
        let updated = profile.into_participant(id);
        self.storage.update_participant(&updated).await?;
        info!(participant_id = %id, "participant updated");
        Ok(updated)
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// Create an event, optionally with its creator as the first member.
    pub async fn create_event(
        &self,
        title: &str,
        currency: Option<Currency>,
        creator: Option<ParticipantId>,
    ) -> Result<Event, LedgerError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(ValidationError::MissingField("title").into());
        }
        if let Some(creator) = creator {
            self.get_participant(creator).await?;
        }

        let currency = currency.unwrap_or(self.settings.default_currency);
        let mut attempt = 0;
        let event = loop {
            attempt += 1;
            let new_event = NewEvent {
                title: title.to_string(),
                invite_code: generate_invite_code(),
                currency,
                created_at: TimeMs::now(),
            };
            match self.storage.create_event(&new_event).await {
                Ok(event) => break event,
                Err(StorageError::Conflict(msg)) if attempt < INVITE_CODE_ATTEMPTS => {
                    warn!(attempt, conflict = %msg, "invite code collision, regenerating");
                }
                Err(e) => return Err(e.into()),
            }
        };
        info!(event_id = %event.id, currency = %currency, "event created");

        match creator {
            Some(creator) => self.join(event.id, creator).await,
            None => Ok(event),
        }
    }

    pub async fn get_event(&self, id: EventId) -> Result<Event, LedgerError> {
        self.storage
            .find_event(id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("event {}", id)))
    }

    /// Delete an event and, through storage, all its expenses.
    pub async fn delete_event(&self, id: EventId) -> Result<(), LedgerError> {
        let slot = self.slots.read().await.get(&id).cloned();
        // Wait out any in-flight mutation of this event.
        let _guard = match &slot {
            Some(slot) => Some(slot.history.lock().await),
            None => None,
        };
        if !self.storage.delete_event(id).await? {
            return Err(LedgerError::NotFound(format!("event {}", id)));
        }
        self.slots.write().await.remove(&id);
        info!(event_id = %id, "event deleted");
        Ok(())
    }

    pub async fn join_event(
        &self,
        invite_code: &str,
        participant: ParticipantId,
    ) -> Result<Event, LedgerError> {
        let code = normalize_invite_code(invite_code);
        let event = self
            .storage
            .find_event_by_invite_code(&code)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("invite code {}", code)))?;
        self.get_participant(participant).await?;
        self.join(event.id, participant).await
    }

    async fn join(&self, event_id: EventId, participant: ParticipantId) -> Result<Event, LedgerError> {
        let slot = self.slot(event_id).await?;
        let _history = slot.history.lock().await;
        let mut working = slot.working_copy().await;
        if working.add_member(participant) {
            self.storage.add_member(event_id, participant).await?;
            self.publish(
                event_id,
                &slot,
                working,
                Some(ChangeNotice::ParticipantJoined { participant }),
            )
            .await;
            info!(event_id = %event_id, participant_id = %participant, "participant joined");
        }
        self.get_event(event_id).await
    }

    /// Remove a member. Fails while any expense still references them.
    pub async fn leave_event(
        &self,
        event_id: EventId,
        participant: ParticipantId,
    ) -> Result<(), LedgerError> {
        let slot = self.slot(event_id).await?;
        let _history = slot.history.lock().await;
        let mut working = slot.working_copy().await;
        working.remove_member(participant)?;
        self.storage.remove_member(event_id, participant).await?;
        self.publish(
            event_id,
            &slot,
            working,
            Some(ChangeNotice::ParticipantLeft { participant }),
        )
        .await;
        info!(event_id = %event_id, participant_id = %participant, "participant left");
        Ok(())
    }

    // =========================================================================
    // Expenses
    // =========================================================================

    pub async fn add_expense(
        &self,
        event_id: EventId,
        draft: ExpenseDraft,
    ) -> Result<ExpenseId, LedgerError> {
        let report = self
            .run_command(event_id, Box::new(AddExpense::new(draft)))
            .await?;
        report
            .expense
            .ok_or_else(|| LedgerError::Consistency("add reported no expense id".into()))
    }

    pub async fn edit_expense(
        &self,
        event_id: EventId,
        expense_id: ExpenseId,
        draft: ExpenseDraft,
    ) -> Result<Expense, LedgerError> {
        self.run_command(event_id, Box::new(EditExpense::new(expense_id, draft)))
            .await?;
        self.snapshot(event_id)
            .await?
            .get(expense_id)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(format!("expense {}", expense_id)))
    }

    pub async fn remove_expense(
        &self,
        event_id: EventId,
        expense_id: ExpenseId,
    ) -> Result<(), LedgerError> {
        self.run_command(event_id, Box::new(RemoveExpense::new(expense_id)))
            .await?;
        Ok(())
    }

    pub async fn list_expenses(&self, event_id: EventId) -> Result<Vec<Expense>, LedgerError> {
        Ok(self.snapshot(event_id).await?.entries().to_vec())
    }

    /// Undo the most recent expense command of this event.
    pub async fn undo_last(&self, event_id: EventId) -> Result<UndoOutcome, LedgerError> {
        let slot = self.slot(event_id).await?;
        let mut history = slot.history.lock().await;
        let mut working = slot.working_copy().await;
        let outcome = {
            let mut ctx = CommandContext {
                ledger: &mut working,
                storage: self.storage.as_ref(),
            };
            match history.undo_last(&mut ctx).await {
                Ok(outcome) => outcome,
                Err(e @ LedgerError::Unbalanced(_)) => {
                    // Storage already holds the undo; drop the cached ledger.
                    self.slots.write().await.remove(&event_id);
                    return Err(e);
                }
                Err(e) => return Err(e),
            }
        };

        match &outcome {
            UndoOutcome::Undone(report) => {
                self.publish(event_id, &slot, working, report.notice).await;
                info!(event_id = %event_id, command = %report.description, "command undone");
            }
            UndoOutcome::Empty => info!(event_id = %event_id, "nothing to undo"),
        }
        Ok(outcome)
    }

    // =========================================================================
    // Balances
    // =========================================================================

    pub async fn get_balances(&self, event_id: EventId) -> Result<Balances, LedgerError> {
        self.snapshot(event_id).await?.balances()
    }

    pub async fn get_settlement(&self, event_id: EventId) -> Result<Vec<Debt>, LedgerError> {
        let ledger = self.snapshot(event_id).await?;
        let balances = ledger.balances()?;
        self.settlement
            .settle(&balances, ledger.currency())
            .inspect_err(|e| {
                if e.is_consistency() {
                    error!(event_id = %event_id, error = %e, "settlement on inconsistent ledger");
                }
            })
    }

    /// Fails if storage cannot be reached.
    pub async fn check_storage(&self) -> Result<(), LedgerError> {
        self.storage
            .ping()
            .await
            .inspect_err(|e| warn!(error = %e, "storage ping failed"))?;
        Ok(())
    }

    /// Current published ledger of an event.
    pub async fn snapshot(&self, event_id: EventId) -> Result<Arc<Ledger>, LedgerError> {
        Ok(self.slot(event_id).await?.snapshot().await)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn slot(&self, event_id: EventId) -> Result<Arc<EventSlot>, LedgerError> {
        if let Some(slot) = self.slots.read().await.get(&event_id) {
            return Ok(slot.clone());
        }

        let event = self.get_event(event_id).await?;
        let expenses = self.storage.find_all_for_event(event_id).await?;
        let ledger = Ledger::from_entries(
            event.id,
            event.currency,
            event.members.iter().copied(),
            expenses,
        )
        .inspect_err(|e| error!(event_id = %event_id, error = %e, "stored ledger is invalid"))?;
        ledger
            .check_zero_sum()
            .inspect_err(|e| error!(event_id = %event_id, error = %e, "stored ledger is unbalanced"))?;
        info!(event_id = %event_id, entries = ledger.len(), "ledger loaded");

        let mut slots = self.slots.write().await;
        let limit = self.settings.undo_history_limit;
        Ok(slots
            .entry(event_id)
            .or_insert_with(|| Arc::new(EventSlot::new(ledger, limit)))
            .clone())
    }

    async fn run_command(
        &self,
        event_id: EventId,
        command: Box<dyn Command>,
    ) -> Result<CommandReport, LedgerError> {
        let slot = self.slot(event_id).await?;
        let mut history = slot.history.lock().await;
        let mut working = slot.working_copy().await;
        let report = {
            let mut ctx = CommandContext {
                ledger: &mut working,
                storage: self.storage.as_ref(),
            };
            history.run(command, &mut ctx).await.inspect_err(|e| {
                warn!(event_id = %event_id, error = %e, "command failed");
            })?
        };

        self.publish(event_id, &slot, working, report.notice).await;
        info!(
            event_id = %event_id,
            command = %report.description,
            expense_id = ?report.expense,
            "command executed"
        );
        Ok(report)
    }

    /// Swap in the mutated ledger and tell listeners. Caller holds the
    /// slot's history lock. Expense changes are balance-checked by the
    /// history; membership changes never move a balance.
    async fn publish(
        &self,
        event_id: EventId,
        slot: &EventSlot,
        ledger: Ledger,
        notice: Option<ChangeNotice>,
    ) {
        *slot.ledger.write().await = Arc::new(ledger);

        if let Err(e) = self.storage.touch_event(event_id, TimeMs::now()).await {
            warn!(event_id = %event_id, error = %e, "failed to record last activity");
        }
        if let Some(notice) = notice {
            self.notifier.broadcast(event_id, notice);
        }
    }
}

fn check_profile(profile: &ParticipantProfile) -> Result<(), ValidationError> {
    if profile.username.trim().is_empty() {
        return Err(ValidationError::MissingField("username"));
    }
    if profile.display_name.trim().is_empty() {
        return Err(ValidationError::MissingField("displayName"));
    }
    Ok(())
}
