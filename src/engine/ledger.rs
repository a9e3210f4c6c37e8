use std::collections::{BTreeMap, HashSet};
use std::sync::OnceLock;

use crate::domain::{
    Currency, EventId, Expense, ExpenseDraft, ExpenseId, Money, ParticipantId, ValidationError,
};

use super::LedgerError;

pub type Balances = BTreeMap<ParticipantId, Money>;

/// Ordered expense entries of one event, and the only source of balances.
///
/// Balances are computed lazily: every mutation drops the cached table and the
/// next query rebuilds it once.
#[derive(Debug, Clone)]
pub struct Ledger {
    event_id: EventId,
    currency: Currency,
    members: Vec<ParticipantId>,
    entries: Vec<Expense>,
    cache: OnceLock<Result<Balances, ValidationError>>,
}

impl PartialEq for Ledger {
    fn eq(&self, other: &Self) -> bool {
        self.event_id == other.event_id
            && self.currency == other.currency
            && self.members == other.members
            && self.entries == other.entries
    }
}

impl Eq for Ledger {}

impl Ledger {
    pub fn new(
        event_id: EventId,
        currency: Currency,
        members: impl IntoIterator<Item = ParticipantId>,
    ) -> Self {
        let mut ledger = Ledger {
            event_id,
            currency,
            members: Vec::new(),
            entries: Vec::new(),
            cache: OnceLock::new(),
        };
        for member in members {
            ledger.add_member(member);
        }
        ledger
    }

    /// Rebuild a ledger from persisted entries, validating each one.
    pub fn from_entries(
        event_id: EventId,
        currency: Currency,
        members: impl IntoIterator<Item = ParticipantId>,
        entries: impl IntoIterator<Item = Expense>,
    ) -> Result<Self, LedgerError> {
        let mut ledger = Ledger::new(event_id, currency, members);
        for entry in entries {
            ledger.insert_entry(entry)?;
        }
        Ok(ledger)
    }

    pub fn event_id(&self) -> EventId {
        self.event_id
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn members(&self) -> &[ParticipantId] {
        &self.members
    }

    pub fn is_member(&self, participant: ParticipantId) -> bool {
        self.members.contains(&participant)
    }

    pub fn entries(&self) -> &[Expense] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: ExpenseId) -> Option<&Expense> {
        self.entries.iter().find(|e| e.id == id)
    }

    fn position(&self, id: ExpenseId) -> Result<usize, LedgerError> {
        self.entries
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| LedgerError::NotFound(format!("expense {}", id)))
    }

    fn invalidate(&mut self) {
        self.cache = OnceLock::new();
    }

    /// Returns false if the participant already was a member.
    pub fn add_member(&mut self, participant: ParticipantId) -> bool {
        if self.is_member(participant) {
            return false;
        }
        self.members.push(participant);
        self.invalidate();
        true
    }

    /// Returns the member's former position, for undo.
    pub fn remove_member(&mut self, participant: ParticipantId) -> Result<usize, LedgerError> {
        let position = self
            .members
            .iter()
            .position(|m| *m == participant)
            .ok_or_else(|| LedgerError::NotFound(format!("participant {}", participant)))?;
        if self.entries.iter().any(|e| e.involves(participant)) {
            return Err(ValidationError::ParticipantReferenced(participant).into());
        }
        self.members.remove(position);
        self.invalidate();
        Ok(position)
    }

    /// Check a draft against this ledger without mutating anything.
    pub fn validate(&self, draft: &ExpenseDraft) -> Result<(), ValidationError> {
        if draft.title.trim().is_empty() {
            return Err(ValidationError::MissingField("title"));
        }
        if !draft.amount.is_positive() {
            return Err(ValidationError::NonPositiveAmount);
        }
        draft.amount.ensure_currency(self.currency)?;
        if !self.is_member(draft.payer) {
            return Err(ValidationError::NotAMember(draft.payer));
        }
        if let Some(outsider) = draft.sharers.iter().find(|s| !self.is_member(**s)) {
            return Err(ValidationError::NotAMember(*outsider));
        }
        draft.shares().map(|_| ())
    }

    /// Validate and append a draft, assigning the next local id.
    pub fn add_entry(&mut self, draft: ExpenseDraft) -> Result<&Expense, LedgerError> {
        self.validate(&draft)?;
        let next = self.entries.iter().map(|e| e.id.0).max().unwrap_or(0) + 1;
        let expense = draft.into_expense(ExpenseId(next), self.event_id);
        self.entries.push(expense);
        self.invalidate();
        Ok(&self.entries[self.entries.len() - 1])
    }

    /// Append an expense whose id was assigned by storage.
    pub fn insert_entry(&mut self, expense: Expense) -> Result<&Expense, LedgerError> {
        self.check_foreign(&expense)?;
        if self.get(expense.id).is_some() {
            return Err(LedgerError::Consistency(format!(
                "expense {} is already in the ledger",
                expense.id
            )));
        }
        self.entries.push(expense);
        self.invalidate();
        Ok(&self.entries[self.entries.len() - 1])
    }

    /// Remove an entry, returning its former position with it.
    pub fn remove_entry(&mut self, id: ExpenseId) -> Result<(usize, Expense), LedgerError> {
        let position = self.position(id)?;
        let expense = self.entries.remove(position);
        self.invalidate();
        Ok((position, expense))
    }

    /// Put a removed entry back where it was.
    pub fn restore_entry(&mut self, position: usize, expense: Expense) -> Result<(), LedgerError> {
        self.check_restore(&expense)?;
        let position = position.min(self.entries.len());
        self.entries.insert(position, expense);
        self.invalidate();
        Ok(())
    }

    /// Swap in a new value for an existing entry. Returns the previous value.
    pub fn replace_entry(&mut self, expense: Expense) -> Result<Expense, LedgerError> {
        self.check_replace(&expense)?;
        let position = self.position(expense.id)?;
        let previous = std::mem::replace(&mut self.entries[position], expense);
        self.invalidate();
        Ok(previous)
    }

    /// Whether `restore_entry` would accept `expense`. Does not mutate.
    pub fn check_restore(&self, expense: &Expense) -> Result<(), LedgerError> {
        self.check_foreign(expense)?;
        if self.get(expense.id).is_some() {
            return Err(LedgerError::Consistency(format!(
                "expense {} is already in the ledger",
                expense.id
            )));
        }
        Ok(())
    }

    /// Whether `replace_entry` would accept `expense`. Does not mutate.
    pub fn check_replace(&self, expense: &Expense) -> Result<(), LedgerError> {
        self.position(expense.id)?;
        self.check_foreign(expense)
    }

    fn check_foreign(&self, expense: &Expense) -> Result<(), LedgerError> {
        if expense.event_id != self.event_id {
            return Err(LedgerError::Consistency(format!(
                "expense {} belongs to event {}, not {}",
                expense.id, expense.event_id, self.event_id
            )));
        }
        self.validate(&expense.to_draft())?;
        Ok(())
    }

    /// Net balance of every member: positive is owed money, negative owes.
    pub fn balances(&self) -> Result<Balances, LedgerError> {
        self.cache
            .get_or_init(|| self.compute_balances())
            .clone()
            .map_err(LedgerError::from)
    }

    pub fn net_balance(&self, participant: ParticipantId) -> Result<Money, LedgerError> {
        if !self.is_member(participant) {
            return Err(LedgerError::NotFound(format!("participant {}", participant)));
        }
        let balances = self.balances()?;
        Ok(balances
            .get(&participant)
            .copied()
            .unwrap_or(Money::zero(self.currency)))
    }

    fn compute_balances(&self) -> Result<Balances, ValidationError> {
        let mut balances: Balances = self
            .members
            .iter()
            .map(|m| (*m, Money::zero(self.currency)))
            .collect();

        for entry in &self.entries {
            let payer = balances
                .entry(entry.payer)
                .or_insert(Money::zero(self.currency));
            *payer = payer.checked_add(entry.amount)?;
            for (participant, share) in entry.shares()? {
                let balance = balances
                    .entry(participant)
                    .or_insert(Money::zero(self.currency));
                *balance = balance.checked_sub(share)?;
            }
        }
        Ok(balances)
    }

    /// Sum of all entry amounts.
    pub fn total_spent(&self) -> Result<Money, LedgerError> {
        Ok(Money::sum(
            self.entries.iter().map(|e| &e.amount),
            self.currency,
        )?)
    }

    /// Fails if the balances do not sum to exactly zero.
    pub fn check_zero_sum(&self) -> Result<(), LedgerError> {
        let balances = self.balances()?;
        let sum: i128 = balances.values().map(|m| m.minor() as i128).sum();
        if sum != 0 {
            return Err(LedgerError::Unbalanced(format!(
                "event {} balances sum to {} minor units",
                self.event_id, sum
            )));
        }
        Ok(())
    }

    /// Participants referenced by any entry.
    pub fn referenced_participants(&self) -> HashSet<ParticipantId> {
        self.entries
            .iter()
            .flat_map(|e| std::iter::once(e.payer).chain(e.sharers.iter().copied()))
            .collect()
    }
}
