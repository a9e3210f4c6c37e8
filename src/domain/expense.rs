//! Expense: one immutable payment record in an event ledger.

use serde::{Deserialize, Serialize};

use super::error::ValidationError;
use super::money::Money;
use super::primitives::{EventId, ExpenseId, ParticipantId, TimeMs};
use super::split::SplitStrategy;

/// An expense that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseDraft {
    pub title: String,
    pub payer: ParticipantId,
    pub amount: Money,
    pub date: TimeMs,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default)]
    pub split: SplitStrategy,
    /// Participants sharing the cost, in allocation order.
    pub sharers: Vec<ParticipantId>,
}

impl ExpenseDraft {
    /// Equal split of `amount` among `sharers`, dated now.
    pub fn equal(
        title: impl Into<String>,
        payer: ParticipantId,
        amount: Money,
        sharers: Vec<ParticipantId>,
    ) -> Self {
        ExpenseDraft {
            title: title.into(),
            payer,
            amount,
            date: TimeMs::now(),
            tag: None,
            split: SplitStrategy::Equal,
            sharers,
        }
    }

    pub fn with_split(mut self, split: SplitStrategy) -> Self {
        self.split = split;
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_date(mut self, date: TimeMs) -> Self {
        self.date = date;
        self
    }

    /// Per-sharer shares; they always sum to `amount`.
    pub fn shares(&self) -> Result<Vec<(ParticipantId, Money)>, ValidationError> {
        if !self.amount.is_positive() {
            return Err(ValidationError::NonPositiveAmount);
        }
        self.split.shares(self.amount, &self.sharers)
    }

    pub fn into_expense(self, id: ExpenseId, event_id: EventId) -> Expense {
        Expense {
            id,
            event_id,
            title: self.title,
            payer: self.payer,
            amount: self.amount,
            date: self.date,
            tag: self.tag,
            split: self.split,
            sharers: self.sharers,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    pub id: ExpenseId,
    pub event_id: EventId,
    pub title: String,
    pub payer: ParticipantId,
    pub amount: Money,
    pub date: TimeMs,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    pub split: SplitStrategy,
    pub sharers: Vec<ParticipantId>,
}

impl Expense {
    pub fn to_draft(&self) -> ExpenseDraft {
        ExpenseDraft {
            title: self.title.clone(),
            payer: self.payer,
            amount: self.amount,
            date: self.date,
            tag: self.tag.clone(),
            split: self.split.clone(),
            sharers: self.sharers.clone(),
        }
    }

    pub fn shares(&self) -> Result<Vec<(ParticipantId, Money)>, ValidationError> {
        self.split.shares(self.amount, &self.sharers)
    }

    /// True if `participant` paid for or shares this expense.
    pub fn involves(&self, participant: ParticipantId) -> bool {
        self.payer == participant || self.sharers.contains(&participant)
    }
}
