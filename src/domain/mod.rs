//! Domain types for the Splitty expense ledger.
//!
//! This module provides:
//! - Fixed-point money with a currency tag
//! - Identifier and time primitives
//! - Participant, Event, Expense and Debt records
//! - Split strategies that divide an expense into exact shares

pub mod debt;
pub mod error;
pub mod event;
pub mod expense;
pub mod money;
pub mod participant;
pub mod primitives;
pub mod split;

pub use debt::Debt;
pub use error::ValidationError;
pub use event::{Event, NewEvent};
pub use expense::{Expense, ExpenseDraft};
pub use money::Money;
pub use participant::{Participant, ParticipantProfile};
pub use primitives::{Currency, EventId, ExpenseId, ParticipantId, TimeMs};
pub use split::{ExactShare, PercentShare, SplitStrategy};
