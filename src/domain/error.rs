//! Validation failures raised before any ledger mutation.

use super::primitives::{Currency, ParticipantId};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("amount must be greater than zero")]
    NonPositiveAmount,
    #[error("an expense must be shared by at least one participant")]
    EmptySharers,
    #[error("participant {0} is listed more than once")]
    DuplicateSharer(ParticipantId),
    #[error("participant {0} is not a member of this event")]
    NotAMember(ParticipantId),
    #[error("currency mismatch: expected {expected}, got {actual}")]
    CurrencyMismatch { expected: Currency, actual: Currency },
    #[error("shares sum to {actual} minor units but the total is {expected}")]
    ShareMismatch { expected: i64, actual: i64 },
    #[error("percentages sum to {0}, expected 100")]
    PercentageMismatch(String),
    #[error("invalid split: {0}")]
    InvalidSplit(String),
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("invalid currency code: {0}")]
    InvalidCurrency(String),
    #[error("amount overflow")]
    AmountOverflow,
    #[error("debt amount must be positive")]
    NegativeDebt,
    #[error("participant {0} is still referenced by an expense")]
    ParticipantReferenced(ParticipantId),
    #[error("{0} must not be empty")]
    MissingField(&'static str),
}
